use std::collections::BTreeSet;

use crate::error::{FailedTrigger, PreviewError, Result, Stage};
use crate::railway::types::ServiceInstance;
use crate::railway::{ApiResult, Platform};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggeredService {
    pub service_id: String,
    pub service_name: String,
    pub deployment_id: String,
}

#[derive(Debug, Default)]
pub struct RedeployOutcome {
    pub triggered: Vec<TriggeredService>,
    pub failed: Vec<FailedTrigger>,
    pub skipped: Vec<String>,
}

impl RedeployOutcome {
    pub fn service(&self, name: &str) -> Option<&TriggeredService> {
        self.triggered.iter().find(|s| s.service_name == name)
    }

    /// The error describing failed triggers, if there were any.
    pub fn partial_error(&self, environment_id: &str) -> Option<PreviewError> {
        if self.failed.is_empty() {
            return None;
        }
        Some(PreviewError::PartialRedeploy {
            environment_id: environment_id.to_string(),
            failed: self.failed.clone(),
        })
    }
}

/// Trigger a fresh deployment of every service in the environment not named in `ignore`.
///
/// When `branch` is given each service's deployment trigger is pointed at it first.
/// Services are handled independently; failures are collected in the outcome.
pub async fn redeploy_all(
    api: &dyn Platform,
    project_id: &str,
    environment_id: &str,
    ignore: &BTreeSet<String>,
    branch: Option<&str>,
) -> Result<RedeployOutcome> {
    let services = api.service_instances(environment_id).await.map_err(|e| {
        PreviewError::transport(
            Stage::Redeploy,
            format!("failed to list services of environment {environment_id}"),
            e,
        )
    })?;

    let mut outcome = RedeployOutcome::default();
    for service in services {
        if ignore.contains(&service.service_name) {
            tracing::info!(service = %service.service_name, "redeploy: skipping ignored service");
            outcome.skipped.push(service.service_name);
            continue;
        }

        match redeploy_one(api, project_id, environment_id, &service, branch).await {
            Ok(deployment_id) => {
                tracing::info!(
                    service = %service.service_name,
                    deployment = %deployment_id,
                    "redeploy: deployment triggered"
                );
                outcome.triggered.push(TriggeredService {
                    service_id: service.service_id,
                    service_name: service.service_name,
                    deployment_id,
                });
            }
            Err(err) => {
                tracing::warn!(service = %service.service_name, error = %err, "redeploy: trigger failed");
                outcome.failed.push(FailedTrigger {
                    service_name: service.service_name,
                    reason: err.to_string(),
                });
            }
        }
    }

    if outcome.triggered.is_empty() && outcome.failed.is_empty() {
        tracing::info!(environment = %environment_id, "redeploy: no eligible services");
    }
    tracing::debug!(
        triggered = outcome.triggered.len(),
        failed = outcome.failed.len(),
        skipped = outcome.skipped.len(),
        "redeploy: done"
    );
    Ok(outcome)
}

async fn redeploy_one(
    api: &dyn Platform,
    project_id: &str,
    environment_id: &str,
    service: &ServiceInstance,
    branch: Option<&str>,
) -> ApiResult<String> {
    if let Some(branch) = branch {
        let triggers = api
            .deployment_triggers(project_id, environment_id, &service.service_id)
            .await?;
        for trigger in triggers {
            if trigger.branch.as_deref() != Some(branch) {
                tracing::debug!(service = %service.service_name, trigger = %trigger.id, branch, "redeploy: retargeting trigger");
                api.set_trigger_branch(&trigger.id, branch).await?;
            }
        }
    }
    api.deploy_service(environment_id, &service.service_id).await
}
