use crate::cleanup;
use crate::config::{BaseEnvironment, RunConfig};
use crate::domain::resolve_domain;
use crate::environment::{self, Resolution};
use crate::error::{FailedTrigger, PreviewError, Result, Stage};
use crate::railway::Platform;
use crate::readiness::await_ready;
use crate::redeploy::{TriggeredService, redeploy_all};
use crate::variables::apply_variables;

#[derive(Debug)]
pub struct DeployReport {
    pub environment: Resolution,
    pub triggered: Vec<TriggeredService>,
    pub failed: Vec<FailedTrigger>,
    pub domain: Option<String>,
}

/// Bring the preview environment up to date and report its public domain.
pub async fn run_deploy(api: &dyn Platform, cfg: &RunConfig) -> Result<DeployReport> {
    let base = cfg.base_environment.as_ref().ok_or_else(|| {
        PreviewError::Configuration("a base environment is required to deploy".into())
    })?;
    tracing::debug!(preview = %cfg.preview_name, base = %describe_base(base), "deploy: start");

    let environment =
        environment::resolve(api, &cfg.project_id, base, &cfg.preview_name, cfg.reuse).await?;
    let env_id = environment.id().to_string();

    let variables_service = match cfg.variables_service.as_deref() {
        Some(name) => Some(
            environment::find_service(api, &env_id, name, Stage::Configure)
                .await?
                .service_id,
        ),
        None => None,
    };
    apply_variables(
        api,
        &cfg.project_id,
        &env_id,
        variables_service.as_deref(),
        &cfg.variables,
    )
    .await?;

    let outcome = redeploy_all(
        api,
        &cfg.project_id,
        &env_id,
        &cfg.ignore_services,
        cfg.branch.as_deref(),
    )
    .await?;

    if let Some(err) = outcome.partial_error(&env_id) {
        let api_service_missing = cfg
            .api_service_name
            .as_deref()
            .is_some_and(|name| outcome.failed.iter().any(|f| f.service_name == name));
        if cfg.strict_redeploy || outcome.triggered.is_empty() || api_service_missing {
            return Err(err);
        }
        tracing::warn!(error = %err, "deploy: continuing with partially redeployed environment");
    }

    let domain = match cfg.api_service_name.as_deref() {
        None => {
            tracing::info!("deploy: no api service configured, skipping domain resolution");
            None
        }
        Some(name) => {
            let service_id = match outcome.service(name) {
                Some(triggered) => {
                    await_ready(
                        api,
                        name,
                        &triggered.deployment_id,
                        cfg.deploy_timeout,
                        cfg.poll_interval,
                    )
                    .await?;
                    triggered.service_id.clone()
                }
                None => {
                    tracing::info!(service = %name, "deploy: api service was not redeployed, not waiting for it");
                    environment::find_service(api, &env_id, name, Stage::Domain)
                        .await?
                        .service_id
                }
            };
            Some(
                resolve_domain(
                    api,
                    &cfg.project_id,
                    &env_id,
                    &service_id,
                    name,
                    cfg.domain_pattern.as_ref(),
                )
                .await?,
            )
        }
    };

    Ok(DeployReport {
        environment,
        triggered: outcome.triggered,
        failed: outcome.failed,
        domain,
    })
}

/// Remove the preview environment. Returns the deleted id, if there was one.
pub async fn run_cleanup(api: &dyn Platform, cfg: &RunConfig) -> Result<Option<String>> {
    tracing::debug!(preview = %cfg.preview_name, "cleanup: start");
    cleanup::cleanup(api, &cfg.project_id, &cfg.preview_name).await
}

fn describe_base(base: &BaseEnvironment) -> &str {
    match base {
        BaseEnvironment::Id(id) => id,
        BaseEnvironment::Name(name) => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FileConfig, Inputs, Mode};
    use crate::railway::types::DeploymentStatus;
    use crate::testing::FakePlatform;

    fn config(extra: impl FnOnce(&mut Inputs)) -> RunConfig {
        let mut inputs = Inputs {
            token: Some("t".into()),
            project_id: Some("proj".into()),
            base_environment_name: Some("staging".into()),
            preview_environment_name: Some("pr-42".into()),
            environment_variables: Some(r#"{"FEATURE_FLAG":"on"}"#.into()),
            api_service_name: Some("web".into()),
            ignore_service_redeploy: Some(r#"["migrate"]"#.into()),
            branch_name: Some("feature/pr-42".into()),
            ..Inputs::default()
        };
        extra(&mut inputs);
        RunConfig::build(inputs, FileConfig::default(), None).unwrap()
    }

    fn staging() -> FakePlatform {
        FakePlatform::new()
            .with_environment(
                "env-staging",
                "staging",
                &[("svc-web", "web"), ("svc-worker", "worker"), ("svc-migrate", "migrate")],
            )
            .with_status_script(
                "svc-web",
                &[
                    DeploymentStatus::Queued,
                    DeploymentStatus::Building,
                    DeploymentStatus::Success,
                ],
            )
            .with_generated_domain("pr-42-web.up.example")
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end_deploy_reports_the_domain() {
        let api = staging();
        let report = run_deploy(&api, &config(|_| {})).await.unwrap();

        assert_eq!(report.domain.as_deref(), Some("pr-42-web.up.example"));
        assert!(matches!(report.environment, Resolution::Created(_)));
        let names: Vec<_> = report.triggered.iter().map(|s| s.service_name.as_str()).collect();
        assert_eq!(names, vec!["web", "worker"]);
        assert!(report.failed.is_empty());
        assert_eq!(
            api.variables(report.environment.id(), None).get("FEATURE_FLAG").map(String::as_str),
            Some("on")
        );
        assert_eq!(api.count_calls("deployment"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn second_run_reuses_environment_and_domain() {
        let api = staging();
        let cfg = config(|_| {});
        let first = run_deploy(&api, &cfg).await.unwrap();
        let second = run_deploy(&api, &cfg).await.unwrap();
        assert!(matches!(second.environment, Resolution::Reused(_)));
        assert_eq!(first.environment.id(), second.environment.id());
        assert_eq!(second.domain, first.domain);
        assert_eq!(api.count_calls("create_service_domain"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_failure_of_other_service_is_tolerated() {
        let api = staging().with_failing_deploy("svc-worker");
        let report = run_deploy(&api, &config(|_| {})).await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.domain.as_deref(), Some("pr-42-web.up.example"));
    }

    #[tokio::test(start_paused = true)]
    async fn strict_mode_fails_on_any_trigger_failure() {
        let api = staging().with_failing_deploy("svc-worker");
        let cfg = config(|i| i.strict_redeploy = Some("true".into()));
        let err = run_deploy(&api, &cfg).await.unwrap_err();
        assert!(matches!(err, PreviewError::PartialRedeploy { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_api_service_trigger_fails_the_run() {
        let api = staging().with_failing_deploy("svc-web");
        let err = run_deploy(&api, &config(|_| {})).await.unwrap_err();
        assert!(matches!(err, PreviewError::PartialRedeploy { .. }));
        assert_eq!(api.count_calls("domains"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ignored_api_service_is_not_polled() {
        let api = staging();
        let cfg = config(|i| i.ignore_service_redeploy = Some("web,migrate".into()));
        let report = run_deploy(&api, &cfg).await.unwrap();
        assert_eq!(report.domain.as_deref(), Some("pr-42-web.up.example"));
        assert_eq!(api.count_calls("deployment"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn without_api_service_no_domain_is_produced() {
        let api = staging();
        let cfg = config(|i| i.api_service_name = None);
        let report = run_deploy(&api, &cfg).await.unwrap();
        assert_eq!(report.domain, None);
        assert_eq!(api.count_calls("domains"), 0);
    }

    #[tokio::test]
    async fn cleanup_twice_succeeds() {
        let api = staging().with_environment("env-pr", "pr-42", &[]);
        let cfg = config(|i| i.cleanup = Some("true".into()));
        assert_eq!(cfg.mode, Mode::Cleanup);
        assert_eq!(run_cleanup(&api, &cfg).await.unwrap().as_deref(), Some("env-pr"));
        assert_eq!(run_cleanup(&api, &cfg).await.unwrap(), None);
    }
}
