use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::railway::ApiError;
use crate::railway::types::DeploymentStatus;

/// Step of the run an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Configure,
    Redeploy,
    Poll,
    Domain,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Resolve => "resolve",
            Stage::Configure => "configure",
            Stage::Redeploy => "redeploy",
            Stage::Poll => "poll",
            Stage::Domain => "domain",
        };
        f.write_str(name)
    }
}

/// A service whose deployment trigger failed.
#[derive(Debug, Clone)]
pub struct FailedTrigger {
    pub service_name: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("[{stage}] {what} not found")]
    NotFound { stage: Stage, what: String },

    #[error("[configure] invalid input: {0}")]
    Configuration(String),

    #[error("[redeploy] failed to trigger {} service(s) in environment {environment_id}: {}", .failed.len(), format_failures(.failed))]
    PartialRedeploy {
        environment_id: String,
        failed: Vec<FailedTrigger>,
    },

    #[error("[poll] service {service} not ready after {}s (last status: {last_status})", .timeout.as_secs())]
    DeploymentTimeout {
        service: String,
        last_status: DeploymentStatus,
        timeout: Duration,
    },

    #[error("[poll] deployment {deployment_id} of service {service} ended with status {status}")]
    DeploymentFailed {
        service: String,
        deployment_id: String,
        status: DeploymentStatus,
    },

    #[error("[domain] no domain obtainable for service {service} in environment {environment_id}")]
    DomainUnavailable {
        service: String,
        environment_id: String,
    },

    #[error("[cleanup] failed to delete environment {environment}{}: {source}", describe_id(.environment_id.as_deref()))]
    Cleanup {
        environment: String,
        /// Unknown when the failure happened while looking the environment up.
        environment_id: Option<String>,
        #[source]
        source: ApiError,
    },

    #[error("[{stage}] {context}: {source}")]
    Transport {
        stage: Stage,
        context: String,
        #[source]
        source: ApiError,
    },
}

impl PreviewError {
    pub fn not_found(stage: Stage, what: impl Into<String>) -> Self {
        Self::NotFound {
            stage,
            what: what.into(),
        }
    }

    pub fn transport(stage: Stage, context: impl Into<String>, source: ApiError) -> Self {
        Self::Transport {
            stage,
            context: context.into(),
            source,
        }
    }
}

fn describe_id(id: Option<&str>) -> String {
    id.map(|id| format!(" ({id})")).unwrap_or_default()
}

fn format_failures(failed: &[FailedTrigger]) -> String {
    failed
        .iter()
        .map(|f| format!("{} ({})", f.service_name, f.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, PreviewError>;
