use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::error::{PreviewError, Result, Stage};
use crate::railway::Platform;
use crate::railway::types::{Deployment, DeploymentStatus, Phase};

/// Poll a deployment until it succeeds, fails, or `timeout` elapses.
///
/// A failed deployment is reported as [`PreviewError::DeploymentFailed`].
pub async fn await_ready(
    api: &dyn Platform,
    service_name: &str,
    deployment_id: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Deployment> {
    let started = Instant::now();
    let mut last_status = DeploymentStatus::Unknown;

    loop {
        let deployment = api.deployment(deployment_id).await.map_err(|e| {
            PreviewError::transport(
                Stage::Poll,
                format!("failed to read deployment {deployment_id} of service {service_name}"),
                e,
            )
        })?;

        if deployment.status != last_status {
            tracing::info!(
                service = %service_name,
                deployment = %deployment_id,
                status = %deployment.status,
                "poll: status changed"
            );
            last_status = deployment.status;
        }

        match deployment.status.phase() {
            Phase::Succeeded => {
                tracing::debug!(
                    service = %service_name,
                    deployment = %deployment.id,
                    created_at = ?deployment.created_at,
                    waited = ?started.elapsed(),
                    "poll: deployment ready"
                );
                return Ok(deployment);
            }
            Phase::Failed => {
                return Err(PreviewError::DeploymentFailed {
                    service: service_name.to_string(),
                    deployment_id: deployment_id.to_string(),
                    status: deployment.status,
                });
            }
            Phase::InProgress => {}
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(PreviewError::DeploymentTimeout {
                service: service_name.to_string(),
                last_status,
                timeout,
            });
        }
        sleep(poll_interval.min(timeout - elapsed)).await;
    }
}
