use std::collections::BTreeMap;

use crate::error::{PreviewError, Result, Stage};
use crate::railway::Platform;

/// Merge `variables` into the environment, or into one of its services.
///
/// Existing variables not named in `variables` are kept.
pub async fn apply_variables(
    api: &dyn Platform,
    project_id: &str,
    environment_id: &str,
    service_id: Option<&str>,
    variables: &BTreeMap<String, String>,
) -> Result<()> {
    if variables.is_empty() {
        tracing::debug!("configure: no variables to apply");
        return Ok(());
    }

    tracing::info!(
        environment = %environment_id,
        service = service_id.unwrap_or("<shared>"),
        count = variables.len(),
        "configure: upserting variables"
    );
    api.upsert_variables(project_id, environment_id, service_id, variables)
        .await
        .map_err(|e| {
            PreviewError::transport(
                Stage::Configure,
                format!("failed to upsert variables in environment {environment_id}"),
                e,
            )
        })
}
