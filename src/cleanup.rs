use crate::error::{PreviewError, Result};
use crate::railway::Platform;

/// Delete the preview environment called `preview_name`.
///
/// Returns the id of the deleted environment, or `None` when it was already gone.
pub async fn cleanup(
    api: &dyn Platform,
    project_id: &str,
    preview_name: &str,
) -> Result<Option<String>> {
    let environments = api
        .environments(project_id)
        .await
        .map_err(|source| PreviewError::Cleanup {
            environment: preview_name.to_string(),
            environment_id: None,
            source,
        })?;
    let Some(env) = environments.into_iter().find(|e| e.name == preview_name) else {
        tracing::info!(environment = %preview_name, "cleanup: environment not found, nothing to do");
        return Ok(None);
    };

    tracing::info!(environment = %preview_name, id = %env.id, "cleanup: deleting environment");
    api.delete_environment(&env.id)
        .await
        .map_err(|source| PreviewError::Cleanup {
            environment: preview_name.to_string(),
            environment_id: Some(env.id.clone()),
            source,
        })?;
    Ok(Some(env.id))
}
