use crate::config::BaseEnvironment;
use crate::error::{PreviewError, Result, Stage};
use crate::railway::Platform;
use crate::railway::types::{Environment, ServiceInstance};

/// How the preview environment was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Reused(Environment),
    Created(Environment),
    /// Another run created it between our lookup and our create call.
    AdoptedAfterConflict(Environment),
}

impl Resolution {
    pub fn environment(&self) -> &Environment {
        match self {
            Resolution::Reused(env)
            | Resolution::Created(env)
            | Resolution::AdoptedAfterConflict(env) => env,
        }
    }

    pub fn id(&self) -> &str {
        &self.environment().id
    }
}

/// Find an environment of the project by exact name.
pub async fn lookup(
    api: &dyn Platform,
    project_id: &str,
    name: &str,
    stage: Stage,
) -> Result<Option<Environment>> {
    let environments = api.environments(project_id).await.map_err(|e| {
        PreviewError::transport(
            stage,
            format!("failed to list environments of project {project_id}"),
            e,
        )
    })?;
    Ok(environments.into_iter().find(|e| e.name == name))
}

/// Find a service of an environment by exact name.
pub async fn find_service(
    api: &dyn Platform,
    environment_id: &str,
    name: &str,
    stage: Stage,
) -> Result<ServiceInstance> {
    let services = api.service_instances(environment_id).await.map_err(|e| {
        PreviewError::transport(
            stage,
            format!("failed to list services of environment {environment_id}"),
            e,
        )
    })?;
    services
        .into_iter()
        .find(|s| s.service_name == name)
        .ok_or_else(|| {
            PreviewError::not_found(stage, format!("service '{name}' in environment {environment_id}"))
        })
}

/// Return the preview environment called `preview_name`, forking it from `base` when needed.
pub async fn resolve(
    api: &dyn Platform,
    project_id: &str,
    base: &BaseEnvironment,
    preview_name: &str,
    reuse: bool,
) -> Result<Resolution> {
    if reuse && let Some(existing) = lookup(api, project_id, preview_name, Stage::Resolve).await? {
        tracing::info!(environment = %preview_name, id = %existing.id, "resolve: reusing preview environment");
        return Ok(Resolution::Reused(existing));
    }

    let base_id = resolve_base(api, project_id, base).await?;
    tracing::info!(environment = %preview_name, base = %base_id, "resolve: creating preview environment");

    match api.create_environment(project_id, preview_name, &base_id).await {
        Ok(created) => Ok(Resolution::Created(created)),
        Err(err) if err.is_conflict() => {
            tracing::warn!(environment = %preview_name, "resolve: environment already exists, looking it up again");
            match lookup(api, project_id, preview_name, Stage::Resolve).await? {
                Some(existing) => Ok(Resolution::AdoptedAfterConflict(existing)),
                None => Err(PreviewError::transport(
                    Stage::Resolve,
                    format!("failed to create environment {preview_name}"),
                    err,
                )),
            }
        }
        Err(err) => Err(PreviewError::transport(
            Stage::Resolve,
            format!("failed to create environment {preview_name} from {base_id}"),
            err,
        )),
    }
}

async fn resolve_base(
    api: &dyn Platform,
    project_id: &str,
    base: &BaseEnvironment,
) -> Result<String> {
    match base {
        BaseEnvironment::Id(id) => Ok(id.clone()),
        BaseEnvironment::Name(name) => lookup(api, project_id, name, Stage::Resolve)
            .await?
            .map(|env| env.id)
            .ok_or_else(|| {
                PreviewError::not_found(
                    Stage::Resolve,
                    format!("base environment '{name}' in project {project_id}"),
                )
            }),
    }
}
