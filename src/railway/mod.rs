mod client;
mod error;
pub mod types;

use std::collections::BTreeMap;

use async_trait::async_trait;

pub use client::{DEFAULT_API_URL, RailwayClient};
pub use error::ApiError;

use types::{Deployment, DeploymentTrigger, Environment, ServiceInstance};

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// The platform operations a preview run needs.
///
/// [`RailwayClient`] talks to the real API; tests substitute an in-memory
/// implementation.
#[async_trait]
pub trait Platform: Send + Sync {
    /// All environments of a project, in platform order.
    async fn environments(&self, project_id: &str) -> ApiResult<Vec<Environment>>;

    /// Fork `source_environment_id` into a new environment called `name`.
    async fn create_environment(
        &self,
        project_id: &str,
        name: &str,
        source_environment_id: &str,
    ) -> ApiResult<Environment>;

    async fn delete_environment(&self, environment_id: &str) -> ApiResult<()>;

    async fn service_instances(&self, environment_id: &str) -> ApiResult<Vec<ServiceInstance>>;

    /// Merge `variables` into the environment (or one service of it). Keys
    /// not present in `variables` are left untouched.
    async fn upsert_variables(
        &self,
        project_id: &str,
        environment_id: &str,
        service_id: Option<&str>,
        variables: &BTreeMap<String, String>,
    ) -> ApiResult<()>;

    async fn deployment_triggers(
        &self,
        project_id: &str,
        environment_id: &str,
        service_id: &str,
    ) -> ApiResult<Vec<DeploymentTrigger>>;

    async fn set_trigger_branch(&self, trigger_id: &str, branch: &str) -> ApiResult<()>;

    /// Start a fresh deployment and return its id.
    async fn deploy_service(&self, environment_id: &str, service_id: &str) -> ApiResult<String>;

    async fn deployment(&self, deployment_id: &str) -> ApiResult<Deployment>;

    /// Domains bound to a service, in platform order.
    async fn domains(
        &self,
        project_id: &str,
        environment_id: &str,
        service_id: &str,
    ) -> ApiResult<Vec<String>>;

    /// Generate a platform domain for the service and return it.
    async fn create_service_domain(
        &self,
        environment_id: &str,
        service_id: &str,
    ) -> ApiResult<String>;
}
