use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::error::ApiError;
use super::types::{Connection, Deployment, DeploymentTrigger, DomainList, Environment, ServiceInstance};
use super::{ApiResult, Platform};

pub const DEFAULT_API_URL: &str = "https://backboard.railway.app/graphql/v2";

const USER_AGENT: &str = concat!("railship/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const ENVIRONMENTS_QUERY: &str = "query environments($projectId: String!) {
  environments(projectId: $projectId) { edges { node { id name } } }
}";

const ENVIRONMENT_CREATE_MUTATION: &str = "mutation environmentCreate($input: EnvironmentCreateInput!) {
  environmentCreate(input: $input) { id name }
}";

const ENVIRONMENT_DELETE_MUTATION: &str = "mutation environmentDelete($id: String!) {
  environmentDelete(id: $id)
}";

const SERVICE_INSTANCES_QUERY: &str = "query environment($id: String!) {
  environment(id: $id) {
    serviceInstances { edges { node { serviceId serviceName } } }
  }
}";

const VARIABLE_UPSERT_MUTATION: &str = "mutation variableCollectionUpsert($input: VariableCollectionUpsertInput!) {
  variableCollectionUpsert(input: $input)
}";

const DEPLOYMENT_TRIGGERS_QUERY: &str = "query deploymentTriggers($projectId: String!, $environmentId: String!, $serviceId: String!) {
  deploymentTriggers(projectId: $projectId, environmentId: $environmentId, serviceId: $serviceId) {
    edges { node { id branch } }
  }
}";

const DEPLOYMENT_TRIGGER_UPDATE_MUTATION: &str = "mutation deploymentTriggerUpdate($id: String!, $input: DeploymentTriggerUpdateInput!) {
  deploymentTriggerUpdate(id: $id, input: $input) { id }
}";

const SERVICE_DEPLOY_MUTATION: &str = "mutation serviceInstanceDeployV2($environmentId: String!, $serviceId: String!) {
  serviceInstanceDeployV2(environmentId: $environmentId, serviceId: $serviceId)
}";

const DEPLOYMENT_QUERY: &str = "query deployment($id: String!) {
  deployment(id: $id) { id status createdAt }
}";

const DOMAINS_QUERY: &str = "query domains($projectId: String!, $environmentId: String!, $serviceId: String!) {
  domains(projectId: $projectId, environmentId: $environmentId, serviceId: $serviceId) {
    serviceDomains { domain }
    customDomains { domain }
  }
}";

const SERVICE_DOMAIN_CREATE_MUTATION: &str = "mutation serviceDomainCreate($input: ServiceDomainCreateInput!) {
  serviceDomainCreate(input: $input) { domain }
}";

/// Authenticated client for the Railway GraphQL API.
pub struct RailwayClient {
    http: Client,
    api_url: String,
    token: String,
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct ErrorsOnly {
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

impl RailwayClient {
    pub fn new(token: impl Into<String>, api_url: impl Into<String>) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            token: token.into(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn execute<T: DeserializeOwned>(&self, query: &str, variables: Value) -> ApiResult<T> {
        tracing::trace!(api_url = %self.api_url, "railway: sending request");
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .json(&GraphQlRequest { query, variables })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            // GraphQL servers often report rejected operations with a 4xx and an errors array.
            if let Ok(parsed) = serde_json::from_str::<ErrorsOnly>(&body)
                && !parsed.errors.is_empty()
            {
                return Err(ApiError::from_graphql_messages(
                    parsed.errors.into_iter().map(|e| e.message).collect(),
                ));
            }
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        // Errors are checked before the payload is typed, so a partial `data`
        // object never hides a rejected operation.
        let parsed: GraphQlResponse<Value> =
            serde_json::from_str(&body).map_err(|e| ApiError::Parse(e.to_string()))?;
        if !parsed.errors.is_empty() {
            return Err(ApiError::from_graphql_messages(
                parsed.errors.into_iter().map(|e| e.message).collect(),
            ));
        }
        match parsed.data {
            Some(data) if !data.is_null() => {
                serde_json::from_value(data).map_err(|e| ApiError::Parse(e.to_string()))
            }
            _ => Err(ApiError::Parse("response carried no data".into())),
        }
    }
}

#[derive(Deserialize)]
struct EnvironmentsData {
    environments: Connection<Environment>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvironmentCreateData {
    environment_create: Environment,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceInstancesEnvironment {
    service_instances: Connection<ServiceInstance>,
}

#[derive(Deserialize)]
struct ServiceInstancesData {
    environment: ServiceInstancesEnvironment,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentTriggersData {
    deployment_triggers: Connection<DeploymentTrigger>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceDeployData {
    service_instance_deploy_v2: String,
}

#[derive(Deserialize)]
struct DeploymentData {
    deployment: Deployment,
}

#[derive(Deserialize)]
struct DomainsData {
    domains: DomainList,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceDomainCreateData {
    service_domain_create: CreatedDomain,
}

#[derive(Deserialize)]
struct CreatedDomain {
    #[serde(default)]
    domain: String,
}

#[async_trait]
impl Platform for RailwayClient {
    async fn environments(&self, project_id: &str) -> ApiResult<Vec<Environment>> {
        let data: EnvironmentsData = self
            .execute(ENVIRONMENTS_QUERY, json!({ "projectId": project_id }))
            .await?;
        Ok(data.environments.into_nodes())
    }

    async fn create_environment(
        &self,
        project_id: &str,
        name: &str,
        source_environment_id: &str,
    ) -> ApiResult<Environment> {
        let data: EnvironmentCreateData = self
            .execute(
                ENVIRONMENT_CREATE_MUTATION,
                json!({
                    "input": {
                        "projectId": project_id,
                        "name": name,
                        "sourceEnvironmentId": source_environment_id,
                    }
                }),
            )
            .await?;
        Ok(data.environment_create)
    }

    async fn delete_environment(&self, environment_id: &str) -> ApiResult<()> {
        let _: Value = self
            .execute(ENVIRONMENT_DELETE_MUTATION, json!({ "id": environment_id }))
            .await?;
        Ok(())
    }

    async fn service_instances(&self, environment_id: &str) -> ApiResult<Vec<ServiceInstance>> {
        let data: ServiceInstancesData = self
            .execute(SERVICE_INSTANCES_QUERY, json!({ "id": environment_id }))
            .await?;
        Ok(data.environment.service_instances.into_nodes())
    }

    async fn upsert_variables(
        &self,
        project_id: &str,
        environment_id: &str,
        service_id: Option<&str>,
        variables: &BTreeMap<String, String>,
    ) -> ApiResult<()> {
        let mut input = json!({
            "projectId": project_id,
            "environmentId": environment_id,
            "variables": variables,
            "replace": false,
        });
        if let Some(service_id) = service_id {
            input["serviceId"] = Value::from(service_id);
        }
        let _: Value = self
            .execute(VARIABLE_UPSERT_MUTATION, json!({ "input": input }))
            .await?;
        Ok(())
    }

    async fn deployment_triggers(
        &self,
        project_id: &str,
        environment_id: &str,
        service_id: &str,
    ) -> ApiResult<Vec<DeploymentTrigger>> {
        let data: DeploymentTriggersData = self
            .execute(
                DEPLOYMENT_TRIGGERS_QUERY,
                json!({
                    "projectId": project_id,
                    "environmentId": environment_id,
                    "serviceId": service_id,
                }),
            )
            .await?;
        Ok(data.deployment_triggers.into_nodes())
    }

    async fn set_trigger_branch(&self, trigger_id: &str, branch: &str) -> ApiResult<()> {
        let _: Value = self
            .execute(
                DEPLOYMENT_TRIGGER_UPDATE_MUTATION,
                json!({ "id": trigger_id, "input": { "branch": branch } }),
            )
            .await?;
        Ok(())
    }

    async fn deploy_service(&self, environment_id: &str, service_id: &str) -> ApiResult<String> {
        let data: ServiceDeployData = self
            .execute(
                SERVICE_DEPLOY_MUTATION,
                json!({ "environmentId": environment_id, "serviceId": service_id }),
            )
            .await?;
        Ok(data.service_instance_deploy_v2)
    }

    async fn deployment(&self, deployment_id: &str) -> ApiResult<Deployment> {
        let data: DeploymentData = self
            .execute(DEPLOYMENT_QUERY, json!({ "id": deployment_id }))
            .await?;
        Ok(data.deployment)
    }

    async fn domains(
        &self,
        project_id: &str,
        environment_id: &str,
        service_id: &str,
    ) -> ApiResult<Vec<String>> {
        let data: DomainsData = self
            .execute(
                DOMAINS_QUERY,
                json!({
                    "projectId": project_id,
                    "environmentId": environment_id,
                    "serviceId": service_id,
                }),
            )
            .await?;
        Ok(data.domains.into_hostnames())
    }

    async fn create_service_domain(
        &self,
        environment_id: &str,
        service_id: &str,
    ) -> ApiResult<String> {
        let data: ServiceDomainCreateData = self
            .execute(
                SERVICE_DOMAIN_CREATE_MUTATION,
                json!({ "input": { "environmentId": environment_id, "serviceId": service_id } }),
            )
            .await?;
        Ok(data.service_domain_create.domain)
    }
}
