//! In-memory [`Platform`] used by unit tests.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::railway::types::{Deployment, DeploymentStatus, DeploymentTrigger, Environment, ServiceInstance};
use crate::railway::{ApiError, ApiResult, Platform};

#[derive(Default)]
struct State {
    environments: Vec<Environment>,
    services: HashMap<String, Vec<ServiceInstance>>,
    variables: HashMap<(String, Option<String>), BTreeMap<String, String>>,
    triggers: HashMap<(String, String), Vec<DeploymentTrigger>>,
    deployments: HashMap<String, VecDeque<DeploymentStatus>>,
    status_scripts: HashMap<String, Vec<DeploymentStatus>>,
    domains: HashMap<(String, String), Vec<String>>,
    generated_domain: Option<String>,
    failing_deploys: BTreeSet<String>,
    racing_environment: Option<Environment>,
    phantom_conflict: bool,
    fail_list: bool,
    fail_delete: bool,
    next_id: usize,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<State>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_environment(self, id: &str, name: &str, services: &[(&str, &str)]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.environments.push(Environment {
                id: id.into(),
                name: name.into(),
            });
            state.services.insert(
                id.into(),
                services
                    .iter()
                    .map(|(sid, sname)| ServiceInstance {
                        service_id: (*sid).into(),
                        service_name: (*sname).into(),
                    })
                    .collect(),
            );
        }
        self
    }

    pub fn with_variables(self, env_id: &str, vars: &[(&str, &str)]) -> Self {
        self.state.lock().unwrap().variables.insert(
            (env_id.into(), None),
            vars.iter()
                .map(|(k, v)| ((*k).into(), (*v).into()))
                .collect(),
        );
        self
    }

    pub fn with_trigger(self, env_id: &str, service_id: &str, trigger_id: &str, branch: &str) -> Self {
        self.state.lock().unwrap().triggers.insert(
            (env_id.into(), service_id.into()),
            vec![DeploymentTrigger {
                id: trigger_id.into(),
                branch: Some(branch.into()),
            }],
        );
        self
    }

    /// Statuses each new deployment of `service_id` reports, one per poll. The last repeats.
    pub fn with_status_script(self, service_id: &str, statuses: &[DeploymentStatus]) -> Self {
        self.state
            .lock()
            .unwrap()
            .status_scripts
            .insert(service_id.into(), statuses.to_vec());
        self
    }

    pub fn with_domains(self, env_id: &str, service_id: &str, domains: &[&str]) -> Self {
        self.state.lock().unwrap().domains.insert(
            (env_id.into(), service_id.into()),
            domains.iter().map(|d| (*d).into()).collect(),
        );
        self
    }

    pub fn with_generated_domain(self, domain: &str) -> Self {
        self.state.lock().unwrap().generated_domain = Some(domain.into());
        self
    }

    pub fn with_failing_deploy(self, service_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_deploys
            .insert(service_id.into());
        self
    }

    /// Simulate another run creating `name` between our lookup and our create call.
    pub fn with_racing_create(self, id: &str, name: &str) -> Self {
        self.state.lock().unwrap().racing_environment = Some(Environment {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    /// Report a name conflict on create without the environment ever becoming visible.
    pub fn with_phantom_conflict(self) -> Self {
        self.state.lock().unwrap().phantom_conflict = true;
        self
    }

    pub fn with_failing_list(self) -> Self {
        self.state.lock().unwrap().fail_list = true;
        self
    }

    pub fn with_failing_delete(self) -> Self {
        self.state.lock().unwrap().fail_delete = true;
        self
    }

    pub fn environment_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.environments.iter().map(|e| e.name.clone()).collect()
    }

    pub fn variables(&self, env_id: &str, service_id: Option<&str>) -> BTreeMap<String, String> {
        let state = self.state.lock().unwrap();
        state
            .variables
            .get(&(env_id.to_string(), service_id.map(String::from)))
            .cloned()
            .unwrap_or_default()
    }

    pub fn trigger_branch(&self, env_id: &str, service_id: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .triggers
            .get(&(env_id.to_string(), service_id.to_string()))
            .and_then(|t| t.first())
            .and_then(|t| t.branch.clone())
    }

    /// Names of the platform operations called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| *c == name).count()
    }

    fn record(&self, call: &str) -> std::sync::MutexGuard<'_, State> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.to_string());
        state
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn environments(&self, _project_id: &str) -> ApiResult<Vec<Environment>> {
        let state = self.record("environments");
        if state.fail_list {
            return Err(ApiError::Status {
                status: 503,
                message: "service unavailable".into(),
            });
        }
        Ok(state.environments.clone())
    }

    async fn create_environment(
        &self,
        _project_id: &str,
        name: &str,
        source_environment_id: &str,
    ) -> ApiResult<Environment> {
        let mut state = self.record("create_environment");
        if let Some(racer) = state.racing_environment.take() {
            let services = state
                .services
                .get(source_environment_id)
                .cloned()
                .unwrap_or_default();
            state.services.insert(racer.id.clone(), services);
            state.environments.push(racer);
        }
        if state.phantom_conflict || state.environments.iter().any(|e| e.name == name) {
            return Err(ApiError::Conflict(format!("environment {name} already exists")));
        }
        let Some(services) = state.services.get(source_environment_id).cloned() else {
            return Err(ApiError::GraphQl(format!(
                "environment {source_environment_id} not found"
            )));
        };
        state.next_id += 1;
        let env = Environment {
            id: format!("env-created-{}", state.next_id),
            name: name.to_string(),
        };
        state.services.insert(env.id.clone(), services);
        state.environments.push(env.clone());
        Ok(env)
    }

    async fn delete_environment(&self, environment_id: &str) -> ApiResult<()> {
        let mut state = self.record("delete_environment");
        if state.fail_delete {
            return Err(ApiError::Status {
                status: 500,
                message: "internal error".into(),
            });
        }
        state.environments.retain(|e| e.id != environment_id);
        state.services.remove(environment_id);
        Ok(())
    }

    async fn service_instances(&self, environment_id: &str) -> ApiResult<Vec<ServiceInstance>> {
        let state = self.record("service_instances");
        state
            .services
            .get(environment_id)
            .cloned()
            .ok_or_else(|| ApiError::GraphQl(format!("environment {environment_id} not found")))
    }

    async fn upsert_variables(
        &self,
        _project_id: &str,
        environment_id: &str,
        service_id: Option<&str>,
        variables: &BTreeMap<String, String>,
    ) -> ApiResult<()> {
        let mut state = self.record("upsert_variables");
        let current = state
            .variables
            .entry((environment_id.to_string(), service_id.map(String::from)))
            .or_default();
        for (k, v) in variables {
            current.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    async fn deployment_triggers(
        &self,
        _project_id: &str,
        environment_id: &str,
        service_id: &str,
    ) -> ApiResult<Vec<DeploymentTrigger>> {
        let state = self.record("deployment_triggers");
        Ok(state
            .triggers
            .get(&(environment_id.to_string(), service_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn set_trigger_branch(&self, trigger_id: &str, branch: &str) -> ApiResult<()> {
        let mut state = self.record("set_trigger_branch");
        for trigger in state.triggers.values_mut().flatten() {
            if trigger.id == trigger_id {
                trigger.branch = Some(branch.to_string());
            }
        }
        Ok(())
    }

    async fn deploy_service(&self, _environment_id: &str, service_id: &str) -> ApiResult<String> {
        let mut state = self.record("deploy_service");
        if state.failing_deploys.contains(service_id) {
            return Err(ApiError::GraphQl(format!("cannot deploy {service_id}")));
        }
        state.next_id += 1;
        let id = format!("dep-{}-{}", service_id, state.next_id);
        let script = state
            .status_scripts
            .get(service_id)
            .cloned()
            .unwrap_or_else(|| vec![DeploymentStatus::Success]);
        state.deployments.insert(id.clone(), script.into());
        Ok(id)
    }

    async fn deployment(&self, deployment_id: &str) -> ApiResult<Deployment> {
        let mut state = self.record("deployment");
        let statuses = state
            .deployments
            .get_mut(deployment_id)
            .ok_or_else(|| ApiError::GraphQl(format!("deployment {deployment_id} not found")))?;
        let next = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().copied()
        };
        let status = next.unwrap_or(DeploymentStatus::Unknown);
        Ok(Deployment {
            id: deployment_id.to_string(),
            status,
            created_at: None,
        })
    }

    async fn domains(
        &self,
        _project_id: &str,
        environment_id: &str,
        service_id: &str,
    ) -> ApiResult<Vec<String>> {
        let state = self.record("domains");
        Ok(state
            .domains
            .get(&(environment_id.to_string(), service_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn create_service_domain(
        &self,
        environment_id: &str,
        service_id: &str,
    ) -> ApiResult<String> {
        let mut state = self.record("create_service_domain");
        let domain = state.generated_domain.clone().unwrap_or_default();
        if !domain.is_empty() {
            state
                .domains
                .entry((environment_id.to_string(), service_id.to_string()))
                .or_default()
                .push(domain.clone());
        }
        Ok(domain)
    }
}
