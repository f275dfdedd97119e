use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::PreviewError;
use crate::railway::DEFAULT_API_URL;

const DEFAULT_CONFIG_FILE: &str = ".railship.toml";
const DEFAULT_DEPLOY_TIMEOUT_SECS: u64 = 600;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Raw inputs, as passed on the command line or through GitHub Actions `INPUT_*` variables.
#[derive(Args, Debug, Default)]
pub struct Inputs {
    /// Railway API token
    #[arg(long, global = true, env = "INPUT_RAILWAY_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Railway project id
    #[arg(long, global = true, env = "INPUT_PROJECT_ID")]
    pub project_id: Option<String>,

    /// Id of the environment to fork the preview from
    #[arg(long, global = true, env = "INPUT_BASE_ENVIRONMENT_ID")]
    pub base_environment_id: Option<String>,

    /// Name of the environment to fork the preview from (used when no id is given)
    #[arg(long, global = true, env = "INPUT_BASE_ENVIRONMENT_NAME")]
    pub base_environment_name: Option<String>,

    /// Name of the preview environment, e.g. pr-42
    #[arg(long, global = true, env = "INPUT_PREVIEW_ENVIRONMENT_NAME")]
    pub preview_environment_name: Option<String>,

    /// Flat JSON object of variables to merge into the preview environment
    #[arg(long, global = true, env = "INPUT_ENVIRONMENT_VARIABLES")]
    pub environment_variables: Option<String>,

    /// Scope the variables to this service instead of the whole environment
    #[arg(long, global = true, env = "INPUT_VARIABLES_SERVICE")]
    pub variables_service: Option<String>,

    /// Service whose domain is reported once it is deployed
    #[arg(long, global = true, env = "INPUT_API_SERVICE_NAME")]
    pub api_service_name: Option<String>,

    /// Services to skip when redeploying (JSON array or comma separated)
    #[arg(long, global = true, env = "INPUT_IGNORE_SERVICE_REDEPLOY")]
    pub ignore_service_redeploy: Option<String>,

    /// Branch the preview services deploy from
    #[arg(long, global = true, env = "INPUT_BRANCH_NAME")]
    pub branch_name: Option<String>,

    /// Reuse an existing preview environment of the same name [default: true]
    #[arg(long, global = true, env = "INPUT_REUSE_PREVIEW_ENVIRONMENT", num_args = 0..=1, default_missing_value = "true")]
    pub reuse_preview_environment: Option<String>,

    /// Delete the preview environment instead of deploying it
    #[arg(long, global = true, env = "INPUT_CLEANUP", num_args = 0..=1, default_missing_value = "true")]
    pub cleanup: Option<String>,

    /// Seconds to wait for the API service deployment
    #[arg(long, global = true, env = "INPUT_DEPLOY_TIMEOUT_SECS")]
    pub deploy_timeout_secs: Option<String>,

    /// Seconds between deployment status checks
    #[arg(long, global = true, env = "INPUT_POLL_INTERVAL_SECS")]
    pub poll_interval_secs: Option<String>,

    /// Prefer the first domain matching this regex when a service has several
    #[arg(long, global = true, env = "INPUT_DOMAIN_PATTERN")]
    pub domain_pattern: Option<String>,

    /// Fail the run when any service fails to redeploy
    #[arg(long, global = true, env = "INPUT_STRICT_REDEPLOY", num_args = 0..=1, default_missing_value = "true")]
    pub strict_redeploy: Option<String>,

    /// GraphQL endpoint
    #[arg(long, global = true, env = "RAILSHIP_API_URL")]
    pub api_url: Option<String>,
}

/// Defaults read from `.railship.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub ignore_service_redeploy: Vec<String>,
    pub api_service_name: Option<String>,
    pub deploy_timeout_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub domain_pattern: Option<String>,
}

pub async fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = Path::new(DEFAULT_CONFIG_FILE).to_path_buf();
            if !path.exists() {
                return Ok(FileConfig::default());
            }
            path
        }
    };
    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cfg: FileConfig =
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(cfg)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Deploy,
    Cleanup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseEnvironment {
    Id(String),
    Name(String),
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: Mode,
    pub token: String,
    pub api_url: String,
    pub project_id: String,
    pub base_environment: Option<BaseEnvironment>,
    pub preview_name: String,
    pub variables: BTreeMap<String, String>,
    pub variables_service: Option<String>,
    pub api_service_name: Option<String>,
    pub ignore_services: BTreeSet<String>,
    pub branch: Option<String>,
    pub reuse: bool,
    pub strict_redeploy: bool,
    pub deploy_timeout: Duration,
    pub poll_interval: Duration,
    pub domain_pattern: Option<Regex>,
}

impl RunConfig {
    /// Merge CLI inputs over file defaults and validate the result.
    ///
    /// `forced_mode` comes from an explicit subcommand and wins over the cleanup flag.
    pub fn build(
        inputs: Inputs,
        file: FileConfig,
        forced_mode: Option<Mode>,
    ) -> Result<Self, PreviewError> {
        let cleanup = flag(inputs.cleanup, "cleanup")?.unwrap_or(false);
        let mode = forced_mode.unwrap_or(if cleanup {
            Mode::Cleanup
        } else {
            Mode::Deploy
        });

        let token = required(inputs.token, "token")?;
        let project_id = required(inputs.project_id, "project id")?;
        let preview_name = required(inputs.preview_environment_name, "preview environment name")?;

        let base_environment = match (
            non_empty(inputs.base_environment_id),
            non_empty(inputs.base_environment_name),
        ) {
            (Some(id), _) => Some(BaseEnvironment::Id(id)),
            (None, Some(name)) => Some(BaseEnvironment::Name(name)),
            (None, None) => None,
        };

        let branch = non_empty(inputs.branch_name);
        if mode == Mode::Deploy {
            if base_environment.is_none() {
                return Err(PreviewError::Configuration(
                    "either base environment id or base environment name is required".into(),
                ));
            }
            if branch.is_none() {
                return Err(PreviewError::Configuration("branch name is required".into()));
            }
        }

        let variables = match non_empty(inputs.environment_variables) {
            Some(raw) => parse_variables(&raw)?,
            None => BTreeMap::new(),
        };

        let ignore_services = match non_empty(inputs.ignore_service_redeploy) {
            Some(raw) => parse_service_list(&raw)?,
            None => file.ignore_service_redeploy.into_iter().collect(),
        };

        let deploy_timeout = seconds(
            number(inputs.deploy_timeout_secs, "deploy timeout")?.or(file.deploy_timeout_secs),
            DEFAULT_DEPLOY_TIMEOUT_SECS,
            "deploy timeout",
        )?;
        let poll_interval = seconds(
            number(inputs.poll_interval_secs, "poll interval")?.or(file.poll_interval_secs),
            DEFAULT_POLL_INTERVAL_SECS,
            "poll interval",
        )?;

        let domain_pattern = non_empty(inputs.domain_pattern)
            .or(file.domain_pattern)
            .map(|p| {
                Regex::new(&p).map_err(|e| {
                    PreviewError::Configuration(format!("invalid domain pattern {p:?}: {e}"))
                })
            })
            .transpose()?;

        Ok(Self {
            mode,
            token,
            api_url: non_empty(inputs.api_url).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            project_id,
            base_environment,
            preview_name,
            variables,
            variables_service: non_empty(inputs.variables_service),
            api_service_name: non_empty(inputs.api_service_name).or(file.api_service_name),
            ignore_services,
            branch,
            reuse: flag(inputs.reuse_preview_environment, "reuse preview environment")?
                .unwrap_or(true),
            strict_redeploy: flag(inputs.strict_redeploy, "strict redeploy")?.unwrap_or(false),
            deploy_timeout,
            poll_interval,
            domain_pattern,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, what: &str) -> Result<String, PreviewError> {
    non_empty(value).ok_or_else(|| PreviewError::Configuration(format!("{what} is required")))
}

/// Boolean inputs accept the spellings GitHub Actions users write; empty means unset.
fn flag(value: Option<String>, what: &str) -> Result<Option<bool>, PreviewError> {
    let Some(raw) = non_empty(value) else {
        return Ok(None);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "on" | "1" => Ok(Some(true)),
        "false" | "no" | "n" | "off" | "0" => Ok(Some(false)),
        _ => Err(PreviewError::Configuration(format!(
            "{what} must be a boolean, got {raw:?}"
        ))),
    }
}

fn number(value: Option<String>, what: &str) -> Result<Option<u64>, PreviewError> {
    non_empty(value)
        .map(|raw| {
            raw.parse::<u64>().map_err(|_| {
                PreviewError::Configuration(format!(
                    "{what} must be a whole number of seconds, got {raw:?}"
                ))
            })
        })
        .transpose()
}

fn seconds(value: Option<u64>, default: u64, what: &str) -> Result<Duration, PreviewError> {
    match value.unwrap_or(default) {
        0 => Err(PreviewError::Configuration(format!(
            "{what} must be greater than zero"
        ))),
        secs => Ok(Duration::from_secs(secs)),
    }
}

/// Parse a flat JSON object of string values.
///
/// Nested objects, arrays and non-string scalars are rejected instead of being stringified.
pub fn parse_variables(raw: &str) -> Result<BTreeMap<String, String>, PreviewError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        PreviewError::Configuration(format!("environment variables are not valid JSON: {e}"))
    })?;
    let Value::Object(map) = value else {
        return Err(PreviewError::Configuration(
            "environment variables must be a JSON object".into(),
        ));
    };

    let mut vars = BTreeMap::new();
    for (key, value) in map {
        if key.trim().is_empty() {
            return Err(PreviewError::Configuration(
                "environment variable names must not be empty".into(),
            ));
        }
        match value {
            Value::String(s) => {
                vars.insert(key, s);
            }
            other => {
                return Err(PreviewError::Configuration(format!(
                    "environment variable {key} must be a string, got {}",
                    json_kind(&other)
                )));
            }
        }
    }
    Ok(vars)
}

/// Parse a service list given either as a JSON array of strings or comma separated.
pub fn parse_service_list(raw: &str) -> Result<BTreeSet<String>, PreviewError> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        let names: Vec<String> = serde_json::from_str(raw).map_err(|e| {
            PreviewError::Configuration(format!(
                "service list must be a JSON array of strings: {e}"
            ))
        })?;
        return Ok(names
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect());
    }
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
        .collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
