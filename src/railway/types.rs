//! Typed views of the Railway objects railship reads.
//!
//! Every struct ignores fields it does not name so new fields added by the
//! platform never break parsing.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Environment {
    pub id: String,
    pub name: String,
}

/// A service as bound to one environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstance {
    pub service_id: String,
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,
    pub status: DeploymentStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeploymentTrigger {
    pub id: String,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    Initializing,
    Queued,
    Waiting,
    NeedsApproval,
    Building,
    Deploying,
    Success,
    Sleeping,
    Failed,
    Crashed,
    Removing,
    Removed,
    Skipped,
    #[serde(other)]
    Unknown,
}

/// Where a deployment status sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    InProgress,
    Succeeded,
    Failed,
}

impl DeploymentStatus {
    pub fn phase(self) -> Phase {
        match self {
            // A sleeping service has been deployed and is idling.
            DeploymentStatus::Success | DeploymentStatus::Sleeping => Phase::Succeeded,
            DeploymentStatus::Failed
            | DeploymentStatus::Crashed
            | DeploymentStatus::Removing
            | DeploymentStatus::Removed
            | DeploymentStatus::Skipped => Phase::Failed,
            DeploymentStatus::Initializing
            | DeploymentStatus::Queued
            | DeploymentStatus::Waiting
            | DeploymentStatus::NeedsApproval
            | DeploymentStatus::Building
            | DeploymentStatus::Deploying
            | DeploymentStatus::Unknown => Phase::InProgress,
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentStatus::Initializing => "INITIALIZING",
            DeploymentStatus::Queued => "QUEUED",
            DeploymentStatus::Waiting => "WAITING",
            DeploymentStatus::NeedsApproval => "NEEDS_APPROVAL",
            DeploymentStatus::Building => "BUILDING",
            DeploymentStatus::Deploying => "DEPLOYING",
            DeploymentStatus::Success => "SUCCESS",
            DeploymentStatus::Sleeping => "SLEEPING",
            DeploymentStatus::Failed => "FAILED",
            DeploymentStatus::Crashed => "CRASHED",
            DeploymentStatus::Removing => "REMOVING",
            DeploymentStatus::Removed => "REMOVED",
            DeploymentStatus::Skipped => "SKIPPED",
            DeploymentStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Relay-style connection wrapper used by list queries.
#[derive(Debug, Deserialize)]
pub(crate) struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Edge<T> {
    pub node: T,
}

impl<T> Connection<T> {
    pub fn into_nodes(self) -> Vec<T> {
        self.edges.into_iter().map(|e| e.node).collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DomainList {
    #[serde(default)]
    pub service_domains: Vec<DomainRef>,
    #[serde(default)]
    pub custom_domains: Vec<DomainRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DomainRef {
    pub domain: String,
}

impl DomainList {
    /// Hostnames in platform order, generated service domains first.
    pub fn into_hostnames(self) -> Vec<String> {
        self.service_domains
            .into_iter()
            .chain(self.custom_domains)
            .map(|d| d.domain)
            .collect()
    }
}
