//! Pod endpoints and directed probe pairs

use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// A running pod that can send and receive probes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodEndpoint {
    pub name: String,
    pub namespace: String,
    pub ip: IpAddr,
    pub node: Option<String>,
}

impl PodEndpoint {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ip,
            node: None,
        }
    }

    pub fn on_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// Build from a pod object. Pods that are not Running or lack an IP yield `None`.
    pub fn from_pod(pod: &Pod) -> Option<Self> {
        let name = pod.metadata.name.clone()?;
        let namespace = pod
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string());

        let status = pod.status.as_ref()?;
        if status.phase.as_deref() != Some("Running") {
            return None;
        }
        let ip = status.pod_ip.as_deref()?.parse().ok()?;
        let node = pod.spec.as_ref().and_then(|s| s.node_name.clone());

        Some(Self {
            name,
            namespace,
            ip,
            node,
        })
    }
}

impl fmt::Display for PodEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.namespace, self.name, self.ip)
    }
}

/// Directed probe from one endpoint to another
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbePair {
    pub from: PodEndpoint,
    pub to: PodEndpoint,
}

impl ProbePair {
    /// Both ends scheduled on the same node
    pub fn same_node(&self) -> bool {
        matches!((&self.from.node, &self.to.node), (Some(a), Some(b)) if a == b)
    }
}

impl fmt::Display for ProbePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}
