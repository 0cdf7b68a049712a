//! Status conditions on custom resources
//!
//! Reads `.status.conditions` from arbitrary CRs and waits for a condition
//! to reach a desired status.

use anyhow::{anyhow, Context, Result};
use kube::core::{ApiResource, GroupVersionKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, info};

use super::{K8sClient, ObjectStore};
use crate::utils::{poll_until, PollConfig};

/// A standard Kubernetes-style status condition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl fmt::Display for StatusCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.type_, self.status)?;
        if let Some(reason) = &self.reason {
            write!(f, " ({reason})")?;
        }
        Ok(())
    }
}

/// Extract `.status.conditions` from an object's JSON. Missing or malformed
/// entries are skipped.
pub fn conditions_of(object: &Value) -> Vec<StatusCondition> {
    object
        .pointer("/status/conditions")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|c| serde_json::from_value(c.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

pub fn find_condition<'a>(
    conditions: &'a [StatusCondition],
    type_: &str,
) -> Option<&'a StatusCondition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Status comparison is case-insensitive (`True`/`true`)
pub fn condition_has_status(conditions: &[StatusCondition], type_: &str, status: &str) -> bool {
    find_condition(conditions, type_)
        .map(|c| c.status.eq_ignore_ascii_case(status))
        .unwrap_or(false)
}

/// Identifies a single CR read through the dynamic API
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceRef {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
        plural: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            plural: plural.into(),
            namespace: None,
            name: name.into(),
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// `Network.config.openshift.io/cluster`
    pub fn cluster_network() -> Self {
        Self::new("config.openshift.io", "v1", "Network", "networks", "cluster")
    }

    pub fn route_advertisements(name: impl Into<String>) -> Self {
        Self::new(
            "k8s.ovn.org",
            "v1",
            "RouteAdvertisements",
            "routeadvertisements",
            name,
        )
    }

    pub fn frr_configuration(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(
            "frrk8s.metallb.io",
            "v1beta1",
            "FRRConfiguration",
            "frrconfigurations",
            name,
        )
        .in_namespace(namespace)
    }

    pub fn machine_config_pool(name: impl Into<String>) -> Self {
        Self::new(
            "machineconfiguration.openshift.io",
            "v1",
            "MachineConfigPool",
            "machineconfigpools",
            name,
        )
    }

    /// Resolve a short kind name used on the command line
    pub fn from_kind(kind: &str, name: &str, namespace: Option<&str>) -> Result<Self> {
        let resource = match kind.to_lowercase().as_str() {
            "network" | "networks" => Self::cluster_network(),
            "routeadvertisements" | "ra" => Self::route_advertisements(name),
            "frrconfiguration" | "frrconfigurations" => {
                let ns = namespace.context("FRRConfiguration is namespaced; pass --namespace")?;
                Self::frr_configuration(ns, name)
            }
            "machineconfigpool" | "mcp" => Self::machine_config_pool(name),
            other => return Err(anyhow!("Unsupported resource kind: {other}")),
        };

        // Network is a singleton; keep the explicit name if one was given
        Ok(if name.is_empty() {
            resource
        } else {
            Self {
                name: name.to_string(),
                ..resource
            }
        })
    }

    pub fn api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(&self.group, &self.version, &self.kind);
        ApiResource::from_gvk_with_plural(&gvk, &self.plural)
    }

    /// Full CRD name, e.g. `routeadvertisements.k8s.ovn.org`
    pub fn crd_name(&self) -> String {
        format!("{}.{}", self.plural, self.group)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}.{} {}/{}", self.kind, self.group, ns, self.name),
            None => write!(f, "{}.{} {}", self.kind, self.group, self.name),
        }
    }
}

/// Polls a resource until one of its conditions reaches a status
pub struct ConditionWaiter<S = K8sClient> {
    store: S,
    poll: PollConfig,
}

impl<S: ObjectStore> ConditionWaiter<S> {
    pub fn new(store: S, poll: PollConfig) -> Self {
        Self { store, poll }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Poll `resource` until `check` yields a value.
    ///
    /// `check` also describes what it saw; the last description ends up in the
    /// timeout error. Get errors are retried until the deadline.
    pub async fn wait_for<T, F>(&self, resource: &ResourceRef, what: &str, check: F) -> Result<T>
    where
        F: Fn(&Value) -> (Option<T>, String),
    {
        let last_seen: Mutex<Option<String>> = Mutex::new(None);
        let check = &check;
        let seen_slot = &last_seen;

        let result = poll_until(self.poll, || {
            let object = self.store.get(resource);
            async move {
                let object = object.await?;
                let (value, seen) = check(&object);
                debug!("{}: {}", resource, seen);
                if let Ok(mut slot) = seen_slot.lock() {
                    *slot = Some(seen);
                }
                Ok::<_, anyhow::Error>(value)
            }
        })
        .await;

        result.map_err(|timeout| {
            anyhow!(
                "{} did not reach {}: {}; last observed: {}",
                resource,
                what,
                timeout,
                last_seen
                    .into_inner()
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| "no successful read".to_string())
            )
        })
    }

    /// Wait until `type_` has `status`
    pub async fn wait(
        &self,
        resource: &ResourceRef,
        type_: &str,
        status: &str,
    ) -> Result<StatusCondition> {
        info!(
            "Waiting for {} condition {}={} (timeout {}s)",
            resource,
            type_,
            status,
            self.poll.timeout.as_secs()
        );

        let condition = self
            .wait_for(resource, &format!("{type_}={status}"), |object| {
                let conditions = conditions_of(object);
                let current = find_condition(&conditions, type_).cloned();
                let seen = current
                    .as_ref()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| format!("{type_} not reported"));
                let reached = condition_has_status(&conditions, type_, status);
                (current.filter(|_| reached), seen)
            })
            .await?;

        info!("{} reached {}", resource, condition);
        Ok(condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::scripted::ScriptedStore;
    use serde_json::json;

    fn network_status() -> Value {
        json!({
            "apiVersion": "config.openshift.io/v1",
            "kind": "Network",
            "metadata": {"name": "cluster"},
            "status": {
                "networkType": "OVNKubernetes",
                "conditions": [
                    {
                        "type": "NetworkTypeMigrationInProgress",
                        "status": "False",
                        "reason": "NetworkTypeMigrationCompleted",
                        "lastTransitionTime": "2026-10-01T10:00:00Z"
                    },
                    {
                        "type": "NetworkTypeMigrationTargetCNIInUse",
                        "status": "True"
                    },
                    {"bogus": true}
                ]
            }
        })
    }

    #[test]
    fn test_conditions_of_skips_malformed() {
        let conditions = conditions_of(&network_status());
        assert_eq!(conditions.len(), 2);
        assert_eq!(
            conditions[0].reason.as_deref(),
            Some("NetworkTypeMigrationCompleted")
        );
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2026-10-01T10:00:00Z")
        );
    }

    #[test]
    fn test_conditions_missing_status() {
        assert!(conditions_of(&json!({"metadata": {}})).is_empty());
        assert!(conditions_of(&json!({"status": {"conditions": "nope"}})).is_empty());
    }

    #[test]
    fn test_condition_has_status() {
        let conditions = conditions_of(&network_status());
        assert!(condition_has_status(
            &conditions,
            "NetworkTypeMigrationInProgress",
            "false"
        ));
        assert!(condition_has_status(
            &conditions,
            "NetworkTypeMigrationTargetCNIInUse",
            "True"
        ));
        assert!(!condition_has_status(&conditions, "Degraded", "False"));
    }

    #[test]
    fn test_condition_display() {
        let conditions = conditions_of(&network_status());
        assert_eq!(
            conditions[0].to_string(),
            "NetworkTypeMigrationInProgress=False (NetworkTypeMigrationCompleted)"
        );
        assert_eq!(
            conditions[1].to_string(),
            "NetworkTypeMigrationTargetCNIInUse=True"
        );
    }

    #[test]
    fn test_resource_presets() {
        let ra = ResourceRef::route_advertisements("default");
        assert_eq!(ra.crd_name(), "routeadvertisements.k8s.ovn.org");
        assert_eq!(ra.to_string(), "RouteAdvertisements.k8s.ovn.org default");

        let frr = ResourceRef::frr_configuration("openshift-frr-k8s", "receive-all");
        assert_eq!(
            frr.to_string(),
            "FRRConfiguration.frrk8s.metallb.io openshift-frr-k8s/receive-all"
        );

        let ar = ResourceRef::machine_config_pool("worker").api_resource();
        assert_eq!(ar.api_version, "machineconfiguration.openshift.io/v1");
        assert_eq!(ar.plural, "machineconfigpools");
    }

    #[test]
    fn test_from_kind() {
        let mcp = ResourceRef::from_kind("mcp", "master", None).unwrap();
        assert_eq!(mcp.name, "master");

        let net = ResourceRef::from_kind("Network", "", None).unwrap();
        assert_eq!(net.name, "cluster");

        assert!(ResourceRef::from_kind("frrconfiguration", "x", None).is_err());
        assert!(ResourceRef::from_kind("deployment", "x", None).is_err());
    }

    fn in_progress() -> Value {
        json!({
            "status": {
                "conditions": [
                    {
                        "type": "NetworkTypeMigrationInProgress",
                        "status": "True",
                        "reason": "NetworkTypeMigrationStarted"
                    }
                ]
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_retries_through_get_errors() {
        let store = ScriptedStore::new(vec![None, None, Some(network_status())]);
        let waiter = ConditionWaiter::new(store, PollConfig::new(5, 60));

        let condition = waiter
            .wait(
                &ResourceRef::cluster_network(),
                "NetworkTypeMigrationInProgress",
                "False",
            )
            .await
            .unwrap();

        assert_eq!(condition.status, "False");
        assert_eq!(waiter.store().gets(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_names_resource_and_last_condition() {
        let store = ScriptedStore::new(vec![Some(in_progress())]);
        let waiter = ConditionWaiter::new(store, PollConfig::new(5, 20));

        let err = waiter
            .wait(
                &ResourceRef::cluster_network(),
                "NetworkTypeMigrationInProgress",
                "False",
            )
            .await
            .unwrap_err()
            .to_string();

        assert!(err.starts_with(
            "Network.config.openshift.io cluster did not reach NetworkTypeMigrationInProgress=False"
        ));
        assert!(err.contains("Timed out"));
        assert!(err.ends_with(
            "last observed: NetworkTypeMigrationInProgress=True (NetworkTypeMigrationStarted)"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_when_every_read_fails() {
        let store = ScriptedStore::new(vec![None]);
        let waiter = ConditionWaiter::new(store, PollConfig::new(5, 20));

        let err = waiter
            .wait(&ResourceRef::machine_config_pool("worker"), "Updated", "True")
            .await
            .unwrap_err()
            .to_string();

        assert!(err.contains("MachineConfigPool.machineconfiguration.openshift.io worker"));
        assert!(err.ends_with("last observed: no successful read"));
        assert_eq!(waiter.store().gets(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_reports_missing_condition() {
        let store = ScriptedStore::new(vec![Some(json!({"status": {}}))]);
        let waiter = ConditionWaiter::new(store, PollConfig::new(5, 10));

        let err = waiter
            .wait(&ResourceRef::route_advertisements("default"), "Accepted", "True")
            .await
            .unwrap_err()
            .to_string();

        assert!(err.ends_with("last observed: Accepted not reported"));
    }
}
