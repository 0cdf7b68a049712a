//! Pod discovery and command execution
//!
//! Lists probe endpoints and runs diagnostic commands inside pods.

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use tracing::debug;

use super::K8sClient;
use crate::models::PodEndpoint;

/// Pod operations used by the checks
#[derive(Clone)]
pub struct PodManager {
    client: K8sClient,
}

impl PodManager {
    pub fn new(client: K8sClient) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.client().clone(), namespace)
    }

    /// List pods with an optional label selector
    pub async fn list_pods(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<Pod>> {
        let api = self.api(namespace);
        let params = match label_selector {
            Some(selector) => ListParams::default().labels(selector),
            None => ListParams::default(),
        };
        let list = api
            .list(&params)
            .await
            .with_context(|| format!("Failed to list pods in {namespace}"))?;
        Ok(list.items)
    }

    /// Running pods with an IP, as probe endpoints
    pub async fn list_endpoints(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<PodEndpoint>> {
        let pods = self.list_pods(namespace, label_selector).await?;
        let total = pods.len();
        let endpoints: Vec<PodEndpoint> = pods.iter().filter_map(PodEndpoint::from_pod).collect();

        debug!(
            "{} of {} pods in {} are usable endpoints",
            endpoints.len(),
            total,
            namespace
        );

        Ok(endpoints)
    }

    /// Execute a command in a pod and return its stdout
    pub async fn exec_in_pod(
        &self,
        name: &str,
        namespace: &str,
        container: Option<&str>,
        command: Vec<String>,
    ) -> Result<String> {
        exec_in_pod(name, namespace, container, command).await
    }
}

/// Build the `kubectl exec` argument list
pub(crate) fn kubectl_exec_args(
    name: &str,
    namespace: &str,
    container: Option<&str>,
    command: Vec<String>,
) -> Vec<String> {
    let mut args = vec![
        "exec".to_string(),
        "-n".to_string(),
        namespace.to_string(),
        name.to_string(),
    ];
    if let Some(container) = container {
        args.push("-c".to_string());
        args.push(container.to_string());
    }
    args.push("--".to_string());
    args.extend(command);
    args
}

/// Run a command through `kubectl exec`. kube-rs exec needs the `ws` feature,
/// so this shells out instead.
pub(crate) async fn exec_in_pod(
    name: &str,
    namespace: &str,
    container: Option<&str>,
    command: Vec<String>,
) -> Result<String> {
    let args = kubectl_exec_args(name, namespace, container, command);
    debug!("kubectl {}", args.join(" "));

    let output = tokio::process::Command::new("kubectl")
        .args(&args)
        .kill_on_drop(true)
        .output()
        .await
        .context("Failed to execute kubectl")?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!(
            "exec in {namespace}/{name} failed ({}): {}",
            output.status,
            stderr.trim()
        )
    }
}
