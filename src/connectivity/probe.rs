//! Probe implementations
//!
//! A probe sends traffic from one pod to another and fails if it does not
//! get through.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

use crate::k8s::PodManager;
use crate::models::PodEndpoint;

/// Sends one probe between two endpoints
pub trait Prober: Send + Sync + 'static {
    fn probe(
        &self,
        from: &PodEndpoint,
        to: &PodEndpoint,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// What traffic a probe sends
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum ProbeKind {
    /// ICMP echo
    Ping { count: u32 },
    /// HTTP GET against a port on the target pod
    Http { port: u16 },
}

impl Default for ProbeKind {
    fn default() -> Self {
        ProbeKind::Ping { count: 1 }
    }
}

impl ProbeKind {
    /// Command run inside the source pod
    pub fn command(&self, target: IpAddr, timeout_secs: u64) -> Vec<String> {
        match self {
            ProbeKind::Ping { count } => {
                let mut cmd = vec!["ping".to_string()];
                if target.is_ipv6() {
                    cmd.push("-6".to_string());
                }
                cmd.extend([
                    "-c".to_string(),
                    count.to_string(),
                    "-W".to_string(),
                    timeout_secs.to_string(),
                    target.to_string(),
                ]);
                cmd
            }
            ProbeKind::Http { port } => {
                let host = match target {
                    IpAddr::V4(v4) => v4.to_string(),
                    IpAddr::V6(v6) => format!("[{v6}]"),
                };
                vec![
                    "curl".to_string(),
                    "-s".to_string(),
                    "-o".to_string(),
                    "/dev/null".to_string(),
                    "-m".to_string(),
                    timeout_secs.to_string(),
                    format!("http://{host}:{port}/"),
                ]
            }
        }
    }

    /// Parse `ping`, `ping:<count>` or `http:<port>`
    pub fn parse(s: &str) -> Option<Self> {
        let (kind, arg) = match s.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (s, None),
        };
        match (kind.to_lowercase().as_str(), arg) {
            ("ping" | "icmp", None) => Some(ProbeKind::default()),
            ("ping" | "icmp", Some(n)) => n.parse().ok().map(|count| ProbeKind::Ping { count }),
            ("http", None) => Some(ProbeKind::Http { port: 8080 }),
            ("http", Some(p)) => p.parse().ok().map(|port| ProbeKind::Http { port }),
            _ => None,
        }
    }
}

/// Probes by running `ping`/`curl` in the source pod through `kubectl exec`
pub struct KubectlProber {
    pods: PodManager,
    kind: ProbeKind,
    timeout_secs: u64,
    container: Option<String>,
}

impl KubectlProber {
    pub fn new(pods: PodManager, kind: ProbeKind, timeout_secs: u64) -> Self {
        Self {
            pods,
            kind,
            timeout_secs,
            container: None,
        }
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }
}

impl Prober for KubectlProber {
    async fn probe(&self, from: &PodEndpoint, to: &PodEndpoint) -> Result<()> {
        let command = self.kind.command(to.ip, self.timeout_secs);
        debug!("Probing {} -> {}", from, to);

        // The in-pod tool has its own timeout; this bounds kubectl itself
        let deadline = Duration::from_secs(self.timeout_secs + 10);
        let exec = self.pods.exec_in_pod(
            &from.name,
            &from.namespace,
            self.container.as_deref(),
            command,
        );

        match tokio::time::timeout(deadline, exec).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(anyhow!(
                "probe {} -> {} exceeded {}s",
                from.name,
                to.ip,
                deadline.as_secs()
            )),
        }
    }
}
