//! Secondary network IP assignment checks
//!
//! Reads the Multus `network-status` annotation from pods and checks the
//! addresses handed out by an IPAM plugin such as Whereabouts.

use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

use crate::models::{IpPrefix, ParseError};

pub const NETWORK_STATUS_ANNOTATION: &str = "k8s.v1.cni.cncf.io/network-status";

/// One entry of the network-status annotation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub name: String,
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub default: bool,
}

pub fn parse_network_status(annotation: &str) -> Result<Vec<NetworkStatus>, ParseError> {
    serde_json::from_str(annotation).map_err(|e| ParseError::InvalidNetworkStatus(e.to_string()))
}

/// An address assigned to one pod interface
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAssignment {
    pub pod: String,
    pub namespace: String,
    pub network: String,
    pub interface: Option<String>,
    pub ip: IpAddr,
}

/// Addresses on non-default networks of a pod. A pod without the annotation has none.
pub fn assignments_from_pod(pod: &Pod) -> Result<Vec<IpAssignment>, ParseError> {
    let name = pod.metadata.name.clone().unwrap_or_default();
    let namespace = pod.metadata.namespace.clone().unwrap_or_default();

    let Some(annotation) = pod
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(NETWORK_STATUS_ANNOTATION))
    else {
        return Ok(Vec::new());
    };

    let mut assignments = Vec::new();
    for status in parse_network_status(annotation)? {
        if status.default {
            continue;
        }
        for ip in &status.ips {
            // Some plugins report CIDR notation
            let addr = ip.split('/').next().unwrap_or(ip);
            let ip = addr
                .parse()
                .map_err(|_| ParseError::InvalidAddress(ip.clone()))?;
            assignments.push(IpAssignment {
                pod: name.clone(),
                namespace: namespace.clone(),
                network: status.name.clone(),
                interface: status.interface.clone(),
                ip,
            });
        }
    }

    Ok(assignments)
}

/// An address handed to more than one pod on the same network
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateIp {
    pub network: String,
    pub ip: IpAddr,
    pub pods: Vec<String>,
}

/// Every (network, ip) held by more than one pod, sorted by network then address
pub fn find_duplicate_ips(assignments: &[IpAssignment]) -> Vec<DuplicateIp> {
    let mut holders: BTreeMap<(&str, IpAddr), Vec<String>> = BTreeMap::new();
    for a in assignments {
        holders
            .entry((a.network.as_str(), a.ip))
            .or_default()
            .push(format!("{}/{}", a.namespace, a.pod));
    }

    holders
        .into_iter()
        .filter_map(|((network, ip), mut pods)| {
            pods.sort();
            pods.dedup();
            (pods.len() > 1).then(|| DuplicateIp {
                network: network.to_string(),
                ip,
                pods,
            })
        })
        .collect()
}

/// The range an IPAM plugin is configured to allocate from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRange {
    pub range: IpPrefix,
    #[serde(default)]
    pub exclude: Vec<IpPrefix>,
}

impl IpRange {
    pub fn new(range: IpPrefix) -> Self {
        Self {
            range,
            exclude: Vec::new(),
        }
    }

    pub fn excluding(mut self, prefix: IpPrefix) -> Self {
        self.exclude.push(prefix);
        self
    }

    pub fn allows(&self, ip: IpAddr) -> bool {
        self.range.contains(ip) && !self.exclude.iter().any(|e| e.contains(ip))
    }

    /// Assignments on `network` that the range does not allow
    pub fn violations<'a>(
        &self,
        assignments: &'a [IpAssignment],
        network: &str,
    ) -> Vec<&'a IpAssignment> {
        assignments
            .iter()
            .filter(|a| a.network == network && !self.allows(a.ip))
            .collect()
    }
}

/// Findings for one secondary network
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IpamReport {
    pub network: String,
    pub assignments: usize,
    pub duplicates: Vec<DuplicateIp>,
    pub out_of_range: Vec<IpAssignment>,
}

impl IpamReport {
    pub fn build(assignments: &[IpAssignment], network: &str, range: Option<&IpRange>) -> Self {
        let on_network: Vec<IpAssignment> = assignments
            .iter()
            .filter(|a| a.network == network)
            .cloned()
            .collect();

        Self {
            network: network.to_string(),
            assignments: on_network.len(),
            duplicates: find_duplicate_ips(&on_network),
            out_of_range: range
                .map(|r| r.violations(&on_network, network).into_iter().cloned().collect())
                .unwrap_or_default(),
        }
    }

    pub fn passed(&self) -> bool {
        self.duplicates.is_empty() && self.out_of_range.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ObjectMeta;

    fn pod_with_status(name: &str, status: &str) -> Pod {
        let mut annotations = BTreeMap::new();
        annotations.insert(NETWORK_STATUS_ANNOTATION.to_string(), status.to_string());
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("netcheck".to_string()),
                annotations: Some(annotations),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn status_json(ip: &str) -> String {
        format!(
            r#"[
                {{"name": "ovn-kubernetes", "interface": "eth0", "ips": ["10.128.2.5"], "default": true}},
                {{"name": "netcheck/wb-net", "interface": "net1", "ips": ["{ip}"], "mac": "0a:58:c0:a8:0a:02"}}
            ]"#
        )
    }

    fn assignment(pod: &str, ip: &str) -> IpAssignment {
        IpAssignment {
            pod: pod.to_string(),
            namespace: "netcheck".to_string(),
            network: "netcheck/wb-net".to_string(),
            interface: Some("net1".to_string()),
            ip: ip.parse().unwrap(),
        }
    }

    #[test]
    fn test_parse_network_status() {
        let statuses = parse_network_status(&status_json("192.168.10.2")).unwrap();
        assert_eq!(statuses.len(), 2);
        assert!(statuses[0].default);
        assert_eq!(statuses[1].mac.as_deref(), Some("0a:58:c0:a8:0a:02"));

        assert!(parse_network_status("{not json").is_err());
    }

    #[test]
    fn test_assignments_skip_default_network() {
        let pod = pod_with_status("client-a", &status_json("192.168.10.2/24"));
        let assignments = assignments_from_pod(&pod).unwrap();

        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].network, "netcheck/wb-net");
        assert_eq!(assignments[0].ip.to_string(), "192.168.10.2");
    }

    #[test]
    fn test_pod_without_annotation() {
        assert!(assignments_from_pod(&Pod::default()).unwrap().is_empty());
    }

    #[test]
    fn test_bad_address_rejected() {
        let pod = pod_with_status("client-a", &status_json("not-an-ip"));
        assert_eq!(
            assignments_from_pod(&pod).unwrap_err(),
            ParseError::InvalidAddress("not-an-ip".to_string())
        );
    }

    #[test]
    fn test_find_duplicates() {
        let assignments = vec![
            assignment("a", "192.168.10.2"),
            assignment("b", "192.168.10.3"),
            assignment("c", "192.168.10.2"),
            assignment("d", "192.168.10.4"),
        ];

        let dups = find_duplicate_ips(&assignments);
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].ip.to_string(), "192.168.10.2");
        assert_eq!(dups[0].pods, vec!["netcheck/a", "netcheck/c"]);
    }

    #[test]
    fn test_same_ip_on_different_networks_is_fine() {
        let mut other = assignment("b", "192.168.10.2");
        other.network = "netcheck/other-net".to_string();

        assert!(find_duplicate_ips(&[assignment("a", "192.168.10.2"), other]).is_empty());
    }

    #[test]
    fn test_ipam_report() {
        let mut other = assignment("z", "10.0.0.1");
        other.network = "netcheck/other-net".to_string();
        let assignments = vec![
            assignment("a", "192.168.10.5"),
            assignment("b", "192.168.10.5"),
            assignment("c", "192.168.20.1"),
            other,
        ];
        let range = IpRange::new("192.168.10.0/24".parse().unwrap());

        let report = IpamReport::build(&assignments, "netcheck/wb-net", Some(&range));
        assert_eq!(report.assignments, 3);
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.out_of_range.len(), 1);
        assert_eq!(report.out_of_range[0].pod, "c");
        assert!(!report.passed());

        let report = IpamReport::build(&assignments, "netcheck/other-net", None);
        assert!(report.passed());
    }

    #[test]
    fn test_range_violations() {
        let range = IpRange::new("192.168.10.0/24".parse().unwrap())
            .excluding("192.168.10.0/30".parse().unwrap());

        let assignments = vec![
            assignment("a", "192.168.10.1"),
            assignment("b", "192.168.10.9"),
            assignment("c", "192.168.11.9"),
        ];

        let bad: Vec<&str> = range
            .violations(&assignments, "netcheck/wb-net")
            .iter()
            .map(|a| a.pod.as_str())
            .collect();
        assert_eq!(bad, vec!["a", "c"]);
        assert!(range.violations(&assignments, "other").is_empty());
    }
}
