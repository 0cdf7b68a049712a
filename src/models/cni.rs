//! CNI network types and live-migration plans

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ParseError;

/// Cluster default network plugin
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkType {
    #[serde(rename = "OVNKubernetes")]
    OvnKubernetes,
    #[serde(rename = "OpenShiftSDN")]
    OpenShiftSdn,
}

impl NetworkType {
    /// Value used in `spec.networkType` of the cluster Network resource
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::OvnKubernetes => "OVNKubernetes",
            NetworkType::OpenShiftSdn => "OpenShiftSDN",
        }
    }

    /// The plugin a live migration would move away from
    pub fn other(&self) -> NetworkType {
        match self {
            NetworkType::OvnKubernetes => NetworkType::OpenShiftSdn,
            NetworkType::OpenShiftSdn => NetworkType::OvnKubernetes,
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ovnkubernetes" | "ovn-kubernetes" | "ovn" => Ok(NetworkType::OvnKubernetes),
            "openshiftsdn" | "openshift-sdn" | "sdn" => Ok(NetworkType::OpenShiftSdn),
            _ => Err(ParseError::UnknownNetworkType(s.to_string())),
        }
    }
}

/// Target CNI for a live migration, optionally followed by a rollback
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub target: NetworkType,
    #[serde(default)]
    pub rollback: bool,
}

impl MigrationPlan {
    pub fn new(target: NetworkType) -> Self {
        Self {
            target,
            rollback: false,
        }
    }

    pub fn with_rollback(mut self) -> Self {
        self.rollback = true;
        self
    }

    /// Network types to migrate to, in order
    pub fn steps(&self) -> Vec<NetworkType> {
        if self.rollback {
            vec![self.target, self.target.other()]
        } else {
            vec![self.target]
        }
    }
}

impl FromStr for MigrationPlan {
    type Err = ParseError;

    /// Parses `<target>` or `<target>:rollback`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (target, suffix) = match s.split_once(':') {
            Some((target, suffix)) => (target, Some(suffix)),
            None => (s, None),
        };

        let target: NetworkType = target
            .parse()
            .map_err(|_| ParseError::InvalidMigration(s.to_string()))?;

        match suffix.map(|v| v.trim().to_lowercase()) {
            None => Ok(MigrationPlan::new(target)),
            Some(v) if v == "rollback" => Ok(MigrationPlan::new(target).with_rollback()),
            Some(_) => Err(ParseError::InvalidMigration(s.to_string())),
        }
    }
}

impl fmt::Display for MigrationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rollback {
            write!(f, "{} (with rollback)", self.target)
        } else {
            write!(f, "{}", self.target)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_type_parse() {
        assert_eq!("OVNKubernetes".parse::<NetworkType>(), Ok(NetworkType::OvnKubernetes));
        assert_eq!("openshift-sdn".parse::<NetworkType>(), Ok(NetworkType::OpenShiftSdn));
        assert!("calico".parse::<NetworkType>().is_err());
    }

    #[test]
    fn test_network_type_serde_names() {
        let json = serde_json::to_string(&NetworkType::OpenShiftSdn).unwrap();
        assert_eq!(json, "\"OpenShiftSDN\"");
    }

    #[test]
    fn test_migration_plan_steps() {
        let plan: MigrationPlan = "OVNKubernetes".parse().unwrap();
        assert_eq!(plan.steps(), vec![NetworkType::OvnKubernetes]);

        let plan: MigrationPlan = "OVNKubernetes:rollback".parse().unwrap();
        assert!(plan.rollback);
        assert_eq!(
            plan.steps(),
            vec![NetworkType::OvnKubernetes, NetworkType::OpenShiftSdn]
        );
    }

    #[test]
    fn test_migration_plan_rejects_garbage() {
        assert_eq!(
            "OVNKubernetes:later".parse::<MigrationPlan>(),
            Err(ParseError::InvalidMigration("OVNKubernetes:later".to_string()))
        );
        assert!("flannel".parse::<MigrationPlan>().is_err());
    }
}
