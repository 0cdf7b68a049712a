//! Configuration module
//!
//! File configuration, environment overrides and the resolved
//! [`SuiteConfig`] handed to every check.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::{find_config, load_or_default};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::connectivity::ProbeKind;
use crate::models::{MigrationPlan, ParseError};
use crate::output::OutputFormat;
use crate::utils::PollConfig;

use file::is_yaml_file;

/// Configuration errors detected while resolving settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Worker count must be at least 1 (got {0})")]
    InvalidWorkers(usize),

    #[error("Unknown probe '{0}': expected ping[:count] or http[:port]")]
    InvalidProbe(String),

    #[error("Unknown output format: {0}")]
    InvalidFormat(String),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Application configuration as stored on disk
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Namespace holding the probe pods
    pub namespace: String,

    /// Label selector for probe pods
    pub selector: Option<String>,

    /// Maximum concurrent probes
    pub workers: usize,

    /// Probe type: `ping`, `ping:<count>`, `http`, `http:<port>`
    pub probe: String,

    /// Per-probe timeout in seconds
    pub probe_timeout_secs: u64,

    /// Interval between status polls
    pub poll_interval_secs: u64,

    /// Deadline for a status condition to settle
    pub poll_timeout_secs: u64,

    /// Output format for reports
    pub format: String,

    /// Path to kubeconfig; default discovery when unset
    pub kubeconfig: Option<String>,

    /// CNI live migration target, `<type>[:rollback]`
    pub migration: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            namespace: "netcheck".to_string(),
            selector: Some("app=netcheck-probe".to_string()),
            workers: 8,
            probe: "ping".to_string(),
            probe_timeout_secs: 5,
            poll_interval_secs: 10,
            poll_timeout_secs: 45 * 60,
            format: "table".to_string(),
            kubeconfig: None,
            migration: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Explicit or discovered file (explicit path beats `NETCHECK_CONFIG`), then the environment
    pub fn discover(explicit: Option<&str>, env: &EnvConfig) -> Result<Self> {
        let path = explicit.or(env.config_file.as_deref());
        let mut config = load_or_default(path)?;
        config.merge_env(env);
        Ok(config)
    }

    /// Apply environment overrides (environment wins over file)
    pub fn merge_env(&mut self, env: &EnvConfig) {
        if let Some(ns) = &env.namespace {
            self.namespace = ns.clone();
        }
        if let Some(selector) = &env.selector {
            self.selector = Some(selector.clone());
        }
        if let Some(workers) = env.workers {
            self.workers = workers;
        }
        if let Some(probe) = &env.probe {
            self.probe = probe.clone();
        }
        if let Some(timeout) = env.probe_timeout {
            self.probe_timeout_secs = timeout;
        }
        if let Some(interval) = env.poll_interval {
            self.poll_interval_secs = interval;
        }
        if let Some(timeout) = env.poll_timeout {
            self.poll_timeout_secs = timeout;
        }
        if let Some(format) = &env.format {
            self.format = format.clone();
        }
        if let Some(kubeconfig) = &env.kubeconfig {
            self.kubeconfig = Some(kubeconfig.clone());
        }
        if let Some(migration) = &env.migration {
            self.migration = Some(migration.clone());
        }
    }

    /// Validate and convert into the settings the checks consume
    pub fn resolve(&self) -> Result<SuiteConfig, ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidWorkers(self.workers));
        }

        let probe =
            ProbeKind::parse(&self.probe).ok_or_else(|| ConfigError::InvalidProbe(self.probe.clone()))?;

        let format = OutputFormat::from_str(&self.format)
            .ok_or_else(|| ConfigError::InvalidFormat(self.format.clone()))?;

        let migration = self
            .migration
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .map(str::parse::<MigrationPlan>)
            .transpose()?;

        Ok(SuiteConfig {
            namespace: self.namespace.clone(),
            selector: self.selector.clone().filter(|s| !s.is_empty()),
            workers: self.workers,
            probe,
            probe_timeout_secs: self.probe_timeout_secs,
            poll: PollConfig::new(self.poll_interval_secs, self.poll_timeout_secs),
            format,
            kubeconfig: self.kubeconfig.clone(),
            migration,
        })
    }
}

/// Validated settings passed by reference into each check
#[derive(Clone, Debug)]
pub struct SuiteConfig {
    pub namespace: String,
    pub selector: Option<String>,
    pub workers: usize,
    pub probe: ProbeKind,
    pub probe_timeout_secs: u64,
    pub poll: PollConfig,
    pub format: OutputFormat,
    pub kubeconfig: Option<String>,
    pub migration: Option<MigrationPlan>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NetworkType;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_resolves() {
        let suite = AppConfig::default().resolve().unwrap();
        assert_eq!(suite.namespace, "netcheck");
        assert_eq!(suite.workers, 8);
        assert_eq!(suite.probe, ProbeKind::Ping { count: 1 });
        assert_eq!(suite.format, OutputFormat::Table);
        assert!(suite.migration.is_none());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = AppConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(matches!(config.resolve(), Err(ConfigError::InvalidWorkers(0))));
    }

    #[test]
    fn test_bad_probe_and_format_rejected() {
        let config = AppConfig {
            probe: "sctp".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.resolve(), Err(ConfigError::InvalidProbe(_))));

        let config = AppConfig {
            format: "xml".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.resolve(), Err(ConfigError::InvalidFormat(_))));
    }

    #[test]
    fn test_migration_resolves() {
        let config = AppConfig {
            migration: Some("OVNKubernetes:rollback".to_string()),
            ..Default::default()
        };
        let plan = config.resolve().unwrap().migration.unwrap();
        assert_eq!(plan.target, NetworkType::OvnKubernetes);
        assert!(plan.rollback);

        let config = AppConfig {
            migration: Some("Calico".to_string()),
            ..Default::default()
        };
        assert!(matches!(config.resolve(), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = AppConfig::default();
        let env = EnvConfig {
            namespace: Some("e2e".to_string()),
            workers: Some(2),
            probe: Some("http:9000".to_string()),
            ..Default::default()
        };
        config.merge_env(&env);

        let suite = config.resolve().unwrap();
        assert_eq!(suite.namespace, "e2e");
        assert_eq!(suite.workers, 2);
        assert_eq!(suite.probe, ProbeKind::Http { port: 9000 });
        assert_eq!(suite.probe_timeout_secs, 5);
    }

    #[test]
    fn test_discover_explicit_file_then_env() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("suite.yaml");
        std::fs::write(&path, "namespace: from-file\nworkers: 3\n").unwrap();

        let env = EnvConfig {
            workers: Some(5),
            config_file: Some("/nonexistent/ignored.yaml".to_string()),
            ..Default::default()
        };
        let config = AppConfig::discover(path.to_str(), &env).unwrap();
        assert_eq!(config.namespace, "from-file");
        assert_eq!(config.workers, 5);
    }

    #[test]
    fn test_config_save_load_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("netcheck.yaml");

        let config = AppConfig {
            workers: 16,
            migration: Some("OpenShiftSDN".to_string()),
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("netcheck.json");
        std::fs::write(&path, r#"{"namespace": "probes", "workers": 3}"#).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.namespace, "probes");
        assert_eq!(loaded.workers, 3);
        assert_eq!(loaded.probe, "ping");
    }
}
