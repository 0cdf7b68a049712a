//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "NETCHECK";

/// Settings read from `NETCHECK_*` variables and `KUBECONFIG`
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// NETCHECK_NAMESPACE
    pub namespace: Option<String>,
    /// NETCHECK_SELECTOR
    pub selector: Option<String>,
    /// NETCHECK_WORKERS
    pub workers: Option<usize>,
    /// NETCHECK_PROBE
    pub probe: Option<String>,
    /// NETCHECK_PROBE_TIMEOUT
    pub probe_timeout: Option<u64>,
    /// NETCHECK_POLL_INTERVAL
    pub poll_interval: Option<u64>,
    /// NETCHECK_POLL_TIMEOUT
    pub poll_timeout: Option<u64>,
    /// NETCHECK_FORMAT
    pub format: Option<String>,
    /// NETCHECK_CONFIG
    pub config_file: Option<String>,
    /// NETCHECK_MIGRATION, `<target>[:rollback]`
    pub migration: Option<String>,
    /// KUBECONFIG
    pub kubeconfig: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            namespace: get_env("NAMESPACE"),
            selector: get_env("SELECTOR"),
            workers: get_env_parse("WORKERS"),
            probe: get_env("PROBE"),
            probe_timeout: get_env_parse("PROBE_TIMEOUT"),
            poll_interval: get_env_parse("POLL_INTERVAL"),
            poll_timeout: get_env_parse("POLL_TIMEOUT"),
            format: get_env("FORMAT"),
            config_file: get_env("CONFIG"),
            migration: get_env("MIGRATION"),
            kubeconfig: env::var("KUBECONFIG").ok().filter(|v| !v.is_empty()),
        }
    }

    /// Check if any NETCHECK variables are set
    pub fn has_any(&self) -> bool {
        self.namespace.is_some()
            || self.selector.is_some()
            || self.workers.is_some()
            || self.probe.is_some()
            || self.probe_timeout.is_some()
            || self.poll_interval.is_some()
            || self.poll_timeout.is_some()
            || self.format.is_some()
            || self.config_file.is_some()
            || self.migration.is_some()
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_NAMESPACE:      {:?}", ENV_PREFIX, self.namespace);
        println!("  {}_SELECTOR:       {:?}", ENV_PREFIX, self.selector);
        println!("  {}_WORKERS:        {:?}", ENV_PREFIX, self.workers);
        println!("  {}_PROBE:          {:?}", ENV_PREFIX, self.probe);
        println!("  {}_PROBE_TIMEOUT:  {:?}", ENV_PREFIX, self.probe_timeout);
        println!("  {}_POLL_INTERVAL:  {:?}", ENV_PREFIX, self.poll_interval);
        println!("  {}_POLL_TIMEOUT:   {:?}", ENV_PREFIX, self.poll_timeout);
        println!("  {}_FORMAT:         {:?}", ENV_PREFIX, self.format);
        println!("  {}_CONFIG:         {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_MIGRATION:      {:?}", ENV_PREFIX, self.migration);
        println!("  KUBECONFIG:              {:?}", self.kubeconfig);
    }
}

/// Get environment variable with prefix; empty values count as unset
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}"))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.trim().parse().ok())
}

/// Print all NETCHECK environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_NAMESPACE      Namespace holding the probe pods");
    println!("  {ENV_PREFIX}_SELECTOR       Label selector for probe pods");
    println!("  {ENV_PREFIX}_WORKERS        Maximum concurrent probes (>= 1)");
    println!("  {ENV_PREFIX}_PROBE          Probe type: ping[:count] or http[:port]");
    println!("  {ENV_PREFIX}_PROBE_TIMEOUT  Per-probe timeout in seconds");
    println!("  {ENV_PREFIX}_POLL_INTERVAL  Seconds between status polls");
    println!("  {ENV_PREFIX}_POLL_TIMEOUT   Seconds to wait for a condition");
    println!("  {ENV_PREFIX}_FORMAT         Output format (table, json, json-pretty, csv)");
    println!("  {ENV_PREFIX}_CONFIG         Path to configuration file");
    println!("  {ENV_PREFIX}_MIGRATION      CNI migration target, e.g. OVNKubernetes:rollback");
    println!("  KUBECONFIG              Path to kubeconfig file");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_NAMESPACE=netcheck");
    println!("  export {ENV_PREFIX}_WORKERS=16");
    println!("  netcheck connectivity --selector app=probe");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment is process-global; serialize the tests that touch it
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Sets variables for the test and restores them on drop
    struct EnvGuard {
        previous: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn set(vars: &[(&str, &str)]) -> Self {
            let previous = vars
                .iter()
                .map(|(k, _)| (k.to_string(), env::var(k).ok()))
                .collect();
            for (k, v) in vars {
                env::set_var(k, v);
            }
            Self { previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in &self.previous {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(config.namespace.is_none());
        assert!(!config.has_any());
    }

    #[test]
    fn test_env_load() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::set(&[
            ("NETCHECK_NAMESPACE", "e2e-probes"),
            ("NETCHECK_WORKERS", "12"),
            ("NETCHECK_MIGRATION", "OVNKubernetes:rollback"),
            ("NETCHECK_PROBE_TIMEOUT", " 7 "),
        ]);

        let config = EnvConfig::load();
        assert_eq!(config.namespace.as_deref(), Some("e2e-probes"));
        assert_eq!(config.workers, Some(12));
        assert_eq!(config.probe_timeout, Some(7));
        assert_eq!(config.migration.as_deref(), Some("OVNKubernetes:rollback"));
        assert!(config.has_any());
    }

    #[test]
    fn test_env_unparseable_and_empty_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::set(&[("NETCHECK_WORKERS", "many"), ("NETCHECK_SELECTOR", "")]);

        let config = EnvConfig::load();
        assert_eq!(config.workers, None);
        assert_eq!(config.selector, None);
    }
}
