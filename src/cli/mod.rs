//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};

/// Cluster networking checks for CNI migration, IPsec, BGP and IPAM rollouts
#[derive(Parser, Debug)]
#[command(name = "netcheck")]
#[command(version)]
#[command(about = "Probe pod connectivity and verify cluster networking state")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Configuration file (defaults to NETCHECK_CONFIG or a discovered file)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to kubeconfig
    #[arg(long, global = true)]
    pub kubeconfig: Option<String>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long, global = true)]
    pub format: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Probe every ordered pair of pods
    Connectivity(ConnectivityArgs),

    /// Check routes learned on a node or pod
    Routes(RoutesArgs),

    /// Capture tunnel traffic and check it is encrypted
    Capture(CaptureArgs),

    /// Check secondary network IP assignments
    Ipam(IpamArgs),

    /// Wait for a status condition on a cluster resource
    Wait(WaitArgs),

    /// Run a CNI live migration
    Migrate(MigrateArgs),

    /// Show environment variable configuration
    Env,

    /// Manage configuration files
    Config(ConfigArgs),
}

/// Arguments for connectivity command
#[derive(Parser, Debug)]
pub struct ConnectivityArgs {
    /// Namespace holding the probe pods
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Label selector for probe pods
    #[arg(short = 'l', long)]
    pub selector: Option<String>,

    /// Maximum concurrent probes
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Probe type: ping[:count] or http[:port]
    #[arg(short, long)]
    pub probe: Option<String>,

    /// Per-probe timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Only probe pairs on different nodes
    #[arg(long)]
    pub cross_node: bool,

    /// Container to exec the probe in
    #[arg(long)]
    pub container: Option<String>,

    /// Save the report to file
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Arguments for routes command
#[derive(Parser, Debug)]
pub struct RoutesArgs {
    /// Pods to read the routing table from (a host-network pod sees node routes)
    #[arg(required = true)]
    pub pods: Vec<String>,

    /// Pod namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Container to exec in
    #[arg(long)]
    pub container: Option<String>,

    /// Prefix that must be present (repeatable)
    #[arg(short, long = "expect")]
    pub expect: Vec<String>,

    /// Routing protocol the prefixes must be learned with
    #[arg(long, default_value = "bgp")]
    pub proto: String,

    /// Read the IPv6 table
    #[arg(long)]
    pub ipv6: bool,

    /// Save the report to file
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Arguments for capture command
#[derive(Parser, Debug)]
pub struct CaptureArgs {
    /// Host-network pod to capture in
    pub pod: String,

    /// Pod namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Container to exec in
    #[arg(long)]
    pub container: Option<String>,

    /// Interface to capture on
    #[arg(short, long, default_value = "br-ex")]
    pub interface: String,

    /// Stop after this many packets
    #[arg(long, default_value = "50")]
    pub count: u32,

    /// Stop after this many seconds
    #[arg(short, long, default_value = "30")]
    pub seconds: u64,

    /// tcpdump filter expression
    #[arg(long)]
    pub filter: Option<String>,
}

/// Arguments for ipam command
#[derive(Parser, Debug)]
pub struct IpamArgs {
    /// Network attachment name as reported in network-status, e.g. ns/wb-net
    pub network: String,

    /// Namespace holding the pods
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Label selector for pods
    #[arg(short = 'l', long)]
    pub selector: Option<String>,

    /// Range the addresses must fall in
    #[arg(short, long)]
    pub range: Option<String>,

    /// Excluded prefix within the range (repeatable)
    #[arg(short = 'x', long)]
    pub exclude: Vec<String>,
}

/// Arguments for wait command
#[derive(Parser, Debug)]
pub struct WaitArgs {
    /// Resource kind: network, routeadvertisements, frrconfiguration, mcp
    pub kind: String,

    /// Resource name
    pub name: String,

    /// Namespace for namespaced resources
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Condition type
    #[arg(long)]
    pub condition: String,

    /// Expected condition status
    #[arg(long, default_value = "True")]
    pub status: String,

    /// Seconds between polls
    #[arg(long)]
    pub interval: Option<u64>,

    /// Seconds to wait before giving up
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Arguments for migrate command
#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// Target network type (OVNKubernetes, OpenShiftSDN); defaults to NETCHECK_MIGRATION
    pub target: Option<String>,

    /// Migrate back to the original network type afterwards
    #[arg(long)]
    pub rollback: bool,

    /// Print the patches without applying them
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for config management
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "netcheck.yaml")]
        output: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print an example configuration
    Example,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_args() {
        let args = Args::parse_from([
            "netcheck",
            "connectivity",
            "-n",
            "probes",
            "--workers",
            "16",
            "--probe",
            "http:8080",
            "--cross-node",
            "-v",
        ]);
        assert!(args.verbose);
        match args.command {
            Command::Connectivity(c) => {
                assert_eq!(c.namespace.as_deref(), Some("probes"));
                assert_eq!(c.workers, Some(16));
                assert_eq!(c.probe.as_deref(), Some("http:8080"));
                assert!(c.cross_node);
                assert!(c.selector.is_none());
            }
            _ => panic!("Expected Connectivity command"),
        }
    }

    #[test]
    fn test_routes_args_repeat_expect() {
        let args = Args::parse_from([
            "netcheck",
            "routes",
            "frr-k8s-abcde",
            "-e",
            "10.128.0.0/23",
            "--expect",
            "10.129.0.0/23",
            "--format",
            "json",
        ]);
        assert_eq!(args.format.as_deref(), Some("json"));
        match args.command {
            Command::Routes(r) => {
                assert_eq!(r.pods, vec!["frr-k8s-abcde"]);
                assert_eq!(r.expect.len(), 2);
                assert_eq!(r.proto, "bgp");
                assert!(!r.ipv6);
            }
            _ => panic!("Expected Routes command"),
        }
    }

    #[test]
    fn test_wait_args() {
        let args = Args::parse_from([
            "netcheck",
            "wait",
            "network",
            "cluster",
            "--condition",
            "NetworkTypeMigrationInProgress",
            "--status",
            "False",
        ]);
        match args.command {
            Command::Wait(w) => {
                assert_eq!(w.kind, "network");
                assert_eq!(w.name, "cluster");
                assert_eq!(w.status, "False");
            }
            _ => panic!("Expected Wait command"),
        }
    }

    #[test]
    fn test_migrate_and_config_args() {
        let args = Args::parse_from(["netcheck", "migrate", "OVNKubernetes", "--rollback"]);
        match args.command {
            Command::Migrate(m) => {
                assert_eq!(m.target.as_deref(), Some("OVNKubernetes"));
                assert!(m.rollback);
            }
            _ => panic!("Expected Migrate command"),
        }

        let args = Args::parse_from(["netcheck", "config", "init", "--force"]);
        match args.command {
            Command::Config(ConfigArgs {
                action: ConfigAction::Init { output, force },
            }) => {
                assert_eq!(output, "netcheck.yaml");
                assert!(force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }
}
