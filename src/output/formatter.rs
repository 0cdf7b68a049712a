//! Output formatters for check reports
//!
//! Provides Table, JSON, CSV and one-line summary output.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::capture::CaptureSummary;
use crate::connectivity::ConnectivityReport;
use crate::ipam::IpamReport;
use crate::routes::RouteCheck;

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }

    /// Guess from a file extension, for `--output` paths
    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
    }
}

/// Report formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn paint(&self, text: &str, color: &str) -> String {
        if self.colorize {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn verdict(&self, passed: bool) -> String {
        if passed {
            self.paint("✓ PASS", GREEN)
        } else {
            self.paint("✗ FAIL", RED)
        }
    }

    fn json<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.format == OutputFormat::JsonPretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_default()
    }

    /// Format a connectivity matrix report
    pub fn format_connectivity(&self, report: &ConnectivityReport) -> String {
        match self.format {
            OutputFormat::Table => self.format_connectivity_table(report),
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(report),
            OutputFormat::Csv => connectivity_csv(report).unwrap_or_default(),
            OutputFormat::Summary => format!(
                "{} connectivity: {}/{} pairs reachable ({:.1}%) in {}ms",
                self.verdict(report.is_healthy()),
                report.reachable(),
                report.total_pairs,
                report.success_rate(),
                report.duration_ms
            ),
        }
    }

    fn format_connectivity_table(&self, report: &ConnectivityReport) -> String {
        let mut output = String::new();

        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!(
            "║  Connectivity Matrix - {:38} ║\n",
            report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        for pair in &report.broken {
            output.push_str(&format!(
                "║  {} {} -> {}\n║      {}\n",
                self.paint("✗", RED),
                pair.from,
                pair.to,
                pair.error.lines().next().unwrap_or("")
            ));
        }
        if !report.broken.is_empty() {
            output.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        }

        let rate = format!("{:5.1}%", report.success_rate());
        let rate = if report.success_rate() >= 100.0 {
            self.paint(&rate, GREEN)
        } else if report.success_rate() >= 50.0 {
            self.paint(&rate, YELLOW)
        } else {
            self.paint(&rate, RED)
        };

        output.push_str(&format!(
            "║  Pairs: {:4} | Reachable: {:4} | Broken: {:4} | Rate: {}\n",
            report.total_pairs,
            report.reachable(),
            report.broken.len(),
            rate
        ));
        output.push_str(&format!(
            "║  {} | Duration: {}ms\n",
            self.verdict(report.is_healthy()),
            report.duration_ms
        ));
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        output
    }

    /// Format a route advertisement check
    pub fn format_routes(&self, check: &RouteCheck) -> String {
        match self.format {
            OutputFormat::Table => {
                let mut output = String::new();
                output.push_str(&format!(
                    "\nRoutes on {} (proto {}): {}\n",
                    check.source,
                    check.proto,
                    self.verdict(check.passed())
                ));
                output.push_str("──────────────────────────────────────────────────────────────\n");
                for dest in &check.learned {
                    output.push_str(&format!("  {} {dest}\n", self.paint("✓", GREEN)));
                }
                for prefix in &check.missing {
                    output.push_str(&format!("  {} {prefix} (missing)\n", self.paint("✗", RED)));
                }
                output
            }
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(check),
            OutputFormat::Csv => routes_csv(check).unwrap_or_default(),
            OutputFormat::Summary => format!(
                "{} {}: {} {} routes, {} missing",
                self.verdict(check.passed()),
                check.source,
                check.learned.len(),
                check.proto,
                check.missing.len()
            ),
        }
    }

    /// Format a packet capture summary taken on `source`
    pub fn format_capture(&self, source: &str, summary: &CaptureSummary) -> String {
        match self.format {
            OutputFormat::Table => {
                let spis: Vec<&str> = summary.spis.iter().map(String::as_str).collect();
                format!(
                    "\nCapture on {source}: {}\n  packets: {} | esp: {} | geneve: {} | other: {}\n  spis: {}\n",
                    self.verdict(summary.is_encrypted()),
                    summary.total,
                    summary.esp,
                    summary.geneve,
                    summary.other,
                    if spis.is_empty() { "-".to_string() } else { spis.join(", ") }
                )
            }
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(summary),
            OutputFormat::Csv => format!(
                "source,total,esp,geneve,other,spis\n{source},{},{},{},{},{}\n",
                summary.total,
                summary.esp,
                summary.geneve,
                summary.other,
                summary.spis.iter().cloned().collect::<Vec<_>>().join(" ")
            ),
            OutputFormat::Summary => format!(
                "{} {source}: {} esp / {} geneve of {} packets",
                self.verdict(summary.is_encrypted()),
                summary.esp,
                summary.geneve,
                summary.total
            ),
        }
    }

    /// Format IP assignment findings
    pub fn format_ipam(&self, report: &IpamReport) -> String {
        match self.format {
            OutputFormat::Table => {
                let mut output = String::new();
                output.push_str(&format!(
                    "\nIPAM on {} ({} assignments): {}\n",
                    report.network,
                    report.assignments,
                    self.verdict(report.passed())
                ));
                output.push_str("──────────────────────────────────────────────────────────────\n");
                for dup in &report.duplicates {
                    output.push_str(&format!(
                        "  {} {} held by {}\n",
                        self.paint("✗", RED),
                        dup.ip,
                        dup.pods.join(", ")
                    ));
                }
                for a in &report.out_of_range {
                    output.push_str(&format!(
                        "  {} {} on {}/{} is outside the range\n",
                        self.paint("✗", RED),
                        a.ip,
                        a.namespace,
                        a.pod
                    ));
                }
                output
            }
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(report),
            OutputFormat::Csv => ipam_csv(report).unwrap_or_default(),
            OutputFormat::Summary => format!(
                "{} {}: {} assignments, {} duplicates, {} out of range",
                self.verdict(report.passed()),
                report.network,
                report.assignments,
                report.duplicates.len(),
                report.out_of_range.len()
            ),
        }
    }
}

fn csv_string(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

fn connectivity_csv(report: &ConnectivityReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["from", "from_ip", "to", "to_ip", "error"])?;
    for pair in &report.broken {
        writer.write_record([
            format!("{}/{}", pair.from.namespace, pair.from.name),
            pair.from.ip.to_string(),
            format!("{}/{}", pair.to.namespace, pair.to.name),
            pair.to.ip.to_string(),
            pair.error.clone(),
        ])?;
    }
    csv_string(writer)
}

fn routes_csv(check: &RouteCheck) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["source", "destination", "status"])?;
    for dest in &check.learned {
        writer.write_record([check.source.as_str(), dest.as_str(), "learned"])?;
    }
    for prefix in &check.missing {
        writer.write_record([check.source.clone(), prefix.to_string(), "missing".to_string()])?;
    }
    csv_string(writer)
}

fn ipam_csv(report: &IpamReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["network", "ip", "problem", "pods"])?;
    for dup in &report.duplicates {
        writer.write_record([
            dup.network.clone(),
            dup.ip.to_string(),
            "duplicate".to_string(),
            dup.pods.join(" "),
        ])?;
    }
    for a in &report.out_of_range {
        writer.write_record([
            a.network.clone(),
            a.ip.to_string(),
            "out-of-range".to_string(),
            format!("{}/{}", a.namespace, a.pod),
        ])?;
    }
    csv_string(writer)
}

/// Write already formatted output to a file, creating parent directories
pub fn write_output_to_file(path: impl AsRef<Path>, content: &str) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(content.as_bytes())?;
    if !content.ends_with('\n') {
        file.write_all(b"\n")?;
    }

    Ok(())
}
