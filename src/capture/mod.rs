//! Packet capture summaries
//!
//! Classifies `tcpdump -nn` text output so IPsec checks can tell whether
//! node-to-node tunnel traffic is encrypted.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default capture filter: ESP, NAT-T and Geneve
pub const DEFAULT_FILTER: &str = "esp or udp port 4500 or udp port 6081";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSummary {
    pub total: usize,
    pub esp: usize,
    pub geneve: usize,
    pub other: usize,
    /// Distinct security parameter indexes seen in ESP headers
    pub spis: BTreeSet<String>,
}

impl CaptureSummary {
    pub fn parse(text: &str) -> Self {
        let mut summary = Self::default();

        for line in text.lines().map(str::trim) {
            if !is_packet_line(line) {
                continue;
            }
            summary.total += 1;

            if let Some(spi) = esp_spi(line) {
                summary.esp += 1;
                summary.spis.insert(spi);
            } else if line.contains("Geneve") {
                summary.geneve += 1;
            } else {
                summary.other += 1;
            }
        }

        summary
    }

    /// ESP seen and no plaintext Geneve leaked
    pub fn is_encrypted(&self) -> bool {
        self.esp > 0 && self.geneve == 0
    }

    /// Fail unless packets were captured on `source` and all of them were
    /// encrypted
    pub fn ensure_encrypted(&self, source: &str) -> Result<()> {
        if self.total == 0 {
            bail!("No packets captured on {source}; is there traffic on the interface?");
        }
        if !self.is_encrypted() {
            bail!(
                "Traffic on {} is not encrypted: {} ESP, {} plaintext Geneve packets",
                source,
                self.esp,
                self.geneve
            );
        }
        Ok(())
    }
}

/// Packet lines start with a timestamp such as `10:00:00.123456`
fn is_packet_line(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .map(|ts| {
            ts.starts_with(|c: char| c.is_ascii_digit())
                && ts.contains(':')
                && ts.chars().all(|c| c.is_ascii_digit() || c == ':' || c == '.')
        })
        .unwrap_or(false)
}

fn esp_spi(line: &str) -> Option<String> {
    let start = line.find("ESP(spi=")? + "ESP(spi=".len();
    let rest = &line[start..];
    let end = rest.find([',', ')']).unwrap_or(rest.len());
    Some(rest[..end].to_lowercase())
}

/// Exit status of `timeout` when the deadline fires
const TIMEOUT_EXIT: i32 = 124;

/// `tcpdump` invocation bounded by packet count and wall-clock seconds.
///
/// Hitting the deadline counts as a capture; any other non-zero exit is
/// passed through. Arguments reach the script as positional parameters and
/// are never spliced into its text.
pub fn tcpdump_command(interface: &str, count: u32, seconds: u64, filter: &str) -> Vec<String> {
    let script = format!(
        r#"timeout "$1" tcpdump -nn -i "$2" -c "$3" "$4"; rc=$?; [ "$rc" -eq {TIMEOUT_EXIT} ] && exit 0; exit "$rc""#
    );
    vec![
        "sh".to_string(),
        "-c".to_string(),
        script,
        "tcpdump".to_string(),
        seconds.to_string(),
        interface.to_string(),
        count.to_string(),
        filter.to_string(),
    ]
}
