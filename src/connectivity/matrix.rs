//! Directed connectivity matrix

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::Prober;
use crate::executor::{work_item, BoundedParallelRunner, WorkItem};
use crate::models::{PodEndpoint, ProbePair};
use crate::utils::Timer;

/// Every ordered pair of distinct endpoints
#[derive(Clone, Debug, Default)]
pub struct ConnectivityMatrix {
    endpoints: Vec<PodEndpoint>,
    cross_node_only: bool,
}

impl ConnectivityMatrix {
    pub fn new(endpoints: Vec<PodEndpoint>) -> Self {
        Self {
            endpoints,
            cross_node_only: false,
        }
    }

    /// Drop pairs whose endpoints share a node
    pub fn cross_node_only(mut self) -> Self {
        self.cross_node_only = true;
        self
    }

    /// Directed pairs in submission order, self pairs excluded
    pub fn pairs(&self) -> Vec<ProbePair> {
        let mut pairs = Vec::new();
        for (i, from) in self.endpoints.iter().enumerate() {
            for (j, to) in self.endpoints.iter().enumerate() {
                if i == j {
                    continue;
                }
                let pair = ProbePair {
                    from: from.clone(),
                    to: to.clone(),
                };
                if self.cross_node_only && pair.same_node() {
                    continue;
                }
                pairs.push(pair);
            }
        }
        pairs
    }

    /// Probe every pair through the runner and report all broken pairs
    pub async fn check<P: Prober>(
        &self,
        prober: Arc<P>,
        runner: &BoundedParallelRunner,
    ) -> ConnectivityReport {
        let started_at = Utc::now();
        let timer = Timer::start("connectivity matrix");
        let pairs = self.pairs();

        info!(
            "Probing {} pairs across {} endpoints with {} workers",
            pairs.len(),
            self.endpoints.len(),
            runner.workers()
        );

        let items: Vec<WorkItem> = pairs
            .iter()
            .cloned()
            .map(|pair| {
                let prober = prober.clone();
                work_item(async move { prober.probe(&pair.from, &pair.to).await })
            })
            .collect();

        let failures = runner.run(items).await;
        debug!("{} of {} pairs failed", failures.len(), pairs.len());

        let mut broken: Vec<BrokenPair> = failures
            .into_iter()
            .filter_map(|failure| {
                let pair = pairs.get(failure.index)?;
                Some(BrokenPair {
                    from: pair.from.clone(),
                    to: pair.to.clone(),
                    error: format!("{:#}", failure.error),
                })
            })
            .collect();
        broken.sort_by(|a, b| {
            (&a.from.name, &a.to.name).cmp(&(&b.from.name, &b.to.name))
        });

        for pair in &broken {
            warn!("{} -> {}: {}", pair.from, pair.to, pair.error);
        }

        ConnectivityReport {
            started_at,
            duration_ms: timer.stop().as_millis() as u64,
            total_pairs: pairs.len(),
            broken,
        }
    }
}

/// One directed pair that failed its probe
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrokenPair {
    pub from: PodEndpoint,
    pub to: PodEndpoint,
    pub error: String,
}

/// Outcome of a full matrix run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub total_pairs: usize,
    pub broken: Vec<BrokenPair>,
}

impl ConnectivityReport {
    pub fn is_healthy(&self) -> bool {
        self.broken.is_empty()
    }

    pub fn reachable(&self) -> usize {
        self.total_pairs - self.broken.len()
    }

    /// Percentage of reachable pairs; an empty matrix counts as fully reachable
    pub fn success_rate(&self) -> f64 {
        if self.total_pairs == 0 {
            100.0
        } else {
            self.reachable() as f64 / self.total_pairs as f64 * 100.0
        }
    }
}
