//! CNI live migration
//!
//! Patches the cluster Network resource to a new network type and waits for
//! the operator to pick the change up and finish the rollout.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::info;

use super::conditions::{condition_has_status, conditions_of, find_condition, StatusCondition};
use super::{ConditionWaiter, K8sClient, ObjectStore, ResourceRef};
use crate::models::{MigrationPlan, NetworkType};
use crate::utils::{PollConfig, Stopwatch};

pub const MIGRATION_ANNOTATION: &str = "network.openshift.io/network-type-migration";
pub const MIGRATION_IN_PROGRESS: &str = "NetworkTypeMigrationInProgress";
pub const TARGET_CNI_IN_USE: &str = "NetworkTypeMigrationTargetCNIInUse";

/// Merge patch that starts a live migration to `target`
pub fn migration_patch(target: NetworkType) -> Value {
    json!({
        "metadata": {
            "annotations": {
                MIGRATION_ANNOTATION: ""
            }
        },
        "spec": {
            "networkType": target.as_str()
        }
    })
}

/// The in-progress condition is True, or last changed at or after `since`.
///
/// A completed condition left over from an earlier migration has an older
/// transition time and does not count.
fn migration_started(conditions: &[StatusCondition], since: DateTime<Utc>) -> bool {
    if condition_has_status(conditions, MIGRATION_IN_PROGRESS, "True") {
        return true;
    }

    find_condition(conditions, MIGRATION_IN_PROGRESS)
        .and_then(|c| c.last_transition_time.as_deref())
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .is_some_and(|t| t.timestamp() >= since.timestamp())
}

/// Drives a migration plan against the cluster
pub struct NetworkMigrator<S = K8sClient> {
    waiter: ConditionWaiter<S>,
}

impl<S: ObjectStore> NetworkMigrator<S> {
    pub fn new(store: S, poll: PollConfig) -> Self {
        Self {
            waiter: ConditionWaiter::new(store, poll),
        }
    }

    /// Current `spec.networkType` of the cluster Network
    pub async fn current_network_type(&self) -> Result<Option<NetworkType>> {
        let object = self
            .waiter
            .store()
            .get(&ResourceRef::cluster_network())
            .await
            .context("Failed to get cluster Network")?;

        Ok(object
            .pointer("/spec/networkType")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok()))
    }

    /// Migrate to one network type and wait for completion.
    ///
    /// Waits for the migration to start, then for InProgress=False,
    /// TargetCNIInUse=True and `status.networkType` to report `target`.
    pub async fn migrate_to(&self, target: NetworkType) -> Result<()> {
        let resource = ResourceRef::cluster_network();

        info!("Starting live migration to {}", target);
        let since = Utc::now();
        self.waiter
            .store()
            .merge_patch(&resource, &migration_patch(target))
            .await
            .with_context(|| format!("Failed to start migration to {target}"))?;

        self.waiter
            .wait_for(&resource, "migration start", |object| {
                let conditions = conditions_of(object);
                let seen = find_condition(&conditions, MIGRATION_IN_PROGRESS)
                    .map(|c| match &c.last_transition_time {
                        Some(t) => format!("{c} since {t}"),
                        None => c.to_string(),
                    })
                    .unwrap_or_else(|| format!("{MIGRATION_IN_PROGRESS} not reported"));
                (migration_started(&conditions, since).then_some(()), seen)
            })
            .await?;
        info!("Migration to {} started", target);

        self.waiter
            .wait(&resource, MIGRATION_IN_PROGRESS, "False")
            .await?;
        self.waiter.wait(&resource, TARGET_CNI_IN_USE, "True").await?;

        self.waiter
            .wait_for(&resource, &format!("networkType {target}"), |object| {
                let current = object.pointer("/status/networkType").and_then(Value::as_str);
                let seen = format!("networkType {}", current.unwrap_or("unset"));
                ((current == Some(target.as_str())).then_some(()), seen)
            })
            .await?;

        info!("Cluster network is now {}", target);
        Ok(())
    }

    /// Run every step of the plan in order, stopping at the first failed step
    pub async fn migrate(&self, plan: &MigrationPlan) -> Result<Stopwatch> {
        let mut stopwatch = Stopwatch::new();

        for target in plan.steps() {
            self.migrate_to(target).await?;
            stopwatch.lap(target.as_str());
        }

        Ok(stopwatch)
    }
}
