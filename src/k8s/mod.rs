//! Kubernetes API module
//!
//! Cluster access for the network checks: pods, exec, CR status conditions
//! and CNI migration.

mod client;
mod conditions;
mod migration;
mod pod;
#[cfg(test)]
mod scripted;

pub use client::{K8sClient, ObjectStore};
pub use conditions::{ConditionWaiter, ResourceRef};
pub use migration::{migration_patch, NetworkMigrator};
pub use pod::PodManager;
