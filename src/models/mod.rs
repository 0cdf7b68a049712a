//! Data models for cluster network checks
//!
//! Value types shared by the probes, parsers and cluster helpers.

mod cni;
mod endpoint;
mod error;
mod prefix;

pub use cni::{MigrationPlan, NetworkType};
pub use endpoint::{PodEndpoint, ProbePair};
pub use error::ParseError;
pub use prefix::IpPrefix;
