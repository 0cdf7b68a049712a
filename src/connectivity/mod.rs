//! Pod-to-pod connectivity checks
//!
//! Builds the directed probe matrix across a set of pods and fans the
//! probes out over the bounded runner.

mod matrix;
mod probe;

pub use matrix::{BrokenPair, ConnectivityMatrix, ConnectivityReport};
pub use probe::{KubectlProber, ProbeKind, Prober};
