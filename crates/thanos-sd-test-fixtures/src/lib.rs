//! Test fixtures for store discovery integration tests.
//!
//! In-memory stand-ins for every external system the reconciliation touches:
//!
//! - [`StaticDirectory`]: a Route53-like paged record listing
//! - [`MemoryConfigMaps`]: a configmap store that counts creates and replaces
//! - [`FakeCluster`]: a deployment whose replica set replaces deleted pods
//! - [`RecordingNotifier`]: captures failure messages
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use thanos_sd_core::{RollingRestarter, RolloutConfig};
//! use thanos_sd_test_fixtures::FakeCluster;
//!
//! # async fn example() {
//! let cluster = Arc::new(FakeCluster::with_pods("thanos-query", &["q-1", "q-2"]));
//! let restarter = RollingRestarter::new(cluster.clone(), RolloutConfig::default());
//! let report = restarter.restart("monitoring", "thanos-query").await.unwrap();
//! assert_eq!(report.deleted, cluster.deleted());
//! # }
//! ```

mod cluster;
mod configmaps;
mod directory;
mod notifier;

pub use cluster::{FakeCluster, Replacement, deployment, pod};
pub use configmaps::MemoryConfigMaps;
pub use directory::StaticDirectory;
pub use notifier::RecordingNotifier;
use thanos_sd_resolver::{Target, TargetSequence};

/// Namespace used throughout the tests
pub const NAMESPACE: &str = "monitoring";

/// Build a target sequence from rendered addresses
pub fn targets(addresses: &[&str]) -> TargetSequence {
    addresses.iter().map(|a| Target::from_stored(*a)).collect()
}
