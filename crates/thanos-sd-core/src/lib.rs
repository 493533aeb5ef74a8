//! Thanos store discovery
//!
//! Keeps the Thanos Query file-SD configmap in line with the store gRPC records of a
//! Route53 private hosted zone, and rolls the query pods when it changes.
//!
//! # Flow
//!
//! 1. [`TargetResolver`] lists the zone and builds the desired `host:10901` targets
//! 2. [`ConfigStore`] reads the targets currently in the configmap
//! 3. [`reconcile::detect_drift`] compares them position by position
//! 4. On drift, the configmap is written and [`RollingRestarter`] replaces the query pods
//!    one at a time
//!
//! Every external system sits behind a trait ([`RecordDirectory`], [`ConfigMapApi`],
//! [`WorkloadApi`], [`Notifier`]) so the flow can run against in-memory fakes.

pub mod config;
pub mod config_store;
pub mod cycle;
pub mod error;
pub mod kubernetes;
pub mod logging;
pub mod notify;
pub mod reconcile;
pub mod rollout;

pub use config::StoreDiscoveryConfig;
pub use config_store::{ConfigMapApi, ConfigStore, SERVICE_DISCOVERY_KEY, WriteOutcome};
pub use cycle::{CycleOutcome, CycleTargets, StoreDiscovery};
pub use error::{Error, Result};
pub use kubernetes::KubeCluster;
pub use notify::{Notifier, WebhookNotifier, report_failure};
pub use reconcile::{Drift, detect_drift, is_up_to_date};
pub use rollout::{PodWait, RollingRestarter, RolloutConfig, RolloutReport, WorkloadApi};
pub use thanos_sd_resolver::{
    RecordDirectory, Route53Directory, Target, TargetResolver, TargetSequence,
};
