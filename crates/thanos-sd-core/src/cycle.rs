//! One reconciliation run
//!
//! Resolve the desired targets, compare them with the configmap, and on drift write
//! the configmap and roll the query deployment.

use thanos_sd_resolver::TargetResolver;
use tracing::info;

use crate::{
    config::StoreDiscoveryConfig,
    config_store::{ConfigStore, WriteOutcome},
    error::Result,
    reconcile::detect_drift,
    rollout::{RollingRestarter, RolloutReport},
};

/// Names of the cluster objects a run works on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleTargets {
    /// Hosted zone to resolve
    pub zone_id: String,
    /// Namespace of the deployment and configmap
    pub namespace: String,
    /// Query deployment to roll
    pub deployment: String,
    /// Service discovery configmap
    pub configmap: String,
}

impl From<&StoreDiscoveryConfig> for CycleTargets {
    fn from(config: &StoreDiscoveryConfig) -> Self {
        Self {
            zone_id: config.zone_id.clone(),
            namespace: config.namespace.clone(),
            deployment: config.deployment.clone(),
            configmap: config.configmap.clone(),
        }
    }
}

/// Result of a reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The zone holds no store records; nothing was read or written
    NoTargets,

    /// The configmap already lists the resolved targets
    UpToDate { targets: usize },

    /// The configmap was written and the deployment rolled
    Updated { write: WriteOutcome, rollout: RolloutReport },
}

/// Ties resolver, configmap store and restarter into a single run
#[derive(Debug, Clone)]
pub struct StoreDiscovery {
    resolver: TargetResolver,
    store: ConfigStore,
    restarter: RollingRestarter,
    targets: CycleTargets,
}

impl StoreDiscovery {
    /// Assemble a run from its components
    pub fn new(
        resolver: TargetResolver,
        store: ConfigStore,
        restarter: RollingRestarter,
        targets: CycleTargets,
    ) -> Self {
        Self { resolver, store, restarter, targets }
    }

    /// Perform one reconciliation
    pub async fn run_once(&self) -> Result<CycleOutcome> {
        let CycleTargets { zone_id, namespace, deployment, configmap } = &self.targets;

        info!(zone_id = %zone_id, "Getting Route53 records for hosted zone");
        let desired = self.resolver.resolve(zone_id).await?;
        if desired.is_empty() {
            info!(zone_id = %zone_id, "No Thanos records to register, canceling run");
            return Ok(CycleOutcome::NoTargets);
        }

        let current = self.store.read(configmap, namespace).await?;

        let Some(drift) = detect_drift(&current, &desired) else {
            info!(
                configmap = %configmap,
                targets = desired.len(),
                "The Thanos configmap targets are up to date with existing Route53 targets"
            );
            return Ok(CycleOutcome::UpToDate { targets: desired.len() });
        };

        info!(
            configmap = %configmap,
            drift = %drift,
            current = %current,
            desired = %desired,
            "The Thanos configmap targets are not up to date with existing Route53 targets"
        );

        let write = self.store.write_or_create(configmap, namespace, &desired).await?;
        let rollout = self.restarter.restart(namespace, deployment).await?;

        info!(
            deployment = %deployment,
            deleted = rollout.deleted.len(),
            "Successfully rotated all Thanos Query pods"
        );

        Ok(CycleOutcome::Updated { write, rollout })
    }
}
