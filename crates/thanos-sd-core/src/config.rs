//! Process configuration
//!
//! Everything comes from the environment of the CronJob pod. Settings are read once at
//! startup, validated in one place and then handed to each component by reference.

use std::time::Duration;

use serde::Deserialize;
use thanos_sd_resolver::{DEFAULT_RECORD_MARKER, DEFAULT_TARGET_PORT};

use crate::{
    error::{Error, Result},
    rollout::RolloutConfig,
};

/// Hosted zone holding the store records
pub const ZONE_ID_VAR: &str = "PRIVATE_HOSTED_ZONE_ID";
/// Namespace of the Thanos Query deployment and configmap
pub const NAMESPACE_VAR: &str = "THANOS_NAMESPACE";
/// Name of the Thanos Query deployment
pub const DEPLOYMENT_VAR: &str = "THANOS_DEPLOYMENT_NAME";
/// Name of the service discovery configmap
pub const CONFIGMAP_VAR: &str = "THANOS_CONFIGMAP_NAME";
/// Mattermost incoming webhook for failure alerts
pub const ALERTS_HOOK_VAR: &str = "MATTERMOST_ALERTS_HOOK";

/// Settings exactly as found in the environment
///
/// The `config` crate lowercases environment keys, so field names mirror the variables.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawSettings {
    private_hosted_zone_id: Option<String>,
    thanos_namespace: Option<String>,
    thanos_deployment_name: Option<String>,
    thanos_configmap_name: Option<String>,
    mattermost_alerts_hook: Option<String>,

    rollout_ready_timeout_secs: Option<u64>,
    rollout_poll_interval_secs: Option<u64>,
    store_record_marker: Option<String>,
    store_target_port: Option<u16>,
}

/// Validated configuration for one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreDiscoveryConfig {
    /// Route53 private hosted zone ID
    pub zone_id: String,

    /// Namespace holding the query deployment and the configmap
    pub namespace: String,

    /// Thanos Query deployment to roll
    pub deployment: String,

    /// Configmap holding `servicediscovery.yml`
    pub configmap: String,

    /// Webhook receiving failure notifications
    pub alerts_hook: String,

    /// Readiness bound and polling interval for the rollout
    pub rollout: RolloutConfig,

    /// Substring marking store records
    pub record_marker: String,

    /// Port appended to each store record
    pub target_port: u16,
}

impl StoreDiscoveryConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::default())
    }

    /// Load configuration from an explicit set of variables
    ///
    /// Used by tests and by callers that already captured the environment.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source: config::Map<String, String> =
            vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self::from_environment(config::Environment::default().source(Some(source)))
    }

    /// Values stay strings in the source; numeric fields are converted when
    /// `RawSettings` is deserialized, so names such as `1e3` or `0123` are kept verbatim.
    fn from_environment(environment: config::Environment) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(environment)
            .build()
            .map_err(|e| Error::Config(format!("Failed to read environment: {}", e)))?;

        let raw: RawSettings = settings
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to deserialize environment: {}", e)))?;

        Self::validate(raw)
    }

    fn validate(raw: RawSettings) -> Result<Self> {
        let mut missing = Vec::new();
        let mut required = |value: Option<String>, var: &'static str| match value {
            Some(v) if !v.trim().is_empty() => v,
            _ => {
                missing.push(var);
                String::new()
            },
        };

        let zone_id = required(raw.private_hosted_zone_id, ZONE_ID_VAR);
        let namespace = required(raw.thanos_namespace, NAMESPACE_VAR);
        let deployment = required(raw.thanos_deployment_name, DEPLOYMENT_VAR);
        let configmap = required(raw.thanos_configmap_name, CONFIGMAP_VAR);
        let alerts_hook = required(raw.mattermost_alerts_hook, ALERTS_HOOK_VAR);

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "required environment variables are not set: {}",
                missing.join(", ")
            )));
        }

        if !alerts_hook.starts_with("http://") && !alerts_hook.starts_with("https://") {
            return Err(Error::Config(format!(
                "{} must start with http:// or https://",
                ALERTS_HOOK_VAR
            )));
        }

        let defaults = RolloutConfig::default();
        let rollout = RolloutConfig {
            ready_timeout: raw
                .rollout_ready_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.ready_timeout),
            poll_interval: raw
                .rollout_poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
        };

        if rollout.ready_timeout.is_zero() {
            return Err(Error::Config("ROLLOUT_READY_TIMEOUT_SECS must be greater than 0".into()));
        }
        if rollout.poll_interval.is_zero() {
            return Err(Error::Config("ROLLOUT_POLL_INTERVAL_SECS must be greater than 0".into()));
        }
        if rollout.poll_interval > rollout.ready_timeout {
            tracing::warn!(
                poll_interval_secs = rollout.poll_interval.as_secs(),
                ready_timeout_secs = rollout.ready_timeout.as_secs(),
                "Rollout poll interval exceeds the readiness bound; pods get a single readiness check"
            );
        }

        let record_marker = raw
            .store_record_marker
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_RECORD_MARKER.to_string());

        let target_port = raw.store_target_port.unwrap_or(DEFAULT_TARGET_PORT);
        if target_port == 0 {
            return Err(Error::Config("STORE_TARGET_PORT must be greater than 0".into()));
        }

        Ok(Self {
            zone_id,
            namespace,
            deployment,
            configmap,
            alerts_hook,
            rollout,
            record_marker,
            target_port,
        })
    }
}
