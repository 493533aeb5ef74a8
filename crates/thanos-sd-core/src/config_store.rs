//! Service discovery configmap access
//!
//! Thanos Query reads its store targets from a file-SD document mounted from a
//! configmap. The document is a YAML list of target groups:
//!
//! ```yaml
//! - targets:
//!   - store-a-grpc.example.internal.:10901
//!   - store-b-grpc.example.internal.:10901
//! ```
//!
//! Only the first group is read and exactly one group is ever written.

use std::{collections::BTreeMap, fmt, sync::Arc};

use async_trait::async_trait;
use k8s_openapi::{api::core::v1::ConfigMap, apimachinery::pkg::apis::meta::v1::ObjectMeta};
use serde::{Deserialize, Serialize};
use thanos_sd_resolver::{Target, TargetSequence};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Configmap data key holding the file-SD document
pub const SERVICE_DISCOVERY_KEY: &str = "servicediscovery.yml";

/// Namespaced configmap operations used by the store
#[async_trait]
pub trait ConfigMapApi: Send + Sync + fmt::Debug {
    /// Fetch a configmap, `None` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>>;

    /// Create a configmap
    async fn create(&self, namespace: &str, configmap: &ConfigMap) -> Result<()>;

    /// Replace an existing configmap wholesale
    async fn replace(&self, namespace: &str, name: &str, configmap: &ConfigMap) -> Result<()>;
}

/// One group of the file-SD document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    #[serde(default)]
    pub targets: Vec<String>,
}

/// Parse a file-SD document; an empty or null document has no groups
pub fn decode_document(data: &str) -> std::result::Result<Vec<TargetGroup>, serde_yaml::Error> {
    if data.trim().is_empty() {
        return Ok(Vec::new());
    }
    let groups: Option<Vec<TargetGroup>> = serde_yaml::from_str(data)?;
    Ok(groups.unwrap_or_default())
}

/// Render targets as a single-group file-SD document
pub fn encode_document(targets: &TargetSequence) -> std::result::Result<String, serde_yaml::Error> {
    serde_yaml::to_string(&[TargetGroup { targets: targets.to_strings() }])
}

/// What `write_or_create` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The configmap did not exist and was created
    Created,
    /// The existing configmap was replaced
    Replaced,
}

/// Reads and writes the store targets held in the service discovery configmap
#[derive(Debug, Clone)]
pub struct ConfigStore {
    api: Arc<dyn ConfigMapApi>,
}

impl ConfigStore {
    /// Create a store over a configmap API
    pub fn new(api: Arc<dyn ConfigMapApi>) -> Self {
        Self { api }
    }

    /// Read the currently deployed targets
    ///
    /// A missing configmap or a missing data key yields an empty sequence.
    ///
    /// # Arguments
    ///
    /// * `name` - Configmap name
    /// * `namespace` - Namespace holding the configmap
    ///
    /// # Errors
    ///
    /// Returns `Error::Kubernetes` if the configmap cannot be fetched, or
    /// `Error::Decode` if the stored document does not parse.
    pub async fn read(&self, name: &str, namespace: &str) -> Result<TargetSequence> {
        let Some(configmap) = self.api.get(namespace, name).await? else {
            info!(configmap = %name, namespace = %namespace, "Configmap does not exist yet");
            return Ok(TargetSequence::new());
        };

        let data = configmap
            .data
            .as_ref()
            .and_then(|d| d.get(SERVICE_DISCOVERY_KEY))
            .map(String::as_str)
            .unwrap_or_default();

        debug!(configmap = %name, namespace = %namespace, "Decoding service discovery document");
        let groups = decode_document(data).map_err(|source| Error::Decode {
            configmap: format!("{}/{}", namespace, name),
            source,
        })?;

        let targets: TargetSequence = groups
            .into_iter()
            .next()
            .map(|group| group.targets.into_iter().map(Target::from_stored).collect())
            .unwrap_or_default();

        debug!(configmap = %name, namespace = %namespace, targets = targets.len(), "Read stored targets");
        Ok(targets)
    }

    /// Write the targets, creating the configmap when it does not exist
    ///
    /// An existing configmap has its whole data map replaced; there is no merge with
    /// other keys and no resource version check.
    ///
    /// # Arguments
    ///
    /// * `name` - Configmap name
    /// * `namespace` - Namespace holding the configmap
    /// * `targets` - Targets to store, in order, as a single group
    ///
    /// # Errors
    ///
    /// Returns `Error::Encode` if the document cannot be rendered, or
    /// `Error::Kubernetes` if the lookup, create or replace fails.
    pub async fn write_or_create(
        &self,
        name: &str,
        namespace: &str,
        targets: &TargetSequence,
    ) -> Result<WriteOutcome> {
        let document = encode_document(targets).map_err(Error::Encode)?;
        let configmap = ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(SERVICE_DISCOVERY_KEY.to_string(), document)])),
            ..Default::default()
        };

        if self.api.get(namespace, name).await?.is_none() {
            info!(configmap = %name, namespace = %namespace, "Configmap does not exist, creating");
            self.api.create(namespace, &configmap).await?;
            return Ok(WriteOutcome::Created);
        }

        info!(configmap = %name, namespace = %namespace, "Configmap exists, replacing");
        self.api.replace(namespace, name, &configmap).await?;
        Ok(WriteOutcome::Replaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hand_written_document() {
        let data = "- targets:\n  - a-grpc.zone.:10901\n  - b-grpc.zone.:10901";
        let groups = decode_document(data).unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].targets, vec!["a-grpc.zone.:10901", "b-grpc.zone.:10901"]);
    }

    #[test]
    fn test_decode_empty_and_null_documents() {
        assert!(decode_document("").unwrap().is_empty());
        assert!(decode_document("  \n").unwrap().is_empty());
        assert!(decode_document("~").unwrap().is_empty());
    }

    #[test]
    fn test_decode_group_without_targets() {
        let groups = decode_document("- labels:\n    env: prod").unwrap();
        assert_eq!(groups, vec![TargetGroup::default()]);
    }

    #[test]
    fn test_decode_malformed_document() {
        assert!(decode_document("targets: a-grpc.zone.:10901").is_err());
    }

    #[test]
    fn test_encode_single_group() {
        let targets: TargetSequence =
            vec![Target::from_stored("a:10901"), Target::from_stored("b:10901")].into();

        let document = encode_document(&targets).unwrap();
        let groups = decode_document(&document).unwrap();

        assert!(document.starts_with("- targets:"));
        assert_eq!(groups, vec![TargetGroup { targets: vec!["a:10901".into(), "b:10901".into()] }]);
    }
}
