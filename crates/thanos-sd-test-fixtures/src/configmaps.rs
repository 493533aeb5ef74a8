use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::{api::core::v1::ConfigMap, apimachinery::pkg::apis::meta::v1::ObjectMeta};
use parking_lot::Mutex;
use thanos_sd_core::{
    ConfigMapApi, Error, Result, SERVICE_DISCOVERY_KEY,
    config_store::{decode_document, encode_document},
};

use crate::targets;

#[derive(Debug, Default)]
struct Store {
    configmaps: BTreeMap<(String, String), ConfigMap>,
    creates: usize,
    replaces: usize,
}

/// Configmaps held in memory, keyed by namespace and name
///
/// `create` on an existing configmap and `replace` on a missing one fail the way the
/// API server does.
#[derive(Debug, Default)]
pub struct MemoryConfigMaps {
    store: Mutex<Store>,
}

impl MemoryConfigMaps {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding one configmap with the given raw data entries
    pub fn with_data(namespace: &str, name: &str, data: &[(&str, &str)]) -> Self {
        let maps = Self::new();
        maps.insert(ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                resource_version: Some("1".to_string()),
                ..Default::default()
            },
            data: Some(data.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()),
            ..Default::default()
        });
        maps
    }

    /// Store holding one configmap whose document lists `addresses`
    pub fn with_targets(namespace: &str, name: &str, addresses: &[&str]) -> Self {
        let document = encode_document(&targets(addresses)).unwrap_or_default();
        Self::with_data(namespace, name, &[(SERVICE_DISCOVERY_KEY, &document)])
    }

    /// Put a configmap in place without counting it as a create
    pub fn insert(&self, configmap: ConfigMap) {
        let key = key_of(&configmap);
        self.store.lock().configmaps.insert(key, configmap);
    }

    /// Stored configmap
    pub fn get_configmap(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        self.store.lock().configmaps.get(&(namespace.to_string(), name.to_string())).cloned()
    }

    /// Raw service discovery document
    pub fn document(&self, namespace: &str, name: &str) -> Option<String> {
        self.get_configmap(namespace, name)?.data?.get(SERVICE_DISCOVERY_KEY).cloned()
    }

    /// Targets of the first group of the stored document
    pub fn stored_targets(&self, namespace: &str, name: &str) -> Vec<String> {
        self.document(namespace, name)
            .and_then(|doc| decode_document(&doc).ok())
            .and_then(|groups| groups.into_iter().next())
            .map(|group| group.targets)
            .unwrap_or_default()
    }

    /// Number of successful creates
    pub fn creates(&self) -> usize {
        self.store.lock().creates
    }

    /// Number of successful replaces
    pub fn replaces(&self) -> usize {
        self.store.lock().replaces
    }
}

fn key_of(configmap: &ConfigMap) -> (String, String) {
    (
        configmap.metadata.namespace.clone().unwrap_or_default(),
        configmap.metadata.name.clone().unwrap_or_default(),
    )
}

#[async_trait]
impl ConfigMapApi for MemoryConfigMaps {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>> {
        Ok(self.get_configmap(namespace, name))
    }

    async fn create(&self, namespace: &str, configmap: &ConfigMap) -> Result<()> {
        let name = configmap.metadata.name.clone().unwrap_or_default();
        let mut store = self.store.lock();
        let key = (namespace.to_string(), name);
        if store.configmaps.contains_key(&key) {
            return Err(Error::Kubernetes(format!("configmaps \"{}\" already exists", key.1)));
        }
        store.configmaps.insert(key, configmap.clone());
        store.creates += 1;
        Ok(())
    }

    async fn replace(&self, namespace: &str, name: &str, configmap: &ConfigMap) -> Result<()> {
        let mut store = self.store.lock();
        let key = (namespace.to_string(), name.to_string());
        if !store.configmaps.contains_key(&key) {
            return Err(Error::Kubernetes(format!("configmaps \"{}\" not found", name)));
        }
        store.configmaps.insert(key, configmap.clone());
        store.replaces += 1;
        Ok(())
    }
}
