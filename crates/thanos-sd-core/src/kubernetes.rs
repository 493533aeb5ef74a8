//! Kubernetes-backed implementations of the configmap and workload APIs

use async_trait::async_trait;
use k8s_openapi::api::{
    apps::v1::Deployment,
    core::v1::{ConfigMap, Pod},
};
use kube::{
    Api, Client,
    api::{DeleteParams, ListParams, PostParams},
};
use tracing::debug;

use crate::{
    config_store::ConfigMapApi,
    error::{Error, Result},
    rollout::WorkloadApi,
};

/// Cluster access through the in-cluster (or kubeconfig) client
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl std::fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCluster").field("default_namespace", &self.client.default_namespace()).finish()
    }
}

impl KubeCluster {
    /// Wrap an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the in-cluster service account or the local kubeconfig
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| Error::kube("Unable to create Kubernetes client", e))?;
        Ok(Self::new(client))
    }

    fn configmaps(&self, namespace: &str) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 404)
}

#[async_trait]
impl ConfigMapApi for KubeCluster {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>> {
        self.configmaps(namespace)
            .get_opt(name)
            .await
            .map_err(|e| Error::kube(format!("Unable to get configmap {}/{}", namespace, name), e))
    }

    async fn create(&self, namespace: &str, configmap: &ConfigMap) -> Result<()> {
        let name = configmap.metadata.name.as_deref().unwrap_or_default();
        self.configmaps(namespace)
            .create(&PostParams::default(), configmap)
            .await
            .map(|_| ())
            .map_err(|e| Error::kube(format!("Unable to create configmap {}/{}", namespace, name), e))
    }

    async fn replace(&self, namespace: &str, name: &str, configmap: &ConfigMap) -> Result<()> {
        self.configmaps(namespace)
            .replace(name, &PostParams::default(), configmap)
            .await
            .map(|_| ())
            .map_err(|e| Error::kube(format!("Unable to update configmap {}/{}", namespace, name), e))
    }
}

#[async_trait]
impl WorkloadApi for KubeCluster {
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>> {
        self.deployments(namespace)
            .get_opt(name)
            .await
            .map_err(|e| Error::kube(format!("Unable to get deployment {}/{}", namespace, name), e))
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>> {
        let params = ListParams::default().labels(label_selector);
        let pods = self.pods(namespace).list(&params).await.map_err(|e| {
            Error::kube(format!("Unable to list pods in {} matching {}", namespace, label_selector), e)
        })?;
        Ok(pods.items)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<bool> {
        match self.pods(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => {
                debug!(pod = %name, namespace = %namespace, "Pod already deleted");
                Ok(false)
            },
            Err(e) => Err(Error::kube(format!("Unable to delete pod {}/{}", namespace, name), e)),
        }
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>> {
        self.pods(namespace)
            .get_opt(name)
            .await
            .map_err(|e| Error::kube(format!("Unable to get pod {}/{}", namespace, name), e))
    }
}
