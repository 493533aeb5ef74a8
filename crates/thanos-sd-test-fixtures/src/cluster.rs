use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use k8s_openapi::{
    api::{
        apps::v1::Deployment,
        core::v1::{Pod, PodCondition, PodStatus},
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use parking_lot::Mutex;
use thanos_sd_core::{Error, Result, WorkloadApi, rollout::label_selector};

/// How a pod created to replace a deleted one behaves when polled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement {
    /// Ready on the first poll
    Ready,
    /// Not ready for the given number of polls, then ready
    ReadyAfterPolls(u32),
    /// Never becomes ready
    NeverReady,
    /// Listed, but gone by the time it is fetched
    Vanishes,
}

#[derive(Debug)]
struct FakePod {
    name: String,
    behavior: Replacement,
    polls: u32,
}

#[derive(Debug)]
struct Cluster {
    deployment: Option<Deployment>,
    pods: Vec<FakePod>,
    deleted: Vec<String>,
    selectors: Vec<String>,
    replacements: VecDeque<Replacement>,
    default_replacement: Replacement,
    created: usize,
    already_gone: Vec<String>,
    get_pod_failures: u32,
    remove_deployment_after: Option<usize>,
}

/// A namespace holding one deployment whose replica set recreates deleted pods
///
/// Every deletion adds a pod named `{deployment}-new-{n}`; its behavior comes from the
/// queue filled by [`FakeCluster::with_replacement`], then the default.
#[derive(Debug)]
pub struct FakeCluster {
    cluster: Mutex<Cluster>,
}

impl FakeCluster {
    /// A cluster without the deployment
    pub fn empty() -> Self {
        Self {
            cluster: Mutex::new(Cluster {
                deployment: None,
                pods: Vec::new(),
                deleted: Vec::new(),
                selectors: Vec::new(),
                replacements: VecDeque::new(),
                default_replacement: Replacement::Ready,
                created: 0,
                already_gone: Vec::new(),
                get_pod_failures: 0,
                remove_deployment_after: None,
            }),
        }
    }

    /// A deployment labeled `app={name}` running ready pods
    pub fn with_pods(name: &str, pods: &[&str]) -> Self {
        Self::empty().with_deployment(deployment(name, &[("app", name)])).with_running(pods)
    }

    /// Put a deployment in place
    pub fn with_deployment(self, deployment: Deployment) -> Self {
        self.cluster.lock().deployment = Some(deployment);
        self
    }

    /// Add ready pods
    pub fn with_running(self, pods: &[&str]) -> Self {
        self.cluster.lock().pods.extend(pods.iter().map(|name| FakePod {
            name: name.to_string(),
            behavior: Replacement::Ready,
            polls: 0,
        }));
        self
    }

    /// Queue the behavior of the next replacement pod
    pub fn with_replacement(self, behavior: Replacement) -> Self {
        self.cluster.lock().replacements.push_back(behavior);
        self
    }

    /// Behavior of replacement pods once the queue is drained
    pub fn with_default_replacement(self, behavior: Replacement) -> Self {
        self.cluster.lock().default_replacement = behavior;
        self
    }

    /// The named pod is removed behind the restarter's back before it gets deleted
    pub fn with_pod_already_gone(self, name: &str) -> Self {
        self.cluster.lock().already_gone.push(name.to_string());
        self
    }

    /// Fail the next `count` pod fetches
    pub fn with_get_pod_failures(self, count: u32) -> Self {
        self.cluster.lock().get_pod_failures = count;
        self
    }

    /// Remove the deployment once `deletions` pods have been deleted
    pub fn with_deployment_removed_after(self, deletions: usize) -> Self {
        self.cluster.lock().remove_deployment_after = Some(deletions);
        self
    }

    /// Pods deleted, in order
    pub fn deleted(&self) -> Vec<String> {
        self.cluster.lock().deleted.clone()
    }

    /// Label selectors pods were listed with
    pub fn selectors(&self) -> Vec<String> {
        self.cluster.lock().selectors.clone()
    }

    /// Names of the pods currently present
    pub fn pod_names(&self) -> Vec<String> {
        self.cluster.lock().pods.iter().map(|p| p.name.clone()).collect()
    }

    /// Total polls of the named pod
    pub fn polls(&self, name: &str) -> u32 {
        self.cluster.lock().pods.iter().find(|p| p.name == name).map_or(0, |p| p.polls)
    }
}

#[async_trait]
impl WorkloadApi for FakeCluster {
    async fn get_deployment(&self, _namespace: &str, name: &str) -> Result<Option<Deployment>> {
        let cluster = self.cluster.lock();
        Ok(cluster
            .deployment
            .as_ref()
            .filter(|d| d.metadata.name.as_deref() == Some(name))
            .cloned())
    }

    async fn list_pods(&self, _namespace: &str, selector: &str) -> Result<Vec<Pod>> {
        let mut cluster = self.cluster.lock();
        cluster.selectors.push(selector.to_string());

        let matches = cluster
            .deployment
            .as_ref()
            .and_then(|d| d.metadata.labels.as_ref())
            .is_some_and(|labels| label_selector(labels) == selector);
        if !matches {
            return Ok(Vec::new());
        }

        Ok(cluster.pods.iter().map(|p| pod(&p.name, true)).collect())
    }

    async fn delete_pod(&self, _namespace: &str, name: &str) -> Result<bool> {
        let mut cluster = self.cluster.lock();

        if let Some(at) = cluster.already_gone.iter().position(|n| n == name) {
            cluster.already_gone.remove(at);
            cluster.pods.retain(|p| p.name != name);
            return Ok(false);
        }

        let Some(at) = cluster.pods.iter().position(|p| p.name == name) else {
            return Ok(false);
        };
        cluster.pods.remove(at);
        cluster.deleted.push(name.to_string());

        let owner = cluster.deployment.as_ref().and_then(|d| d.metadata.name.clone());
        if let Some(deployment) = owner {
            cluster.created += 1;
            let behavior =
                cluster.replacements.pop_front().unwrap_or(cluster.default_replacement);
            let replacement = format!("{}-new-{}", deployment, cluster.created);
            cluster.pods.push(FakePod { name: replacement, behavior, polls: 0 });
        }

        if cluster.remove_deployment_after == Some(cluster.deleted.len()) {
            cluster.deployment = None;
        }
        Ok(true)
    }

    async fn get_pod(&self, _namespace: &str, name: &str) -> Result<Option<Pod>> {
        let mut cluster = self.cluster.lock();

        if cluster.get_pod_failures > 0 {
            cluster.get_pod_failures -= 1;
            return Err(Error::Kubernetes(format!("get pod {}: connection reset", name)));
        }

        let Some(current) = cluster.pods.iter_mut().find(|p| p.name == name) else {
            return Ok(None);
        };
        current.polls += 1;

        let ready = match current.behavior {
            Replacement::Ready => true,
            Replacement::ReadyAfterPolls(n) => current.polls > n,
            Replacement::NeverReady => false,
            Replacement::Vanishes => return Ok(None),
        };
        Ok(Some(pod(name, ready)))
    }
}

/// A pod whose `Ready` condition reflects `ready`
pub fn pod(name: &str, ready: bool) -> Pod {
    let condition = |type_: &str, status: &str| PodCondition {
        type_: type_.to_string(),
        status: status.to_string(),
        ..Default::default()
    };

    Pod {
        metadata: ObjectMeta { name: Some(name.to_string()), ..Default::default() },
        status: Some(PodStatus {
            conditions: Some(vec![
                condition("Initialized", "True"),
                condition("Ready", if ready { "True" } else { "False" }),
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A deployment with the given metadata labels
pub fn deployment(name: &str, labels: &[(&str, &str)]) -> Deployment {
    let labels: BTreeMap<String, String> =
        labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();

    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: (!labels.is_empty()).then_some(labels),
            ..Default::default()
        },
        ..Default::default()
    }
}
