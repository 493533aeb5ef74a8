//! Sequential pod rotation for the Thanos Query deployment
//!
//! Pods are deleted one at a time. After each deletion the pod group is looked up again
//! through the deployment's labels and every other pod in it must report ready before
//! the next pod is touched:
//!
//! ```text
//! Idle ─▶ Deleting(pod) ─▶ AwaitingReplacement(new) ─┬─▶ Ready ──────┐
//!                                                    ├─▶ NotFound ───┤
//!                                                    └─▶ TimedOut ✗  │
//!  ▲                                                                 │
//!  └──────────────────────────── next pod ◀──────────────────────────┘
//! ```
//!
//! A timeout aborts the rotation. Pods already replaced stay replaced.

use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use k8s_openapi::api::{apps::v1::Deployment, core::v1::Pod};
use kube::ResourceExt;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Workload operations used by the rollout
#[async_trait]
pub trait WorkloadApi: Send + Sync + fmt::Debug {
    /// Fetch a deployment, `None` when it does not exist
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>>;

    /// List pods matching a label selector, in API order
    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>>;

    /// Delete a pod; `false` when it was already gone
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<bool>;

    /// Fetch a pod, `None` when it does not exist
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>>;
}

/// Readiness bound and polling cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloutConfig {
    /// How long each replacement pod may take to become ready
    pub ready_timeout: Duration,

    /// Delay between readiness checks
    pub poll_interval: Duration,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self { ready_timeout: Duration::from_secs(180), poll_interval: Duration::from_secs(5) }
    }
}

/// How a readiness wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodWait {
    /// Every condition of the pod reports other than `False`
    Ready,
    /// The pod no longer exists, superseded by a newer replica set
    Gone,
}

/// What a rotation did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolloutReport {
    /// Whether the deployment existed when the rotation started
    pub workload_found: bool,

    /// Pods deleted, in order
    pub deleted: Vec<String>,

    /// Readiness waits completed, ready or gone
    pub waits: usize,
}

impl RolloutReport {
    fn not_deployed() -> Self {
        Self::default()
    }
}

/// A pod is ready when none of its conditions reports `False`
pub fn is_pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_none_or(|conditions| conditions.iter().all(|c| c.status != "False"))
}

/// Render deployment metadata labels as an equality selector (`k1=v1,k2=v2`)
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join(",")
}

/// Replaces the pods of a deployment one at a time
#[derive(Debug, Clone)]
pub struct RollingRestarter {
    api: Arc<dyn WorkloadApi>,
    config: RolloutConfig,
}

impl RollingRestarter {
    /// Create a restarter with explicit timing
    pub fn new(api: Arc<dyn WorkloadApi>, config: RolloutConfig) -> Self {
        Self { api, config }
    }

    /// Timing in use
    pub fn config(&self) -> RolloutConfig {
        self.config
    }

    /// Current pod group of the deployment, `None` when the deployment does not exist
    ///
    /// The selector is read from the deployment on every call.
    pub async fn current_pods(&self, namespace: &str, deployment: &str) -> Result<Option<Vec<Pod>>> {
        let Some(workload) = self.api.get_deployment(namespace, deployment).await? else {
            return Ok(None);
        };

        let labels = workload.labels();
        if labels.is_empty() {
            return Err(Error::Config(format!(
                "deployment {}/{} has no labels to select its pods by",
                namespace, deployment
            )));
        }

        let selector = label_selector(labels);
        debug!(deployment = %deployment, selector = %selector, "Listing deployment pods");
        self.api.list_pods(namespace, &selector).await.map(Some)
    }

    /// Delete every pod of the deployment in turn, waiting for the group to be ready
    /// after each deletion
    ///
    /// A missing deployment is not an error: the report has `workload_found` unset.
    ///
    /// # Arguments
    ///
    /// * `namespace` - Namespace of the deployment
    /// * `deployment` - Deployment whose pods are replaced
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the deployment has no labels, `Error::Kubernetes` if
    /// a lookup or deletion fails, or `Error::ReadinessTimeout` if a pod does not become
    /// ready in time. Pods after the one in progress are left untouched.
    pub async fn restart(&self, namespace: &str, deployment: &str) -> Result<RolloutReport> {
        let Some(pods) = self.current_pods(namespace, deployment).await? else {
            info!(
                deployment = %deployment,
                namespace = %namespace,
                "No Thanos Query deployment found, assuming it is not deployed"
            );
            return Ok(RolloutReport::not_deployed());
        };

        let mut report = RolloutReport { workload_found: true, ..Default::default() };
        let snapshot: Vec<String> = pods.iter().map(|p| p.name_any()).collect();
        info!(deployment = %deployment, pods = snapshot.len(), "Starting pod rotation");

        for (position, pod_name) in snapshot.iter().enumerate() {
            info!(pod = %pod_name, position = position + 1, total = snapshot.len(), "Deleting pod");
            if self.api.delete_pod(namespace, pod_name).await? {
                report.deleted.push(pod_name.clone());
            } else {
                info!(pod = %pod_name, "Pod was already gone");
            }

            let Some(group) = self.current_pods(namespace, deployment).await? else {
                warn!(
                    deployment = %deployment,
                    namespace = %namespace,
                    "Deployment disappeared during rotation, stopping"
                );
                return Ok(report);
            };

            info!(
                deployment = %deployment,
                timeout_secs = self.config.ready_timeout.as_secs(),
                "Waiting for pods to become ready"
            );
            for replacement in group.iter().map(|p| p.name_any()).filter(|n| n != pod_name) {
                self.wait_for_pod_ready(namespace, &replacement).await?;
                report.waits += 1;
            }
        }

        info!(deployment = %deployment, deleted = report.deleted.len(), "Pod rotation complete");
        Ok(report)
    }

    /// Poll a pod until it is ready or gone, bounded by `ready_timeout`
    ///
    /// Errors fetching the pod are logged and polled through until the deadline.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReadinessTimeout` when the bound elapses. If the last fetch
    /// attempt failed, its error is carried in `last_error`.
    pub async fn wait_for_pod_ready(&self, namespace: &str, pod: &str) -> Result<PodWait> {
        let mut last_error: Option<String> = None;

        let poll = async {
            loop {
                match self.api.get_pod(namespace, pod).await {
                    Ok(Some(current)) if is_pod_ready(&current) => {
                        debug!(pod = %pod, "Pod is ready");
                        return PodWait::Ready;
                    },
                    Ok(Some(_)) => {
                        last_error = None;
                        debug!(pod = %pod, "Pod not ready yet");
                    },
                    Ok(None) => {
                        info!(
                            pod = %pod,
                            namespace = %namespace,
                            "Pod not found, probably part of the previous replica set, moving on"
                        );
                        return PodWait::Gone;
                    },
                    Err(e) => {
                        warn!(pod = %pod, error = %e, "Failed to fetch pod, retrying");
                        last_error = Some(e.to_string());
                    },
                }
                sleep(self.config.poll_interval).await;
            }
        };

        let outcome = timeout(self.config.ready_timeout, poll).await;
        outcome.map_err(|_| Error::ReadinessTimeout {
            namespace: namespace.to_string(),
            pod: pod.to_string(),
            timeout: self.config.ready_timeout,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::{
        api::core::v1::{PodCondition, PodStatus},
        apimachinery::pkg::apis::meta::v1::ObjectMeta,
    };

    use super::*;

    fn pod_with_conditions(conditions: Option<Vec<(&str, &str)>>) -> Pod {
        Pod {
            metadata: ObjectMeta { name: Some("p".to_string()), ..Default::default() },
            status: Some(PodStatus {
                conditions: conditions.map(|cs| {
                    cs.into_iter()
                        .map(|(type_, status)| PodCondition {
                            type_: type_.to_string(),
                            status: status.to_string(),
                            ..Default::default()
                        })
                        .collect()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_ready_when_no_condition_is_false() {
        let pod = pod_with_conditions(Some(vec![
            ("Initialized", "True"),
            ("Ready", "True"),
            ("PodScheduled", "Unknown"),
        ]));
        assert!(is_pod_ready(&pod));
    }

    #[test]
    fn test_not_ready_when_any_condition_is_false() {
        let pod = pod_with_conditions(Some(vec![("Initialized", "True"), ("Ready", "False")]));
        assert!(!is_pod_ready(&pod));
    }

    #[test]
    fn test_pod_without_conditions_is_ready() {
        assert!(is_pod_ready(&pod_with_conditions(None)));
        assert!(is_pod_ready(&Pod::default()));
    }

    #[test]
    fn test_label_selector() {
        let labels = BTreeMap::from([
            ("app.kubernetes.io/name".to_string(), "thanos-query".to_string()),
            ("app.kubernetes.io/component".to_string(), "query".to_string()),
        ]);
        assert_eq!(
            label_selector(&labels),
            "app.kubernetes.io/component=query,app.kubernetes.io/name=thanos-query"
        );
    }

    #[test]
    fn test_rollout_defaults() {
        let config = RolloutConfig::default();
        assert_eq!(config.ready_timeout, Duration::from_secs(180));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }
}
