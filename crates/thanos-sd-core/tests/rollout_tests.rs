//! Pod rotation against a fake cluster, on a paused clock

use std::{sync::Arc, time::Duration};

use thanos_sd_core::{Error, PodWait, RollingRestarter, RolloutConfig};
use thanos_sd_test_fixtures::{FakeCluster, NAMESPACE, Replacement};
use tokio::time::Instant;

const DEPLOYMENT: &str = "thanos-query";

fn restarter(cluster: &Arc<FakeCluster>) -> RollingRestarter {
    RollingRestarter::new(cluster.clone(), RolloutConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_each_pod_deleted_once_in_order() {
    let cluster = Arc::new(FakeCluster::with_pods(DEPLOYMENT, &["q-0", "q-1", "q-2"]));

    let report = restarter(&cluster).restart(NAMESPACE, DEPLOYMENT).await.expect("Rotation failed");

    assert!(report.workload_found);
    assert_eq!(report.deleted, vec!["q-0", "q-1", "q-2"]);
    assert_eq!(cluster.deleted(), vec!["q-0", "q-1", "q-2"]);
    // Each pass waits on the two untouched pods plus the new one
    assert_eq!(report.waits, 9);
    assert_eq!(
        cluster.pod_names(),
        vec!["thanos-query-new-1", "thanos-query-new-2", "thanos-query-new-3"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_selector_comes_from_deployment_labels() {
    let cluster = Arc::new(FakeCluster::with_pods(DEPLOYMENT, &["q-0"]));

    restarter(&cluster).restart(NAMESPACE, DEPLOYMENT).await.expect("Rotation failed");

    // Initial listing plus one re-listing per deleted pod
    assert_eq!(cluster.selectors(), vec!["app=thanos-query", "app=thanos-query"]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_replacement_is_waited_for() {
    let cluster = Arc::new(
        FakeCluster::with_pods(DEPLOYMENT, &["q-0", "q-1"])
            .with_replacement(Replacement::ReadyAfterPolls(4)),
    );
    let started = Instant::now();

    let report = restarter(&cluster).restart(NAMESPACE, DEPLOYMENT).await.expect("Rotation failed");

    assert_eq!(report.deleted, vec!["q-0", "q-1"]);
    assert_eq!(cluster.polls("thanos-query-new-1"), 6);
    assert!(started.elapsed() >= Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn test_replacement_never_ready_stops_rotation() {
    let cluster = Arc::new(
        FakeCluster::with_pods(DEPLOYMENT, &["q-0", "q-1", "q-2"])
            .with_replacement(Replacement::NeverReady),
    );
    let started = Instant::now();

    let err = restarter(&cluster)
        .restart(NAMESPACE, DEPLOYMENT)
        .await
        .expect_err("Rotation should time out");

    match err {
        Error::ReadinessTimeout { pod, timeout, last_error, .. } => {
            assert_eq!(pod, "thanos-query-new-1");
            assert_eq!(timeout, Duration::from_secs(180));
            assert_eq!(last_error, None);
        },
        other => panic!("expected a readiness timeout, got {:?}", other),
    }
    assert_eq!(cluster.deleted(), vec!["q-0"]);
    assert!(started.elapsed() >= Duration::from_secs(180));
}

#[tokio::test(start_paused = true)]
async fn test_custom_timeout_is_honored() {
    let cluster = Arc::new(
        FakeCluster::with_pods(DEPLOYMENT, &["q-0"]).with_replacement(Replacement::NeverReady),
    );
    let config =
        RolloutConfig { ready_timeout: Duration::from_secs(30), poll_interval: Duration::from_secs(1) };
    let started = Instant::now();

    let err = RollingRestarter::new(cluster.clone(), config)
        .restart(NAMESPACE, DEPLOYMENT)
        .await
        .expect_err("Rotation should time out");

    assert!(matches!(err, Error::ReadinessTimeout { .. }));
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert!(started.elapsed() < Duration::from_secs(180));
    assert!(cluster.polls("thanos-query-new-1") >= 30);
}

#[tokio::test(start_paused = true)]
async fn test_vanished_replacement_counts_as_done() {
    let cluster = Arc::new(
        FakeCluster::with_pods(DEPLOYMENT, &["q-0", "q-1"])
            .with_default_replacement(Replacement::Vanishes),
    );
    let started = Instant::now();

    let report = restarter(&cluster).restart(NAMESPACE, DEPLOYMENT).await.expect("Rotation failed");

    assert_eq!(report.deleted, vec!["q-0", "q-1"]);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_transient_fetch_errors_are_retried() {
    let cluster = Arc::new(FakeCluster::with_pods(DEPLOYMENT, &["q-0"]).with_get_pod_failures(3));
    let started = Instant::now();

    let report = restarter(&cluster).restart(NAMESPACE, DEPLOYMENT).await.expect("Rotation failed");

    assert_eq!(report.deleted, vec!["q-0"]);
    assert_eq!(started.elapsed(), Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn test_persistent_fetch_errors_surface_in_timeout() {
    let cluster =
        Arc::new(FakeCluster::with_pods(DEPLOYMENT, &["q-0"]).with_get_pod_failures(u32::MAX));

    let err = restarter(&cluster)
        .restart(NAMESPACE, DEPLOYMENT)
        .await
        .expect_err("Rotation should time out");

    match &err {
        Error::ReadinessTimeout { pod, last_error, .. } => {
            assert_eq!(pod, "thanos-query-new-1");
            let last_error = last_error.as_deref().expect("last fetch error missing");
            assert!(last_error.contains("connection reset"));
        },
        other => panic!("expected a readiness timeout, got {:?}", other),
    }
    assert!(err.to_string().contains("last error"));
}

#[tokio::test(start_paused = true)]
async fn test_missing_deployment_is_not_an_error() {
    let cluster = Arc::new(FakeCluster::empty());

    let report = restarter(&cluster).restart(NAMESPACE, DEPLOYMENT).await.expect("Rotation failed");

    assert!(!report.workload_found);
    assert!(report.deleted.is_empty());
    assert!(cluster.selectors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_deployment_removed_mid_rotation() {
    let cluster = Arc::new(
        FakeCluster::with_pods(DEPLOYMENT, &["q-0", "q-1", "q-2"]).with_deployment_removed_after(1),
    );

    let report = restarter(&cluster).restart(NAMESPACE, DEPLOYMENT).await.expect("Rotation failed");

    assert!(report.workload_found);
    assert_eq!(report.deleted, vec!["q-0"]);
    assert_eq!(report.waits, 0);
}

#[tokio::test(start_paused = true)]
async fn test_pod_already_gone_is_skipped() {
    let cluster = Arc::new(
        FakeCluster::with_pods(DEPLOYMENT, &["q-0", "q-1"]).with_pod_already_gone("q-0"),
    );

    let report = restarter(&cluster).restart(NAMESPACE, DEPLOYMENT).await.expect("Rotation failed");

    assert_eq!(report.deleted, vec!["q-1"]);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_missing_pod() {
    let cluster = Arc::new(FakeCluster::with_pods(DEPLOYMENT, &["q-0"]));

    let wait = restarter(&cluster)
        .wait_for_pod_ready(NAMESPACE, "q-from-old-replica-set")
        .await
        .expect("Wait failed");

    assert_eq!(wait, PodWait::Gone);
}
