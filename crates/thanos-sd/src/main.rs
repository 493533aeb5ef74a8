use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use thanos_sd_core::{
    ConfigStore, CycleOutcome, CycleTargets, Error, KubeCluster, Result, RollingRestarter,
    Route53Directory, StoreDiscovery, StoreDiscoveryConfig, TargetResolver, WebhookNotifier,
    config::ALERTS_HOOK_VAR,
    logging::{self, LogConfig, LogFormat},
    report_failure,
};
use tracing::{error, info};

const CONFIG_STAGE: &str = "Environment variable validation failed";
const RUN_STAGE: &str = "The Thanos store discovery failed";

#[derive(Parser, Debug)]
#[command(name = "thanos-sd")]
#[command(about = "Registers Route53 Thanos store records with Thanos Query", long_about = None)]
struct Args {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Use JSON structured logging
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // kube and reqwest both go through rustls; the provider must be in place first
    if rustls::crypto::aws_lc_rs::default_provider().install_default().is_err() {
        eprintln!("A rustls crypto provider was already installed");
    }

    let args = Args::parse();
    logging::init(&LogConfig {
        level: args.log_level,
        format: if args.json_logs { LogFormat::Json } else { LogFormat::Compact },
    });

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Thanos store discovery");

    let config = match StoreDiscoveryConfig::load() {
        Ok(config) => config,
        Err(e) => {
            notify_without_config(&e).await;
            return ExitCode::FAILURE;
        },
    };

    let notifier = match WebhookNotifier::new(config.alerts_hook.clone()) {
        Ok(notifier) => notifier,
        Err(e) => {
            error!(error = %e, "Unable to set up failure notifications");
            return ExitCode::FAILURE;
        },
    };

    match run(&config).await {
        Ok(outcome) => {
            info!(outcome = ?outcome, "Thanos store discovery finished");
            ExitCode::SUCCESS
        },
        Err(e) => {
            report_failure(&notifier, RUN_STAGE, &e).await;
            ExitCode::FAILURE
        },
    }
}

async fn run(config: &StoreDiscoveryConfig) -> Result<CycleOutcome> {
    let directory = Arc::new(Route53Directory::from_env().await);
    let cluster = Arc::new(KubeCluster::try_default().await?);

    let resolver = TargetResolver::new(directory)
        .with_marker(config.record_marker.clone())
        .with_port(config.target_port);

    let discovery = StoreDiscovery::new(
        resolver,
        ConfigStore::new(cluster.clone()),
        RollingRestarter::new(cluster, config.rollout),
        CycleTargets::from(config),
    );

    discovery.run_once().await
}

/// Configuration failed to load; alert through the raw hook variable if it is usable
async fn notify_without_config(err: &Error) {
    let hook = std::env::var(ALERTS_HOOK_VAR).ok().filter(|h| !h.trim().is_empty());

    match hook.map(WebhookNotifier::new) {
        Some(Ok(notifier)) => report_failure(&notifier, CONFIG_STAGE, err).await,
        Some(Err(e)) => {
            error!(error = %err, "{}", CONFIG_STAGE);
            error!(error = %e, "Unable to set up failure notifications");
        },
        None => error!(error = %err, "{}", CONFIG_STAGE),
    }
}
