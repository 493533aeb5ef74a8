use std::time::Duration;

use thanos_sd_resolver::ResolverError;
use thiserror::Error;

/// Result type alias for store discovery operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for store discovery
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid process configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record directory errors
    #[error("Unable to resolve store targets: {0}")]
    Resolver(#[from] ResolverError),

    /// Kubernetes API errors, with the failing operation
    #[error("Kubernetes API error: {0}")]
    Kubernetes(String),

    /// The stored service discovery document could not be parsed
    #[error("Unable to decode service discovery document in configmap {configmap}: {source}")]
    Decode {
        configmap: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// The service discovery document could not be rendered
    #[error("Unable to encode service discovery document: {0}")]
    Encode(#[source] serde_yaml::Error),

    /// A replacement pod did not become ready within the rollout bound
    ///
    /// `last_error` holds the most recent failure fetching the pod, when the last
    /// attempt failed.
    #[error(
        "Timed out after {}s waiting for pod {namespace}/{pod} to become ready{}",
        .timeout.as_secs(),
        last_error_suffix(.last_error)
    )]
    ReadinessTimeout {
        namespace: String,
        pod: String,
        timeout: Duration,
        last_error: Option<String>,
    },

    /// Failure notification could not be delivered
    #[error("Notification error: {0}")]
    Notification(String),
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    last_error.as_ref().map(|e| format!(" (last error: {})", e)).unwrap_or_default()
}

impl Error {
    /// Short machine-readable kind, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "configuration",
            Error::Resolver(_) => "resolver",
            Error::Kubernetes(_) => "kubernetes",
            Error::Decode { .. } => "decode",
            Error::Encode(_) => "encode",
            Error::ReadinessTimeout { .. } => "readiness_timeout",
            Error::Notification(_) => "notification",
        }
    }

    /// Wrap a kube client error with the operation that failed
    pub fn kube(operation: impl std::fmt::Display, err: kube::Error) -> Self {
        Error::Kubernetes(format!("{}: {}", operation, err))
    }
}
