use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Single-line human readable output
    #[default]
    Compact,
    /// One JSON object per line, for log collectors
    Json,
}

/// Logging settings taken from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is not set (e.g., "info" or
    /// "thanos_sd_core=debug,info")
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

/// Build the filter: `RUST_LOG` wins, then the configured level, then `info`
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize structured logging
///
/// Must be called once, before anything logs.
pub fn init(config: &LogConfig) {
    let env_filter = env_filter(config);

    match config.format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true)
                .with_filter(env_filter);

            tracing_subscriber::registry().with(fmt_layer).init();
        },
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .with_filter(env_filter);

            tracing_subscriber::registry().with(fmt_layer).init();
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // init() installs the global subscriber and can only run once per process, so the
    // tests stick to the pieces around it.

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Compact);
    }

    #[test]
    fn test_invalid_level_falls_back() {
        let config = LogConfig { level: "not a directive[".to_string(), format: LogFormat::Json };
        // Builds a usable filter either from RUST_LOG or the "info" fallback
        let _filter = env_filter(&config);
    }
}
