use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_json_format(mut self, enabled: bool) -> Self {
        self.json = enabled;
        self
    }

    /// Filter directive used when `RUST_LOG` is not set.
    pub fn env_filter(&self) -> String {
        let level = self.level.as_str().to_lowercase();
        format!("{level},streamguard_core={level},streamguard_cli={level}")
    }
}

pub fn parse_level(level: &str) -> Result<Level> {
    level
        .parse::<Level>()
        .map_err(|_| anyhow!("Unknown log level '{level}'. Use trace, debug, info, warn or error"))
}

/// Install the global subscriber. Logs go to stderr so reports on stdout stay
/// machine readable.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialise logging: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::WARN);
        assert!(!config.json);
        assert_eq!(
            config.env_filter(),
            "warn,streamguard_core=warn,streamguard_cli=warn"
        );
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_level("INFO").unwrap(), Level::INFO);
        assert!(parse_level("loud").is_err());
    }

    #[test]
    fn test_builder() {
        let config = LoggingConfig::default()
            .with_level(Level::TRACE)
            .with_json_format(true);
        assert!(config.json);
        assert!(config.env_filter().starts_with("trace,"));
    }
}
