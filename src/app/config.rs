//! Pipeline configuration
//!
//! Settings are read from a TOML file (explicit `--config`, or
//! `<config_dir>/Eventpipe/eventpipe.toml` when present) and then
//! overridden by command line flags. Missing keys take their defaults.

use crate::app::cli::args::Args;
use crate::core::error_handling::ContextualError;
use crate::core::retry::RetryPolicy;
use crate::stream::api::StreamSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("The specified configuration file does not exist: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Error reading configuration file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing configuration file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{message}")]
    Invalid { message: String },
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, ConfigError::Invalid { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConfigError::Invalid { message } => Some(message),
            _ => None,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub host_id: String,
    pub module_name: String,
    pub broker_host: String,
    pub broker_port: u16,
    pub partitions: usize,
    pub heartbeat_interval_ms: u64,
    pub session_timeout_ms: u64,
    pub retry_attempts: usize,
    pub retry_delay_ms: u64,
    pub mutex_capacity: usize,
    pub max_displacement: Option<usize>,
    pub commit_timeout_ms: Option<u64>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub log_file: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            host_id: "localhost".to_string(),
            module_name: "eventpipe".to_string(),
            broker_host: "localhost".to_string(),
            broker_port: 9092,
            partitions: 1,
            heartbeat_interval_ms: 3000,
            session_timeout_ms: 120_000,
            retry_attempts: 3,
            retry_delay_ms: 500,
            mutex_capacity: 1,
            max_displacement: None,
            commit_timeout_ms: None,
            log_level: None,
            log_format: None,
            log_file: None,
        }
    }
}

/// `<config_dir>/Eventpipe/eventpipe.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("Eventpipe").join("eventpipe.toml"))
}

impl PipelineConfig {
    pub fn from_toml_str(contents: &str, path: &Path) -> ConfigResult<Self> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `explicit` (which must exist) or the default file if present
    pub async fn load(explicit: Option<&Path>) -> ConfigResult<Self> {
        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => {
                    log::debug!("No configuration file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        log::debug!("Loading configuration from {}", path.display());
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
        Self::from_toml_str(&contents, &path)
    }

    /// Apply the flags given on the command line
    pub fn apply_args(&mut self, args: &Args) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut self.host_id, &args.host_id);
        set(&mut self.module_name, &args.module_name);
        set(&mut self.broker_host, &args.broker_host);
        set(&mut self.broker_port, &args.broker_port);
        set(&mut self.partitions, &args.partitions);
        set(&mut self.heartbeat_interval_ms, &args.heartbeat_interval_ms);
        set(&mut self.retry_attempts, &args.retry_attempts);
        set(&mut self.retry_delay_ms, &args.retry_delay_ms);
        if args.max_displacement.is_some() {
            self.max_displacement = args.max_displacement;
        }
        if args.commit_timeout_ms.is_some() {
            self.commit_timeout_ms = args.commit_timeout_ms;
        }
        if args.log_level.is_some() {
            self.log_level = args.log_level.clone();
        }
        if args.log_format.is_some() {
            self.log_format = args.log_format.clone();
        }
        if let Some(file) = &args.log_file {
            self.log_file = Some(file.to_string_lossy().to_string());
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |message: String| Err(ConfigError::Invalid { message });

        if self.host_id.trim().is_empty() {
            return invalid("host_id must not be empty".to_string());
        }
        if self.module_name.trim().is_empty() {
            return invalid("module_name must not be empty".to_string());
        }
        if self.retry_attempts == 0 {
            return invalid("retry_attempts must be at least 1".to_string());
        }
        if self.mutex_capacity == 0 {
            return invalid("mutex_capacity must be at least 1".to_string());
        }
        if self.partitions == 0 {
            return invalid("partitions must be at least 1".to_string());
        }
        if self.heartbeat_interval_ms >= self.session_timeout_ms {
            return invalid(format!(
                "heartbeat_interval_ms ({}) must be below session_timeout_ms ({})",
                self.heartbeat_interval_ms, self.session_timeout_ms
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_millis(self.retry_delay_ms))
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            broker: format!("{}:{}", self.broker_host, self.broker_port),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            session_timeout: Duration::from_millis(self.session_timeout_ms),
            commit_timeout: self.commit_timeout_ms.map(Duration::from_millis),
            commit_capacity: self.mutex_capacity,
            ..StreamSettings::new(self.host_id.clone(), self.module_name.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.stream_settings().client_id(), "eventpipe@localhost");
        assert_eq!(config.stream_settings().broker, "localhost:9092");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            "host_id = \"edge\"\nretry_attempts = 5\nmax_displacement = 8\n",
            Path::new("inline.toml"),
        )
        .unwrap();

        assert_eq!(config.host_id, "edge");
        assert_eq!(config.retry_attempts, 5);
        assert_eq!(config.max_displacement, Some(8));
        assert_eq!(config.heartbeat_interval_ms, 3000);
        assert_eq!(config.stream_settings().topic(), "edge_events");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let error = PipelineConfig::from_toml_str("hostid = \"edge\"", Path::new("bad.toml"))
            .unwrap_err();

        assert!(matches!(error, ConfigError::Parse { .. }));
        assert!(!error.is_user_actionable());
    }

    #[test]
    fn test_validation_messages_are_user_actionable() {
        let config = PipelineConfig {
            heartbeat_interval_ms: 120_000,
            ..PipelineConfig::default()
        };

        let error = config.validate().unwrap_err();
        assert!(error.is_user_actionable());
        assert_eq!(
            error.user_message(),
            Some("heartbeat_interval_ms (120000) must be below session_timeout_ms (120000)")
        );

        let zero_retries = PipelineConfig {
            retry_attempts: 0,
            ..PipelineConfig::default()
        };
        assert!(zero_retries.validate().is_err());

        let empty_host = PipelineConfig {
            host_id: " ".into(),
            ..PipelineConfig::default()
        };
        assert!(empty_host.validate().is_err());

        let no_capacity = PipelineConfig {
            mutex_capacity: 0,
            ..PipelineConfig::default()
        };
        assert!(no_capacity.validate().is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let mut config = PipelineConfig {
            host_id: "from-file".into(),
            retry_attempts: 7,
            ..PipelineConfig::default()
        };
        let args = Args::try_parse_from(["eventpipe", "-H", "from-flag", "--commit-timeout", "40"])
            .unwrap();

        config.apply_args(&args);

        assert_eq!(config.host_id, "from-flag");
        assert_eq!(config.retry_attempts, 7);
        assert_eq!(
            config.stream_settings().commit_timeout,
            Some(Duration::from_millis(40))
        );
    }

    #[tokio::test]
    async fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "module_name = \"collector\"\npartitions = 4").unwrap();

        let config = PipelineConfig::load(Some(file.path())).await.unwrap();

        assert_eq!(config.module_name, "collector");
        assert_eq!(config.partitions, 4);
    }

    #[tokio::test]
    async fn test_missing_explicit_file_is_an_error() {
        let error = PipelineConfig::load(Some(Path::new("/nonexistent/eventpipe.toml")))
            .await
            .unwrap_err();

        assert!(matches!(error, ConfigError::NotFound { .. }));
    }
}
