//! Command line arguments
//!
//! Every pipeline setting can also come from the configuration file; flags
//! given here take precedence over it.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "eventpipe")]
#[command(about = "Publish events through a log broker and dispatch them by priority")]
#[command(version)]
#[command(after_help = "Events are read as one JSON object per line, e.g.\n  {\"eventType\":\"ScanForFiles\",\"pipelineName\":\"edge\",\"path\":\"/in\"}")]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Read events from FILE instead of stdin
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Host identifier; the topic is <HOST>_events
    #[arg(short = 'H', long = "host-id", value_name = "HOST")]
    pub host_id: Option<String>,

    /// Module name used in the consumer client id
    #[arg(short = 'm', long = "module", value_name = "NAME")]
    pub module_name: Option<String>,

    /// Broker host
    #[arg(long = "broker-host", value_name = "HOST")]
    pub broker_host: Option<String>,

    /// Broker port
    #[arg(long = "broker-port", value_name = "PORT")]
    pub broker_port: Option<u16>,

    /// Partitions per topic of the in-memory broker
    #[arg(short = 'p', long = "partitions", value_name = "COUNT")]
    pub partitions: Option<usize>,

    /// Milliseconds between consumer heartbeats
    #[arg(long = "heartbeat-interval", value_name = "MS")]
    pub heartbeat_interval_ms: Option<u64>,

    /// Attempts per listener notification
    #[arg(long = "retry-attempts", value_name = "COUNT")]
    pub retry_attempts: Option<usize>,

    /// Milliseconds between notification attempts
    #[arg(long = "retry-delay", value_name = "MS")]
    pub retry_delay_ms: Option<u64>,

    /// How many queued events a new event may overtake
    #[arg(short = 'd', long = "max-displacement", value_name = "COUNT")]
    pub max_displacement: Option<usize>,

    /// Longest wait for the commit lock, in milliseconds
    #[arg(long = "commit-timeout", value_name = "MS")]
    pub commit_timeout_ms: Option<u64>,

    /// Log level or flexi_logger spec
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Log file path (use 'none' to log to stderr)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Force coloured log output
    #[arg(long = "color", conflicts_with = "no_color")]
    pub color: bool,

    /// Disable coloured log output
    #[arg(long = "no-color")]
    pub no_color: bool,
}

impl Args {
    /// Colour when forced, or when logging to a terminal and not disabled
    pub fn use_color(&self, is_terminal: bool) -> bool {
        !self.no_color && (self.color || is_terminal)
    }

    /// Log file as a string, with 'none' meaning stderr
    pub fn log_file_str(&self) -> Option<String> {
        self.log_file
            .as_ref()
            .map(|path| path.to_string_lossy().to_string())
            .filter(|path| !path.eq_ignore_ascii_case("none"))
    }
}
