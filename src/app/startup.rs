//! Binary entry point
//!
//! Reads events as JSON lines, publishes them through the stream
//! dispatcher onto an in-memory broker and consumes them back with a
//! logging listener. Exits once every published event is committed, or on
//! the first interrupt after draining what is in flight.

use crate::app::cli::args::Args;
use crate::app::config::{ConfigError, PipelineConfig};
use crate::app::listeners::LoggingListener;
use crate::core::error_handling::{log_error_with_context, ContextualError};
use crate::core::logging::{init_logging, reconfigure_logging};
use crate::core::shutdown::ShutdownCoordinator;
use crate::events::api::{DomainEvent, EventDispatcher};
use crate::stream::api::{
    throttle_hook, CodecError, EventCodec, JsonCodec, MemoryBroker, StreamError,
    StreamEventDispatcher,
};
use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

/// How often the binary checks whether everything was committed
const COMMIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Failures that end the binary
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("Cannot read events from {source_name}: {source}")]
    Input {
        source_name: String,
        #[source]
        source: std::io::Error,
    },
}

impl ContextualError for StartupError {
    fn is_user_actionable(&self) -> bool {
        match self {
            StartupError::Config(error) => error.is_user_actionable(),
            StartupError::Stream(error) => error.is_user_actionable(),
            StartupError::Input { .. } => true,
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            StartupError::Config(error) => error.user_message(),
            StartupError::Stream(error) => error.user_message(),
            StartupError::Input { .. } => None,
        }
    }
}

/// Counts reported when the binary finishes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub published: usize,
    pub skipped_lines: usize,
    pub delivered: usize,
}

/// Run the binary; returns the process exit code
pub async fn startup() -> i32 {
    let args = Args::parse();
    let use_color = args.use_color(std::io::stderr().is_terminal());
    let log_file = args.log_file_str();

    if let Err(error) = init_logging(
        args.log_level.as_deref(),
        args.log_format.as_deref(),
        log_file.as_deref(),
        use_color,
    ) {
        eprintln!("Error initialising logging: {}", error);
        return 1;
    }

    log::info!(
        "eventpipe {} ({} built {})",
        env!("CARGO_PKG_VERSION"),
        crate::GIT_HASH,
        crate::BUILD_TIME
    );

    let config = match load_config(&args).await {
        Ok(config) => config,
        Err(error) => {
            log_error_with_context(&error, "Configuration loading");
            return 1;
        }
    };

    let input = args.input.clone();
    let outcome = ShutdownCoordinator::guard(|coordinator, shutdown_rx| async move {
        run(config, input, coordinator, shutdown_rx).await
    })
    .await;

    match outcome {
        Ok(summary) => {
            log::info!(
                "Published {} event(s), delivered {}, skipped {} line(s)",
                summary.published,
                summary.delivered,
                summary.skipped_lines
            );
            0
        }
        Err(error) => {
            log_error_with_context(&error, "Event pipeline");
            1
        }
    }
}

async fn load_config(args: &Args) -> Result<PipelineConfig, ConfigError> {
    let mut config = PipelineConfig::load(args.config_file.as_deref()).await?;
    config.apply_args(args);
    config.validate()?;

    // Only the level can change after the logger is installed
    if args.log_level.is_none() {
        if let Some(level) = &config.log_level {
            if let Err(error) = reconfigure_logging(level) {
                log::warn!("Ignoring log_level from configuration: {}", error);
            }
        }
    }
    log::debug!("Configuration: {:?}", config);
    Ok(config)
}

/// Publish everything from `input`, then wait until it is consumed
pub async fn run(
    config: PipelineConfig,
    input: Option<PathBuf>,
    coordinator: ShutdownCoordinator,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<RunSummary, StartupError> {
    let (reader, source_name) = open_input(input.as_deref()).await?;

    let broker = Arc::new(MemoryBroker::new(config.partitions));
    let dispatcher = EventDispatcher::<DomainEvent>::builder()
        .retry_policy(config.retry_policy())
        .max_displacement(config.max_displacement)
        .pause_hook(throttle_hook())
        .build();
    let stream = StreamEventDispatcher::builder(config.stream_settings(), broker.clone())
        .dispatcher(dispatcher)
        .build();

    let listener = Arc::new(LoggingListener::<DomainEvent>::new());
    stream.add_listener(listener.clone()).await?;

    let mut summary = match publish_lines(&stream, reader, &source_name, &coordinator).await {
        Ok(summary) => summary,
        Err(error) => {
            stream.shutdown().await;
            return Err(error);
        }
    };

    let client_id = stream.client_id().to_string();
    let topic = stream.topic().to_string();
    while !broker.is_fully_committed(&client_id, &topic) {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                log::info!("Stopping before every event was committed");
                break;
            }
            _ = tokio::time::sleep(COMMIT_POLL_INTERVAL) => {}
        }
    }

    stream.shutdown().await;
    summary.delivered = listener.delivered();
    Ok(summary)
}

type EventReader = Box<dyn AsyncBufRead + Unpin + Send>;

async fn open_input(input: Option<&Path>) -> Result<(EventReader, String), StartupError> {
    match input {
        Some(path) => {
            let source_name = path.display().to_string();
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|source| StartupError::Input {
                    source_name: source_name.clone(),
                    source,
                })?;
            Ok((Box::new(BufReader::new(file)), source_name))
        }
        None => Ok((Box::new(BufReader::new(tokio::io::stdin())), "stdin".to_string())),
    }
}

/// Publish each line of `reader` as an event; blank lines are ignored
pub async fn publish_lines<R>(
    stream: &StreamEventDispatcher<DomainEvent>,
    reader: R,
    source_name: &str,
    coordinator: &ShutdownCoordinator,
) -> Result<RunSummary, StartupError>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = RunSummary::default();
    let mut lines = reader.lines();
    let mut line_number = 0usize;

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|source| StartupError::Input {
            source_name: source_name.to_string(),
            source,
        })?
    {
        line_number += 1;
        if coordinator.is_shutdown_requested() {
            log::info!("Shutdown requested; not reading past line {}", line_number - 1);
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let decoded: Result<DomainEvent, CodecError> = JsonCodec.decode(Some(line.as_bytes()));
        match decoded {
            Ok(event) => {
                stream.queue_event(event).await?;
                summary.published += 1;
            }
            Err(error) => {
                log::warn!("Skipping {} line {}: {}", source_name, line_number, error);
                summary.skipped_lines += 1;
            }
        }
    }
    Ok(summary)
}
