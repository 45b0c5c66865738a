//! Logger setup.
//!
//! Without a `log_file` everything goes to stderr through `env_logger`, and
//! `RUST_LOG` accepts the usual module filters. With a `log_file` a log4rs
//! config sends every record to stderr and to the file. The file is rotated
//! once it grows past `log_max_bytes`:
//!
//! ```text
//! cloud_uploader.log     current
//! cloud_uploader.log.1   previous
//! cloud_uploader.log.2   older, up to log_backups
//! ```
//!
//! In that mode `RUST_LOG` is read as a single level (`debug`, `warn`, ...).

use crate::config::UploaderConfig;
use env_logger::Env;
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::Path;
use thiserror::Error;

const PATTERN: &str = "[{d(%Y-%m-%dT%H:%M:%S)} {l} {t}] {m}{n}";

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("cannot open log file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid log rotation: {0}")]
    Rotation(String),
    #[error("invalid logger config: {0}")]
    Config(String),
    #[error(transparent)]
    SetLogger(#[from] log::SetLoggerError),
}

/// Install the global logger for `config`. Call once, before any job runs.
pub fn init(config: &UploaderConfig) -> Result<(), LoggingError> {
    let Some(path) = config.log_file.as_deref() else {
        env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init()?;
        return Ok(());
    };

    let file = rolling_appender(path, config.log_max_bytes, config.log_backups)?;
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    let log4rs_config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .appender(Appender::builder().build("file", Box::new(file)))
        .build(
            Root::builder()
                .appender("stderr")
                .appender("file")
                .build(env_level()),
        )
        .map_err(|e| LoggingError::Config(e.to_string()))?;

    log4rs::init_config(log4rs_config)?;
    Ok(())
}

/// File appender that keeps `backups` rotated copies named `<path>.1`,
/// `<path>.2`, ... and rolls once the file exceeds `max_bytes`.
pub fn rolling_appender(
    path: &Path,
    max_bytes: u64,
    backups: u32,
) -> Result<RollingFileAppender, LoggingError> {
    let pattern = format!("{}.{{}}", path.display());
    let roller = FixedWindowRoller::builder()
        .base(1)
        .build(&pattern, backups)
        .map_err(|e| LoggingError::Rotation(e.to_string()))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(max_bytes)), Box::new(roller));

    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(path, Box::new(policy))?)
}

fn env_level() -> LevelFilter {
    std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.trim().parse().ok())
        .unwrap_or(LevelFilter::Info)
}
