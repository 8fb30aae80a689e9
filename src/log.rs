//! Logging for the engine.
//!
//! The engine logs through the `log` facade; the macros are re-exported here so that modules
//! write `use crate::log::warn;`. [`enable_logging`], [`disable_logging`] and [`set_log_level`]
//! install or reconfigure a `log4rs` console logger. Nothing is printed until one of them is
//! called, so library users are free to install their own logger instead.

use std::sync::{Mutex, PoisonError};

use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Handle;

pub use ::log::{debug, error, info, trace, warn, LevelFilter};

const DEFAULT_LOG_PATTERN: &str = "{h({l})} {M} - {m}{n}";
const STDOUT_APPENDER: &str = "stdout";

// The handle returned by the first successful `log4rs::init_config`. `log` only allows one
// global logger, so later changes go through `Handle::set_config`.
static LOG_HANDLE: Mutex<Option<Handle>> = Mutex::new(None);

fn build_config(level: LevelFilter) -> Option<Config> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(DEFAULT_LOG_PATTERN)))
        .build();

    Config::builder()
        .appender(Appender::builder().build(STDOUT_APPENDER, Box::new(stdout)))
        .build(Root::builder().appender(STDOUT_APPENDER).build(level))
        .map_err(|errors| eprintln!("failed to build logging configuration: {errors}"))
        .ok()
}

/// Sets the maximum level that is printed, installing the console logger on first use.
pub fn set_log_level(level: LevelFilter) {
    let Some(config) = build_config(level) else {
        return;
    };

    let mut handle = LOG_HANDLE.lock().unwrap_or_else(PoisonError::into_inner);
    match handle.as_ref() {
        Some(existing) => existing.set_config(config),
        None => match log4rs::init_config(config) {
            Ok(new_handle) => *handle = Some(new_handle),
            // Another logger was installed by the embedding application; only the level applies.
            Err(error) => eprintln!("console logger not installed: {error}"),
        },
    }
    ::log::set_max_level(level);
}

/// Enables logging at the `Warn` level.
pub fn enable_logging() {
    set_log_level(LevelFilter::Warn);
}

pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

/// Parses a level name such as `"info"` or `"warn"` (case-insensitive).
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    name.parse().ok()
}
