use std::io::{self, IsTerminal};

use anyhow::{Context, Result};
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::config::{CommonConfig, PathSet};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogConfig {
    #[serde(default = "LogConfig::default_level")]
    pub level: LogLevel,

    #[serde(default = "LogConfig::default_target")]
    pub target: LogTarget,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "info")]
    Info,
    #[serde(rename = "debug")]
    Debug,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    #[serde(rename = "stdout")]
    Stdout,
    #[serde(rename = "stderr")]
    Stderr,
}

impl CommonConfig for LogConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            target: Self::default_target(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        Ok(())
    }
}

impl LogConfig {
    pub fn default_level() -> LogLevel {
        LogLevel::Info
    }

    pub fn default_target() -> LogTarget {
        LogTarget::Stdout
    }

    pub fn init(&self) -> Result<()> {
        let level = match self.level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
        };

        let is_terminal = match self.target {
            LogTarget::Stdout => io::stdout().is_terminal(),
            LogTarget::Stderr => io::stderr().is_terminal(),
        };

        let colors = ColoredLevelConfig::new()
            .info(Color::Green)
            .warn(Color::Yellow)
            .debug(Color::Magenta);

        let dispatch = fern::Dispatch::new()
            .format(move |out, message, record| {
                let now = humantime::format_rfc3339_millis(std::time::SystemTime::now());
                if is_terminal {
                    out.finish(format_args!(
                        "{} [{}] {}",
                        now,
                        colors.color(record.level()),
                        message
                    ))
                } else {
                    out.finish(format_args!("{} [{}] {}", now, record.level(), message))
                }
            })
            .level(level)
            // Keep dependency noise out of debug output
            .level_for("actix_server", LevelFilter::Warn)
            .level_for("mio", LevelFilter::Warn);

        let dispatch = match self.target {
            LogTarget::Stdout => dispatch.chain(io::stdout()),
            LogTarget::Stderr => dispatch.chain(io::stderr()),
        };

        dispatch.apply().context("init logger")?;
        Ok(())
    }
}
