use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use shared_telemetry::LogLevel;

/// Runtime settings for the CLI.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Directory holding `<family>.json` artifacts.
    pub artifact_dir: PathBuf,
    /// Directory for the prediction log and the version registry.
    pub history_dir: PathBuf,
    /// Structured log file; `None` disables file logging.
    pub log_path: Option<PathBuf>,
    /// JSONL event log; `None` disables event publishing.
    pub event_log: Option<PathBuf>,
    /// Minimum level written to the log.
    pub log_level: LogLevel,
    /// Requests processed at once by `stream`.
    pub stream_concurrency: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ServiceConfigSerde {
    artifact_dir: Option<PathBuf>,
    history_dir: Option<PathBuf>,
    log_path: Option<PathBuf>,
    event_log: Option<PathBuf>,
    log_level: Option<String>,
    stream_concurrency: Option<usize>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("predictml/inference/artifacts"),
            history_dir: PathBuf::from("data/history"),
            log_path: Some(PathBuf::from("data/logs/predictml.log")),
            event_log: None,
            log_level: LogLevel::Info,
            stream_concurrency: 8,
        }
    }
}

impl ServiceConfig {
    /// Loads a TOML file. Relative paths resolve against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let document: ServiceConfigSerde =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        let source_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let defaults = Self::default();
        let resolve = |value: PathBuf| resolve_path(&source_dir, value);
        let log_level = match document.log_level {
            Some(level) => level
                .parse()
                .with_context(|| format!("invalid log_level in {}", path.display()))?,
            None => defaults.log_level,
        };
        let stream_concurrency = document
            .stream_concurrency
            .unwrap_or(defaults.stream_concurrency);
        ensure!(stream_concurrency > 0, "stream_concurrency must be at least 1");
        Ok(Self {
            artifact_dir: resolve(document.artifact_dir.unwrap_or(defaults.artifact_dir)),
            history_dir: resolve(document.history_dir.unwrap_or(defaults.history_dir)),
            log_path: document.log_path.or(defaults.log_path).map(resolve),
            event_log: document.event_log.map(resolve),
            log_level,
            stream_concurrency,
        })
    }

    /// Loads `path` when it exists, otherwise returns defaults relative to the working
    /// directory.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Append-only prediction log.
    #[must_use]
    pub fn history_file(&self) -> PathBuf {
        self.history_dir.join("predictions.jsonl")
    }

    /// Model version registry document.
    #[must_use]
    pub fn registry_file(&self) -> PathBuf {
        self.history_dir.join("model_versions.json")
    }
}

fn resolve_path(base: &Path, value: PathBuf) -> PathBuf {
    if value.is_relative() {
        base.join(value)
    } else {
        value
    }
}
