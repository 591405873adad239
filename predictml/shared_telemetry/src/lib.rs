#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Telemetry handle shared by the pipeline, the recorder and the CLI.

use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_event_bus::{EventPublisher, EventRecord};
use shared_logging::{JsonLogger, LogRecord};
use tokio::runtime::{Handle, Runtime};

pub use shared_logging::LogLevel;

/// Builder for telemetry sinks.
pub struct TelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    min_level: LogLevel,
    event_publisher: Option<Arc<dyn EventPublisher>>,
}

impl TelemetryBuilder {
    /// Creates a new builder scoped to a module label.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            min_level: LogLevel::Info,
            event_publisher: None,
        }
    }

    /// Sets the log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Sets the minimum level written to the log.
    #[must_use]
    pub const fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Sets the event publisher.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    /// Builds telemetry.
    pub fn build(self) -> Result<Telemetry> {
        let logger = match self.log_path {
            Some(path) => Some(Arc::new(JsonLogger::with_min_level(path, self.min_level)?)),
            None => None,
        };
        Ok(Telemetry {
            module: self.module,
            logger,
            publisher: self.event_publisher,
        })
    }
}

/// Cheaply clonable telemetry handle. Every sink is optional.
#[derive(Clone)]
pub struct Telemetry {
    module: String,
    logger: Option<Arc<JsonLogger>>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("module", &self.module)
            .field("logging", &self.logger.is_some())
            .field("events", &self.publisher.is_some())
            .finish()
    }
}

impl Telemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> TelemetryBuilder {
        TelemetryBuilder::new(module)
    }

    /// Telemetry with no sinks attached.
    #[must_use]
    pub fn disabled(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            logger: None,
            publisher: None,
        }
    }

    /// Same sinks, different module label.
    #[must_use]
    pub fn child(&self, module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            logger: self.logger.clone(),
            publisher: self.publisher.clone(),
        }
    }

    /// Module label attached to every record.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Writes a structured log line.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        if let Some(logger) = &self.logger {
            if logger.enabled(level) {
                let record = LogRecord::new(&self.module, level, message).with_metadata(metadata);
                logger.log(&record)?;
            }
        }
        Ok(())
    }

    /// Publishes an event. Inside a tokio runtime the publish is spawned and not awaited.
    pub fn event(&self, event_type: &str, payload: Value) -> Result<()> {
        let Some(publisher) = &self.publisher else {
            return Ok(());
        };
        let record = EventRecord::new(&self.module, event_type, payload);
        if let Ok(handle) = Handle::try_current() {
            let publisher = Arc::clone(publisher);
            handle.spawn(async move {
                let _ = publisher.publish(record).await;
            });
            Ok(())
        } else {
            Runtime::new()?.block_on(publisher.publish(record))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_event_bus::MemoryEventBus;
    use tempfile::tempdir;

    #[test]
    fn telemetry_writes_log_and_event() {
        let tmp = tempdir().unwrap();
        let bus = Arc::new(MemoryEventBus::new(4));
        let log_path = tmp.path().join("service.log");
        let telemetry = Telemetry::builder("pipeline")
            .log_path(&log_path)
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        telemetry
            .log(LogLevel::Info, "artifacts.loaded", json!({ "families": 5 }))
            .unwrap();
        telemetry
            .event("prediction.completed", json!({ "model": "stock" }))
            .unwrap();
        assert!(std::fs::read_to_string(&log_path)
            .unwrap()
            .contains("artifacts.loaded"));
        assert_eq!(bus.snapshot().len(), 1);
    }

    #[test]
    fn child_shares_sinks_under_new_label() {
        let tmp = tempdir().unwrap();
        let log_path = tmp.path().join("service.log");
        let root = Telemetry::builder("service")
            .log_path(&log_path)
            .min_level(LogLevel::Debug)
            .build()
            .unwrap();
        let child = root.child("recorder");
        child
            .log(LogLevel::Debug, "record.appended", Value::Null)
            .unwrap();
        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("\"module\":\"recorder\""));
    }

    #[test]
    fn disabled_telemetry_is_silent() {
        let telemetry = Telemetry::disabled("quiet");
        telemetry.log(LogLevel::Error, "ignored", Value::Null).unwrap();
        telemetry.event("ignored", Value::Null).unwrap();
        assert_eq!(telemetry.module(), "quiet");
    }
}
