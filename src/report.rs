// src/report.rs

//! Reporting capability handed to each component
//!
//! The recipe compiler and the build emitter never write to a process-wide
//! logger on their own. They are constructed with an `Arc<dyn Reporter>` and
//! send their diagnostics through it.
//!
//! Implementations:
//! - `LogReporter`: forwards to tracing
//! - `SilentReporter`: no-op for scripted/quiet modes
//! - `CallbackReporter`: hands every event to a closure
//!
//! # Example
//!
//! ```ignore
//! use stackinator::report::{LogReporter, Reporter};
//!
//! let reporter = LogReporter::new("recipe");
//! reporter.debug("opening compilers.yaml");
//! ```

use std::sync::Arc;
use tracing::{debug, info, warn};

/// Severity of a reported message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReportLevel {
    Debug,
    Info,
    Warn,
}

/// A single reported message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEvent {
    pub level: ReportLevel,
    pub message: String,
}

/// Core trait for reporting
pub trait Reporter: Send + Sync {
    /// Report a message at the given level
    fn report(&self, level: ReportLevel, message: &str);

    /// Report a debug message
    fn debug(&self, message: &str) {
        self.report(ReportLevel::Debug, message);
    }

    /// Report an informational message
    fn info(&self, message: &str) {
        self.report(ReportLevel::Info, message);
    }

    /// Report a warning
    fn warn(&self, message: &str) {
        self.report(ReportLevel::Warn, message);
    }
}

/// Silent reporter (no-op)
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl SilentReporter {
    /// Create a new silent reporter
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for SilentReporter {
    fn report(&self, _level: ReportLevel, _message: &str) {}
}

/// Logging reporter
///
/// Forwards messages to tracing, tagged with the component name.
#[derive(Debug, Clone)]
pub struct LogReporter {
    name: String,
}

impl LogReporter {
    /// Create a new logging reporter
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Reporter for LogReporter {
    fn report(&self, level: ReportLevel, message: &str) {
        match level {
            ReportLevel::Debug => debug!(component = %self.name, "{}", message),
            ReportLevel::Info => info!(component = %self.name, "{}", message),
            ReportLevel::Warn => warn!(component = %self.name, "{}", message),
        }
    }
}

/// Callback-based reporter
///
/// Calls a user-provided function for every event.
pub struct CallbackReporter<F>
where
    F: Fn(ReportEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackReporter<F>
where
    F: Fn(ReportEvent) + Send + Sync,
{
    /// Create a new callback reporter
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> Reporter for CallbackReporter<F>
where
    F: Fn(ReportEvent) + Send + Sync,
{
    fn report(&self, level: ReportLevel, message: &str) {
        (self.callback)(ReportEvent {
            level,
            message: message.to_string(),
        });
    }
}

/// Shared silent reporter, for callers that do not care about diagnostics
pub fn silent() -> Arc<dyn Reporter> {
    Arc::new(SilentReporter)
}
