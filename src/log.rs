//! The categorized diagnostic hook.
//!
//! The protocol core reports every successful inbound and outbound frame as
//! an `Info` line, protocol violations as `Warn`, and unreachable branches
//! as `Assertion`. The hook is pluggable: the default [`TracingSink`]
//! forwards to the `tracing` ecosystem, [`NullSink`] drops everything.
//!
//! The `Warn` stream is compiled out entirely when the `error-logging`
//! cargo feature (default on) is disabled.

use std::fmt;

/// Category of a diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    /// Frame traffic and lifecycle notes.
    Info,
    /// Protocol violations and recoverable faults.
    Warn,
    /// Branches that should be unreachable.
    Assertion,
}

/// Receiver for the core's diagnostic lines. May be a no-op.
pub trait LogSink: Send {
    fn log(&self, category: LogCategory, message: &str);
}

/// Default sink: forwards each category to the matching `tracing` level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, category: LogCategory, message: &str) {
        match category {
            LogCategory::Info => tracing::info!(target: "oiswire", "{message}"),
            LogCategory::Warn => tracing::warn!(target: "oiswire", "{message}"),
            LogCategory::Assertion => tracing::error!(target: "oiswire", "{message}"),
        }
    }
}

/// Sink that discards every line.
#[derive(Debug, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _category: LogCategory, _message: &str) {}
}

/// Internal handle the endpoints log through.
pub(crate) struct Logger {
    sink: Box<dyn LogSink>,
}

impl Logger {
    pub(crate) fn new() -> Self {
        Self {
            sink: Box::new(TracingSink),
        }
    }

    pub(crate) fn set_sink(&mut self, sink: Box<dyn LogSink>) {
        self.sink = sink;
    }

    pub(crate) fn info(&self, args: fmt::Arguments<'_>) {
        self.sink.log(LogCategory::Info, &args.to_string());
    }

    #[cfg_attr(not(feature = "error-logging"), allow(unused_variables))]
    pub(crate) fn warn(&self, args: fmt::Arguments<'_>) {
        #[cfg(feature = "error-logging")]
        self.sink.log(LogCategory::Warn, &args.to_string());
    }

    pub(crate) fn assertion(&self, args: fmt::Arguments<'_>) {
        self.sink.log(LogCategory::Assertion, &args.to_string());
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::RecordingSink;
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_logger_routes_categories() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let mut logger = Logger::new();
        logger.set_sink(Box::new(RecordingSink(lines.clone())));

        logger.info(format_args!("<- ACT"));
        logger.assertion(format_args!("unreachable"));

        let got = lines.lock().unwrap();
        assert_eq!(got[0], (LogCategory::Info, "<- ACT".to_string()));
        assert_eq!(got[1], (LogCategory::Assertion, "unreachable".to_string()));
    }

    #[cfg(feature = "error-logging")]
    #[test]
    fn test_warn_stream_enabled_by_default() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let mut logger = Logger::new();
        logger.set_sink(Box::new(RecordingSink(lines.clone())));

        logger.warn(format_args!("Unknown command: XYZ"));
        assert_eq!(lines.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_null_sink_is_silent() {
        // Just exercises the no-op path.
        NullSink.log(LogCategory::Warn, "dropped");
    }
}
