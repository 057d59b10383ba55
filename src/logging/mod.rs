//! Logging infrastructure - structured tracing for the call bridge
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Configurable level, overridable through `RUST_LOG`
//! - Zero-cost when disabled
//! - One `ccall` span per facade call
//! - Console or file output, human-readable or JSON

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::coordinator::{OperationId, ProtocolViolation};
use crate::interop::MarshalError;

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default log level: trace, debug, info, warn, error
    #[serde(default = "default_level")]
    pub level: String,
    /// Log file path (console when unset)
    #[serde(default, rename = "file")]
    pub log_path: Option<String>,
    /// Enable JSON format (vs human-readable)
    #[serde(default, rename = "json")]
    pub json_format: bool,
    /// Show span events (enter/exit)
    #[serde(default, rename = "spans")]
    pub show_spans: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            log_path: None,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Overlay environment variables on this config
    pub fn with_env(mut self) -> Self {
        // CCALL_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("CCALL_LOG_LEVEL") {
            self.level = level.to_lowercase();
        }

        // CCALL_LOG_FILE: path to log file
        if let Ok(path) = std::env::var("CCALL_LOG_FILE") {
            self.log_path = Some(path);
        }

        if std::env::var("CCALL_LOG_JSON").is_ok() {
            self.json_format = true;
        }
        if std::env::var("CCALL_LOG_SPANS").is_ok() {
            self.show_spans = true;
        }

        self
    }

    /// Parsed level, INFO when unrecognised
    pub fn level(&self) -> Level {
        match self.level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// Verbose config for debugging a misbehaving module
    pub fn debug() -> Self {
        Self {
            level: "trace".to_string(),
            log_path: None,
            json_format: false,
            show_spans: true,
        }
    }
}

/// Initialize logging with default configuration
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration
///
/// Only the first call installs a subscriber.
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "ccall_bridge={}",
                config.level().as_str().to_lowercase()
            ))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let writer = match config.log_path.as_deref().map(Path::new) {
            Some(path) => {
                let dir = path.parent().unwrap_or_else(|| Path::new("."));
                let file = path.file_name().unwrap_or_else(|| "ccall.log".as_ref());
                BoxMakeWriter::new(tracing_appender::rolling::never(dir, file))
            }
            None => BoxMakeWriter::new(io::stderr),
        };

        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(span_events)
            .with_target(true)
            .with_line_number(cfg!(debug_assertions));

        let registry = tracing_subscriber::registry().with(env_filter);
        let installed = if config.json_format {
            registry.with(layer.json()).try_init()
        } else {
            registry.with(layer.compact()).try_init()
        };
        installed.ok(); // Another subscriber may already be installed
    });
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Bridge-specific logging functions
// ============================================================================

/// Log a facade call
#[inline]
pub fn log_call(ident: &str, args_count: usize) {
    tracing::trace!(target: "ccall", function = ident, args_count, "foreign call");
}

/// Log a completed call
#[inline]
pub fn log_return(ident: &str, deferred: bool) {
    tracing::trace!(target: "ccall", function = ident, deferred, "foreign return");
}

/// Log a call that unwound
#[inline]
pub fn log_suspend(ident: &str, operation: OperationId) {
    tracing::debug!(target: "ccall", function = ident, operation = %operation, "foreign call suspended");
}

/// Log the completion of a suspended call
#[inline]
pub fn log_resume(ident: &str, operation: OperationId) {
    tracing::debug!(target: "ccall", function = ident, operation = %operation, "suspended call resumed");
}

/// Log an arena frame restored to its save point
#[inline]
pub fn log_frame_release(top: usize, depth: usize) {
    tracing::trace!(target: "arena", top, depth, "frame released");
}

/// Log a protocol violation
#[inline]
pub fn log_violation(violation: &ProtocolViolation) {
    tracing::error!(target: "coordinator", error = %violation, "async protocol violation");
}

/// Log a marshalling failure
#[inline]
pub fn log_marshal_error(ident: &str, error: &MarshalError) {
    tracing::warn!(target: "ccall", function = ident, error = %error, "marshalling failed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing_defaults_to_info() {
        let mut config = LogConfig::default();
        assert_eq!(config.level(), Level::INFO);

        config.level = "TRACE".to_string();
        assert_eq!(config.level(), Level::TRACE);

        config.level = "loud".to_string();
        assert_eq!(config.level(), Level::INFO);
    }

    #[test]
    fn init_is_idempotent() {
        init_with_config(LogConfig::default());
        init_with_config(LogConfig::debug());
        assert!(is_initialized());
    }

    #[test]
    fn test_logging_functions() {
        // These should not panic
        log_call("add", 2);
        log_return("add", false);
        log_frame_release(1024, 0);
        log_marshal_error(
            "greet",
            &MarshalError::InvalidAddress { found: "string" },
        );
        log_violation(&ProtocolViolation::NotOptedIn {
            ident: "sleep".to_string(),
        });
    }
}
