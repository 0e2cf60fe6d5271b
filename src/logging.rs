//! Logging and tracing setup for providers.
//!
//! All logs are written to **stderr**; stdout carries the plugin handshake line
//! and nothing else.
//!
//! # Quick Start
//!
//! ```ignore
//! use tfplug_framework::{serve, init_logging};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     serve(MyProvider::default()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: full filter directives (e.g. `tfplug_framework=debug`)
//! - `TF_LOG`: level set by the host (`TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR`),
//!   used when `RUST_LOG` is not set

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable the host uses to request a log level.
pub const TF_LOG_ENV: &str = "TF_LOG";

/// Map a `TF_LOG` value to a filter directive.
///
/// `JSON` is accepted as an alias for `trace`. Unrecognized values yield `None`.
pub fn level_from_tf_log(value: &str) -> Option<&'static str> {
    match value.trim().to_ascii_uppercase().as_str() {
        "TRACE" | "JSON" => Some("trace"),
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARN" => Some("warn"),
        "ERROR" => Some("error"),
        _ => None,
    }
}

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var(TF_LOG_ENV)
            .ok()
            .and_then(|v| level_from_tf_log(&v))
            .unwrap_or(default_level);
        EnvFilter::new(level)
    })
}

fn try_init_with(default_level: &str) -> bool {
    tracing_subscriber::registry()
        .with(build_filter(default_level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
        .is_ok()
}

/// Initialize the default logging subscriber at `info`.
///
/// Does nothing if a global subscriber is already set.
pub fn init_logging() {
    try_init_with("info");
}

/// Initialize logging with a custom default level.
///
/// The default applies only when neither `RUST_LOG` nor `TF_LOG` is set.
pub fn init_logging_with_default(default_level: &str) {
    try_init_with(default_level);
}

/// Try to initialize logging, returning false if already initialized.
pub fn try_init_logging() -> bool {
    try_init_with("info")
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so these tests
    // stick to the filter helpers.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("tfplug_framework=debug").is_ok());
        assert!(EnvFilter::try_new("warn,tfplug_framework=debug").is_ok());
    }

    #[test]
    fn test_tf_log_levels() {
        assert_eq!(level_from_tf_log("TRACE"), Some("trace"));
        assert_eq!(level_from_tf_log("debug"), Some("debug"));
        assert_eq!(level_from_tf_log(" WARN "), Some("warn"));
        assert_eq!(level_from_tf_log("JSON"), Some("trace"));
        assert_eq!(level_from_tf_log("verbose"), None);
        assert_eq!(level_from_tf_log(""), None);
    }
}
