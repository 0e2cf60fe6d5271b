//! Error types for the framework.
//!
//! Callbacks report user-facing problems as [`Diagnostic`]s. [`ProviderError`]
//! covers the failures that happen around them: dispatching to an unknown
//! type, serving the plugin and stopping the provider.

use thiserror::Error;

use crate::diag::Diagnostic;

/// Errors raised by the framework itself.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The host asked for a resource type the provider does not define.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// The host asked for a data source type the provider does not define.
    #[error("Unknown data source type: {0}")]
    UnknownDataSource(String),

    /// Two resources report the same type name.
    #[error("Duplicate resource type: {0}")]
    DuplicateResource(String),

    /// Two data sources report the same type name.
    #[error("Duplicate data source type: {0}")]
    DuplicateDataSource(String),

    /// An error returned by provider code.
    #[error("SDK error: {0}")]
    Sdk(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// An I/O error occurred while setting up the server.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The binary was started outside of a plugin host.
    #[error(
        "This binary is a plugin and is not meant to be executed directly. \
         Run it through the host that loads it."
    )]
    NotPlugin,
}

impl ProviderError {
    /// Short summary used when the error is reported as a diagnostic.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::UnknownResource(_) => "Resource Type Not Found",
            Self::UnknownDataSource(_) => "Data Source Type Not Found",
            Self::DuplicateResource(_) => "Duplicate Resource Type Defined",
            Self::DuplicateDataSource(_) => "Duplicate Data Source Type Defined",
            Self::Sdk(_) => "Provider Error",
            Self::Serialization(_) => "Serialization Error",
            Self::Transport(_) => "Transport Error",
            Self::Io(_) => "I/O Error",
            Self::NotPlugin => "Not Running As Plugin",
        }
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        Diagnostic::error(err.summary(), err.to_string())
    }
}
