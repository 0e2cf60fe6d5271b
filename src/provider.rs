//! The provider-level trait.
//!
//! A provider describes its own configuration schema, configures itself from the
//! practitioner's configuration and lists the resources and data sources it
//! serves. Every callback reports problems by appending to the response's
//! diagnostics.
//!
//! # Example
//!
//! ```ignore
//! use tfplug_framework::provider::*;
//! use tfplug_framework::schema::{Attribute, Schema};
//! use tfplug_framework::path::Path;
//!
//! #[derive(Default)]
//! struct ExampleProvider;
//!
//! #[async_trait::async_trait]
//! impl Provider for ExampleProvider {
//!     fn metadata(&self) -> MetadataResponse {
//!         MetadataResponse::new("example", env!("CARGO_PKG_VERSION"))
//!     }
//!
//!     async fn schema(&self, resp: &mut SchemaResponse) {
//!         resp.schema = Schema::v0().with_attribute("endpoint", Attribute::optional_string());
//!     }
//!
//!     async fn configure(&self, req: ConfigureRequest, resp: &mut ConfigureResponse) {
//!         match req.config.get_attribute::<Option<String>>(&Path::root("endpoint")) {
//!             Ok(endpoint) => resp.provider_data = Some(std::sync::Arc::new(endpoint)),
//!             Err(diags) => resp.diagnostics.append(diags),
//!         }
//!     }
//! }
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::data::Config;
use crate::datasource::DataSourceFactory;
use crate::diag::Diagnostics;
use crate::error::ProviderError;
use crate::resource::ResourceFactory;
use crate::schema::Schema;

/// Data produced by [`Provider::configure`] and handed to every resource and
/// data source before it is used.
pub type ProviderData = Arc<dyn Any + Send + Sync>;

/// Provider identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataResponse {
    /// Prefix of every resource and data source type name, such as `example`.
    pub type_name: String,
    /// Provider version.
    pub version: String,
}

impl MetadataResponse {
    /// Create metadata with a type name and version.
    pub fn new(type_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            version: version.into(),
        }
    }
}

/// Output of [`Provider::schema`].
#[derive(Debug, Clone, Default)]
pub struct SchemaResponse {
    /// The provider configuration schema.
    pub schema: Schema,
    /// Problems found while building the schema.
    pub diagnostics: Diagnostics,
}

/// Input to a configuration validation callback.
#[derive(Debug, Clone, Default)]
pub struct ValidateConfigRequest {
    /// The configuration to validate. May contain unknown values.
    pub config: Config,
}

/// Output of a configuration validation callback.
#[derive(Debug, Clone, Default)]
pub struct ValidateConfigResponse {
    /// Problems found in the configuration.
    pub diagnostics: Diagnostics,
}

/// Input to [`Provider::configure`].
#[derive(Debug, Clone, Default)]
pub struct ConfigureRequest {
    /// Version of the host, passed through unmodified. May be empty.
    pub terraform_version: String,
    /// The provider configuration. Null when the provider has no schema.
    pub config: Config,
}

/// Output of [`Provider::configure`].
#[derive(Default)]
pub struct ConfigureResponse {
    /// Problems found while configuring.
    pub diagnostics: Diagnostics,
    /// Data to share with resources and data sources, such as an API client.
    pub provider_data: Option<ProviderData>,
}

impl fmt::Debug for ConfigureResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigureResponse")
            .field("diagnostics", &self.diagnostics)
            .field("provider_data", &self.provider_data.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Trait that provider implementations must implement.
#[async_trait::async_trait]
pub trait Provider: Send + Sync + 'static {
    /// Return the provider's type name and version.
    fn metadata(&self) -> MetadataResponse;

    /// Describe the provider configuration.
    async fn schema(&self, resp: &mut SchemaResponse);

    /// Schema of the `provider_meta` block modules may set, if supported.
    fn meta_schema(&self) -> Option<Schema> {
        None
    }

    /// Validate the provider configuration beyond what the schema enforces.
    async fn validate_config(&self, req: ValidateConfigRequest, resp: &mut ValidateConfigResponse) {
        let _ = (req, resp);
    }

    /// Configure the provider.
    ///
    /// Called once per run, before any resource or data source is used.
    async fn configure(&self, req: ConfigureRequest, resp: &mut ConfigureResponse);

    /// The resources this provider serves.
    fn resources(&self) -> Vec<ResourceFactory> {
        Vec::new()
    }

    /// The data sources this provider serves.
    fn data_sources(&self) -> Vec<DataSourceFactory> {
        Vec::new()
    }

    /// Stop the provider gracefully.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
