//! Data sources.
//!
//! A [`DataSource`] reads information the provider does not manage. Like
//! resources, a fresh instance is created for every call and configured with
//! the provider data first.

use std::sync::Arc;

use crate::data::{Config, State};
use crate::diag::Diagnostics;
use crate::schema::Schema;

pub use crate::provider::{ValidateConfigRequest, ValidateConfigResponse};
pub use crate::resource::{ConfigureRequest, ConfigureResponse};

/// Creates a new data source instance.
pub type DataSourceFactory = Arc<dyn Fn() -> Box<dyn DataSource> + Send + Sync>;

/// Wrap a constructor as a [`DataSourceFactory`].
pub fn factory<F, D>(constructor: F) -> DataSourceFactory
where
    F: Fn() -> D + Send + Sync + 'static,
    D: DataSource + 'static,
{
    Arc::new(move || Box::new(constructor()) as Box<dyn DataSource>)
}

/// Input to [`DataSource::read`].
#[derive(Debug, Clone, Default)]
pub struct ReadRequest {
    /// The configuration.
    pub config: Config,
    /// The module's `provider_meta`, if any.
    pub provider_meta: Config,
}

/// Output of [`DataSource::read`].
#[derive(Debug, Clone, Default)]
pub struct ReadResponse {
    /// The state to return. Starts as a copy of the configuration; every
    /// computed attribute must be set.
    pub state: State,
    /// Problems found while reading.
    pub diagnostics: Diagnostics,
}

/// Trait that data source implementations must implement.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    /// The full type name, usually `format!("{provider_type_name}_thing")`.
    fn type_name(&self, provider_type_name: &str) -> String;

    /// Describe the data source.
    fn schema(&self) -> Schema;

    /// Receive the provider data. Called before every other callback.
    fn configure(&mut self, req: ConfigureRequest, resp: &mut ConfigureResponse) {
        let _ = (req, resp);
    }

    /// Validate the configuration beyond what the schema enforces.
    async fn validate_config(&self, req: ValidateConfigRequest, resp: &mut ValidateConfigResponse) {
        let _ = (req, resp);
    }

    /// Read the data.
    async fn read(&self, req: ReadRequest, resp: &mut ReadResponse);
}
