//! tfplug framework
//!
//! This crate provides a typed framework for building Terraform-style
//! providers that speak the gRPC plugin protocol (version 5). Provider authors
//! implement the [`Provider`], [`Resource`] and [`DataSource`] traits; the
//! framework handles the wire protocol, value decoding, schema validation and
//! the sequencing of each RPC.
//!
//! # Overview
//!
//! The framework provides:
//!
//! - **Protocol types**: Rust types generated from the plugin protocol definition
//! - **Schema types**: Attributes, nested blocks and versioned schemas
//! - **Values**: A schema-aware value model with null and unknown values
//! - **Diagnostics**: Ordered errors and warnings, optionally tied to an attribute path
//! - **Server**: An adapter from protocol requests to the provider traits
//! - **Serving**: The plugin handshake, gRPC server and graceful shutdown
//! - **Testing**: [`testing::ProviderTester`] for exercising providers without a server
//!
//! # Quick Start
//!
//! ```ignore
//! use tfplug_framework::{
//!     async_trait, serve, Provider, Resource,
//!     provider::{ConfigureRequest, ConfigureResponse, MetadataResponse, SchemaResponse},
//!     resource::{self, CreateRequest, CreateResponse},
//!     schema::{Attribute, Schema},
//!     path::Path,
//! };
//!
//! struct MyProvider;
//!
//! #[async_trait]
//! impl Provider for MyProvider {
//!     fn metadata(&self) -> MetadataResponse {
//!         MetadataResponse::new("example", env!("CARGO_PKG_VERSION"))
//!     }
//!
//!     async fn schema(&self, resp: &mut SchemaResponse) {
//!         resp.schema = Schema::v0().with_attribute("endpoint", Attribute::optional_string());
//!     }
//!
//!     async fn configure(&self, req: ConfigureRequest, resp: &mut ConfigureResponse) {
//!         // Connect a client here and hand it to resources via provider_data.
//!     }
//!
//!     fn resources(&self) -> Vec<resource::ResourceFactory> {
//!         vec![resource::factory(|| Thing)]
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     tfplug_framework::init_logging();
//!     serve(MyProvider).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Handshake Protocol
//!
//! When a provider starts via [`serve`], it checks the host's magic cookie and
//! prints a handshake line to stdout:
//!
//! ```text
//! 1|5|tcp|127.0.0.1:50051|grpc
//! ```
//!
//! Format: `<core_version>|<protocol_version>|tcp|<address>|grpc`
//!
//! # Provider Protocol
//!
//! - **GetProviderSchema**: Returns schemas for the provider, resources and data sources
//! - **ValidateProviderConfig**: Validates provider configuration
//! - **ConfigureProvider**: Configures the provider and stores its data for resources
//! - **ValidateResourceConfig / ValidateDataResourceConfig**: Validates configuration
//! - **UpgradeResourceState**: Migrates state from older schema versions
//! - **ReadResource**: Refreshes resource state
//! - **PlanResourceChange**: Calculates the planned state and replacement paths
//! - **ApplyResourceChange**: Creates, updates or deletes a resource
//! - **ImportResourceState**: Imports existing infrastructure
//! - **ReadDataSource**: Reads data from external sources
//! - **StopProvider**: Asks the provider to stop

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod data;
pub mod datasource;
pub mod diag;
pub mod error;
pub mod grpc;
pub mod logging;
pub mod path;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod serve;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;
pub mod value;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod proto;

// Re-export main types at crate root
pub use data::{Config, Plan, State};
pub use datasource::DataSource;
pub use diag::{Diagnostic, Diagnostics, Severity};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use path::{Path, Paths};
pub use provider::{Provider, ProviderData};
pub use resource::Resource;
pub use schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema};
pub use serve::{
    serve, serve_on, serve_on_with_options, serve_with_options, ServeOptions, PROTOCOL_VERSION,
};
pub use server::Server;
pub use types::{AttrValue, BoolValue, Float64Value, Int64Value, StringValue};
pub use validation::{is_valid, validate, validate_result};
pub use value::{Value, ValueError, UNKNOWN_VALUE};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tonic;
pub use tracing;
