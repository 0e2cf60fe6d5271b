//! Protocol buffer types for the plugin protocol.
//!
//! The types and the `Provider` service trait are generated at build time from
//! `proto/tfplugin.proto`. RPC messages are nested: `configure_provider::Request`,
//! `plan_resource_change::Response`, and so on.

tonic::include_proto!("tfplugin");

pub use provider_server::{Provider as ProviderRpc, ProviderServer};
