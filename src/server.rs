//! The protocol adapter.
//!
//! [`Server`] translates each plugin protocol call into calls on a [`Provider`]
//! and its resources and data sources. Every method takes the wire request and
//! returns the wire response; failures are reported as diagnostics in the
//! response and never as transport errors.
//!
//! A missing request (`None`) produces an empty response without invoking any
//! provider code.
//!
//! # Configure
//!
//! `configure_provider` runs in a fixed order:
//!
//! 1. Fetch the provider schema. If it reported an error, return its
//!    diagnostics without configuring.
//! 2. If the schema is empty, skip decoding and configure with a null config.
//! 3. Otherwise decode the config. A decode failure is returned as an error
//!    diagnostic without configuring.
//! 4. Call [`Provider::configure`] with the decoded config and the
//!    `terraform_version` from the request, unmodified.
//! 5. Return every diagnostic collected, in order.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::data::{Config, Plan, State};
use crate::datasource::{self, DataSource};
use crate::diag::Diagnostics;
use crate::error::ProviderError;
use crate::path::{Path, PathStep, Paths};
use crate::proto;
use crate::provider::{
    ConfigureRequest, ConfigureResponse, Provider, ProviderData, SchemaResponse,
    ValidateConfigRequest, ValidateConfigResponse,
};
use crate::resource::{self, Resource};
use crate::schema::{Block, BlockNestingMode, Schema};
use crate::validation;
use crate::value::{decode_dynamic_value, encode_dynamic_value, Value};

const NULL: &Value = &Value::Null;

/// Serves a [`Provider`] over the plugin protocol.
pub struct Server<P: Provider> {
    provider: Arc<P>,
    provider_data: RwLock<Option<ProviderData>>,
}

impl<P: Provider> Server<P> {
    /// Create a server for a provider.
    pub fn new(provider: P) -> Self {
        Self::from_arc(Arc::new(provider))
    }

    /// Create a server for a shared provider.
    pub fn from_arc(provider: Arc<P>) -> Self {
        Self {
            provider,
            provider_data: RwLock::new(None),
        }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    async fn provider_schema(&self) -> (Schema, Diagnostics) {
        let mut resp = SchemaResponse::default();
        self.provider.schema(&mut resp).await;
        (resp.schema, resp.diagnostics)
    }

    fn provider_meta(
        &self,
        provider_meta: Option<&proto::DynamicValue>,
        diagnostics: &mut Diagnostics,
    ) -> Config {
        match self.provider.meta_schema() {
            Some(schema) => {
                let raw = decode_value(provider_meta, &schema, "provider_meta", diagnostics);
                Config::new(schema, raw)
            }
            None => Config::default(),
        }
    }

    async fn resource(
        &self,
        type_name: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<Box<dyn Resource>> {
        let provider_type_name = self.provider.metadata().type_name;
        let found = self
            .provider
            .resources()
            .iter()
            .map(|factory| factory())
            .find(|r| r.type_name(&provider_type_name) == type_name);

        let Some(mut resource) = found else {
            diagnostics.push(ProviderError::UnknownResource(type_name.to_string()).into());
            return None;
        };

        let mut resp = resource::ConfigureResponse::default();
        let req = resource::ConfigureRequest {
            provider_data: self.provider_data.read().await.clone(),
        };
        resource.configure(req, &mut resp);

        let failed = resp.diagnostics.has_error();
        diagnostics.append(resp.diagnostics);
        if failed {
            None
        } else {
            Some(resource)
        }
    }

    async fn data_source(
        &self,
        type_name: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<Box<dyn DataSource>> {
        let provider_type_name = self.provider.metadata().type_name;
        let found = self
            .provider
            .data_sources()
            .iter()
            .map(|factory| factory())
            .find(|d| d.type_name(&provider_type_name) == type_name);

        let Some(mut data_source) = found else {
            diagnostics.push(ProviderError::UnknownDataSource(type_name.to_string()).into());
            return None;
        };

        let mut resp = datasource::ConfigureResponse::default();
        let req = datasource::ConfigureRequest {
            provider_data: self.provider_data.read().await.clone(),
        };
        data_source.configure(req, &mut resp);

        let failed = resp.diagnostics.has_error();
        diagnostics.append(resp.diagnostics);
        if failed {
            None
        } else {
            Some(data_source)
        }
    }

    /// Describe the provider, its resources and its data sources.
    pub async fn get_provider_schema(&self) -> proto::get_provider_schema::Response {
        debug!("GetProviderSchema called");
        let mut diagnostics = Diagnostics::new();

        let (provider_schema, diags) = self.provider_schema().await;
        diagnostics.append(diags);

        let provider_type_name = self.provider.metadata().type_name;

        let mut resource_schemas = HashMap::new();
        for factory in self.provider.resources() {
            let resource = factory();
            let type_name = resource.type_name(&provider_type_name);
            if resource_schemas.contains_key(&type_name) {
                diagnostics.push(ProviderError::DuplicateResource(type_name).into());
                continue;
            }
            resource_schemas.insert(type_name, proto::Schema::from(&resource.schema()));
        }

        let mut data_source_schemas = HashMap::new();
        for factory in self.provider.data_sources() {
            let data_source = factory();
            let type_name = data_source.type_name(&provider_type_name);
            if data_source_schemas.contains_key(&type_name) {
                diagnostics.push(ProviderError::DuplicateDataSource(type_name).into());
                continue;
            }
            data_source_schemas.insert(type_name, proto::Schema::from(&data_source.schema()));
        }

        info!(
            resources = resource_schemas.len(),
            data_sources = data_source_schemas.len(),
            "GetProviderSchema completed"
        );

        proto::get_provider_schema::Response {
            provider: Some(proto::Schema::from(&provider_schema)),
            resource_schemas,
            data_source_schemas,
            diagnostics: finish("GetProviderSchema", diagnostics),
            provider_meta: self.provider.meta_schema().as_ref().map(proto::Schema::from),
            server_capabilities: Some(proto::ServerCapabilities { plan_destroy: true }),
        }
    }

    /// Validate the provider configuration.
    pub async fn validate_provider_config(
        &self,
        request: Option<proto::validate_provider_config::Request>,
    ) -> proto::validate_provider_config::Response {
        let Some(request) = request else {
            return Default::default();
        };
        debug!("ValidateProviderConfig called");

        let (schema, mut diagnostics) = self.provider_schema().await;
        if !diagnostics.has_error() {
            let raw = decode_value(request.config.as_ref(), &schema, "configuration", &mut diagnostics);
            if !diagnostics.has_error() {
                diagnostics.append(validation::validate(&schema, &raw));

                let mut resp = ValidateConfigResponse::default();
                let config = Config::new(schema, raw);
                self.provider
                    .validate_config(ValidateConfigRequest { config }, &mut resp)
                    .await;
                diagnostics.append(resp.diagnostics);
            }
        }

        proto::validate_provider_config::Response {
            diagnostics: finish("ValidateProviderConfig", diagnostics),
        }
    }

    /// Configure the provider.
    pub async fn configure_provider(
        &self,
        request: Option<proto::configure_provider::Request>,
    ) -> proto::configure_provider::Response {
        let Some(request) = request else {
            debug!("ConfigureProvider called without a request");
            return Default::default();
        };
        debug!(terraform_version = %request.terraform_version, "ConfigureProvider called");

        let (schema, mut diagnostics) = self.provider_schema().await;
        if diagnostics.has_error() {
            return proto::configure_provider::Response {
                diagnostics: finish("ConfigureProvider", diagnostics),
            };
        }

        let config = if schema.is_empty() {
            Config::null(schema)
        } else {
            let raw = decode_value(request.config.as_ref(), &schema, "configuration", &mut diagnostics);
            if diagnostics.has_error() {
                return proto::configure_provider::Response {
                    diagnostics: finish("ConfigureProvider", diagnostics),
                };
            }
            Config::new(schema, raw)
        };

        let req = ConfigureRequest {
            terraform_version: request.terraform_version,
            config,
        };
        let mut resp = ConfigureResponse::default();
        self.provider.configure(req, &mut resp).await;

        if !resp.diagnostics.has_error() {
            *self.provider_data.write().await = resp.provider_data;
        }
        diagnostics.append(resp.diagnostics);

        proto::configure_provider::Response {
            diagnostics: finish("ConfigureProvider", diagnostics),
        }
    }

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        request: Option<proto::validate_resource_config::Request>,
    ) -> proto::validate_resource_config::Response {
        let Some(request) = request else {
            return Default::default();
        };
        debug!(type_name = %request.type_name, "ValidateResourceConfig called");
        let mut diagnostics = Diagnostics::new();

        if let Some(resource) = self.resource(&request.type_name, &mut diagnostics).await {
            let schema = resource.schema();
            let raw = decode_value(request.config.as_ref(), &schema, "configuration", &mut diagnostics);
            if !diagnostics.has_error() {
                diagnostics.append(validation::validate(&schema, &raw));

                let mut resp = ValidateConfigResponse::default();
                let config = Config::new(schema, raw);
                resource
                    .validate_config(ValidateConfigRequest { config }, &mut resp)
                    .await;
                diagnostics.append(resp.diagnostics);
            }
        }

        proto::validate_resource_config::Response {
            diagnostics: finish("ValidateResourceConfig", diagnostics),
        }
    }

    /// Validate a data source configuration.
    pub async fn validate_data_resource_config(
        &self,
        request: Option<proto::validate_data_resource_config::Request>,
    ) -> proto::validate_data_resource_config::Response {
        let Some(request) = request else {
            return Default::default();
        };
        debug!(type_name = %request.type_name, "ValidateDataResourceConfig called");
        let mut diagnostics = Diagnostics::new();

        if let Some(data_source) = self.data_source(&request.type_name, &mut diagnostics).await {
            let schema = data_source.schema();
            let raw = decode_value(request.config.as_ref(), &schema, "configuration", &mut diagnostics);
            if !diagnostics.has_error() {
                diagnostics.append(validation::validate(&schema, &raw));

                let mut resp = ValidateConfigResponse::default();
                let config = Config::new(schema, raw);
                data_source
                    .validate_config(ValidateConfigRequest { config }, &mut resp)
                    .await;
                diagnostics.append(resp.diagnostics);
            }
        }

        proto::validate_data_resource_config::Response {
            diagnostics: finish("ValidateDataResourceConfig", diagnostics),
        }
    }

    /// Rewrite stored state for the current schema version.
    ///
    /// State at the current version is re-decoded, dropping attributes the
    /// schema no longer defines. Older versions go through
    /// [`Resource::upgrade_state`].
    pub async fn upgrade_resource_state(
        &self,
        request: Option<proto::upgrade_resource_state::Request>,
    ) -> proto::upgrade_resource_state::Response {
        let Some(request) = request else {
            return Default::default();
        };
        debug!(
            type_name = %request.type_name,
            version = request.version,
            "UpgradeResourceState called"
        );
        let mut diagnostics = Diagnostics::new();
        let mut upgraded_state = None;

        let raw_json = request.raw_state.map(|raw| raw.json).unwrap_or_default();

        if raw_json.is_empty() {
            debug!("UpgradeResourceState called without stored state");
        } else if let Some(resource) = self.resource(&request.type_name, &mut diagnostics).await {
            let schema = resource.schema();
            if let Some(upgraded) =
                upgrade_state(resource.as_ref(), &schema, request.version, &raw_json, &mut diagnostics).await
            {
                upgraded_state = encode_value(&upgraded, "upgraded state", &mut diagnostics);
            }
        }

        proto::upgrade_resource_state::Response {
            upgraded_state,
            diagnostics: finish("UpgradeResourceState", diagnostics),
        }
    }

    /// Refresh a resource's state.
    pub async fn read_resource(
        &self,
        request: Option<proto::read_resource::Request>,
    ) -> proto::read_resource::Response {
        let Some(request) = request else {
            return Default::default();
        };
        debug!(type_name = %request.type_name, "ReadResource called");
        let mut diagnostics = Diagnostics::new();

        let Some(resource) = self.resource(&request.type_name, &mut diagnostics).await else {
            return proto::read_resource::Response {
                new_state: request.current_state,
                diagnostics: finish("ReadResource", diagnostics),
            };
        };

        let schema = resource.schema();
        let current = decode_value(request.current_state.as_ref(), &schema, "current state", &mut diagnostics);
        let provider_meta = self.provider_meta(request.provider_meta.as_ref(), &mut diagnostics);

        if diagnostics.has_error() || current.is_null() {
            return proto::read_resource::Response {
                new_state: request.current_state,
                diagnostics: finish("ReadResource", diagnostics),
            };
        }

        let mut resp = resource::ReadResponse {
            state: State::new(schema.clone(), current.clone()),
            diagnostics: Diagnostics::new(),
        };
        let req = resource::ReadRequest {
            state: State::new(schema, current),
            provider_meta,
        };
        resource.read(req, &mut resp).await;
        diagnostics.append(resp.diagnostics);

        let new_state = encode_value(&resp.state.raw, "new state", &mut diagnostics);
        proto::read_resource::Response {
            new_state,
            diagnostics: finish("ReadResource", diagnostics),
        }
    }

    /// Plan a resource change.
    ///
    /// For create and update the proposed state gets attribute defaults
    /// applied. If the result differs from the prior state, computed
    /// attributes left null in the configuration become unknown, and changed
    /// attributes flagged `requires_replace` are reported. The resource's
    /// [`Resource::modify_plan`] runs last, including for destroy.
    pub async fn plan_resource_change(
        &self,
        request: Option<proto::plan_resource_change::Request>,
    ) -> proto::plan_resource_change::Response {
        let Some(request) = request else {
            return Default::default();
        };
        debug!(type_name = %request.type_name, "PlanResourceChange called");
        let mut diagnostics = Diagnostics::new();

        let Some(resource) = self.resource(&request.type_name, &mut diagnostics).await else {
            return proto::plan_resource_change::Response {
                diagnostics: finish("PlanResourceChange", diagnostics),
                ..Default::default()
            };
        };

        let schema = resource.schema();
        let prior = decode_value(request.prior_state.as_ref(), &schema, "prior state", &mut diagnostics);
        let mut planned = decode_value(
            request.proposed_new_state.as_ref(),
            &schema,
            "proposed new state",
            &mut diagnostics,
        );
        let config = decode_value(request.config.as_ref(), &schema, "configuration", &mut diagnostics);
        let provider_meta = self.provider_meta(request.provider_meta.as_ref(), &mut diagnostics);

        if diagnostics.has_error() {
            return proto::plan_resource_change::Response {
                diagnostics: finish("PlanResourceChange", diagnostics),
                ..Default::default()
            };
        }

        let mut requires_replace = Paths::new();
        if !planned.is_null() {
            plan_block(&schema.block, &config, &mut planned, &Path::empty(), PlanPass::Defaults, &mut diagnostics);

            if planned != prior {
                plan_block(
                    &schema.block,
                    &config,
                    &mut planned,
                    &Path::empty(),
                    PlanPass::ComputedUnknown,
                    &mut diagnostics,
                );
                if !prior.is_null() {
                    collect_replacements(&schema.block, &prior, &planned, &Path::empty(), &mut requires_replace);
                }
            }
        }

        let mut resp = resource::ModifyPlanResponse {
            plan: Plan::new(schema.clone(), planned.clone()),
            requires_replace,
            diagnostics: Diagnostics::new(),
        };
        if !diagnostics.has_error() {
            let req = resource::ModifyPlanRequest {
                config: Config::new(schema.clone(), config),
                state: State::new(schema.clone(), prior),
                plan: Plan::new(schema, planned),
                provider_meta,
            };
            resource.modify_plan(req, &mut resp).await;
        }
        diagnostics.append(resp.diagnostics);

        let planned_state = encode_value(&resp.plan.raw, "planned state", &mut diagnostics);
        proto::plan_resource_change::Response {
            planned_state,
            requires_replace: resp.requires_replace.iter().map(proto::AttributePath::from).collect(),
            diagnostics: finish("PlanResourceChange", diagnostics),
        }
    }

    /// Apply a planned change by creating, updating or deleting the resource.
    pub async fn apply_resource_change(
        &self,
        request: Option<proto::apply_resource_change::Request>,
    ) -> proto::apply_resource_change::Response {
        let Some(request) = request else {
            return Default::default();
        };
        debug!(type_name = %request.type_name, "ApplyResourceChange called");
        let mut diagnostics = Diagnostics::new();

        let Some(resource) = self.resource(&request.type_name, &mut diagnostics).await else {
            return proto::apply_resource_change::Response {
                diagnostics: finish("ApplyResourceChange", diagnostics),
                ..Default::default()
            };
        };

        let schema = resource.schema();
        let prior = decode_value(request.prior_state.as_ref(), &schema, "prior state", &mut diagnostics);
        let planned = decode_value(request.planned_state.as_ref(), &schema, "planned state", &mut diagnostics);
        let config = decode_value(request.config.as_ref(), &schema, "configuration", &mut diagnostics);
        let provider_meta = self.provider_meta(request.provider_meta.as_ref(), &mut diagnostics);

        if diagnostics.has_error() {
            return proto::apply_resource_change::Response {
                diagnostics: finish("ApplyResourceChange", diagnostics),
                ..Default::default()
            };
        }

        let new_state = if planned.is_null() && prior.is_null() {
            Value::Null
        } else if planned.is_null() {
            debug!(type_name = %request.type_name, "Deleting resource");
            let mut resp = resource::DeleteResponse {
                state: State::new(schema.clone(), prior.clone()),
                diagnostics: Diagnostics::new(),
            };
            let req = resource::DeleteRequest {
                state: State::new(schema, prior),
                provider_meta,
            };
            resource.delete(req, &mut resp).await;

            let failed = resp.diagnostics.has_error();
            diagnostics.append(resp.diagnostics);
            if failed {
                resp.state.raw
            } else {
                Value::Null
            }
        } else if prior.is_null() {
            debug!(type_name = %request.type_name, "Creating resource");
            let mut resp = resource::CreateResponse {
                state: State::new(schema.clone(), planned.clone()),
                diagnostics: Diagnostics::new(),
            };
            let req = resource::CreateRequest {
                config: Config::new(schema.clone(), config),
                plan: Plan::new(schema, planned),
                provider_meta,
            };
            resource.create(req, &mut resp).await;
            diagnostics.append(resp.diagnostics);

            if !diagnostics.has_error() && resp.state.is_null() {
                diagnostics.add_error(
                    "Missing Resource State After Create",
                    "The resource's create callback returned no state and no error. \
                     This is always a bug in the provider.",
                );
            }
            resp.state.raw
        } else {
            debug!(type_name = %request.type_name, "Updating resource");
            let mut resp = resource::UpdateResponse {
                state: State::new(schema.clone(), planned.clone()),
                diagnostics: Diagnostics::new(),
            };
            let req = resource::UpdateRequest {
                config: Config::new(schema.clone(), config),
                plan: Plan::new(schema.clone(), planned),
                state: State::new(schema, prior),
                provider_meta,
            };
            resource.update(req, &mut resp).await;
            diagnostics.append(resp.diagnostics);

            if !diagnostics.has_error() && resp.state.is_null() {
                diagnostics.add_error(
                    "Missing Resource State After Update",
                    "The resource's update callback returned no state and no error. \
                     This is always a bug in the provider.",
                );
            }
            resp.state.raw
        };

        if !diagnostics.has_error() {
            check_fully_known(&new_state, "apply", &mut diagnostics);
        }

        let new_state = encode_value(&new_state, "new state", &mut diagnostics);
        proto::apply_resource_change::Response {
            new_state,
            diagnostics: finish("ApplyResourceChange", diagnostics),
        }
    }

    /// Import an existing object as a resource.
    pub async fn import_resource_state(
        &self,
        request: Option<proto::import_resource_state::Request>,
    ) -> proto::import_resource_state::Response {
        let Some(request) = request else {
            return Default::default();
        };
        debug!(type_name = %request.type_name, id = %request.id, "ImportResourceState called");
        let mut diagnostics = Diagnostics::new();
        let mut imported_resources = Vec::new();

        if let Some(resource) = self.resource(&request.type_name, &mut diagnostics).await {
            let mut resp = resource::ImportStateResponse {
                state: State::null(resource.schema()),
                diagnostics: Diagnostics::new(),
            };
            let req = resource::ImportStateRequest { id: request.id };
            resource.import_state(req, &mut resp).await;
            diagnostics.append(resp.diagnostics);

            if !diagnostics.has_error() {
                if resp.state.is_null() {
                    diagnostics.add_error(
                        "Missing Resource Import State",
                        "The resource's import callback returned no state and no error. \
                         This is always a bug in the provider.",
                    );
                } else {
                    imported_resources.push(proto::import_resource_state::ImportedResource {
                        type_name: request.type_name,
                        state: encode_value(&resp.state.raw, "imported state", &mut diagnostics),
                    });
                }
            }
        }

        proto::import_resource_state::Response {
            imported_resources,
            diagnostics: finish("ImportResourceState", diagnostics),
        }
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        request: Option<proto::read_data_source::Request>,
    ) -> proto::read_data_source::Response {
        let Some(request) = request else {
            return Default::default();
        };
        debug!(type_name = %request.type_name, "ReadDataSource called");
        let mut diagnostics = Diagnostics::new();

        let Some(data_source) = self.data_source(&request.type_name, &mut diagnostics).await else {
            return proto::read_data_source::Response {
                diagnostics: finish("ReadDataSource", diagnostics),
                ..Default::default()
            };
        };

        let schema = data_source.schema();
        let config = decode_value(request.config.as_ref(), &schema, "configuration", &mut diagnostics);
        let provider_meta = self.provider_meta(request.provider_meta.as_ref(), &mut diagnostics);

        if diagnostics.has_error() {
            return proto::read_data_source::Response {
                diagnostics: finish("ReadDataSource", diagnostics),
                ..Default::default()
            };
        }

        let mut resp = datasource::ReadResponse {
            state: State::new(schema.clone(), config.clone()),
            diagnostics: Diagnostics::new(),
        };
        let req = datasource::ReadRequest {
            config: Config::new(schema, config),
            provider_meta,
        };
        data_source.read(req, &mut resp).await;
        diagnostics.append(resp.diagnostics);

        if !diagnostics.has_error() {
            check_fully_known(&resp.state.raw, "read", &mut diagnostics);
        }

        let state = encode_value(&resp.state.raw, "state", &mut diagnostics);
        proto::read_data_source::Response {
            state,
            diagnostics: finish("ReadDataSource", diagnostics),
        }
    }

    /// Stop the provider.
    pub async fn stop_provider(&self) -> proto::stop_provider::Response {
        debug!("StopProvider called");
        match self.provider.stop().await {
            Ok(()) => {
                info!("StopProvider completed");
                proto::stop_provider::Response::default()
            }
            Err(e) => {
                warn!(error = %e, "Provider stop returned an error");
                proto::stop_provider::Response {
                    error: e.to_string(),
                }
            }
        }
    }
}

async fn upgrade_state(
    resource: &dyn Resource,
    schema: &Schema,
    version: i64,
    raw_json: &[u8],
    diagnostics: &mut Diagnostics,
) -> Option<Value> {
    let json: serde_json::Value = match serde_json::from_slice(raw_json) {
        Ok(json) => json,
        Err(err) => {
            diagnostics.add_error(
                "Unable to Read Previously Saved State for UpgradeResourceState",
                format!("There was an error reading the saved resource state as JSON.\n\n{}", err),
            );
            return None;
        }
    };

    let Ok(version) = u64::try_from(version) else {
        diagnostics.add_error(
            "Invalid Schema Version",
            format!("The stored state has a negative schema version ({}).", version),
        );
        return None;
    };

    if version == schema.version {
        return match Value::from_json_ignoring_undefined(&schema.value_type(), &json) {
            Ok(value) => Some(value),
            Err(err) => {
                diagnostics.add_error(
                    "Unable to Read Previously Saved State for UpgradeResourceState",
                    format!("The saved state does not match the current schema.\n\n{}", err),
                );
                None
            }
        };
    }

    let mut resp = resource::UpgradeStateResponse {
        state: State::null(schema.clone()),
        diagnostics: Diagnostics::new(),
    };
    let req = resource::UpgradeStateRequest {
        version,
        raw_state: json,
    };
    resource.upgrade_state(req, &mut resp).await;

    let failed = resp.diagnostics.has_error();
    diagnostics.append(resp.diagnostics);
    if failed {
        return None;
    }
    if resp.state.is_null() {
        diagnostics.add_error(
            "Missing Upgraded Resource State",
            format!(
                "The resource's upgrade callback returned no state for version {}. \
                 This is always a bug in the provider.",
                version
            ),
        );
        return None;
    }
    Some(resp.state.raw)
}

fn decode_value(
    dynamic_value: Option<&proto::DynamicValue>,
    schema: &Schema,
    what: &str,
    diagnostics: &mut Diagnostics,
) -> Value {
    let Some(dynamic_value) = dynamic_value else {
        return Value::Null;
    };
    match decode_dynamic_value(dynamic_value, &schema.value_type()) {
        Ok(value) => value,
        Err(err) => {
            diagnostics.add_error(
                format!("Unable to Convert {}", what),
                format!(
                    "An unexpected error was encountered when converting the {} from the protocol type. \
                     This is always an issue in the provider or the host and should be reported.\n\n{}",
                    what, err
                ),
            );
            Value::Null
        }
    }
}

fn encode_value(
    value: &Value,
    what: &str,
    diagnostics: &mut Diagnostics,
) -> Option<proto::DynamicValue> {
    match encode_dynamic_value(value) {
        Ok(encoded) => Some(encoded),
        Err(err) => {
            diagnostics.add_error(
                format!("Unable to Convert {}", what),
                format!("An unexpected error was encountered when encoding the {}.\n\n{}", what, err),
            );
            None
        }
    }
}

fn check_fully_known(value: &Value, operation: &str, diagnostics: &mut Diagnostics) {
    for path in value.unknown_paths() {
        diagnostics.add_attribute_error(
            path.clone(),
            format!("Provider Returned Invalid Result Object After {}", operation),
            format!(
                "After the {} operation, the provider still indicated an unknown value for {}. \
                 All values must be known after {}, so this is always a bug in the provider.",
                operation, path, operation
            ),
        );
    }
}

fn finish(rpc: &'static str, diagnostics: Diagnostics) -> Vec<proto::Diagnostic> {
    if diagnostics.has_error() {
        warn!(
            rpc,
            errors = diagnostics.error_count(),
            warnings = diagnostics.warning_count(),
            "Call completed with errors"
        );
    } else {
        debug!(rpc, warnings = diagnostics.warning_count(), "Call completed");
    }
    diagnostics.into_proto()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PlanPass {
    Defaults,
    ComputedUnknown,
}

/// Fill attributes left null in the configuration, with their default or,
/// for computed attributes, with an unknown value.
fn plan_block(
    block: &Block,
    config: &Value,
    planned: &mut Value,
    path: &Path,
    pass: PlanPass,
    diagnostics: &mut Diagnostics,
) {
    let Value::Object(attrs) = planned else {
        return;
    };

    for (name, attr) in &block.attributes {
        if !config.attribute(name).is_null() {
            continue;
        }
        match (&attr.default, pass) {
            (Some(default), PlanPass::Defaults) => match Value::from_json(&attr.attr_type, default) {
                Ok(value) => {
                    attrs.insert(name.clone(), value);
                }
                Err(err) => diagnostics.add_attribute_error(
                    path.with_step(PathStep::AttributeName(name.clone())),
                    "Invalid Attribute Default",
                    format!("The default value does not match the attribute type. This is always a bug in the provider.\n\n{}", err),
                ),
            },
            (None, PlanPass::ComputedUnknown) if attr.flags.computed => {
                attrs.insert(name.clone(), Value::Unknown);
            }
            _ => {}
        }
    }

    for (name, nested) in &block.blocks {
        let Some(planned_value) = attrs.get_mut(name) else {
            continue;
        };
        let config_value = config.attribute(name);
        let block_path = path.with_step(PathStep::AttributeName(name.clone()));

        match (nested.nesting_mode, planned_value) {
            (BlockNestingMode::Single, planned_value) => plan_block(
                &nested.block,
                config_value,
                planned_value,
                &block_path,
                pass,
                diagnostics,
            ),
            (_, Value::List(items)) | (_, Value::Set(items)) => {
                for (i, item) in items.iter_mut().enumerate() {
                    let config_item = match config_value {
                        Value::List(c) | Value::Set(c) => c.get(i).unwrap_or(NULL),
                        _ => NULL,
                    };
                    let item_path = block_path.with_step(PathStep::ElementKeyInt(i as i64));
                    plan_block(&nested.block, config_item, item, &item_path, pass, diagnostics);
                }
            }
            (_, Value::Map(entries)) => {
                for (key, item) in entries.iter_mut() {
                    let config_item = match config_value {
                        Value::Map(c) => c.get(key).unwrap_or(NULL),
                        _ => NULL,
                    };
                    let item_path = block_path.with_step(PathStep::ElementKeyString(key.clone()));
                    plan_block(&nested.block, config_item, item, &item_path, pass, diagnostics);
                }
            }
            _ => {}
        }
    }
}

/// Collect attributes flagged `requires_replace` whose planned value differs
/// from the prior state.
fn collect_replacements(block: &Block, prior: &Value, planned: &Value, path: &Path, out: &mut Paths) {
    for (name, attr) in &block.attributes {
        if attr.requires_replace && prior.attribute(name) != planned.attribute(name) {
            out.append(path.with_step(PathStep::AttributeName(name.clone())));
        }
    }

    for (name, nested) in &block.blocks {
        let block_path = path.with_step(PathStep::AttributeName(name.clone()));
        let prior_value = prior.attribute(name);
        let planned_value = planned.attribute(name);

        match (nested.nesting_mode, prior_value, planned_value) {
            (BlockNestingMode::Single, _, _) => {
                collect_replacements(&nested.block, prior_value, planned_value, &block_path, out)
            }
            (_, Value::Set(before), Value::Set(after)) => {
                // Unchanged elements match by value; the rest pair up in order.
                let removed = before.iter().filter(|b| !after.contains(*b));
                let added = after.iter().enumerate().filter(|(_, a)| !before.contains(*a));
                for ((i, a), b) in added.zip(removed) {
                    let item_path = block_path.with_step(PathStep::ElementKeyInt(i as i64));
                    collect_replacements(&nested.block, b, a, &item_path, out);
                }
            }
            (_, Value::List(before), Value::List(after)) => {
                for (i, (b, a)) in before.iter().zip(after).enumerate() {
                    let item_path = block_path.with_step(PathStep::ElementKeyInt(i as i64));
                    collect_replacements(&nested.block, b, a, &item_path, out);
                }
            }
            (_, Value::Map(before), Value::Map(after)) => {
                for (key, a) in after {
                    if let Some(b) = before.get(key) {
                        let item_path = block_path.with_step(PathStep::ElementKeyString(key.clone()));
                        collect_replacements(&nested.block, b, a, &item_path, out);
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::{Diagnostic, Severity};
    use crate::provider::MetadataResponse;
    use crate::resource::{
        CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ModifyPlanRequest,
        ModifyPlanResponse, ReadRequest, ReadResponse, UpdateRequest, UpdateResponse,
    };
    use crate::schema::{Attribute, AttributeFlags, AttributeType, NestedBlock};
    use crate::types::{Int64Value, StringValue};
    use crate::value::UNKNOWN_VALUE;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct TestProvider {
        schema: Schema,
        schema_diagnostics: Diagnostics,
        configure_diagnostics: Diagnostics,
        seen: Arc<Mutex<Vec<ConfigureRequest>>>,
    }

    #[async_trait::async_trait]
    impl Provider for TestProvider {
        fn metadata(&self) -> MetadataResponse {
            MetadataResponse::new("test", "0.1.0")
        }

        async fn schema(&self, resp: &mut SchemaResponse) {
            resp.schema = self.schema.clone();
            resp.diagnostics = self.schema_diagnostics.clone();
        }

        async fn configure(&self, req: ConfigureRequest, resp: &mut ConfigureResponse) {
            self.seen.lock().unwrap().push(req);
            resp.diagnostics = self.configure_diagnostics.clone();
            resp.provider_data = Some(Arc::new("test-client".to_string()));
        }

        fn resources(&self) -> Vec<resource::ResourceFactory> {
            vec![
                resource::factory(TestResource::default),
                resource::factory(|| ZonedResource),
            ]
        }

        fn data_sources(&self) -> Vec<datasource::DataSourceFactory> {
            vec![datasource::factory(|| LookupDataSource)]
        }
    }

    #[derive(Default)]
    struct TestResource {
        client: Option<String>,
    }

    #[async_trait::async_trait]
    impl Resource for TestResource {
        fn type_name(&self, provider_type_name: &str) -> String {
            format!("{}_thing", provider_type_name)
        }

        fn schema(&self) -> Schema {
            Schema::v0()
                .with_attribute("id", Attribute::computed_string())
                .with_attribute("name", Attribute::required_string().with_requires_replace())
                .with_attribute("size", Attribute::optional_int64())
                .with_attribute(
                    "mode",
                    Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                        .with_default(json!("standard")),
                )
                .with_attribute("client", Attribute::computed_string())
                .with_block(
                    "disk",
                    NestedBlock::list(
                        Block::new()
                            .with_attribute("label", Attribute::required_string())
                            .with_attribute("device", Attribute::computed_string()),
                    ),
                )
        }

        fn configure(&mut self, req: resource::ConfigureRequest, _resp: &mut resource::ConfigureResponse) {
            self.client = req
                .provider_data
                .and_then(|data| data.downcast_ref::<String>().cloned());
        }

        async fn modify_plan(&self, req: ModifyPlanRequest, resp: &mut ModifyPlanResponse) {
            if req.plan.is_null() {
                return;
            }
            if let Ok(Int64Value::Known(size)) = req.plan.get_attribute::<Int64Value>(&Path::root("size")) {
                if size == 42 {
                    resp.requires_replace.append(Path::root("size"));
                }
                if size > 100 {
                    resp.diagnostics.add_attribute_error(
                        Path::root("size"),
                        "Size Too Large",
                        "size must be at most 100",
                    );
                }
            }
        }

        async fn create(&self, req: CreateRequest, resp: &mut CreateResponse) {
            let name: String = match req.plan.get_attribute(&Path::root("name")) {
                Ok(name) => name,
                Err(diags) => {
                    resp.diagnostics.append(diags);
                    return;
                }
            };
            resp.diagnostics
                .append(resp.state.set_attribute(&Path::root("id"), format!("r-{}", name)));
            resp.diagnostics
                .append(resp.state.set_attribute(&Path::root("client"), self.client.clone()));
            resp.diagnostics.append(resp.state.set_attribute(
                &Path::root("disk"),
                Value::List(Vec::new()),
            ));
        }

        async fn read(&self, req: ReadRequest, resp: &mut ReadResponse) {
            let name: StringValue = req.state.get_attribute(&Path::root("name")).unwrap_or_default();
            if name.is_null() {
                resp.diagnostics.add_warning("Read Without Name", "");
            }
            if name.value_string() == "gone" {
                resp.state.remove_resource();
            }
        }

        async fn update(&self, req: UpdateRequest, resp: &mut UpdateResponse) {
            let id: StringValue = req.state.get_attribute(&Path::root("id")).unwrap_or_default();
            resp.diagnostics
                .append(resp.state.set_attribute(&Path::root("id"), id));
            resp.diagnostics
                .append(resp.state.set_attribute(&Path::root("client"), self.client.clone()));
        }

        async fn delete(&self, req: DeleteRequest, resp: &mut DeleteResponse) {
            let name: StringValue = req.state.get_attribute(&Path::root("name")).unwrap_or_default();
            if name.value_string() == "stuck" {
                resp.diagnostics.add_error("Delete Failed", "the thing is stuck");
            }
        }
    }

    struct ZonedResource;

    #[async_trait::async_trait]
    impl Resource for ZonedResource {
        fn type_name(&self, provider_type_name: &str) -> String {
            format!("{}_zoned", provider_type_name)
        }

        fn schema(&self) -> Schema {
            Schema::v0()
                .with_attribute("id", Attribute::computed_string())
                .with_attribute(
                    "zones",
                    Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::optional())
                        .with_requires_replace(),
                )
                .with_block(
                    "rule",
                    NestedBlock::set(
                        Block::new()
                            .with_attribute("port", Attribute::required_int64().with_requires_replace())
                            .with_attribute("note", Attribute::optional_string()),
                    ),
                )
        }

        async fn create(&self, _req: CreateRequest, _resp: &mut CreateResponse) {}

        async fn read(&self, _req: ReadRequest, _resp: &mut ReadResponse) {}

        async fn update(&self, _req: UpdateRequest, _resp: &mut UpdateResponse) {}

        async fn delete(&self, _req: DeleteRequest, _resp: &mut DeleteResponse) {}
    }

    struct LookupDataSource;

    #[async_trait::async_trait]
    impl DataSource for LookupDataSource {
        fn type_name(&self, provider_type_name: &str) -> String {
            format!("{}_lookup", provider_type_name)
        }

        fn schema(&self) -> Schema {
            Schema::v0()
                .with_attribute("key", Attribute::required_string())
                .with_attribute("value", Attribute::computed_string())
        }

        async fn read(&self, req: datasource::ReadRequest, resp: &mut datasource::ReadResponse) {
            let key: StringValue = req.config.get_attribute(&Path::root("key")).unwrap_or_default();
            let value = if key.value_string() == "later" {
                Value::Unknown
            } else {
                Value::from(format!("value-of-{}", key.value_string()))
            };
            resp.diagnostics
                .append(resp.state.set_attribute(&Path::root("value"), value));
        }
    }

    fn dynamic(json: serde_json::Value) -> Option<proto::DynamicValue> {
        Some(proto::DynamicValue {
            msgpack: Vec::new(),
            json: serde_json::to_vec(&json).unwrap(),
        })
    }

    fn json_of(value: &Option<proto::DynamicValue>) -> serde_json::Value {
        serde_json::from_slice(&value.as_ref().unwrap().json).unwrap()
    }

    fn configure_request(config: Option<proto::DynamicValue>) -> proto::configure_provider::Request {
        proto::configure_provider::Request {
            terraform_version: String::new(),
            config,
        }
    }

    #[tokio::test]
    async fn test_configure_missing_request() {
        let server = Server::new(TestProvider::default());
        let resp = server.configure_provider(None).await;

        assert_eq!(resp, proto::configure_provider::Response::default());
        assert!(server.provider().seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_configure_without_schema() {
        let server = Server::new(TestProvider::default());
        let resp = server.configure_provider(Some(configure_request(None))).await;

        assert!(resp.diagnostics.is_empty());
        let seen = server.provider().seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].config.is_null());
        assert!(seen[0].config.schema.is_empty());
    }

    #[tokio::test]
    async fn test_configure_without_schema_ignores_config() {
        let server = Server::new(TestProvider::default());
        let resp = server
            .configure_provider(Some(configure_request(dynamic(json!({"anything": 1})))))
            .await;

        assert!(resp.diagnostics.is_empty());
        assert!(server.provider().seen.lock().unwrap()[0].config.is_null());
    }

    #[tokio::test]
    async fn test_configure_request_config() {
        let provider = TestProvider {
            schema: Schema::v0().with_attribute("test", Attribute::required_string()),
            ..Default::default()
        };
        let server = Server::new(provider);
        let resp = server
            .configure_provider(Some(configure_request(dynamic(json!({"test": "test-value"})))))
            .await;

        assert!(resp.diagnostics.is_empty());
        let seen = server.provider().seen.lock().unwrap();
        let value: StringValue = seen[0].config.get_attribute(&Path::root("test")).unwrap();
        assert_eq!(value.value_string(), "test-value");
    }

    #[tokio::test]
    async fn test_configure_terraform_version() {
        let server = Server::new(TestProvider::default());
        let request = proto::configure_provider::Request {
            terraform_version: "1.0.0".to_string(),
            config: None,
        };
        server.configure_provider(Some(request)).await;

        assert_eq!(server.provider().seen.lock().unwrap()[0].terraform_version, "1.0.0");
    }

    #[tokio::test]
    async fn test_configure_response_diagnostics() {
        let provider = TestProvider {
            configure_diagnostics: vec![
                Diagnostic::warning("warning summary", "warning detail"),
                Diagnostic::error("error summary", "error detail"),
            ]
            .into(),
            ..Default::default()
        };
        let server = Server::new(provider);
        let resp = server.configure_provider(Some(configure_request(None))).await;

        let diags: Diagnostics = resp.diagnostics.into_iter().map(Diagnostic::from).collect();
        assert_eq!(
            diags,
            Diagnostics::from(vec![
                Diagnostic::warning("warning summary", "warning detail"),
                Diagnostic::error("error summary", "error detail"),
            ])
        );
    }

    #[tokio::test]
    async fn test_configure_stops_on_schema_error() {
        let provider = TestProvider {
            schema: Schema::v0().with_attribute("test", Attribute::required_string()),
            schema_diagnostics: Diagnostic::error("bad schema", "").into(),
            ..Default::default()
        };
        let server = Server::new(provider);
        let resp = server
            .configure_provider(Some(configure_request(dynamic(json!({"test": "x"})))))
            .await;

        assert_eq!(resp.diagnostics.len(), 1);
        assert_eq!(resp.diagnostics[0].summary, "bad schema");
        assert!(server.provider().seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_configure_keeps_schema_warnings() {
        let provider = TestProvider {
            schema_diagnostics: Diagnostic::warning("schema warning", "").into(),
            configure_diagnostics: Diagnostic::warning("configure warning", "").into(),
            ..Default::default()
        };
        let server = Server::new(provider);
        let resp = server.configure_provider(Some(configure_request(None))).await;

        let summaries: Vec<_> = resp.diagnostics.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, vec!["schema warning", "configure warning"]);
    }

    #[tokio::test]
    async fn test_configure_stops_on_decode_error() {
        let provider = TestProvider {
            schema: Schema::v0().with_attribute("test", Attribute::required_string()),
            ..Default::default()
        };
        let server = Server::new(provider);
        let resp = server
            .configure_provider(Some(configure_request(dynamic(json!({"test": 42})))))
            .await;

        assert_eq!(resp.diagnostics.len(), 1);
        assert_eq!(
            resp.diagnostics[0].severity,
            proto::diagnostic::Severity::Error as i32
        );
        assert!(server.provider().seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_configure_concurrently() {
        let server = Arc::new(Server::new(TestProvider::default()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let server = Arc::clone(&server);
                tokio::spawn(async move {
                    let request = proto::configure_provider::Request {
                        terraform_version: format!("1.{}.0", i),
                        config: None,
                    };
                    server.configure_provider(Some(request)).await
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().diagnostics.is_empty());
        }
        assert_eq!(server.provider().seen.lock().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_get_provider_schema() {
        let server = Server::new(TestProvider::default());
        let resp = server.get_provider_schema().await;

        assert!(resp.diagnostics.is_empty());
        assert!(resp.provider.is_some());
        assert_eq!(resp.resource_schemas.len(), 2);
        assert!(resp.resource_schemas.contains_key("test_thing"));
        assert!(resp.resource_schemas.contains_key("test_zoned"));
        assert_eq!(resp.data_source_schemas.len(), 1);
        assert!(resp.data_source_schemas.contains_key("test_lookup"));
        assert_eq!(resp.server_capabilities.map(|c| c.plan_destroy), Some(true));
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let server = Server::new(TestProvider::default());
        let resp = server
            .read_resource(Some(proto::read_resource::Request {
                type_name: "test_missing".to_string(),
                current_state: dynamic(json!({"id": "x"})),
                provider_meta: None,
            }))
            .await;

        assert_eq!(resp.diagnostics.len(), 1);
        assert_eq!(resp.diagnostics[0].summary, "Resource Type Not Found");
        assert_eq!(json_of(&resp.new_state), json!({"id": "x"}));
    }

    #[tokio::test]
    async fn test_validate_resource_config() {
        let server = Server::new(TestProvider::default());
        let resp = server
            .validate_resource_config(Some(proto::validate_resource_config::Request {
                type_name: "test_thing".to_string(),
                config: dynamic(json!({"id": "not-allowed"})),
            }))
            .await;

        let summaries: Vec<_> = resp.diagnostics.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(
            summaries,
            vec![
                "Invalid Configuration for Read-Only Attribute",
                "Missing Configuration for Required Attribute",
            ]
        );
    }

    #[tokio::test]
    async fn test_plan_create() {
        let server = Server::new(TestProvider::default());
        let resp = server
            .plan_resource_change(Some(proto::plan_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: dynamic(json!(null)),
                proposed_new_state: dynamic(json!({"name": "a", "disk": [{"label": "root"}]})),
                config: dynamic(json!({"name": "a", "disk": [{"label": "root"}]})),
                provider_meta: None,
            }))
            .await;

        assert!(resp.diagnostics.is_empty());
        assert!(resp.requires_replace.is_empty());

        let planned = json_of(&resp.planned_state);
        assert_eq!(planned["id"], json!(UNKNOWN_VALUE));
        assert_eq!(planned["client"], json!(UNKNOWN_VALUE));
        assert_eq!(planned["mode"], json!("standard"));
        assert_eq!(planned["size"], json!(null));
        assert_eq!(planned["disk"][0]["device"], json!(UNKNOWN_VALUE));
    }

    #[tokio::test]
    async fn test_plan_no_changes() {
        let server = Server::new(TestProvider::default());
        let prior = json!({"id": "r-a", "name": "a", "mode": "standard", "client": "c", "disk": []});
        let resp = server
            .plan_resource_change(Some(proto::plan_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: dynamic(prior.clone()),
                proposed_new_state: dynamic(prior.clone()),
                config: dynamic(json!({"name": "a", "disk": []})),
                provider_meta: None,
            }))
            .await;

        assert!(resp.diagnostics.is_empty());
        assert!(resp.requires_replace.is_empty());
        assert_eq!(json_of(&resp.planned_state)["id"], json!("r-a"));
    }

    #[tokio::test]
    async fn test_plan_requires_replace() {
        let server = Server::new(TestProvider::default());
        let prior = json!({"id": "r-a", "name": "a", "mode": "standard", "client": "c", "disk": []});
        let proposed = json!({"id": "r-a", "name": "b", "mode": "standard", "client": "c", "disk": []});
        let resp = server
            .plan_resource_change(Some(proto::plan_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: dynamic(prior),
                proposed_new_state: dynamic(proposed),
                config: dynamic(json!({"name": "b", "disk": []})),
                provider_meta: None,
            }))
            .await;

        let replaced: Vec<Path> = resp.requires_replace.into_iter().map(Path::from).collect();
        assert_eq!(replaced, vec![Path::root("name")]);
        assert_eq!(json_of(&resp.planned_state)["id"], json!(UNKNOWN_VALUE));
    }

    #[tokio::test]
    async fn test_plan_modify_plan_diagnostics() {
        let server = Server::new(TestProvider::default());
        let resp = server
            .plan_resource_change(Some(proto::plan_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: dynamic(json!(null)),
                proposed_new_state: dynamic(json!({"name": "a", "size": 500})),
                config: dynamic(json!({"name": "a", "size": 500})),
                provider_meta: None,
            }))
            .await;

        assert_eq!(resp.diagnostics.len(), 1);
        assert_eq!(resp.diagnostics[0].summary, "Size Too Large");
        let attribute = resp.diagnostics[0].attribute.clone().map(Path::from);
        assert_eq!(attribute, Some(Path::root("size")));
    }

    fn zoned_plan(prior: serde_json::Value, proposed: serde_json::Value) -> proto::plan_resource_change::Request {
        let mut config = proposed.clone();
        if let Some(object) = config.as_object_mut() {
            object.remove("id");
        }
        proto::plan_resource_change::Request {
            type_name: "test_zoned".to_string(),
            prior_state: dynamic(prior),
            proposed_new_state: dynamic(proposed),
            config: dynamic(config),
            provider_meta: None,
        }
    }

    #[tokio::test]
    async fn test_plan_reordered_sets_are_unchanged() {
        let server = Server::new(TestProvider::default());
        let resp = server
            .plan_resource_change(Some(zoned_plan(
                json!({"id": "x", "zones": ["a", "b"], "rule": [{"port": 1}, {"port": 2}]}),
                json!({"id": "x", "zones": ["b", "a"], "rule": [{"port": 2}, {"port": 1}]}),
            )))
            .await;

        assert!(resp.diagnostics.is_empty());
        assert!(resp.requires_replace.is_empty());
        assert_eq!(json_of(&resp.planned_state)["id"], json!("x"));
    }

    #[tokio::test]
    async fn test_plan_changed_set_element_requires_replace() {
        let server = Server::new(TestProvider::default());
        let resp = server
            .plan_resource_change(Some(zoned_plan(
                json!({"id": "x", "zones": ["a"], "rule": [{"port": 1}, {"port": 2}]}),
                json!({"id": "x", "zones": ["a"], "rule": [{"port": 2}, {"port": 3}]}),
            )))
            .await;

        let replaced: Vec<Path> = resp.requires_replace.into_iter().map(Path::from).collect();
        assert_eq!(replaced, vec![Path::root("rule").at_list_index(1).at_name("port")]);
        assert_eq!(json_of(&resp.planned_state)["id"], json!(UNKNOWN_VALUE));
    }

    #[tokio::test]
    async fn test_plan_modify_plan_requires_replace_appended() {
        let server = Server::new(TestProvider::default());
        let prior = json!({"id": "r-a", "name": "a", "mode": "standard", "client": "c", "size": 1, "disk": []});
        let proposed = json!({"id": "r-a", "name": "b", "mode": "standard", "client": "c", "size": 42, "disk": []});
        let resp = server
            .plan_resource_change(Some(proto::plan_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: dynamic(prior),
                proposed_new_state: dynamic(proposed),
                config: dynamic(json!({"name": "b", "size": 42, "disk": []})),
                provider_meta: None,
            }))
            .await;

        assert!(resp.diagnostics.is_empty());
        let replaced: Vec<Path> = resp.requires_replace.into_iter().map(Path::from).collect();
        assert_eq!(replaced, vec![Path::root("name"), Path::root("size")]);
    }

    #[tokio::test]
    async fn test_plan_destroy() {
        let server = Server::new(TestProvider::default());
        let resp = server
            .plan_resource_change(Some(proto::plan_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: dynamic(json!({"id": "r-a", "name": "a"})),
                proposed_new_state: dynamic(json!(null)),
                config: dynamic(json!(null)),
                provider_meta: None,
            }))
            .await;

        assert!(resp.diagnostics.is_empty());
        assert_eq!(json_of(&resp.planned_state), json!(null));
    }

    #[tokio::test]
    async fn test_apply_create_uses_provider_data() {
        let server = Server::new(TestProvider::default());
        server.configure_provider(Some(configure_request(None))).await;

        let resp = server
            .apply_resource_change(Some(proto::apply_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: dynamic(json!(null)),
                planned_state: dynamic(json!({
                    "id": UNKNOWN_VALUE,
                    "name": "a",
                    "mode": "standard",
                    "client": UNKNOWN_VALUE,
                })),
                config: dynamic(json!({"name": "a"})),
                provider_meta: None,
            }))
            .await;

        assert!(resp.diagnostics.is_empty(), "{:?}", resp.diagnostics);
        let state = json_of(&resp.new_state);
        assert_eq!(state["id"], json!("r-a"));
        assert_eq!(state["client"], json!("test-client"));
    }

    #[tokio::test]
    async fn test_apply_rejects_unknown_after_apply() {
        let server = Server::new(TestProvider::default());
        let resp = server
            .apply_resource_change(Some(proto::apply_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: dynamic(json!({"id": "r-a", "name": "a", "mode": "standard"})),
                planned_state: dynamic(json!({
                    "id": UNKNOWN_VALUE,
                    "name": "a",
                    "mode": "fast",
                    "disk": [{"label": "x", "device": UNKNOWN_VALUE}],
                })),
                config: dynamic(json!({"name": "a", "mode": "fast"})),
                provider_meta: None,
            }))
            .await;

        assert_eq!(resp.diagnostics.len(), 1);
        let attribute = resp.diagnostics[0].attribute.clone().map(Path::from);
        assert_eq!(
            attribute,
            Some(Path::root("disk").at_list_index(0).at_name("device"))
        );
    }

    #[tokio::test]
    async fn test_apply_delete() {
        let server = Server::new(TestProvider::default());

        let resp = server
            .apply_resource_change(Some(proto::apply_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: dynamic(json!({"id": "r-a", "name": "a"})),
                planned_state: dynamic(json!(null)),
                config: dynamic(json!(null)),
                provider_meta: None,
            }))
            .await;
        assert!(resp.diagnostics.is_empty());
        assert_eq!(json_of(&resp.new_state), json!(null));

        let resp = server
            .apply_resource_change(Some(proto::apply_resource_change::Request {
                type_name: "test_thing".to_string(),
                prior_state: dynamic(json!({"id": "r-s", "name": "stuck"})),
                planned_state: dynamic(json!(null)),
                config: dynamic(json!(null)),
                provider_meta: None,
            }))
            .await;
        assert_eq!(resp.diagnostics[0].summary, "Delete Failed");
        assert_eq!(json_of(&resp.new_state)["id"], json!("r-s"));
    }

    #[tokio::test]
    async fn test_read_removes_missing_resource() {
        let server = Server::new(TestProvider::default());
        let resp = server
            .read_resource(Some(proto::read_resource::Request {
                type_name: "test_thing".to_string(),
                current_state: dynamic(json!({"id": "r-g", "name": "gone"})),
                provider_meta: None,
            }))
            .await;

        assert!(resp.diagnostics.is_empty());
        assert_eq!(json_of(&resp.new_state), json!(null));
    }

    #[tokio::test]
    async fn test_read_null_state_skips_read() {
        let server = Server::new(TestProvider::default());
        let resp = server
            .read_resource(Some(proto::read_resource::Request {
                type_name: "test_thing".to_string(),
                current_state: dynamic(json!(null)),
                provider_meta: None,
            }))
            .await;

        assert!(resp.diagnostics.is_empty());
        assert_eq!(json_of(&resp.new_state), json!(null));
    }

    #[tokio::test]
    async fn test_read_data_source() {
        let server = Server::new(TestProvider::default());
        let resp = server
            .read_data_source(Some(proto::read_data_source::Request {
                type_name: "test_lookup".to_string(),
                config: dynamic(json!({"key": "now"})),
                provider_meta: None,
            }))
            .await;

        assert!(resp.diagnostics.is_empty());
        assert_eq!(
            json_of(&resp.state),
            json!({"key": "now", "value": "value-of-now"})
        );
    }

    #[tokio::test]
    async fn test_read_data_source_rejects_unknown_result() {
        let server = Server::new(TestProvider::default());
        let resp = server
            .read_data_source(Some(proto::read_data_source::Request {
                type_name: "test_lookup".to_string(),
                config: dynamic(json!({"key": "later"})),
                provider_meta: None,
            }))
            .await;

        assert_eq!(resp.diagnostics.len(), 1);
        assert_eq!(
            resp.diagnostics[0].summary,
            "Provider Returned Invalid Result Object After read"
        );
        let attribute = resp.diagnostics[0].attribute.clone().map(Path::from);
        assert_eq!(attribute, Some(Path::root("value")));
    }

    #[tokio::test]
    async fn test_import_not_implemented() {
        let server = Server::new(TestProvider::default());
        let resp = server
            .import_resource_state(Some(proto::import_resource_state::Request {
                type_name: "test_thing".to_string(),
                id: "r-1".to_string(),
            }))
            .await;

        assert!(resp.imported_resources.is_empty());
        assert_eq!(resp.diagnostics[0].summary, "Resource Import Not Implemented");
    }

    #[tokio::test]
    async fn test_upgrade_current_version_drops_removed_attributes() {
        let server = Server::new(TestProvider::default());
        let resp = server
            .upgrade_resource_state(Some(proto::upgrade_resource_state::Request {
                type_name: "test_thing".to_string(),
                version: 0,
                raw_state: Some(proto::RawState {
                    json: br#"{"id":"r-a","name":"a","legacy":true}"#.to_vec(),
                }),
            }))
            .await;

        assert!(resp.diagnostics.is_empty());
        let state = json_of(&resp.upgraded_state);
        assert_eq!(state["id"], json!("r-a"));
        assert!(state.get("legacy").is_none());
    }

    #[tokio::test]
    async fn test_upgrade_other_version_not_implemented() {
        let server = Server::new(TestProvider::default());
        let resp = server
            .upgrade_resource_state(Some(proto::upgrade_resource_state::Request {
                type_name: "test_thing".to_string(),
                version: 1,
                raw_state: Some(proto::RawState {
                    json: br#"{"id":"r-a"}"#.to_vec(),
                }),
            }))
            .await;

        assert!(resp.upgraded_state.is_none());
        assert_eq!(resp.diagnostics[0].summary, "Unable to Upgrade Resource State");
    }

    #[tokio::test]
    async fn test_upgrade_negative_version() {
        let server = Server::new(TestProvider::default());
        let resp = server
            .upgrade_resource_state(Some(proto::upgrade_resource_state::Request {
                type_name: "test_thing".to_string(),
                version: -1,
                raw_state: Some(proto::RawState {
                    json: br#"{"id":"r-a"}"#.to_vec(),
                }),
            }))
            .await;

        assert!(resp.upgraded_state.is_none());
        assert_eq!(resp.diagnostics.len(), 1);
        assert_eq!(resp.diagnostics[0].summary, "Invalid Schema Version");
    }

    #[tokio::test]
    async fn test_stop_provider() {
        let server = Server::new(TestProvider::default());
        let resp = server.stop_provider().await;
        assert!(resp.error.is_empty());
    }

    #[test]
    fn test_finish_preserves_severity() {
        let diags: Diagnostics = vec![
            Diagnostic::warning("w", ""),
            Diagnostic::error("e", ""),
        ]
        .into();
        let wire = finish("Test", diags);
        let severities: Vec<Severity> = wire
            .into_iter()
            .map(|d| Diagnostic::from(d).severity)
            .collect();
        assert_eq!(severities, vec![Severity::Warning, Severity::Error]);
    }
}
