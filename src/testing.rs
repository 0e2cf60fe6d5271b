//! Testing utilities for provider implementations.
//!
//! [`ProviderTester`] drives a [`Provider`] through the same adapter the gRPC
//! server uses, without spinning up a server. Values go in and come out as
//! JSON; unknown values appear as [`UNKNOWN_VALUE`](crate::value::UNKNOWN_VALUE).
//!
//! # Example
//!
//! ```ignore
//! use tfplug_framework::testing::ProviderTester;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_resource() {
//!     let tester = ProviderTester::new(MyProvider::default());
//!
//!     tester.configure(json!({"api_key": "test"})).await.unwrap();
//!
//!     let state = tester
//!         .lifecycle_create("example_thing", json!({"name": "test-resource"}))
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(state["name"], "test-resource");
//! }
//! ```

use std::collections::BTreeMap;

use serde_json::Value as Json;

use crate::diag::{Diagnostic, Diagnostics};
use crate::error::ProviderError;
use crate::path::Path;
use crate::proto;
use crate::provider::Provider;
use crate::schema::{AttributeType, Block, BlockNestingMode, Schema};
use crate::server::Server;
use crate::value::{encode_dynamic_value, Value, ValueError};

/// A test harness for provider implementations.
pub struct ProviderTester<P: Provider> {
    server: Server<P>,
}

/// The outcome of a successful plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChange {
    /// The planned state, `null` for destroy.
    pub planned_state: Json,
    /// Attributes whose change forces replacement.
    pub requires_replace: Vec<Path>,
    /// Warnings returned with the plan.
    pub diagnostics: Diagnostics,
}

impl PlannedChange {
    /// Whether the plan destroys the resource.
    pub fn is_destroy(&self) -> bool {
        self.planned_state.is_null()
    }

    /// Whether the plan replaces the resource.
    pub fn requires_replacement(&self) -> bool {
        !self.requires_replace.is_empty()
    }

    /// Whether the value at `path` is unknown in the plan.
    pub fn is_unknown(&self, path: &Path) -> bool {
        Value::from_json(&AttributeType::Dynamic, &self.planned_state)
            .and_then(|value| value.get_at_path(path))
            .map(|value| value.is_unknown())
            .unwrap_or(false)
    }
}

impl<P: Provider> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self {
            server: Server::new(provider),
        }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        self.server.provider()
    }

    /// Get a reference to the adapter, for calls with hand-built requests.
    pub fn server(&self) -> &Server<P> {
        &self.server
    }

    // =========================================================================
    // Schema
    // =========================================================================

    /// Fetch the wire schema, failing on error diagnostics.
    pub async fn schema(&self) -> Result<proto::get_provider_schema::Response, TestError> {
        let resp = self.server.get_provider_schema().await;
        check_diagnostics(diagnostics_from(resp.diagnostics.clone()))?;
        Ok(resp)
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        let provider_type_name = self.provider().metadata().type_name;
        self.provider()
            .resources()
            .iter()
            .map(|factory| factory().type_name(&provider_type_name))
            .collect()
    }

    /// Get the list of data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        let provider_type_name = self.provider().metadata().type_name;
        self.provider()
            .data_sources()
            .iter()
            .map(|factory| factory().type_name(&provider_type_name))
            .collect()
    }

    fn resource_schema(&self, type_name: &str) -> Result<Schema, TestError> {
        let provider_type_name = self.provider().metadata().type_name;
        self.provider()
            .resources()
            .iter()
            .map(|factory| factory())
            .find(|r| r.type_name(&provider_type_name) == type_name)
            .map(|r| r.schema())
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()).into())
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate a provider configuration. Returns the warnings.
    pub async fn validate_provider_config(&self, config: Json) -> Result<Diagnostics, TestError> {
        let resp = self
            .server
            .validate_provider_config(Some(proto::validate_provider_config::Request {
                config: Some(dynamic(&config)?),
            }))
            .await;
        check_diagnostics(diagnostics_from(resp.diagnostics))
    }

    /// Configure the provider. Returns the warnings.
    pub async fn configure(&self, config: Json) -> Result<Diagnostics, TestError> {
        self.configure_with_version("", config).await
    }

    /// Configure the provider as a given host version would.
    pub async fn configure_with_version(
        &self,
        terraform_version: &str,
        config: Json,
    ) -> Result<Diagnostics, TestError> {
        let resp = self
            .server
            .configure_provider(Some(proto::configure_provider::Request {
                terraform_version: terraform_version.to_string(),
                config: Some(dynamic(&config)?),
            }))
            .await;
        check_diagnostics(diagnostics_from(resp.diagnostics))
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), TestError> {
        let resp = self.server.stop_provider().await;
        if resp.error.is_empty() {
            Ok(())
        } else {
            Err(ProviderError::Sdk(resp.error).into())
        }
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration. Returns the warnings.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Json,
    ) -> Result<Diagnostics, TestError> {
        let resp = self
            .server
            .validate_resource_config(Some(proto::validate_resource_config::Request {
                type_name: resource_type.to_string(),
                config: Some(dynamic(&config)?),
            }))
            .await;
        check_diagnostics(diagnostics_from(resp.diagnostics))
    }

    /// Plan creating a resource.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        config: Json,
    ) -> Result<PlannedChange, TestError> {
        self.plan(resource_type, None, Some(config)).await
    }

    /// Plan updating a resource from `prior_state` to `config`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Json,
        config: Json,
    ) -> Result<PlannedChange, TestError> {
        self.plan(resource_type, Some(prior_state), Some(config)).await
    }

    /// Plan destroying a resource.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Json,
    ) -> Result<PlannedChange, TestError> {
        self.plan(resource_type, Some(prior_state), None).await
    }

    /// Plan a change.
    ///
    /// The proposed new state is built the way the host builds it: configured
    /// values, with computed attributes left unset in the configuration
    /// carried over from the prior state.
    pub async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Json>,
        config: Option<Json>,
    ) -> Result<PlannedChange, TestError> {
        let schema = self.resource_schema(resource_type)?;
        let value_type = schema.value_type();

        let prior = match &prior_state {
            Some(json) => Value::from_json(&value_type, json)?,
            None => Value::Null,
        };
        let config = match &config {
            Some(json) => Value::from_json(&value_type, json)?,
            None => Value::Null,
        };
        let proposed = propose_block(&schema.block, &prior, &config);

        let resp = self
            .server
            .plan_resource_change(Some(proto::plan_resource_change::Request {
                type_name: resource_type.to_string(),
                prior_state: Some(encode_dynamic_value(&prior)?),
                proposed_new_state: Some(encode_dynamic_value(&proposed)?),
                config: Some(encode_dynamic_value(&config)?),
                provider_meta: None,
            }))
            .await;
        let diagnostics = check_diagnostics(diagnostics_from(resp.diagnostics))?;

        Ok(PlannedChange {
            planned_state: json_from(resp.planned_state)?,
            requires_replace: resp.requires_replace.into_iter().map(Path::from).collect(),
            diagnostics,
        })
    }

    /// Apply a planned change. Returns the new state, or `None` once the
    /// resource is gone.
    pub async fn apply(
        &self,
        resource_type: &str,
        prior_state: Option<Json>,
        plan: &PlannedChange,
        config: Json,
    ) -> Result<Option<Json>, TestError> {
        let resp = self
            .server
            .apply_resource_change(Some(proto::apply_resource_change::Request {
                type_name: resource_type.to_string(),
                prior_state: Some(dynamic(&prior_state.unwrap_or(Json::Null))?),
                planned_state: Some(dynamic(&plan.planned_state)?),
                config: Some(dynamic(&config)?),
                provider_meta: None,
            }))
            .await;
        check_diagnostics(diagnostics_from(resp.diagnostics))?;
        Ok(non_null(json_from(resp.new_state)?))
    }

    /// Refresh a resource. Returns `None` if the resource no longer exists.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Json,
    ) -> Result<Option<Json>, TestError> {
        let resp = self
            .server
            .read_resource(Some(proto::read_resource::Request {
                type_name: resource_type.to_string(),
                current_state: Some(dynamic(&current_state)?),
                provider_meta: None,
            }))
            .await;
        check_diagnostics(diagnostics_from(resp.diagnostics))?;
        Ok(non_null(json_from(resp.new_state)?))
    }

    /// Import a resource by identifier.
    pub async fn import_resource(&self, resource_type: &str, id: &str) -> Result<Json, TestError> {
        let resp = self
            .server
            .import_resource_state(Some(proto::import_resource_state::Request {
                type_name: resource_type.to_string(),
                id: id.to_string(),
            }))
            .await;
        check_diagnostics(diagnostics_from(resp.diagnostics))?;

        let imported = resp
            .imported_resources
            .into_iter()
            .next()
            .and_then(|resource| resource.state);
        json_from(imported)
    }

    /// Upgrade stored state written with schema `version`.
    pub async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Json,
    ) -> Result<Json, TestError> {
        let resp = self
            .server
            .upgrade_resource_state(Some(proto::upgrade_resource_state::Request {
                type_name: resource_type.to_string(),
                version,
                raw_state: Some(proto::RawState {
                    json: serde_json::to_vec(&state)?,
                }),
            }))
            .await;
        check_diagnostics(diagnostics_from(resp.diagnostics))?;
        json_from(resp.upgraded_state)
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source configuration. Returns the warnings.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Json,
    ) -> Result<Diagnostics, TestError> {
        let resp = self
            .server
            .validate_data_resource_config(Some(proto::validate_data_resource_config::Request {
                type_name: data_source_type.to_string(),
                config: Some(dynamic(&config)?),
            }))
            .await;
        check_diagnostics(diagnostics_from(resp.diagnostics))
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Json,
    ) -> Result<Json, TestError> {
        let resp = self
            .server
            .read_data_source(Some(proto::read_data_source::Request {
                type_name: data_source_type.to_string(),
                config: Some(dynamic(&config)?),
                provider_meta: None,
            }))
            .await;
        check_diagnostics(diagnostics_from(resp.diagnostics))?;
        json_from(resp.state)
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Run a full create lifecycle: plan → apply → read.
    ///
    /// Returns the final state after read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Json,
    ) -> Result<Json, TestError> {
        let plan = self.plan_create(resource_type, config.clone()).await?;
        let created = self
            .apply(resource_type, None, &plan, config)
            .await?
            .ok_or_else(|| missing_state("create"))?;
        self.read(resource_type, created)
            .await?
            .ok_or_else(|| missing_state("read after create"))
    }

    /// Run a full update lifecycle: plan → apply → read.
    ///
    /// Returns the final state after read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Json,
        config: Json,
    ) -> Result<Json, TestError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), config.clone())
            .await?;
        let updated = self
            .apply(resource_type, Some(prior_state), &plan, config)
            .await?
            .ok_or_else(|| missing_state("update"))?;
        self.read(resource_type, updated)
            .await?
            .ok_or_else(|| missing_state("read after update"))
    }

    /// Run a full delete lifecycle: plan → apply.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Json,
    ) -> Result<(), TestError> {
        let plan = self
            .plan_delete(resource_type, current_state.clone())
            .await?;
        match self
            .apply(resource_type, Some(current_state), &plan, Json::Null)
            .await?
        {
            None => Ok(()),
            Some(_) => Err(TestError::Diagnostics(
                Diagnostic::error("Resource Still Exists", "state was not removed after delete")
                    .into(),
            )),
        }
    }

    /// Run a full CRUD lifecycle: create → update → delete.
    ///
    /// Returns the state after the update (before delete).
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Json,
        updated_config: Json,
    ) -> Result<Json, TestError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }
}

/// Build a proposed new state from prior state and configuration.
fn propose_block(block: &Block, prior: &Value, config: &Value) -> Value {
    if config.is_null() || config.is_unknown() {
        return config.clone();
    }

    let mut attrs = BTreeMap::new();
    for (name, attr) in &block.attributes {
        let configured = config.attribute(name);
        let value = if configured.is_null() && attr.flags.computed {
            prior.attribute(name).clone()
        } else {
            configured.clone()
        };
        attrs.insert(name.clone(), value);
    }

    for (name, nested) in &block.blocks {
        let configured = config.attribute(name);
        let prior_value = prior.attribute(name);
        let value = match (nested.nesting_mode, configured) {
            (BlockNestingMode::Single, _) => propose_block(&nested.block, prior_value, configured),
            (_, Value::List(items)) => Value::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| propose_block(&nested.block, element(prior_value, i), item))
                    .collect(),
            ),
            (_, Value::Set(items)) => Value::Set(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| propose_block(&nested.block, element(prior_value, i), item))
                    .collect(),
            ),
            (_, Value::Map(entries)) => Value::Map(
                entries
                    .iter()
                    .map(|(key, item)| {
                        let prior_item = match prior_value {
                            Value::Map(prior_entries) => prior_entries.get(key).unwrap_or(&Value::Null),
                            _ => &Value::Null,
                        };
                        (key.clone(), propose_block(&nested.block, prior_item, item))
                    })
                    .collect(),
            ),
            (_, other) => other.clone(),
        };
        attrs.insert(name.clone(), value);
    }

    Value::Object(attrs)
}

fn element(value: &Value, index: usize) -> &Value {
    const NULL: &Value = &Value::Null;
    match value {
        Value::List(items) | Value::Set(items) => items.get(index).unwrap_or(NULL),
        _ => NULL,
    }
}

fn dynamic(json: &Json) -> Result<proto::DynamicValue, TestError> {
    Ok(proto::DynamicValue {
        msgpack: Vec::new(),
        json: serde_json::to_vec(json)?,
    })
}

fn json_from(value: Option<proto::DynamicValue>) -> Result<Json, TestError> {
    match value {
        Some(value) if !value.json.is_empty() => Ok(serde_json::from_slice(&value.json)?),
        _ => Ok(Json::Null),
    }
}

fn non_null(json: Json) -> Option<Json> {
    if json.is_null() {
        None
    } else {
        Some(json)
    }
}

fn missing_state(operation: &str) -> TestError {
    TestError::Diagnostics(
        Diagnostic::error(
            "Missing State",
            format!("no state was returned by {}", operation),
        )
        .into(),
    )
}

fn diagnostics_from(wire: Vec<proto::Diagnostic>) -> Diagnostics {
    wire.into_iter().map(Diagnostic::from).collect()
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics. Holds every diagnostic returned,
    /// warnings included.
    Diagnostics(Diagnostics),
    /// The operation failed with a provider error.
    Provider(ProviderError),
    /// A test value did not match the schema.
    Value(ValueError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if !diag.detail.is_empty() {
                        write!(f, ": {}", diag.detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
            TestError::Value(e) => write!(f, "Value error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

impl From<ValueError> for TestError {
    fn from(e: ValueError) -> Self {
        TestError::Value(e)
    }
}

impl From<serde_json::Error> for TestError {
    fn from(e: serde_json::Error) -> Self {
        TestError::Provider(e.into())
    }
}

/// Return the diagnostics if none is an error.
fn check_diagnostics(diagnostics: Diagnostics) -> Result<Diagnostics, TestError> {
    if diagnostics.has_error() {
        Err(TestError::Diagnostics(diagnostics))
    } else {
        Ok(diagnostics)
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan requires resource replacement.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlannedChange) {
    assert!(
        plan.requires_replacement(),
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan does not require resource replacement.
///
/// # Panics
///
/// Panics if the plan requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlannedChange) {
    assert!(
        !plan.requires_replacement(),
        "Expected plan to update in place, but it requires replacement of {:?}",
        plan.requires_replace.iter().map(|p| p.to_string()).collect::<Vec<_>>()
    );
}

/// Assert that a change to `path` forces replacement.
///
/// # Panics
///
/// Panics if `path` is not among the plan's replacement paths.
pub fn assert_requires_replace(plan: &PlannedChange, path: &Path) {
    assert!(
        plan.requires_replace.contains(path),
        "Expected '{}' to require replacement. Replacement paths: {:?}",
        path,
        plan.requires_replace.iter().map(|p| p.to_string()).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &Diagnostics) {
    let errors = diagnostics.errors();
    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
///
/// # Panics
///
/// Panics if there are no error diagnostics.
pub fn assert_has_errors(diagnostics: &Diagnostics) {
    assert!(
        diagnostics.has_error(),
        "Expected at least one error, but got none"
    );
}

/// Assert that diagnostics contain an error whose summary or detail contains
/// `substring`.
///
/// # Panics
///
/// Panics if no error diagnostic matches.
pub fn assert_error_contains(diagnostics: &Diagnostics, substring: &str) {
    let has_matching_error = diagnostics
        .errors()
        .iter()
        .any(|d| d.summary.contains(substring) || d.detail.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .errors()
            .iter()
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}
