//! Managed resources.
//!
//! A [`Resource`] implements the create, read, update and delete lifecycle of a
//! single resource type. The framework creates a fresh instance through its
//! [`ResourceFactory`] for every call and hands it the provider data before
//! invoking a callback.
//!
//! Response records arrive pre-populated: `CreateResponse::state` holds the
//! planned state, `ReadResponse::state` the current state and so on, so a
//! callback only has to fill in what changed.

use std::sync::Arc;

use crate::data::{Config, Plan, State};
use crate::diag::Diagnostics;
use crate::path::{Path, Paths};
use crate::provider::ProviderData;
use crate::schema::Schema;

pub use crate::provider::{ValidateConfigRequest, ValidateConfigResponse};

/// Creates a new resource instance.
pub type ResourceFactory = Arc<dyn Fn() -> Box<dyn Resource> + Send + Sync>;

/// Wrap a constructor as a [`ResourceFactory`].
pub fn factory<F, R>(constructor: F) -> ResourceFactory
where
    F: Fn() -> R + Send + Sync + 'static,
    R: Resource + 'static,
{
    Arc::new(move || Box::new(constructor()) as Box<dyn Resource>)
}

/// Input to `configure` on resources and data sources.
#[derive(Clone, Default)]
pub struct ConfigureRequest {
    /// Data produced by the provider's `configure`. `None` until the provider
    /// has been configured.
    pub provider_data: Option<ProviderData>,
}

impl std::fmt::Debug for ConfigureRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigureRequest")
            .field("provider_data", &self.provider_data.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Output of `configure` on resources and data sources.
#[derive(Debug, Clone, Default)]
pub struct ConfigureResponse {
    /// Problems found while configuring.
    pub diagnostics: Diagnostics,
}

/// Input to [`Resource::modify_plan`].
#[derive(Debug, Clone, Default)]
pub struct ModifyPlanRequest {
    /// The configuration.
    pub config: Config,
    /// The prior state. Null on create.
    pub state: State,
    /// The plan computed so far. Null on destroy.
    pub plan: Plan,
    /// The module's `provider_meta`, if any.
    pub provider_meta: Config,
}

/// Output of [`Resource::modify_plan`].
#[derive(Debug, Clone, Default)]
pub struct ModifyPlanResponse {
    /// The plan to return to the host.
    pub plan: Plan,
    /// Attributes whose change forces replacement. Starts with the ones the
    /// schema already flags; entries can only be added.
    pub requires_replace: Paths,
    /// Problems found while planning.
    pub diagnostics: Diagnostics,
}

/// Input to [`Resource::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    /// The configuration.
    pub config: Config,
    /// The planned state.
    pub plan: Plan,
    /// The module's `provider_meta`, if any.
    pub provider_meta: Config,
}

/// Output of [`Resource::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateResponse {
    /// The new state. Starts as the planned state.
    pub state: State,
    /// Problems found while creating.
    pub diagnostics: Diagnostics,
}

/// Input to [`Resource::read`].
#[derive(Debug, Clone, Default)]
pub struct ReadRequest {
    /// The current state.
    pub state: State,
    /// The module's `provider_meta`, if any.
    pub provider_meta: Config,
}

/// Output of [`Resource::read`].
#[derive(Debug, Clone, Default)]
pub struct ReadResponse {
    /// The refreshed state. Starts as the current state; call
    /// [`State::remove_resource`] if the resource no longer exists.
    pub state: State,
    /// Problems found while reading.
    pub diagnostics: Diagnostics,
}

/// Input to [`Resource::update`].
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    /// The configuration.
    pub config: Config,
    /// The planned state.
    pub plan: Plan,
    /// The prior state.
    pub state: State,
    /// The module's `provider_meta`, if any.
    pub provider_meta: Config,
}

/// Output of [`Resource::update`].
#[derive(Debug, Clone, Default)]
pub struct UpdateResponse {
    /// The new state. Starts as the planned state.
    pub state: State,
    /// Problems found while updating.
    pub diagnostics: Diagnostics,
}

/// Input to [`Resource::delete`].
#[derive(Debug, Clone, Default)]
pub struct DeleteRequest {
    /// The prior state.
    pub state: State,
    /// The module's `provider_meta`, if any.
    pub provider_meta: Config,
}

/// Output of [`Resource::delete`].
#[derive(Debug, Clone, Default)]
pub struct DeleteResponse {
    /// The state kept if deletion fails. Removed automatically on success.
    pub state: State,
    /// Problems found while deleting.
    pub diagnostics: Diagnostics,
}

/// Input to [`Resource::import_state`].
#[derive(Debug, Clone, Default)]
pub struct ImportStateRequest {
    /// The identifier the practitioner passed to import.
    pub id: String,
}

/// Output of [`Resource::import_state`].
#[derive(Debug, Clone, Default)]
pub struct ImportStateResponse {
    /// The imported state. Starts null; the host reads the resource
    /// afterwards, so setting the identifying attributes is enough.
    pub state: State,
    /// Problems found while importing.
    pub diagnostics: Diagnostics,
}

/// Input to [`Resource::upgrade_state`].
#[derive(Debug, Clone, Default)]
pub struct UpgradeStateRequest {
    /// Schema version the stored state was written with.
    pub version: u64,
    /// The stored state as raw JSON.
    pub raw_state: serde_json::Value,
}

/// Output of [`Resource::upgrade_state`].
#[derive(Debug, Clone, Default)]
pub struct UpgradeStateResponse {
    /// The state rewritten for the current schema. Starts null.
    pub state: State,
    /// Problems found while upgrading.
    pub diagnostics: Diagnostics,
}

/// Trait that managed resource implementations must implement.
#[async_trait::async_trait]
pub trait Resource: Send + Sync {
    /// The full type name, usually `format!("{provider_type_name}_thing")`.
    fn type_name(&self, provider_type_name: &str) -> String;

    /// Describe the resource.
    fn schema(&self) -> Schema;

    /// Receive the provider data. Called before every other callback.
    fn configure(&mut self, req: ConfigureRequest, resp: &mut ConfigureResponse) {
        let _ = (req, resp);
    }

    /// Validate the configuration beyond what the schema enforces.
    async fn validate_config(&self, req: ValidateConfigRequest, resp: &mut ValidateConfigResponse) {
        let _ = (req, resp);
    }

    /// Adjust the plan. Called for create, update and destroy; the plan is
    /// null on destroy.
    async fn modify_plan(&self, req: ModifyPlanRequest, resp: &mut ModifyPlanResponse) {
        let _ = (req, resp);
    }

    /// Create the resource.
    async fn create(&self, req: CreateRequest, resp: &mut CreateResponse);

    /// Refresh the state from the remote object.
    async fn read(&self, req: ReadRequest, resp: &mut ReadResponse);

    /// Update the resource in place.
    async fn update(&self, req: UpdateRequest, resp: &mut UpdateResponse);

    /// Delete the resource.
    async fn delete(&self, req: DeleteRequest, resp: &mut DeleteResponse);

    /// Import an existing object by identifier.
    async fn import_state(&self, req: ImportStateRequest, resp: &mut ImportStateResponse) {
        let _ = req;
        resp.diagnostics.add_error(
            "Resource Import Not Implemented",
            "This resource does not support import. Please contact the provider developer for additional information.",
        );
    }

    /// Rewrite state stored with an older schema version.
    async fn upgrade_state(&self, req: UpgradeStateRequest, resp: &mut UpgradeStateResponse) {
        resp.diagnostics.add_error(
            "Unable to Upgrade Resource State",
            format!(
                "This resource was stored with schema version {}, but the resource does not implement state upgrades. \
                 Please report this to the provider developer.",
                req.version
            ),
        );
    }
}

/// Import by copying the identifier into the attribute at `path`.
pub fn import_state_passthrough_id(
    path: &Path,
    req: &ImportStateRequest,
    resp: &mut ImportStateResponse,
) {
    let diags = resp.state.set_attribute(path, req.id.clone());
    resp.diagnostics.append(diags);
}
