//! gRPC binding for [`Server`].
//!
//! [`ProviderGrpcService`] implements the generated `Provider` service trait by
//! unwrapping each tonic request and delegating to the adapter. It never
//! returns a [`tonic::Status`] error: problems travel as diagnostics.

use std::sync::Arc;

use tracing::instrument;

use crate::proto;
use crate::provider::Provider;
use crate::server::Server;

/// Wrapper that implements the generated gRPC trait.
pub struct ProviderGrpcService<P: Provider> {
    server: Arc<Server<P>>,
}

impl<P: Provider> ProviderGrpcService<P> {
    /// Wrap a shared adapter.
    pub fn new(server: Arc<Server<P>>) -> Self {
        Self { server }
    }

    /// Wrap the service for registration with a tonic router.
    pub fn into_service(self) -> proto::ProviderServer<Self> {
        proto::ProviderServer::new(self)
    }
}

type RpcResult<T> = Result<tonic::Response<T>, tonic::Status>;

#[tonic::async_trait]
impl<P: Provider> proto::ProviderRpc for ProviderGrpcService<P> {
    #[instrument(skip(self, _request), name = "grpc.get_provider_schema")]
    async fn get_provider_schema(
        &self,
        _request: tonic::Request<proto::get_provider_schema::Request>,
    ) -> RpcResult<proto::get_provider_schema::Response> {
        Ok(tonic::Response::new(self.server.get_provider_schema().await))
    }

    #[instrument(skip(self, request), name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: tonic::Request<proto::validate_provider_config::Request>,
    ) -> RpcResult<proto::validate_provider_config::Response> {
        let resp = self
            .server
            .validate_provider_config(Some(request.into_inner()))
            .await;
        Ok(tonic::Response::new(resp))
    }

    #[instrument(skip(self, request), name = "grpc.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        request: tonic::Request<proto::validate_resource_config::Request>,
    ) -> RpcResult<proto::validate_resource_config::Response> {
        let resp = self
            .server
            .validate_resource_config(Some(request.into_inner()))
            .await;
        Ok(tonic::Response::new(resp))
    }

    #[instrument(skip(self, request), name = "grpc.validate_data_resource_config")]
    async fn validate_data_resource_config(
        &self,
        request: tonic::Request<proto::validate_data_resource_config::Request>,
    ) -> RpcResult<proto::validate_data_resource_config::Response> {
        let resp = self
            .server
            .validate_data_resource_config(Some(request.into_inner()))
            .await;
        Ok(tonic::Response::new(resp))
    }

    #[instrument(skip(self, request), name = "grpc.upgrade_resource_state")]
    async fn upgrade_resource_state(
        &self,
        request: tonic::Request<proto::upgrade_resource_state::Request>,
    ) -> RpcResult<proto::upgrade_resource_state::Response> {
        let resp = self
            .server
            .upgrade_resource_state(Some(request.into_inner()))
            .await;
        Ok(tonic::Response::new(resp))
    }

    #[instrument(skip(self, request), name = "grpc.configure_provider")]
    async fn configure_provider(
        &self,
        request: tonic::Request<proto::configure_provider::Request>,
    ) -> RpcResult<proto::configure_provider::Response> {
        let resp = self
            .server
            .configure_provider(Some(request.into_inner()))
            .await;
        Ok(tonic::Response::new(resp))
    }

    #[instrument(skip(self, request), name = "grpc.read_resource")]
    async fn read_resource(
        &self,
        request: tonic::Request<proto::read_resource::Request>,
    ) -> RpcResult<proto::read_resource::Response> {
        let resp = self.server.read_resource(Some(request.into_inner())).await;
        Ok(tonic::Response::new(resp))
    }

    #[instrument(skip(self, request), name = "grpc.plan_resource_change")]
    async fn plan_resource_change(
        &self,
        request: tonic::Request<proto::plan_resource_change::Request>,
    ) -> RpcResult<proto::plan_resource_change::Response> {
        let resp = self
            .server
            .plan_resource_change(Some(request.into_inner()))
            .await;
        Ok(tonic::Response::new(resp))
    }

    #[instrument(skip(self, request), name = "grpc.apply_resource_change")]
    async fn apply_resource_change(
        &self,
        request: tonic::Request<proto::apply_resource_change::Request>,
    ) -> RpcResult<proto::apply_resource_change::Response> {
        let resp = self
            .server
            .apply_resource_change(Some(request.into_inner()))
            .await;
        Ok(tonic::Response::new(resp))
    }

    #[instrument(skip(self, request), name = "grpc.import_resource_state")]
    async fn import_resource_state(
        &self,
        request: tonic::Request<proto::import_resource_state::Request>,
    ) -> RpcResult<proto::import_resource_state::Response> {
        let resp = self
            .server
            .import_resource_state(Some(request.into_inner()))
            .await;
        Ok(tonic::Response::new(resp))
    }

    #[instrument(skip(self, request), name = "grpc.read_data_source")]
    async fn read_data_source(
        &self,
        request: tonic::Request<proto::read_data_source::Request>,
    ) -> RpcResult<proto::read_data_source::Response> {
        let resp = self
            .server
            .read_data_source(Some(request.into_inner()))
            .await;
        Ok(tonic::Response::new(resp))
    }

    #[instrument(skip(self, _request), name = "grpc.stop_provider")]
    async fn stop_provider(
        &self,
        _request: tonic::Request<proto::stop_provider::Request>,
    ) -> RpcResult<proto::stop_provider::Response> {
        Ok(tonic::Response::new(self.server.stop_provider().await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ConfigureRequest, ConfigureResponse, MetadataResponse, SchemaResponse};
    use crate::proto::ProviderRpc;

    struct EmptyProvider;

    #[async_trait::async_trait]
    impl Provider for EmptyProvider {
        fn metadata(&self) -> MetadataResponse {
            MetadataResponse::new("empty", "0.0.0")
        }

        async fn schema(&self, _resp: &mut SchemaResponse) {}

        async fn configure(&self, _req: ConfigureRequest, resp: &mut ConfigureResponse) {
            resp.diagnostics.add_warning("configured", "");
        }
    }

    fn service() -> ProviderGrpcService<EmptyProvider> {
        ProviderGrpcService::new(Arc::new(Server::new(EmptyProvider)))
    }

    #[test]
    fn test_service_name() {
        use tonic::server::NamedService;

        assert_eq!(
            <proto::ProviderServer<ProviderGrpcService<EmptyProvider>> as NamedService>::NAME,
            "tfplugin.Provider"
        );
    }

    #[tokio::test]
    async fn test_configure_delegates() {
        let resp = service()
            .configure_provider(tonic::Request::new(proto::configure_provider::Request {
                terraform_version: "1.5.0".to_string(),
                config: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(resp.diagnostics.len(), 1);
        assert_eq!(resp.diagnostics[0].summary, "configured");
    }

    #[tokio::test]
    async fn test_unknown_type_is_diagnostic_not_status() {
        let resp = service()
            .read_data_source(tonic::Request::new(proto::read_data_source::Request {
                type_name: "empty_nothing".to_string(),
                config: None,
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(resp.diagnostics[0].summary, "Data Source Type Not Found");
        assert!(resp.state.is_none());
    }

    #[test]
    fn test_stop() {
        let resp = tokio_test::block_on(
            service().stop_provider(tonic::Request::new(proto::stop_provider::Request {})),
        )
        .unwrap()
        .into_inner();
        assert!(resp.error.is_empty());
    }
}
