//! tonic implementation of the billing client

use super::client::BillingClient;
use crate::config::MeteringConfig;
use crate::generated::billing::v1::{self as proto, SERVICE_NAME};
use async_trait::async_trait;
use tollgate_common::BillingError;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status};
use tracing::{debug, instrument};

/// Billing client over a tonic channel
#[derive(Debug, Clone)]
pub struct GrpcBillingClient {
    inner: Grpc<Channel>,
}

impl GrpcBillingClient {
    /// Connect to the billing service
    pub async fn connect(addr: &str) -> Result<Self, BillingError> {
        let channel = Endpoint::from_shared(addr.to_string())
            .map_err(|e| BillingError::Transport(format!("invalid billing address {}: {}", addr, e)))?
            .connect()
            .await
            .map_err(|e| BillingError::Transport(format!("failed to connect to {}: {}", addr, e)))?;

        debug!(addr, "Connected to billing service");
        Ok(Self::from_channel(channel))
    }

    /// Connect to the billing service named by the configuration
    pub async fn from_config(config: &MeteringConfig) -> Result<Self, BillingError> {
        Self::connect(&config.billing_addr).await
    }

    /// Wrap an existing channel
    pub fn from_channel(channel: Channel) -> Self {
        Self {
            inner: Grpc::new(channel),
        }
    }

    async fn unary<Req, Resp>(&self, method: &'static str, request: Req) -> Result<Resp, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.inner.clone();
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("billing service not ready: {}", e)))?;

        let path = PathAndQuery::try_from(format!("/{}/{}", SERVICE_NAME, method))
            .map_err(|e| Status::internal(format!("invalid method path: {}", e)))?;
        let codec: ProstCodec<Req, Resp> = ProstCodec::default();

        let response = grpc.unary(Request::new(request), path, codec).await?;
        Ok(response.into_inner())
    }
}

#[async_trait]
impl BillingClient for GrpcBillingClient {
    #[instrument(skip(self))]
    async fn get_organization_credits_by_workflow(
        &self,
        request: proto::GetOrganizationCreditsByWorkflowRequest,
    ) -> Result<proto::GetOrganizationCreditsByWorkflowResponse, Status> {
        self.unary("GetOrganizationCreditsByWorkflow", request).await
    }

    #[instrument(skip(self))]
    async fn get_workflow_execution_rates(
        &self,
        request: proto::GetWorkflowExecutionRatesRequest,
    ) -> Result<proto::GetWorkflowExecutionRatesResponse, Status> {
        self.unary("GetWorkflowExecutionRates", request).await
    }

    #[instrument(skip(self))]
    async fn reserve_credits(
        &self,
        request: proto::ReserveCreditsRequest,
    ) -> Result<proto::ReserveCreditsResponse, Status> {
        self.unary("ReserveCredits", request).await
    }

    #[instrument(skip(self, request), fields(execution_id = %request.workflow_execution_id))]
    async fn submit_workflow_receipt(
        &self,
        request: proto::SubmitWorkflowReceiptRequest,
    ) -> Result<proto::SubmitWorkflowReceiptResponse, Status> {
        self.unary("SubmitWorkflowReceipt", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_invalid_address() {
        let result = GrpcBillingClient::connect("not a uri").await;
        assert!(matches!(result, Err(BillingError::Transport(_))));
    }

    #[tokio::test]
    async fn test_from_config_uses_billing_addr() {
        let config = MeteringConfig {
            billing_addr: "not a uri".to_string(),
            ..Default::default()
        };
        let err = GrpcBillingClient::from_config(&config).await.unwrap_err();
        assert!(err.to_string().contains("not a uri"));
    }
}
