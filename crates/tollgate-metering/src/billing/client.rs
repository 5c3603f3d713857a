//! Billing service client trait

use crate::generated::billing::v1 as proto;
use async_trait::async_trait;
use tonic::Status;

/// Billing service RPCs
///
/// Decimal amounts travel as strings. Implementations return gRPC statuses
/// so callers can classify transport failures for retry.
#[async_trait]
pub trait BillingClient: Send + Sync {
    async fn get_organization_credits_by_workflow(
        &self,
        request: proto::GetOrganizationCreditsByWorkflowRequest,
    ) -> Result<proto::GetOrganizationCreditsByWorkflowResponse, Status>;

    async fn get_workflow_execution_rates(
        &self,
        request: proto::GetWorkflowExecutionRatesRequest,
    ) -> Result<proto::GetWorkflowExecutionRatesResponse, Status>;

    async fn reserve_credits(
        &self,
        request: proto::ReserveCreditsRequest,
    ) -> Result<proto::ReserveCreditsResponse, Status>;

    async fn submit_workflow_receipt(
        &self,
        request: proto::SubmitWorkflowReceiptRequest,
    ) -> Result<proto::SubmitWorkflowReceiptResponse, Status>;
}
