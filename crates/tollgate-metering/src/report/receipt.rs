//! Report emission and billing receipts

use super::format::format_credits;
use super::MeteringReport;
use crate::billing::{with_retry, RetryPolicy};
use crate::generated::billing::v1 as proto;
use tokio_util::sync::CancellationToken;
use tollgate_common::{BillingError, ReportError, Result};
use tracing::{info, instrument, warn};

const SUBMIT_RECEIPT: &str = "SubmitWorkflowReceipt";

impl MeteringReport {
    /// Push the formatted report to the observability pipeline
    #[instrument(skip_all, fields(execution_id = %self.labels.workflow_execution_id))]
    pub async fn emit_receipt(&self) -> Result<()> {
        self.ensure_reserved().await?;

        let report = self.format_report().await;
        if let Err(err) = self.emitter.emit(&self.labels, &report).await {
            warn!(error = %err, "Failed to emit metering report");
            if let Some(metrics) = &self.metrics {
                metrics.emit_failures.inc();
            }
            return Err(err);
        }
        Ok(())
    }

    /// Submit the report and total spend to the billing service
    ///
    /// Transport-class failures are retried with a fixed delay until the
    /// retry budget is spent or `cancel` fires.
    #[instrument(skip_all, fields(execution_id = %self.labels.workflow_execution_id))]
    pub async fn send_receipt(&self, cancel: &CancellationToken) -> Result<()> {
        let (report, spent) = {
            let state = self.state.lock().await;
            if !state.reserved {
                return Err(ReportError::NotReserved.into());
            }
            (self.snapshot(&state), state.ledger.spent())
        };
        let credits_consumed = format_credits(spent, self.config.decimal_precision);
        let request = proto::SubmitWorkflowReceiptRequest {
            workflow_owner: self.labels.workflow_owner.clone(),
            workflow_id: self.labels.workflow_id.clone(),
            workflow_execution_id: self.labels.workflow_execution_id.clone(),
            metering: Some(report),
            credits_consumed: credits_consumed.clone(),
        };

        let policy = RetryPolicy {
            max_retries: self.config.receipt_max_retries,
            delay: self.config.receipt_retry_delay(),
        };
        let on_retry = |_attempt: u32, _err: &BillingError| {
            if let Some(metrics) = &self.metrics {
                metrics.receipt_retries.inc();
            }
        };
        let result = with_retry(policy, cancel, on_retry, || {
            let request = request.clone();
            async move {
                self.billing
                    .submit_workflow_receipt(request)
                    .await
                    .map_err(BillingError::from)
            }
        })
        .await
        .and_then(|response| match response {
            proto::SubmitWorkflowReceiptResponse { success: true, .. } => Ok(()),
            proto::SubmitWorkflowReceiptResponse { message, .. } if message.is_empty() => {
                Err(BillingError::EmptyResponse(SUBMIT_RECEIPT))
            }
            proto::SubmitWorkflowReceiptResponse { message, .. } => {
                Err(BillingError::Rejected(message))
            }
        });

        match result {
            Ok(()) => {
                info!(credits_consumed = %credits_consumed, "Submitted workflow receipt");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Failed to submit workflow receipt");
                if let Some(metrics) = &self.metrics {
                    metrics.receipt_failures.inc();
                }
                Err(err.into())
            }
        }
    }

    async fn ensure_reserved(&self) -> Result<()> {
        if self.is_reserved().await {
            Ok(())
        } else {
            Err(ReportError::NotReserved.into())
        }
    }
}
