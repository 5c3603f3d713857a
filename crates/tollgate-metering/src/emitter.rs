//! Observability seam for formatted metering reports

use crate::generated::metering::v1::MeteringReport as MeteringReportProto;
use async_trait::async_trait;
use tollgate_common::{ReportLabels, Result};
use tracing::info;

/// Fire-and-forget sink for metering report snapshots
#[async_trait]
pub trait ReportEmitter: Send + Sync {
    /// Emit one formatted report keyed by the execution's labels
    async fn emit(&self, labels: &ReportLabels, report: &MeteringReportProto) -> Result<()>;
}

/// Emitter that writes the JSON snapshot to the tracing pipeline
#[derive(Debug, Default, Clone)]
pub struct TracingEmitter;

#[async_trait]
impl ReportEmitter for TracingEmitter {
    async fn emit(&self, labels: &ReportLabels, report: &MeteringReportProto) -> Result<()> {
        let json = serde_json::to_string(report)?;
        info!(
            target: "tollgate::metering_report",
            workflow_owner = %labels.workflow_owner,
            workflow_id = %labels.workflow_id,
            execution_id = %labels.workflow_execution_id,
            metering_mode = report.metering_mode,
            report = %json,
            "Metering report"
        );
        Ok(())
    }
}
