//! Report snapshot formatting
//!
//! Steps, resource dimensions and node rows are emitted in sorted order so
//! formatting the same state twice yields identical snapshots.

use super::{join_causes, MeteringReport, ReportState, ReportStep};
use crate::generated::metering::v1 as proto;
use rust_decimal::Decimal;
use tollgate_common::decimal;
use tollgate_common::ReportLabels;

impl MeteringReport {
    /// Snapshot the report for emission and receipts
    pub async fn format_report(&self) -> proto::MeteringReport {
        let state = self.state.lock().await;
        self.snapshot(&state)
    }

    pub(super) fn snapshot(&self, state: &ReportState) -> proto::MeteringReport {
        let precision = self.config.decimal_precision;

        proto::MeteringReport {
            steps: state
                .steps
                .iter()
                .map(|(step_ref, step)| (step_ref.clone(), format_step(step, precision)))
                .collect(),
            metadata: Some(metadata(&self.labels, self.started_at.timestamp())),
            metering_mode: state.metering_mode,
            message: join_causes(&state.causes).unwrap_or_default(),
        }
    }
}

/// Format a credit amount at the receipt precision
pub(crate) fn format_credits(value: Decimal, precision: u32) -> String {
    decimal::format(decimal::round_to(value, precision))
}

fn format_step(step: &ReportStep, precision: u32) -> proto::MeteringReportStep {
    let nodes = step
        .spends
        .iter()
        .flat_map(|(spend_unit, records)| {
            records.iter().map(move |record| proto::MeteringReportNodeDetail {
                peer_2_peer_id: record.peer_id.clone(),
                spend_unit: spend_unit.clone(),
                spend_value: record.raw_value.clone(),
                spend_value_credits: record
                    .credits
                    .map(|c| format_credits(c, precision))
                    .unwrap_or_default(),
            })
        })
        .collect();

    let aggregated = step
        .aggregated
        .iter()
        .map(|(spend_unit, agg)| proto::MeteringReportAggregate {
            spend_unit: spend_unit.clone(),
            spend_value: decimal::format(agg.value),
            spend_value_credits: agg
                .credits
                .map(|c| format_credits(c, precision))
                .unwrap_or_default(),
        })
        .collect();

    proto::MeteringReportStep {
        capability_id: step.capability_id.clone(),
        cap_don_n: step.cap_don_n,
        deduction: format_credits(step.deduction, precision),
        nodes,
        aggregated,
    }
}

fn metadata(labels: &ReportLabels, started_at: i64) -> proto::WorkflowMetadata {
    proto::WorkflowMetadata {
        workflow_owner: labels.workflow_owner.clone(),
        workflow_id: labels.workflow_id.clone(),
        workflow_execution_id: labels.workflow_execution_id.clone(),
        workflow_name: labels.workflow_name.clone().unwrap_or_default(),
        don_id: labels.don_id.unwrap_or_default(),
        don_f: labels.don_f.unwrap_or_default(),
        don_n: labels.don_n.unwrap_or_default(),
        p2p_id: labels.p2p_id.clone().unwrap_or_default(),
        trigger_id: labels.trigger_id.clone().unwrap_or_default(),
        org_id: labels.org_id.clone().unwrap_or_default(),
        started_at,
    }
}
