//! Report registry
//!
//! Directory of in-flight metering reports keyed by workflow execution id.
//! The map lock is only held for lookups and inserts; report operations run
//! on the looked-up `Arc` outside it. `end` claims the id before finalizing,
//! so one report is never billed twice.

use crate::billing::{cancellable, BillingClient};
use crate::config::MeteringConfig;
use crate::emitter::ReportEmitter;
use crate::generated::billing::v1 as proto;
use crate::metrics::MeteringMetrics;
use crate::report::MeteringReport;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tollgate_common::{
    BillingError, DegradationCause, RateCard, ReportError, ReportLabels, Result, TollgateError,
};
use tracing::{debug, info, instrument, warn};

/// In-flight metering reports
pub struct Reports {
    reports: DashMap<String, Arc<MeteringReport>>,
    /// Ids whose `end` is in progress
    ending: DashSet<String>,
    billing: Arc<dyn BillingClient>,
    emitter: Arc<dyn ReportEmitter>,
    config: MeteringConfig,
    metrics: Option<MeteringMetrics>,
}

impl Reports {
    pub fn new(
        billing: Arc<dyn BillingClient>,
        emitter: Arc<dyn ReportEmitter>,
        config: MeteringConfig,
    ) -> Self {
        Self {
            reports: DashMap::new(),
            ending: DashSet::new(),
            billing,
            emitter,
            config,
            metrics: None,
        }
    }

    /// Count lifecycle and billing events on `metrics`
    pub fn with_metrics(mut self, metrics: MeteringMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Create and register the report for one execution
    ///
    /// The execution's rate card is fetched from the billing service. A fetch
    /// failure or an empty card starts the report in metering mode.
    #[instrument(skip_all)]
    pub async fn start(
        &self,
        cancel: &CancellationToken,
        labels: &HashMap<String, String>,
    ) -> Result<Arc<MeteringReport>> {
        let labels = ReportLabels::from_map(labels)?;
        let execution_id = labels.workflow_execution_id.clone();
        if self.reports.contains_key(&execution_id) {
            return Err(ReportError::ReportExists(execution_id).into());
        }

        let (rate_card, causes) = self.fetch_rate_card(cancel, &labels).await?;
        let report = MeteringReport::new(
            labels,
            rate_card,
            Arc::clone(&self.billing),
            Arc::clone(&self.emitter),
            self.config.clone(),
            self.metrics.clone(),
        )?
        .with_degradation(causes);
        let report = Arc::new(report);

        match self.reports.entry(execution_id.clone()) {
            Entry::Occupied(_) => return Err(ReportError::ReportExists(execution_id).into()),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&report));
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.reports_started.inc();
        }
        info!(execution_id = %execution_id, "Started metering report");
        Ok(report)
    }

    pub fn get(&self, execution_id: &str) -> Option<Arc<MeteringReport>> {
        self.reports.get(execution_id).map(|r| Arc::clone(r.value()))
    }

    /// Emit and send the report, then drop it
    ///
    /// The report is removed even when emission or submission fails; those
    /// failures are returned together.
    #[instrument(skip(self, cancel))]
    pub async fn end(&self, cancel: &CancellationToken, execution_id: &str) -> Result<()> {
        if !self.ending.insert(execution_id.to_string()) {
            return Err(ReportError::ReportEnding(execution_id.to_string()).into());
        }
        let Some(report) = self.get(execution_id) else {
            self.ending.remove(execution_id);
            return Err(ReportError::ReportNotFound(execution_id.to_string()).into());
        };

        let mut errors = Vec::new();
        if let Err(err) = report.emit_receipt().await {
            errors.push(err);
        }
        if let Err(err) = report.send_receipt(cancel).await {
            errors.push(err);
        }

        self.reports.remove(execution_id);
        self.ending.remove(execution_id);
        if let Some(metrics) = &self.metrics {
            metrics.reports_ended.inc();
        }

        if errors.is_empty() {
            info!("Ended metering report");
            Ok(())
        } else {
            warn!(failures = errors.len(), "Ended metering report with failures");
            Err(TollgateError::Finalize(errors))
        }
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    async fn fetch_rate_card(
        &self,
        cancel: &CancellationToken,
        labels: &ReportLabels,
    ) -> Result<(RateCard, Vec<DegradationCause>)> {
        let request = proto::GetWorkflowExecutionRatesRequest {
            workflow_owner: labels.workflow_owner.clone(),
            workflow_id: labels.workflow_id.clone(),
        };
        let response = cancellable(cancel, async {
            self.billing
                .get_workflow_execution_rates(request)
                .await
                .map_err(BillingError::from)
        })
        .await;

        match response {
            Ok(response) => {
                let (card, causes) = RateCard::from_wire(
                    response
                        .rate_cards
                        .into_iter()
                        .map(|r| (r.resource_type, r.units_per_credit)),
                    response.gas_tokens_per_credit,
                );
                debug!(rates = card.len(), "Fetched rate card");
                Ok((card, causes))
            }
            Err(BillingError::Cancelled) => Err(BillingError::Cancelled.into()),
            Err(err) => Ok((
                RateCard::new(),
                vec![DegradationCause::RateCardUnavailable(err.to_string())],
            )),
        }
    }
}

impl std::fmt::Debug for Reports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reports")
            .field("reports", &self.reports.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
