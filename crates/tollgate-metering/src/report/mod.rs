//! Metering report
//!
//! One report per workflow execution. Owns the execution's balance ledger and
//! per-step records, and implements the reserve, deduct, settle and finalize
//! protocol.
//!
//! ## Metering mode
//!
//! Billing outages, malformed billing data and unknown resource dimensions
//! never fail the execution. Instead the report switches to metering mode:
//! steps are still recorded for the audit trail but the ledger is no longer
//! touched. Once entered, metering mode is never cleared.

pub mod format;
pub mod receipt;
pub mod step;
pub mod strategy;

pub use step::ReportStep;
pub use strategy::{
    CapabilityConfig, CapabilityInfo, DeductionPlan, DeductionStrategy, SPEND_RATIOS_KEY,
};

use crate::aggregation::aggregate_spends;
use crate::billing::{cancellable, BillingClient};
use crate::config::MeteringConfig;
use crate::emitter::ReportEmitter;
use crate::generated::billing::v1 as proto;
use crate::ledger::BalanceStore;
use crate::metrics::MeteringMetrics;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tollgate_common::decimal;
use tollgate_common::{
    BillingError, DegradationCause, NodeSpend, RateCard, ReportError, ReportLabels, Result,
    SpendLimit,
};
use tracing::{debug, info, instrument, warn};

/// Mutable report state, guarded as a whole
struct ReportState {
    ledger: BalanceStore,
    steps: BTreeMap<String, ReportStep>,
    reserved: bool,
    metering_mode: bool,
    causes: Vec<DegradationCause>,
}

impl ReportState {
    fn degrade(
        &mut self,
        execution_id: &str,
        metrics: Option<&MeteringMetrics>,
        cause: DegradationCause,
    ) {
        warn!(execution_id, cause = %cause, "Report switched to metering mode");
        if !self.metering_mode {
            self.metering_mode = true;
            if let Some(metrics) = metrics {
                metrics.metering_mode_entered.inc();
            }
        }
        self.causes.push(cause);
    }
}

/// Credit ledger and audit trail for one workflow execution
pub struct MeteringReport {
    labels: ReportLabels,
    started_at: DateTime<Utc>,
    billing: Arc<dyn BillingClient>,
    emitter: Arc<dyn ReportEmitter>,
    config: MeteringConfig,
    metrics: Option<MeteringMetrics>,
    // Held across the reserve call so every operation sees one consistent state
    state: Mutex<ReportState>,
}

impl MeteringReport {
    /// Create an unreserved report with a zero balance
    ///
    /// An empty rate card is not an error; the report starts in metering mode.
    pub fn new(
        labels: ReportLabels,
        rate_card: RateCard,
        billing: Arc<dyn BillingClient>,
        emitter: Arc<dyn ReportEmitter>,
        config: MeteringConfig,
        metrics: Option<MeteringMetrics>,
    ) -> Result<Self> {
        labels.validate()?;

        let mut state = ReportState {
            ledger: BalanceStore::with_precision(
                Decimal::ZERO,
                &rate_card,
                config.decimal_precision,
            ),
            steps: BTreeMap::new(),
            reserved: false,
            metering_mode: false,
            causes: Vec::new(),
        };
        if rate_card.is_empty() {
            state.degrade(
                &labels.workflow_execution_id,
                metrics.as_ref(),
                DegradationCause::EmptyRateCard,
            );
        }

        Ok(Self {
            labels,
            started_at: Utc::now(),
            billing,
            emitter,
            config,
            metrics,
            state: Mutex::new(state),
        })
    }

    /// Record degradation causes found before the report was created
    pub fn with_degradation(mut self, causes: Vec<DegradationCause>) -> Self {
        let state = self.state.get_mut();
        for cause in causes {
            state.degrade(
                &self.labels.workflow_execution_id,
                self.metrics.as_ref(),
                cause,
            );
        }
        self
    }

    /// Reserve the execution's credit allowance
    ///
    /// Only the first call contacts the billing service. Billing outages and
    /// malformed credit amounts leave a zero balance in metering mode; an
    /// explicit rejection returns `InsufficientFunding`.
    #[instrument(skip_all, fields(execution_id = %self.labels.workflow_execution_id))]
    pub async fn reserve(&self, cancel: &CancellationToken) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.reserved {
            debug!("Credits already reserved");
            return Ok(());
        }

        let request = proto::ReserveCreditsRequest {
            workflow_owner: self.labels.workflow_owner.clone(),
            workflow_id: self.labels.workflow_id.clone(),
            workflow_execution_id: self.labels.workflow_execution_id.clone(),
            don_id: self.labels.don_id.unwrap_or_default(),
        };
        let response = cancellable(cancel, async {
            self.billing
                .reserve_credits(request)
                .await
                .map_err(BillingError::from)
        })
        .await;

        let execution_id = self.labels.workflow_execution_id.as_str();
        let metrics = self.metrics.as_ref();
        let response = match response {
            Ok(response) => response,
            Err(BillingError::Cancelled) => return Err(BillingError::Cancelled.into()),
            Err(err) => {
                state.reserved = true;
                state.ledger.set(Decimal::ZERO);
                state.degrade(
                    execution_id,
                    metrics,
                    DegradationCause::ReserveUnavailable(err.to_string()),
                );
                return Ok(());
            }
        };

        state.reserved = true;
        if !response.success {
            info!("Billing service declined credit reservation");
            return Err(ReportError::InsufficientFunding.into());
        }

        let credits = match decimal::parse(&response.credits) {
            Ok(credits) if !credits.is_sign_negative() => {
                decimal::round_to(credits, self.config.decimal_precision)
            }
            _ => {
                state.ledger.set(Decimal::ZERO);
                state.degrade(
                    execution_id,
                    metrics,
                    DegradationCause::InvalidCredits(response.credits),
                );
                return Ok(());
            }
        };

        if !response.rates.is_empty() || !response.gas_tokens_per_credit.is_empty() {
            let (card, causes) = RateCard::from_wire(
                response
                    .rates
                    .into_iter()
                    .map(|r| (r.resource_type, r.units_per_credit)),
                response.gas_tokens_per_credit,
            );
            for cause in causes {
                state.degrade(execution_id, metrics, cause);
            }
            debug!(rates = card.len(), "Using rate card from reservation");
            state.ledger =
                BalanceStore::with_precision(credits, &card, self.config.decimal_precision);
        } else {
            state.ledger.set(credits);
        }

        info!(credits = %credits, "Reserved credits");
        Ok(())
    }

    /// Earmark credits for a capability call before it runs
    ///
    /// Returns the native spend limits to enforce on the call. No limits are
    /// returned and the balance is untouched in metering mode.
    #[instrument(skip_all, fields(execution_id = %self.labels.workflow_execution_id, step_ref = %step_ref))]
    pub async fn deduct(
        &self,
        step_ref: &str,
        strategy: DeductionStrategy,
    ) -> Result<Vec<SpendLimit>> {
        let mut state = self.state.lock().await;
        if !state.reserved {
            return Err(ReportError::NotReserved.into());
        }
        if state.steps.contains_key(step_ref) {
            return Err(ReportError::StepDeductExists(step_ref.to_string()).into());
        }

        let plan = strategy.plan(
            &state.ledger,
            state.metering_mode,
            self.config.decimal_precision,
        )?;
        for cause in plan.causes {
            state.degrade(
                &self.labels.workflow_execution_id,
                self.metrics.as_ref(),
                cause,
            );
        }

        if !state.metering_mode {
            state.ledger.minus(plan.credits)?;
        }
        debug!(
            capability_id = %plan.capability_id,
            credits = %plan.credits,
            balance = %state.ledger.get(),
            "Deducted credits"
        );

        state.steps.insert(
            step_ref.to_string(),
            ReportStep::new(plan.capability_id, plan.credits),
        );

        if state.metering_mode {
            Ok(Vec::new())
        } else {
            Ok(plan.limits)
        }
    }

    /// Reconcile a capability call's node spends against its deduction
    ///
    /// Refunds the unspent part of the deduction and records the realized
    /// spend. Realized spend above the deduction is logged, not refused.
    #[instrument(
        skip_all,
        fields(execution_id = %self.labels.workflow_execution_id, step_ref = %step_ref, cap_don_n)
    )]
    pub async fn settle(
        &self,
        step_ref: &str,
        node_spends: &[NodeSpend],
        cap_don_n: u32,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.reserved {
            return Err(ReportError::NotReserved.into());
        }
        let deduction = match state.steps.get(step_ref) {
            None => return Err(ReportError::StepNotFound(step_ref.to_string()).into()),
            Some(step) if step.settled => {
                return Err(ReportError::StepSpendExists(step_ref.to_string()).into())
            }
            Some(step) => step.deduction,
        };

        let aggregation = aggregate_spends(
            step_ref,
            node_spends,
            cap_don_n,
            &state.ledger,
            self.config.gas_token_decimals,
        );
        for cause in aggregation.causes {
            state.degrade(
                &self.labels.workflow_execution_id,
                self.metrics.as_ref(),
                cause,
            );
        }

        if !state.metering_mode {
            let realized = aggregation.realized;
            let refund = deduction - realized;
            if refund.is_sign_negative() && !refund.is_zero() {
                warn!(
                    deduction = %deduction,
                    realized = %realized,
                    "Realized spend exceeds deduction"
                );
            } else {
                state.ledger.add(refund)?;
            }
            state.ledger.add_spent(realized)?;
            debug!(
                realized = %realized,
                balance = %state.ledger.get(),
                "Settled step"
            );
        }

        if let Some(step) = state.steps.get_mut(step_ref) {
            step.cap_don_n = cap_don_n.max(1);
            step.spends = aggregation.spends;
            step.aggregated = aggregation.aggregated;
            step.settled = true;
        }
        Ok(())
    }

    pub fn labels(&self) -> &ReportLabels {
        &self.labels
    }

    pub fn execution_id(&self) -> &str {
        &self.labels.workflow_execution_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Current credit balance
    pub async fn balance(&self) -> Decimal {
        self.state.lock().await.ledger.get()
    }

    /// Credits consumed so far
    pub async fn spent(&self) -> Decimal {
        self.state.lock().await.ledger.spent()
    }

    pub async fn is_reserved(&self) -> bool {
        self.state.lock().await.reserved
    }

    pub async fn is_metering_mode(&self) -> bool {
        self.state.lock().await.metering_mode
    }

    /// Every recorded degradation cause, joined
    pub async fn metering_mode_error(&self) -> Option<String> {
        let state = self.state.lock().await;
        join_causes(&state.causes)
    }

    pub async fn step(&self, step_ref: &str) -> Option<ReportStep> {
        self.state.lock().await.steps.get(step_ref).cloned()
    }
}

impl std::fmt::Debug for MeteringReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeteringReport")
            .field("labels", &self.labels)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

fn join_causes(causes: &[DegradationCause]) -> Option<String> {
    if causes.is_empty() {
        return None;
    }
    Some(
        causes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; "),
    )
}
