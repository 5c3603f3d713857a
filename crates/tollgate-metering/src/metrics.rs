//! Prometheus counters for report lifecycle and billing health

use prometheus::{IntCounter, Registry};

/// Metering counters, registered on a caller-supplied registry
#[derive(Clone)]
pub struct MeteringMetrics {
    pub reports_started: IntCounter,
    pub reports_ended: IntCounter,
    pub metering_mode_entered: IntCounter,
    pub emit_failures: IntCounter,
    pub receipt_failures: IntCounter,
    pub receipt_retries: IntCounter,
}

impl MeteringMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let counter = |name: &str, help: &str| IntCounter::new(name, help);

        Ok(Self {
            reports_started: counter(
                "tollgate_reports_started_total",
                "Metering reports started",
            )?,
            reports_ended: counter("tollgate_reports_ended_total", "Metering reports ended")?,
            metering_mode_entered: counter(
                "tollgate_metering_mode_entered_total",
                "Reports that switched to metering mode",
            )?,
            emit_failures: counter(
                "tollgate_emit_failures_total",
                "Failed metering report emissions",
            )?,
            receipt_failures: counter(
                "tollgate_receipt_failures_total",
                "Failed billing receipt submissions",
            )?,
            receipt_retries: counter(
                "tollgate_receipt_retries_total",
                "Billing receipt submission retries",
            )?,
        })
    }

    /// Register every counter on the registry
    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        for counter in [
            &self.reports_started,
            &self.reports_ended,
            &self.metering_mode_entered,
            &self.emit_failures,
            &self.receipt_failures,
            &self.receipt_retries,
        ] {
            registry.register(Box::new(counter.clone()))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for MeteringMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeteringMetrics")
            .field("reports_started", &self.reports_started.get())
            .field("reports_ended", &self.reports_ended.get())
            .field("metering_mode_entered", &self.metering_mode_entered.get())
            .finish()
    }
}
