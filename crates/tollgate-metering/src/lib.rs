//! # Tollgate Metering
//!
//! Per-execution credit ledger for workflows whose capability calls run
//! redundantly across many nodes.
//!
//! ## Protocol
//!
//! ```text
//! start -> reserve -> (deduct -> settle)* -> end
//! ```
//!
//! - `reserve`: fetch the execution's credit allowance
//! - `deduct`: earmark credits before a capability call
//! - `settle`: reconcile the median node spend and refund the difference
//! - `end`: emit the report and submit a receipt to the billing service
//!
//! Billing problems never block an execution. The report switches to
//! metering mode and keeps recording steps without moving credits.

pub mod aggregation;
pub mod billing;
pub mod config;
pub mod emitter;
pub mod generated;
pub mod ledger;
pub mod metrics;
pub mod registry;
pub mod report;

pub use billing::{BillingClient, GrpcBillingClient, RetryPolicy};
pub use config::MeteringConfig;
pub use emitter::{ReportEmitter, TracingEmitter};
pub use ledger::BalanceStore;
pub use metrics::MeteringMetrics;
pub use registry::Reports;
pub use report::{
    CapabilityConfig, CapabilityInfo, DeductionStrategy, MeteringReport, ReportStep,
};
