//! # Tollgate Common
//!
//! Shared types, errors, and decimal helpers for the Tollgate metering ledger.
//!
//! ## Core Types
//!
//! - [`ReportLabels`]: identifying attributes of one workflow execution
//! - [`RateCard`]: resource dimension to "units per credit" table
//! - [`NodeSpend`]/[`SpendLimit`]: capability invocation boundary values
//!
//! ## Errors
//!
//! - [`TollgateError`]: business errors returned to callers
//! - [`DegradationCause`]: conditions that switch a report to metering mode

pub mod decimal;
pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{
    BillingError, DegradationCause, LedgerError, ReportError, Result, TollgateError,
};
pub use types::{
    labels::ReportLabels,
    resource::RateCard,
    spend::{NodeSpend, SpendLimit},
};

/// Tollgate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
