//! Error types for the Tollgate metering ledger
//!
//! Business errors are returned to callers through [`TollgateError`].
//! Degradation causes ([`DegradationCause`]) are never returned as errors;
//! they are accumulated on a report that has switched to metering mode.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias using TollgateError
pub type Result<T> = std::result::Result<T, TollgateError>;

/// Unified error type for Tollgate operations
#[derive(Debug, Error)]
pub enum TollgateError {
    // Balance ledger errors
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    // Report protocol errors
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    // Billing service errors
    #[error("Billing error: {0}")]
    Billing(#[from] BillingError),

    // Emit and send failures collected while ending a report
    #[error("Failed to finalize report: {}", join_errors(.0))]
    Finalize(Vec<TollgateError>),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_errors(errors: &[TollgateError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Balance ledger errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Amount must not be negative: {0}")]
    InvalidAmount(Decimal),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("Resource type not found in rate card: {0}")]
    ResourceTypeNotFound(String),
}

/// Metering report and registry errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReportError {
    #[error("Missing required label: {0}")]
    MissingLabel(String),

    #[error("Insufficient funding to start workflow execution")]
    InsufficientFunding,

    #[error("Credits have not been reserved for this report")]
    NotReserved,

    #[error("Deduction already recorded for step {0}")]
    StepDeductExists(String),

    #[error("Spend already recorded for step {0}")]
    StepSpendExists(String),

    #[error("No deduction recorded for step {0}")]
    StepNotFound(String),

    #[error("Open concurrent call slots must be greater than zero")]
    ZeroOpenSlots,

    #[error("Report already exists for execution {0}")]
    ReportExists(String),

    #[error("Report not found for execution {0}")]
    ReportNotFound(String),

    #[error("Report is already ending for execution {0}")]
    ReportEnding(String),
}

/// Billing service errors
#[derive(Debug, Error, Clone)]
pub enum BillingError {
    #[error("Billing service returned {:?}: {}", .0.code(), .0.message())]
    Status(tonic::Status),

    #[error("Billing service transport error: {0}")]
    Transport(String),

    #[error("Billing service rejected {0}")]
    Rejected(String),

    #[error("Billing service returned an empty response for {0}")]
    EmptyResponse(&'static str),

    #[error("Billing call cancelled")]
    Cancelled,

    #[error("Billing call failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<BillingError> },
}

impl BillingError {
    /// Whether the failure is a transport-class error worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            BillingError::Status(status) => matches!(
                status.code(),
                tonic::Code::Unavailable
                    | tonic::Code::DeadlineExceeded
                    | tonic::Code::ResourceExhausted
            ),
            _ => false,
        }
    }
}

impl From<tonic::Status> for BillingError {
    fn from(status: tonic::Status) -> Self {
        BillingError::Status(status)
    }
}

/// Conditions that switch a report into metering mode
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DegradationCause {
    #[error("rate card is empty")]
    EmptyRateCard,

    #[error("failed to fetch rate card: {0}")]
    RateCardUnavailable(String),

    #[error("invalid rate for {resource}: {value:?}")]
    InvalidRate { resource: String, value: String },

    #[error("failed to reserve credits: {0}")]
    ReserveUnavailable(String),

    #[error("invalid credit amount from billing service: {0:?}")]
    InvalidCredits(String),

    #[error("resource type not found in rate card: {0}")]
    ResourceTypeNotFound(String),

    #[error("spend ratio count {ratios} does not match spend type count {spend_types}")]
    SpendRatioCountMismatch { ratios: usize, spend_types: usize },

    #[error("missing spend ratio for {0}")]
    MissingSpendRatio(String),

    #[error("invalid spend ratio for {resource}: {value}")]
    InvalidSpendRatio { resource: String, value: String },

    #[error("step {step_ref} reported {count} gas spends for {resource}")]
    MultipleGasSpends {
        step_ref: String,
        resource: String,
        count: usize,
    },

    #[error("step {step_ref} spend for {resource} is out of range: {value}")]
    UnconvertibleSpend {
        step_ref: String,
        resource: String,
        value: String,
    },
}

impl From<serde_json::Error> for TollgateError {
    fn from(err: serde_json::Error) -> Self {
        TollgateError::Serialization(err.to_string())
    }
}

impl From<rust_decimal::Error> for TollgateError {
    fn from(err: rust_decimal::Error) -> Self {
        TollgateError::Serialization(err.to_string())
    }
}
