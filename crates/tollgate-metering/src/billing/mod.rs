//! Billing service client
//!
//! Provides:
//! - BillingClient: the four billing RPCs consumed by metering reports
//! - GrpcBillingClient: tonic transport implementation
//! - Retry and cancellation helpers for billing calls

pub mod client;
pub mod grpc;
pub mod retry;

pub use client::BillingClient;
pub use grpc::GrpcBillingClient;
pub use retry::{cancellable, with_retry, RetryPolicy};
