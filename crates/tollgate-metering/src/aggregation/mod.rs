//! Spend aggregation
//!
//! Reduces redundant per-node spend reports for one capability call into a
//! single representative value and converts it to credits.

pub mod median;
pub mod spends;

pub use median::median;
pub use spends::{aggregate_spends, AggregatedSpend, NodeSpendRecord, SpendAggregation};
