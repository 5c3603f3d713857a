//! Per-invocation bookkeeping

use crate::aggregation::{AggregatedSpend, NodeSpendRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One capability invocation, keyed by its caller-supplied reference
///
/// Created by a deduction and written at most once by a settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportStep {
    pub capability_id: String,
    /// Size of the redundant node set that executed the call
    pub cap_don_n: u32,
    /// Credits earmarked before the call ran
    pub deduction: Decimal,
    /// Raw node reports by resource dimension
    pub spends: BTreeMap<String, Vec<NodeSpendRecord>>,
    /// Median spend by resource dimension
    pub aggregated: BTreeMap<String, AggregatedSpend>,
    pub settled: bool,
}

impl ReportStep {
    pub fn new(capability_id: impl Into<String>, deduction: Decimal) -> Self {
        Self {
            capability_id: capability_id.into(),
            cap_don_n: 1,
            deduction,
            spends: BTreeMap::new(),
            aggregated: BTreeMap::new(),
            settled: false,
        }
    }
}
