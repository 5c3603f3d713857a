//! Resource dimensions and the billing rate card
//!
//! A resource dimension names a category of billable consumption. Gas
//! dimensions are keyed per chain as `GAS.<chain-selector>` and are rated in
//! native units per credit; every other dimension is rated in units per credit
//! as well but converted by multiplying with the reciprocal.

use crate::decimal;
use crate::error::DegradationCause;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Compute time dimension
pub const COMPUTE: &str = "RESOURCE_TYPE_COMPUTE";

/// Network cost dimension
pub const NETWORK: &str = "RESOURCE_TYPE_NETWORK";

/// EVM RPC dimension, reported but never funds-settled
pub const RPC_EVM: &str = "RPC_EVM";

/// Prefix of per-chain gas dimensions
pub const GAS_PREFIX: &str = "GAS.";

/// Gas dimension key for a chain selector
pub fn gas_resource(chain_selector: u64) -> String {
    format!("{GAS_PREFIX}{chain_selector}")
}

/// Whether a dimension is a per-chain gas dimension
#[inline]
pub fn is_gas(resource: &str) -> bool {
    resource.starts_with(GAS_PREFIX)
}

/// Chain selector of a gas dimension
pub fn gas_chain_selector(resource: &str) -> Option<u64> {
    resource.strip_prefix(GAS_PREFIX)?.parse().ok()
}

/// Whether spend on a dimension is reconciled against the balance
#[inline]
pub fn is_settled(resource: &str) -> bool {
    resource != RPC_EVM
}

/// Resource dimension to "units per credit" table from the billing service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateCard {
    rates: BTreeMap<String, Decimal>,
}

impl RateCard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a rate card from wire pairs
    ///
    /// Entries that do not parse to a positive decimal are skipped and
    /// reported as degradation causes.
    pub fn from_wire<I, G>(rates: I, gas: G) -> (Self, Vec<DegradationCause>)
    where
        I: IntoIterator<Item = (String, String)>,
        G: IntoIterator<Item = (u64, String)>,
    {
        let mut card = Self::new();
        let mut causes = Vec::new();

        let entries = rates
            .into_iter()
            .chain(gas.into_iter().map(|(selector, raw)| (gas_resource(selector), raw)));
        for (resource, raw) in entries {
            match decimal::parse(&raw) {
                Ok(rate) if rate > Decimal::ZERO => {
                    card.rates.insert(resource, rate);
                }
                _ => causes.push(DegradationCause::InvalidRate {
                    resource,
                    value: raw,
                }),
            }
        }

        (card, causes)
    }

    /// Insert a rate, replacing any existing rate for the dimension
    pub fn with_rate(mut self, resource: impl Into<String>, units_per_credit: Decimal) -> Self {
        self.rates.insert(resource.into(), units_per_credit);
        self
    }

    pub fn get(&self, resource: &str) -> Option<Decimal> {
        self.rates.get(resource).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.rates.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
