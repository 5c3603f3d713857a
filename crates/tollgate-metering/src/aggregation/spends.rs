//! Per-step spend aggregation
//!
//! Groups one capability call's node spend reports by resource dimension,
//! reduces each dimension to its median, and converts the result to credits.
//!
//! - Unparsable values are kept for the audit trail but excluded from the median
//! - Gas values are shifted from native token units to the chain's smallest unit
//! - Regular dimensions are scaled by the redundant node set size
//! - Gas is a single shared on-chain cost and is never scaled
//! - `RPC_EVM` is aggregated but never converted or settled

use super::median::median;
use crate::ledger::BalanceStore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tollgate_common::decimal;
use tollgate_common::types::resource;
use tollgate_common::{DegradationCause, NodeSpend};
use tracing::warn;

/// One node's spend as recorded for the audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpendRecord {
    pub peer_id: String,
    /// Raw value exactly as reported
    pub raw_value: String,
    /// Credit equivalent, absent when the value could not be converted
    pub credits: Option<Decimal>,
}

/// Median spend of one resource dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSpend {
    /// Aggregated native amount (after gas shift and node scaling)
    pub value: Decimal,
    /// Credit equivalent, absent for unsettled or unknown dimensions
    pub credits: Option<Decimal>,
}

/// Result of aggregating one step's node spends
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpendAggregation {
    pub spends: BTreeMap<String, Vec<NodeSpendRecord>>,
    pub aggregated: BTreeMap<String, AggregatedSpend>,
    /// Total credits realized across settled dimensions
    pub realized: Decimal,
    pub causes: Vec<DegradationCause>,
}

/// Aggregate node spends for one step
pub fn aggregate_spends(
    step_ref: &str,
    node_spends: &[NodeSpend],
    cap_don_n: u32,
    ledger: &BalanceStore,
    gas_token_decimals: u32,
) -> SpendAggregation {
    let mut grouped: BTreeMap<&str, Vec<&NodeSpend>> = BTreeMap::new();
    for spend in node_spends {
        grouped.entry(spend.spend_type.as_str()).or_default().push(spend);
    }

    let mut result = SpendAggregation::default();
    for (spend_type, spends) in grouped {
        let is_gas = resource::is_gas(spend_type);
        let settled = resource::is_settled(spend_type);
        let convertible = settled && ledger.has_resource(spend_type);
        if settled && !convertible {
            result
                .causes
                .push(DegradationCause::ResourceTypeNotFound(spend_type.to_string()));
        }

        let mut values = Vec::with_capacity(spends.len());
        let mut records = Vec::with_capacity(spends.len());
        for spend in spends {
            let value = parse_spend(&spend.spend_value, is_gas, gas_token_decimals);
            let credits = match value {
                Some(v) if convertible => ledger.convert_to_balance(spend_type, v).ok(),
                _ => None,
            };

            match value {
                Some(v) => values.push(v),
                None => warn!(
                    step_ref,
                    peer_id = %spend.peer_id,
                    spend_type,
                    value = %spend.spend_value,
                    "Dropping invalid spend value from aggregation"
                ),
            }

            records.push(NodeSpendRecord {
                peer_id: spend.peer_id.clone(),
                raw_value: spend.spend_value.clone(),
                credits,
            });
        }
        records.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        result.spends.insert(spend_type.to_string(), records);

        if is_gas && values.len() > 1 {
            result.causes.push(DegradationCause::MultipleGasSpends {
                step_ref: step_ref.to_string(),
                resource: spend_type.to_string(),
                count: values.len(),
            });
        }

        if values.is_empty() {
            continue;
        }
        let scaled = median(&values).and_then(|mid| {
            if is_gas {
                Some(mid)
            } else {
                mid.checked_mul(Decimal::from(cap_don_n.max(1)))
            }
        });
        let Some(value) = scaled else {
            result.causes.push(out_of_range(step_ref, spend_type, &values));
            continue;
        };

        let credits = if convertible {
            match ledger.convert_to_balance(spend_type, value) {
                Ok(c) => Some(c),
                Err(_) => {
                    result.causes.push(out_of_range(step_ref, spend_type, &values));
                    None
                }
            }
        } else {
            None
        };
        if let Some(c) = credits {
            match result.realized.checked_add(c) {
                Some(total) => result.realized = total,
                None => result.causes.push(out_of_range(step_ref, spend_type, &values)),
            }
        }

        result
            .aggregated
            .insert(spend_type.to_string(), AggregatedSpend { value, credits });
    }

    result
}

fn out_of_range(step_ref: &str, spend_type: &str, values: &[Decimal]) -> DegradationCause {
    DegradationCause::UnconvertibleSpend {
        step_ref: step_ref.to_string(),
        resource: spend_type.to_string(),
        value: values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(","),
    }
}

/// Parse a raw node value, shifting gas to the chain's smallest unit
fn parse_spend(raw: &str, is_gas: bool, gas_token_decimals: u32) -> Option<Decimal> {
    let value = decimal::parse(raw).ok()?;
    if value.is_sign_negative() && !value.is_zero() {
        return None;
    }
    if is_gas {
        decimal::shift(value, gas_token_decimals)
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tollgate_common::types::resource::{gas_resource, COMPUTE, NETWORK, RPC_EVM};
    use tollgate_common::RateCard;

    fn ledger() -> BalanceStore {
        let card = RateCard::new()
            .with_rate(COMPUTE, dec!(2))
            .with_rate(gas_resource(1), dec!(1000000000));
        BalanceStore::new(dec!(100), &card)
    }

    #[test]
    fn test_median_scaled_by_node_count() {
        let spends = vec![
            NodeSpend::new("p3", COMPUTE, "6"),
            NodeSpend::new("p1", COMPUTE, "2"),
            NodeSpend::new("p2", COMPUTE, "4"),
        ];

        let result = aggregate_spends("ref-1", &spends, 3, &ledger(), 18);

        let agg = &result.aggregated[COMPUTE];
        assert_eq!(agg.value, dec!(12));
        assert_eq!(agg.credits, Some(dec!(6)));
        assert_eq!(result.realized, dec!(6));
        assert!(result.causes.is_empty());

        let peers: Vec<_> = result.spends[COMPUTE].iter().map(|r| r.peer_id.as_str()).collect();
        assert_eq!(peers, vec!["p1", "p2", "p3"]);
        assert_eq!(result.spends[COMPUTE][0].credits, Some(dec!(1)));
    }

    #[test]
    fn test_invalid_value_kept_for_audit() {
        let spends = vec![
            NodeSpend::new("p1", COMPUTE, "2"),
            NodeSpend::new("p2", COMPUTE, "garbage"),
        ];

        let result = aggregate_spends("ref-1", &spends, 1, &ledger(), 18);

        assert_eq!(result.spends[COMPUTE].len(), 2);
        assert_eq!(result.spends[COMPUTE][1].raw_value, "garbage");
        assert_eq!(result.spends[COMPUTE][1].credits, None);
        assert_eq!(result.aggregated[COMPUTE].value, dec!(2));
        assert!(result.causes.is_empty());
    }

    #[test]
    fn test_gas_is_shifted_and_not_scaled() {
        let gas = gas_resource(1);
        // 0.000000002 native token = 2e9 smallest units = 2 credits
        let spends = vec![NodeSpend::new("p1", gas.clone(), "0.000000002")];

        let result = aggregate_spends("ref-1", &spends, 4, &ledger(), 18);

        assert_eq!(result.aggregated[&gas].value, dec!(2000000000));
        assert_eq!(result.aggregated[&gas].credits, Some(dec!(2)));
        assert_eq!(result.realized, dec!(2));
        assert!(result.causes.is_empty());
    }

    #[test]
    fn test_multiple_gas_spends_degrade() {
        let gas = gas_resource(1);
        let spends = vec![
            NodeSpend::new("p1", gas.clone(), "0.000000001"),
            NodeSpend::new("p2", gas.clone(), "0.000000003"),
        ];

        let result = aggregate_spends("ref-1", &spends, 2, &ledger(), 18);

        assert_eq!(
            result.causes,
            vec![DegradationCause::MultipleGasSpends {
                step_ref: "ref-1".into(),
                resource: gas,
                count: 2,
            }]
        );
    }

    #[test]
    fn test_unknown_dimension_degrades_once() {
        let spends = vec![
            NodeSpend::new("p1", "RESOURCE_TYPE_UNKNOWN", "1"),
            NodeSpend::new("p2", "RESOURCE_TYPE_UNKNOWN", "1"),
        ];

        let result = aggregate_spends("ref-1", &spends, 2, &ledger(), 18);

        assert_eq!(
            result.causes,
            vec![DegradationCause::ResourceTypeNotFound("RESOURCE_TYPE_UNKNOWN".into())]
        );
        assert_eq!(result.aggregated["RESOURCE_TYPE_UNKNOWN"].credits, None);
        assert_eq!(result.realized, Decimal::ZERO);
    }

    #[test]
    fn test_rpc_evm_is_recorded_but_not_settled() {
        let spends = vec![
            NodeSpend::new("p1", RPC_EVM, "5"),
            NodeSpend::new("p1", COMPUTE, "2"),
        ];

        let result = aggregate_spends("ref-1", &spends, 1, &ledger(), 18);

        assert!(result.causes.is_empty());
        assert_eq!(result.aggregated[RPC_EVM].value, dec!(5));
        assert_eq!(result.aggregated[RPC_EVM].credits, None);
        assert_eq!(result.realized, dec!(1));
    }

    #[test]
    fn test_huge_even_median_does_not_overflow() {
        let max = "79228162514264337593543950335";
        let spends = vec![
            NodeSpend::new("p1", COMPUTE, max),
            NodeSpend::new("p2", COMPUTE, max),
        ];

        let result = aggregate_spends("ref-1", &spends, 1, &ledger(), 18);

        assert!(result.causes.is_empty());
        assert_eq!(result.aggregated[COMPUTE].value, Decimal::MAX);
    }

    #[test]
    fn test_scaling_overflow_degrades() {
        let spends = vec![NodeSpend::new("p1", COMPUTE, "50000000000000000000000000000")];

        let result = aggregate_spends("ref-1", &spends, 4, &ledger(), 18);

        assert!(matches!(
            result.causes.as_slice(),
            [DegradationCause::UnconvertibleSpend { resource, .. }] if resource == COMPUTE
        ));
        assert!(!result.aggregated.contains_key(COMPUTE));
        assert_eq!(result.realized, Decimal::ZERO);
        // The raw report stays in the audit trail
        assert_eq!(result.spends[COMPUTE].len(), 1);
    }

    #[test]
    fn test_realized_overflow_degrades() {
        let card = RateCard::new()
            .with_rate(COMPUTE, dec!(0.5))
            .with_rate(NETWORK, dec!(0.5));
        let ledger = BalanceStore::new(dec!(100), &card);
        let spends = vec![
            NodeSpend::new("p1", COMPUTE, "30000000000000000000000000000"),
            NodeSpend::new("p1", NETWORK, "30000000000000000000000000000"),
        ];

        let result = aggregate_spends("ref-1", &spends, 1, &ledger, 18);

        assert_eq!(result.realized, dec!(60000000000000000000000000000));
        assert!(matches!(
            result.causes.as_slice(),
            [DegradationCause::UnconvertibleSpend { resource, .. }] if resource == NETWORK
        ));
    }
}
