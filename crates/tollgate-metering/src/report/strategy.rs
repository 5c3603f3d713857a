//! Deduction strategies
//!
//! A strategy decides how many credits to earmark for one capability call:
//! - `ByResource`: a known native amount of one resource dimension
//! - `ByDerivedAvailability`: an even share of the remaining balance, capped
//!   by the user's limit, fanned out into per-dimension native ceilings
//!
//! Strategies only plan against the ledger; the report applies the plan.

use crate::ledger::BalanceStore;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::{Map, Value};
use tollgate_common::decimal;
use tollgate_common::types::resource;
use tollgate_common::{DegradationCause, LedgerError, ReportError, SpendLimit};

/// Configuration key carrying the spend ratio map
pub const SPEND_RATIOS_KEY: &str = "spendRatios";

/// Per-invocation capability configuration
pub type CapabilityConfig = Map<String, Value>;

/// Capability metadata relevant to metering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityInfo {
    pub id: String,
    /// Declared spend dimensions
    pub spend_types: Vec<String>,
}

/// Policy deciding the deduction for one step
#[derive(Debug, Clone, PartialEq)]
pub enum DeductionStrategy {
    ByResource {
        resource: String,
        capability_id: String,
        amount: Decimal,
    },
    ByDerivedAvailability {
        user_spend_limit: Option<Decimal>,
        open_concurrent_call_slots: usize,
        capability: CapabilityInfo,
        config: CapabilityConfig,
    },
}

/// What a strategy wants applied to the report
#[derive(Debug, Clone, PartialEq)]
pub struct DeductionPlan {
    pub capability_id: String,
    /// Credits to earmark
    pub credits: Decimal,
    /// Native ceilings for the capability call
    pub limits: Vec<SpendLimit>,
    /// Conditions that should switch the report to metering mode
    pub causes: Vec<DegradationCause>,
}

impl DeductionStrategy {
    pub fn by_resource(
        resource: impl Into<String>,
        capability_id: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self::ByResource {
            resource: resource.into(),
            capability_id: capability_id.into(),
            amount,
        }
    }

    pub fn by_derived_availability(
        user_spend_limit: Option<Decimal>,
        open_concurrent_call_slots: usize,
        capability: CapabilityInfo,
        config: CapabilityConfig,
    ) -> Self {
        Self::ByDerivedAvailability {
            user_spend_limit,
            open_concurrent_call_slots,
            capability,
            config,
        }
    }

    pub fn capability_id(&self) -> &str {
        match self {
            Self::ByResource { capability_id, .. } => capability_id,
            Self::ByDerivedAvailability { capability, .. } => &capability.id,
        }
    }

    /// Plan the deduction against the current ledger
    ///
    /// No limits are produced while in metering mode.
    pub fn plan(
        &self,
        ledger: &BalanceStore,
        metering_mode: bool,
        precision: u32,
    ) -> Result<DeductionPlan, ReportError> {
        match self {
            Self::ByResource {
                resource,
                capability_id,
                amount,
            } => {
                let mut causes = Vec::new();
                let credits = match ledger.convert_to_balance(resource, *amount) {
                    Ok(credits) => credits,
                    Err(_) => {
                        causes.push(DegradationCause::ResourceTypeNotFound(resource.clone()));
                        *amount
                    }
                };

                Ok(DeductionPlan {
                    capability_id: capability_id.clone(),
                    credits,
                    limits: Vec::new(),
                    causes,
                })
            }
            Self::ByDerivedAvailability {
                user_spend_limit,
                open_concurrent_call_slots,
                capability,
                config,
            } => {
                if *open_concurrent_call_slots == 0 {
                    return Err(ReportError::ZeroOpenSlots);
                }

                // Truncate so the shares never sum past the balance
                let share = (ledger.get() / Decimal::from(*open_concurrent_call_slots as u64))
                    .round_dp_with_strategy(precision, RoundingStrategy::ToZero)
                    .max(Decimal::ZERO);
                let credits = match user_spend_limit {
                    Some(limit) if *limit < share => *limit,
                    _ => share,
                };

                let mut plan = DeductionPlan {
                    capability_id: capability.id.clone(),
                    credits,
                    limits: Vec::new(),
                    causes: Vec::new(),
                };
                if metering_mode {
                    return Ok(plan);
                }

                match spend_limits(ledger, credits, &capability.spend_types, config) {
                    Ok(limits) => plan.limits = limits,
                    Err(cause) => plan.causes.push(cause),
                }
                Ok(plan)
            }
        }
    }
}

/// Spend ratio per declared dimension
///
/// A single declared dimension gets ratio 1. More than one requires a ratio
/// map under [`SPEND_RATIOS_KEY`] with exactly one entry per dimension.
pub fn spend_ratios(
    spend_types: &[String],
    config: &CapabilityConfig,
) -> Result<Vec<(String, Decimal)>, DegradationCause> {
    match spend_types {
        [] => return Ok(Vec::new()),
        [only] => return Ok(vec![(only.clone(), Decimal::ONE)]),
        _ => {}
    }

    let ratios = config.get(SPEND_RATIOS_KEY).and_then(Value::as_object);
    let count = ratios.map_or(0, Map::len);
    let Some(ratios) = ratios.filter(|r| r.len() == spend_types.len()) else {
        return Err(DegradationCause::SpendRatioCountMismatch {
            ratios: count,
            spend_types: spend_types.len(),
        });
    };

    spend_types
        .iter()
        .map(|spend_type| {
            let raw = ratios
                .get(spend_type)
                .ok_or_else(|| DegradationCause::MissingSpendRatio(spend_type.clone()))?;
            let text = match raw {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let ratio = decimal::parse(&text)
                .ok()
                .filter(|r| !r.is_sign_negative())
                .ok_or_else(|| DegradationCause::InvalidSpendRatio {
                    resource: spend_type.clone(),
                    value: text.clone(),
                })?;
            Ok((spend_type.clone(), ratio))
        })
        .collect()
}

/// Fan a credit amount out into native ceilings per dimension
fn spend_limits(
    ledger: &BalanceStore,
    credits: Decimal,
    spend_types: &[String],
    config: &CapabilityConfig,
) -> Result<Vec<SpendLimit>, DegradationCause> {
    let mut limits = Vec::new();
    for (spend_type, ratio) in spend_ratios(spend_types, config)? {
        if !resource::is_settled(&spend_type) {
            continue;
        }
        let share = credits
            .checked_mul(ratio)
            .ok_or_else(|| DegradationCause::InvalidSpendRatio {
                resource: spend_type.clone(),
                value: ratio.to_string(),
            })?;
        let amount = ledger
            .convert_from_balance(&spend_type, share)
            .map_err(|err| match err {
                LedgerError::ResourceTypeNotFound(_) => {
                    DegradationCause::ResourceTypeNotFound(spend_type.clone())
                }
                _ => DegradationCause::InvalidSpendRatio {
                    resource: spend_type.clone(),
                    value: ratio.to_string(),
                },
            })?;
        limits.push(SpendLimit {
            spend_type,
            limit: decimal::format(amount),
        });
    }
    Ok(limits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use tollgate_common::types::resource::{gas_resource, COMPUTE, NETWORK};
    use tollgate_common::RateCard;

    fn ledger(balance: Decimal) -> BalanceStore {
        let card = RateCard::new()
            .with_rate(COMPUTE, dec!(2))
            .with_rate(NETWORK, dec!(4))
            .with_rate(gas_resource(1), dec!(1000000000));
        BalanceStore::new(balance, &card)
    }

    fn config(value: Value) -> CapabilityConfig {
        value.as_object().cloned().unwrap_or_default()
    }

    fn capability(spend_types: &[&str]) -> CapabilityInfo {
        CapabilityInfo {
            id: "cap@1.0.0".into(),
            spend_types: spend_types.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_by_resource_converts() {
        let strategy = DeductionStrategy::by_resource(COMPUTE, "cap@1.0.0", dec!(2));
        let plan = strategy.plan(&ledger(dec!(100)), false, 10).unwrap();

        assert_eq!(plan.credits, dec!(1));
        assert_eq!(plan.capability_id, "cap@1.0.0");
        assert!(plan.limits.is_empty());
        assert!(plan.causes.is_empty());
    }

    #[test]
    fn test_by_resource_unknown_resource() {
        let strategy = DeductionStrategy::by_resource("UNKNOWN", "cap@1.0.0", dec!(2));
        let plan = strategy.plan(&ledger(dec!(100)), false, 10).unwrap();

        assert_eq!(plan.credits, dec!(2));
        assert_eq!(plan.causes, vec![DegradationCause::ResourceTypeNotFound("UNKNOWN".into())]);
    }

    #[test]
    fn test_derived_availability_even_share() {
        let strategy = DeductionStrategy::by_derived_availability(
            None,
            4,
            capability(&[COMPUTE]),
            CapabilityConfig::new(),
        );
        let plan = strategy.plan(&ledger(dec!(100)), false, 10).unwrap();

        assert_eq!(plan.credits, dec!(25));
        assert_eq!(
            plan.limits,
            vec![SpendLimit {
                spend_type: COMPUTE.into(),
                limit: "50".into()
            }]
        );
    }

    #[test]
    fn test_derived_availability_user_cap() {
        let strategy = DeductionStrategy::by_derived_availability(
            Some(dec!(5)),
            2,
            capability(&[COMPUTE]),
            CapabilityConfig::new(),
        );
        let plan = strategy.plan(&ledger(dec!(100)), false, 10).unwrap();
        assert_eq!(plan.credits, dec!(5));
    }

    #[test]
    fn test_derived_availability_zero_slots() {
        let strategy = DeductionStrategy::by_derived_availability(
            None,
            0,
            capability(&[COMPUTE]),
            CapabilityConfig::new(),
        );
        assert_eq!(
            strategy.plan(&ledger(dec!(100)), false, 10),
            Err(ReportError::ZeroOpenSlots)
        );
    }

    #[test]
    fn test_derived_availability_truncates_share() {
        let strategy = DeductionStrategy::by_derived_availability(
            None,
            3,
            capability(&[COMPUTE]),
            CapabilityConfig::new(),
        );
        let plan = strategy.plan(&ledger(dec!(10)), false, 10).unwrap();
        assert_eq!(plan.credits, dec!(3.3333333333));
    }

    #[test]
    fn test_derived_availability_ratios() {
        let gas = gas_resource(1);
        let strategy = DeductionStrategy::by_derived_availability(
            None,
            1,
            capability(&[COMPUTE, &gas]),
            config(json!({ SPEND_RATIOS_KEY: { COMPUTE: "0.25", gas.as_str(): "0.75" } })),
        );
        let plan = strategy.plan(&ledger(dec!(8)), false, 10).unwrap();

        assert!(plan.causes.is_empty());
        assert_eq!(
            plan.limits,
            vec![
                SpendLimit {
                    spend_type: COMPUTE.into(),
                    limit: "4".into()
                },
                SpendLimit {
                    spend_type: gas,
                    limit: "6000000000".into()
                },
            ]
        );
    }

    #[test]
    fn test_derived_availability_in_metering_mode() {
        let strategy = DeductionStrategy::by_derived_availability(
            None,
            2,
            capability(&[COMPUTE]),
            CapabilityConfig::new(),
        );
        let plan = strategy.plan(&ledger(dec!(10)), true, 10).unwrap();

        assert_eq!(plan.credits, dec!(5));
        assert!(plan.limits.is_empty());
    }

    #[test]
    fn test_spend_ratio_count_mismatch() {
        let types = vec![COMPUTE.to_string(), NETWORK.to_string()];

        assert_eq!(
            spend_ratios(&types, &CapabilityConfig::new()),
            Err(DegradationCause::SpendRatioCountMismatch {
                ratios: 0,
                spend_types: 2
            })
        );
        assert_eq!(
            spend_ratios(&types, &config(json!({ SPEND_RATIOS_KEY: { COMPUTE: "1" } }))),
            Err(DegradationCause::SpendRatioCountMismatch {
                ratios: 1,
                spend_types: 2
            })
        );
    }

    #[test]
    fn test_spend_ratio_missing_dimension() {
        let types = vec![COMPUTE.to_string(), NETWORK.to_string()];
        let cfg = config(json!({ SPEND_RATIOS_KEY: { COMPUTE: "0.5", "OTHER": "0.5" } }));

        assert_eq!(
            spend_ratios(&types, &cfg),
            Err(DegradationCause::MissingSpendRatio(NETWORK.into()))
        );
    }

    #[test]
    fn test_spend_ratio_invalid_value() {
        let types = vec![COMPUTE.to_string(), NETWORK.to_string()];
        let cfg = config(json!({ SPEND_RATIOS_KEY: { COMPUTE: "half", NETWORK: 0.5 } }));

        assert!(matches!(
            spend_ratios(&types, &cfg),
            Err(DegradationCause::InvalidSpendRatio { .. })
        ));
    }

    #[test]
    fn test_single_dimension_ratio_is_one() {
        let types = vec![NETWORK.to_string()];
        assert_eq!(
            spend_ratios(&types, &CapabilityConfig::new()),
            Ok(vec![(NETWORK.to_string(), Decimal::ONE)])
        );
    }

    #[test]
    fn test_oversized_ratio_degrades() {
        let strategy = DeductionStrategy::by_derived_availability(
            None,
            1,
            capability(&[COMPUTE, NETWORK]),
            config(json!({
                SPEND_RATIOS_KEY: { COMPUTE: "79228162514264337593543950335", NETWORK: "1" }
            })),
        );
        let plan = strategy.plan(&ledger(dec!(100)), false, 10).unwrap();

        assert!(plan.limits.is_empty());
        assert!(matches!(
            plan.causes.as_slice(),
            [DegradationCause::InvalidSpendRatio { resource, .. }] if resource == COMPUTE
        ));
    }
}
