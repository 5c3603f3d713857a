//! Balance store - one execution's credit balance and conversion table
//!
//! Credits are the universal billing unit. The store keeps:
//! - The current balance, mutated only through `add`/`minus`/`set`
//! - Cumulative spent credits, which never decrease
//! - Immutable per-resource conversion rates derived from the rate card
//!
//! Reads take the shared lock; mutations take the exclusive lock.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tollgate_common::decimal::{self, DEFAULT_PRECISION};
use tollgate_common::types::resource;
use tollgate_common::{LedgerError, RateCard};

#[derive(Debug, Default)]
struct Balances {
    balance: Decimal,
    spent: Decimal,
}

/// Credit balance with guarded add/subtract and resource conversions
#[derive(Debug)]
pub struct BalanceStore {
    state: RwLock<Balances>,
    /// Credits per unit for regular dimensions, native units per credit for gas
    conversions: HashMap<String, Decimal>,
    /// Fractional digits kept for gas conversions
    precision: u32,
}

impl BalanceStore {
    /// Create a store from a starting balance and a rate card
    ///
    /// Rate card entries are "units per credit". Regular dimensions are
    /// stored as their reciprocal so conversion to credits multiplies.
    pub fn new(starting_balance: Decimal, rate_card: &RateCard) -> Self {
        Self::with_precision(starting_balance, rate_card, DEFAULT_PRECISION)
    }

    pub fn with_precision(starting_balance: Decimal, rate_card: &RateCard, precision: u32) -> Self {
        let conversions = rate_card
            .iter()
            .map(|(resource, units_per_credit)| {
                let rate = if resource::is_gas(resource) {
                    units_per_credit
                } else {
                    Decimal::ONE
                        .checked_div(units_per_credit)
                        .unwrap_or(Decimal::ZERO)
                };
                (resource.to_string(), rate)
            })
            .collect();

        Self {
            state: RwLock::new(Balances {
                balance: starting_balance,
                spent: Decimal::ZERO,
            }),
            conversions,
            precision,
        }
    }

    /// Current balance
    pub fn get(&self) -> Decimal {
        self.state.read().balance
    }

    /// Cumulative credits consumed since the last `set`
    pub fn spent(&self) -> Decimal {
        self.state.read().spent
    }

    /// Whether a conversion rate exists for the resource
    pub fn has_resource(&self, resource: &str) -> bool {
        self.conversions.contains_key(resource)
    }

    /// Convert a native resource amount to credits
    ///
    /// Unknown resources return `ResourceTypeNotFound`; callers fall back to
    /// the unconverted amount.
    pub fn convert_to_balance(&self, resource: &str, amount: Decimal) -> Result<Decimal, LedgerError> {
        let _guard = self.state.read();
        let rate = self.rate(resource)?;

        if resource::is_gas(resource) {
            if rate.is_zero() {
                return Ok(Decimal::ZERO);
            }
            let credits = amount
                .checked_div(rate)
                .ok_or(LedgerError::InvalidAmount(amount))?;
            return Ok(decimal::round_to(credits, self.precision));
        }

        amount
            .checked_mul(rate)
            .ok_or(LedgerError::InvalidAmount(amount))
    }

    /// Convert credits to a native resource amount
    pub fn convert_from_balance(&self, resource: &str, credits: Decimal) -> Result<Decimal, LedgerError> {
        let _guard = self.state.read();
        let rate = self.rate(resource)?;

        if resource::is_gas(resource) {
            // Gas is an integer-native unit
            let amount = credits
                .checked_mul(rate)
                .ok_or(LedgerError::InvalidAmount(credits))?;
            return Ok(decimal::round_to(amount, 0));
        }

        if rate.is_zero() {
            return Ok(Decimal::ZERO);
        }
        credits
            .checked_div(rate)
            .ok_or(LedgerError::InvalidAmount(credits))
    }

    /// Credit the balance
    pub fn add(&self, amount: Decimal) -> Result<(), LedgerError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut state = self.state.write();
        state.balance = state
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::InvalidAmount(amount))?;
        Ok(())
    }

    /// Debit the balance, rejecting overdraft
    pub fn minus(&self, amount: Decimal) -> Result<(), LedgerError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut state = self.state.write();
        if amount > state.balance {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available: state.balance,
            });
        }

        state.balance -= amount;
        Ok(())
    }

    /// Convert a resource amount to credits and credit the balance
    pub fn add_as(&self, resource: &str, amount: Decimal) -> Result<(), LedgerError> {
        let credits = self.convert_to_balance(resource, amount)?;
        self.add(credits)
    }

    /// Convert a resource amount to credits and debit the balance
    pub fn minus_as(&self, resource: &str, amount: Decimal) -> Result<(), LedgerError> {
        let credits = self.convert_to_balance(resource, amount)?;
        self.minus(credits)
    }

    /// Replace the balance and reset the spent counter
    pub fn set(&self, amount: Decimal) {
        let mut state = self.state.write();
        state.balance = amount;
        state.spent = Decimal::ZERO;
    }

    /// Record credits actually consumed
    pub fn add_spent(&self, amount: Decimal) -> Result<(), LedgerError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut state = self.state.write();
        state.spent = state
            .spent
            .checked_add(amount)
            .ok_or(LedgerError::InvalidAmount(amount))?;
        Ok(())
    }

    fn rate(&self, resource: &str) -> Result<Decimal, LedgerError> {
        self.conversions
            .get(resource)
            .copied()
            .ok_or_else(|| LedgerError::ResourceTypeNotFound(resource.to_string()))
    }
}

impl std::fmt::Display for BalanceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        write!(
            f,
            "BalanceStore(balance={}, spent={}, resources={})",
            state.balance,
            state.spent,
            self.conversions.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tollgate_common::types::resource::{gas_resource, COMPUTE, NETWORK};

    fn rate_card() -> RateCard {
        RateCard::new()
            .with_rate(COMPUTE, dec!(2))
            .with_rate(NETWORK, dec!(3))
            .with_rate(gas_resource(1), dec!(1000000000))
    }

    #[test]
    fn test_add_minus() {
        let store = BalanceStore::new(dec!(100), &rate_card());

        store.add(dec!(10)).unwrap();
        assert_eq!(store.get(), dec!(110));

        store.minus(dec!(30)).unwrap();
        assert_eq!(store.get(), dec!(80));
    }

    #[test]
    fn test_negative_amounts_rejected() {
        let store = BalanceStore::new(dec!(100), &rate_card());

        assert_eq!(store.add(dec!(-1)), Err(LedgerError::InvalidAmount(dec!(-1))));
        assert_eq!(store.minus(dec!(-1)), Err(LedgerError::InvalidAmount(dec!(-1))));
        assert_eq!(store.add_spent(dec!(-1)), Err(LedgerError::InvalidAmount(dec!(-1))));
        assert_eq!(store.get(), dec!(100));
    }

    #[test]
    fn test_no_overdraft() {
        let store = BalanceStore::new(dec!(10), &rate_card());

        let result = store.minus(dec!(10.0000000001));
        assert!(matches!(result, Err(LedgerError::InsufficientBalance { .. })));
        assert_eq!(store.get(), dec!(10));

        store.minus(dec!(10)).unwrap();
        assert_eq!(store.get(), Decimal::ZERO);
        assert!(store.minus(dec!(0.0000000001)).is_err());
        assert!(store.get() >= Decimal::ZERO);
    }

    #[test]
    fn test_convert_regular_dimension() {
        let store = BalanceStore::new(dec!(0), &rate_card());

        // 2 units per credit
        assert_eq!(store.convert_to_balance(COMPUTE, dec!(2)).unwrap(), dec!(1));
        assert_eq!(store.convert_from_balance(COMPUTE, dec!(1)).unwrap(), dec!(2));
    }

    #[test]
    fn test_conversion_round_trip() {
        let store = BalanceStore::new(dec!(0), &rate_card());
        let tolerance = dec!(0.0000000001);

        for amount in [dec!(1), dec!(7), dec!(0.5), dec!(12345.678), dec!(1000000)] {
            let credits = store.convert_to_balance(NETWORK, amount).unwrap();
            let back = store.convert_from_balance(NETWORK, credits).unwrap();
            assert!((back - amount).abs() <= tolerance, "{amount} -> {back}");
        }
    }

    #[test]
    fn test_convert_gas_dimension() {
        let store = BalanceStore::new(dec!(0), &rate_card());
        let gas = gas_resource(1);

        // 1e9 native units per credit, divided and rounded to ten digits
        assert_eq!(store.convert_to_balance(&gas, dec!(1500000000)).unwrap(), dec!(1.5));
        assert_eq!(store.convert_to_balance(&gas, dec!(1)).unwrap(), dec!(0.000000001));
        assert_eq!(store.convert_to_balance(&gas, dec!(0.01)).unwrap(), Decimal::ZERO);

        // Multiplied back and rounded to whole units
        assert_eq!(store.convert_from_balance(&gas, dec!(1.5)).unwrap(), dec!(1500000000));
        assert_eq!(store.convert_from_balance(&gas, dec!(0.0000000015)).unwrap(), dec!(2));
    }

    #[test]
    fn test_unknown_resource() {
        let store = BalanceStore::new(dec!(10), &rate_card());

        assert_eq!(
            store.convert_to_balance("UNKNOWN", dec!(5)),
            Err(LedgerError::ResourceTypeNotFound("UNKNOWN".into()))
        );
        assert!(store.minus_as("UNKNOWN", dec!(5)).is_err());
        assert_eq!(store.get(), dec!(10));
    }

    #[test]
    fn test_zero_rate_yields_zero() {
        let card = RateCard::new().with_rate(COMPUTE, Decimal::ZERO);
        let store = BalanceStore::new(dec!(10), &card);

        assert_eq!(store.convert_to_balance(COMPUTE, dec!(5)).unwrap(), Decimal::ZERO);
        assert_eq!(store.convert_from_balance(COMPUTE, dec!(5)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_as_wrappers() {
        let store = BalanceStore::new(dec!(10), &rate_card());

        store.minus_as(COMPUTE, dec!(4)).unwrap();
        assert_eq!(store.get(), dec!(8));

        store.add_as(COMPUTE, dec!(2)).unwrap();
        assert_eq!(store.get(), dec!(9));

        assert!(matches!(
            store.minus_as(COMPUTE, dec!(20)),
            Err(LedgerError::InsufficientBalance { .. })
        ));
        assert_eq!(store.get(), dec!(9));
    }

    #[test]
    fn test_set_resets_spent() {
        let store = BalanceStore::new(dec!(0), &rate_card());

        store.add_spent(dec!(3)).unwrap();
        store.add_spent(dec!(2)).unwrap();
        assert_eq!(store.spent(), dec!(5));

        store.set(dec!(500));
        assert_eq!(store.get(), dec!(500));
        assert_eq!(store.spent(), Decimal::ZERO);
    }

    #[test]
    fn test_overflow_is_rejected() {
        let store = BalanceStore::new(Decimal::MAX, &rate_card());

        assert_eq!(store.add(dec!(1)), Err(LedgerError::InvalidAmount(dec!(1))));
        assert_eq!(store.get(), Decimal::MAX);

        store.add_spent(Decimal::MAX).unwrap();
        assert!(store.add_spent(dec!(1)).is_err());
        assert_eq!(store.spent(), Decimal::MAX);
    }
}
