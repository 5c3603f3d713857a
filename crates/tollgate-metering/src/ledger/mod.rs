//! Balance ledger
//!
//! Holds one execution's credit balance and resource conversion table.

pub mod balance;

pub use balance::BalanceStore;
