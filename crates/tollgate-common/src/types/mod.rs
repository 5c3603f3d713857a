//! Core data types for the Tollgate metering ledger

pub mod labels;
pub mod resource;
pub mod spend;
