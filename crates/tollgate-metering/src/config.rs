//! Metering configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tollgate_common::decimal::{DEFAULT_GAS_TOKEN_DECIMALS, DEFAULT_PRECISION};
use tollgate_common::{Result, TollgateError};

/// Ledger and billing client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeteringConfig {
    /// Billing service gRPC endpoint
    pub billing_addr: String,
    /// Receipt submission retries after the first attempt
    pub receipt_max_retries: u32,
    /// Fixed delay between receipt submission attempts
    pub receipt_retry_delay_ms: u64,
    /// Decimals of the chains' native gas token
    pub gas_token_decimals: u32,
    /// Fractional digits kept for credit amounts
    pub decimal_precision: u32,
}

impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            billing_addr: "http://127.0.0.1:50060".to_string(),
            receipt_max_retries: 3,
            receipt_retry_delay_ms: 1000,
            gas_token_decimals: DEFAULT_GAS_TOKEN_DECIMALS,
            decimal_precision: DEFAULT_PRECISION,
        }
    }
}

impl MeteringConfig {
    /// Load configuration from environment and an optional `.env` file
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();

        if let Ok(addr) = std::env::var("TOLLGATE_BILLING_ADDR") {
            cfg.billing_addr = addr;
        }
        if let Some(v) = parse_env("TOLLGATE_RECEIPT_MAX_RETRIES")? {
            cfg.receipt_max_retries = v;
        }
        if let Some(v) = parse_env("TOLLGATE_RECEIPT_RETRY_DELAY_MS")? {
            cfg.receipt_retry_delay_ms = v;
        }
        if let Some(v) = parse_env("TOLLGATE_GAS_TOKEN_DECIMALS")? {
            cfg.gas_token_decimals = v;
        }
        if let Some(v) = parse_env("TOLLGATE_DECIMAL_PRECISION")? {
            cfg.decimal_precision = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the decimal type cannot represent
    pub fn validate(&self) -> Result<()> {
        // 96-bit mantissa holds at most 28 fractional digits
        if self.decimal_precision > 28 {
            return Err(TollgateError::Config(format!(
                "decimal_precision {} exceeds 28",
                self.decimal_precision
            )));
        }
        if self.gas_token_decimals > 28 {
            return Err(TollgateError::Config(format!(
                "gas_token_decimals {} exceeds 28",
                self.gas_token_decimals
            )));
        }
        Ok(())
    }

    pub fn receipt_retry_delay(&self) -> Duration {
        Duration::from_millis(self.receipt_retry_delay_ms)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| TollgateError::Config(format!("invalid value for {}: {:?}", key, raw))),
        Err(_) => Ok(None),
    }
}
