// src/records.rs

use ethers::types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Per-token statistics record.
///
/// All fixed-point fields (`price`, `volume`, `market_cap`) use the
/// 18-decimal scale. A record is "present" once any authorized write has
/// occurred for its key; before that, reads return the zero-value record
/// (`TokenRecord::default()`), never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub name: String,
    pub price: U256,
    pub volume: U256,
    pub market_cap: U256,
    pub holders: u64,
}

/// Per-protocol statistics record.
///
/// `volume24h` is only ever written by the metrics-update path; the
/// full-record submit path never touches it, so it stays at zero until the
/// first metrics update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolRecord {
    pub name: String,
    pub tvl: U256,
    pub volume24h: U256,
    pub unique_users: u64,
}

/// Converts an 18-decimal fixed-point amount to a `Decimal` for display.
pub fn display_amount(value: U256) -> Result<Decimal, rust_decimal::Error> {
    let raw = Decimal::from_str(&value.to_string())?;
    Ok(raw / Decimal::from(10u128.pow(18)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_value_records() {
        let token = TokenRecord::default();
        assert!(token.name.is_empty());
        assert_eq!(token.price, U256::zero());
        assert_eq!(token.holders, 0);

        let protocol = ProtocolRecord::default();
        assert_eq!(protocol.tvl, U256::zero());
        assert_eq!(protocol.volume24h, U256::zero());
    }

    #[test]
    fn test_display_amount_scales_by_1e18() {
        let value = U256::exp10(18) * 100u64;
        let displayed = display_amount(value).unwrap();
        assert_eq!(displayed, Decimal::from(100));
    }
}
