//! 256-bit amount helpers.
//!
//! Stored and replayed entities carry wei amounts as decimal strings, the
//! same shape the read layer hands to clients.

use alloy::primitives::{I256, U256};

/// 1 ETH in wei
pub const WEI_PER_ETH: u64 = 1_000_000_000_000_000_000;

/// Reinterpret an unsigned amount as signed, saturating at `I256::MAX`.
pub fn to_signed(value: U256) -> I256 {
    I256::try_from(value).unwrap_or(I256::MAX)
}

/// Whole ETH to wei
pub fn eth(amount: u64) -> U256 {
    U256::from(amount) * U256::from(WEI_PER_ETH)
}

pub mod u256_dec {
    use alloy::primitives::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        U256::from_str(raw.trim()).map_err(D::Error::custom)
    }
}

pub mod i256_dec {
    use alloy::primitives::I256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &I256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<I256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        I256::from_dec_str(raw.trim()).map_err(D::Error::custom)
    }
}

pub mod opt_i256_dec {
    use alloy::primitives::I256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<I256>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<I256>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| I256::from_dec_str(raw.trim()).map_err(D::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Holder {
        #[serde(with = "u256_dec")]
        amount: U256,
        #[serde(with = "i256_dec")]
        pnl: I256,
        #[serde(default, with = "opt_i256_dec")]
        price: Option<I256>,
    }

    #[test]
    fn test_amounts_use_decimal_strings() {
        let holder = Holder {
            amount: eth(2),
            pnl: I256::from_dec_str("-1000000000000000000").unwrap(),
            price: None,
        };

        let json = serde_json::to_value(&holder).unwrap();
        assert_eq!(json["amount"], "2000000000000000000");
        assert_eq!(json["pnl"], "-1000000000000000000");
        assert!(json["price"].is_null());
    }

    #[test]
    fn test_missing_optional_price_deserializes_as_none() {
        let parsed: Holder =
            serde_json::from_str(r#"{"amount":"5","pnl":"0"}"#).unwrap();
        assert_eq!(parsed.amount, U256::from(5u64));
        assert_eq!(parsed.price, None);
    }

    #[test]
    fn test_to_signed_saturates() {
        assert_eq!(to_signed(U256::from(7u64)), I256::from_dec_str("7").unwrap());
        assert_eq!(to_signed(U256::MAX), I256::MAX);
    }
}
