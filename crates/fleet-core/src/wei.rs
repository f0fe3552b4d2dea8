//! Base-10 string <-> `U256` conversion for 256-bit quantities.
//!
//! Every wire boundary (store columns, JSON payloads, `MAX_*_WEI` config
//! values) represents a 256-bit integer as a decimal string. Internally,
//! arithmetic is always `alloy::primitives::U256`. These two functions are
//! the only sanctioned crossing point; never parse or format wei by hand,
//! and never do arithmetic on the string form.

use alloy::primitives::U256;

use crate::error::{FleetError, Result};

/// Parse a base-10 decimal string into a `U256`.
///
/// # Errors
///
/// Returns [`FleetError::ConfigInvalid`] if `s` is not a valid base-10
/// unsigned integer.
pub fn parse_wei(s: &str) -> Result<U256> {
    U256::from_str_radix(s, 10)
        .map_err(|e| FleetError::ConfigInvalid(format!("invalid wei amount {s:?}: {e}")))
}

/// Format a `U256` as a base-10 decimal string for the wire.
#[must_use]
pub fn format_wei(amount: U256) -> String {
    amount.to_string()
}

/// `serde` helpers for `U256` fields that must round-trip as decimal strings.
///
/// Use with `#[serde(with = "crate::wei::serde_u256")]` on any field carrying
/// a 256-bit wei quantity.
pub mod serde_u256 {
    use alloy::primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize a `U256` as a decimal string.
    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Deserialize a `U256` from a decimal string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_wei(&s).map_err(serde::de::Error::custom)
    }

    /// The `Option<U256>` counterpart of [`serialize`]/[`deserialize`].
    pub mod option {
        use alloy::primitives::U256;
        use serde::{Deserialize, Deserializer, Serializer};

        /// Serialize an `Option<U256>` as an optional decimal string.
        pub fn serialize<S: Serializer>(
            value: &Option<U256>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => serializer.serialize_some(&v.to_string()),
                None => serializer.serialize_none(),
            }
        }

        /// Deserialize an `Option<U256>` from an optional decimal string.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<U256>, D::Error> {
            let s: Option<String> = Option::deserialize(deserializer)?;
            s.map(|s| super::super::parse_wei(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_u256_max_width() {
        let s = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
        let amount = parse_wei(s).unwrap();
        assert_eq!(format_wei(amount), s);
    }

    #[test]
    fn rejects_non_numeric() {
        assert!(parse_wei("not-a-number").is_err());
        assert!(parse_wei("-5").is_err());
    }

    #[test]
    fn zero_round_trips() {
        assert_eq!(format_wei(parse_wei("0").unwrap()), "0");
    }
}
