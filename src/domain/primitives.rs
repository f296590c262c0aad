//! Domain primitives: Address, TxHash, Timestamp, BlockRef.

use serde::{Deserialize, Serialize};
use std::fmt;

/// On-chain contract or wallet address, stored lower-case.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Create an Address, normalizing to lower-case.
    pub fn new(addr: impl Into<String>) -> Self {
        Address(addr.into().to_ascii_lowercase())
    }

    /// The all-zero address returned by factories for missing pairs.
    pub fn zero() -> Self {
        Address("0x0000000000000000000000000000000000000000".to_string())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty() || self.0.trim_start_matches("0x").chars().all(|c| c == '0')
    }

    /// Get the address as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Address::new(value)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Address::new(value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction hash (hex string).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxHash(pub String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        TxHash(hash.into().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block timestamp in seconds since Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub const SECONDS_PER_DAY: i64 = 86_400;

    pub fn new(secs: i64) -> Self {
        Timestamp(secs)
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    /// Whole days since epoch, used to key daily snapshots.
    pub fn day(&self) -> i64 {
        self.0.div_euclid(Self::SECONDS_PER_DAY)
    }

    /// UTC midnight of the containing day.
    pub fn day_start(&self) -> Timestamp {
        Timestamp(self.day() * Self::SECONDS_PER_DAY)
    }

    pub fn saturating_add(&self, secs: i64) -> Timestamp {
        Timestamp(self.0.saturating_add(secs))
    }

    pub fn seconds_since(&self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block the event was emitted in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRef {
    pub number: u64,
    pub timestamp: Timestamp,
}

impl BlockRef {
    pub fn new(number: u64, timestamp: i64) -> Self {
        Self {
            number,
            timestamp: Timestamp::new(timestamp),
        }
    }
}

/// Serde helpers for raw u128 token amounts, carried as decimal strings.
pub mod raw_amount {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s.parse::<u128>().map_err(de::Error::custom),
            Raw::Number(n) => Ok(n as u128),
        }
    }

    /// Same encoding for vectors of amounts.
    pub mod vec {
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        #[derive(Serialize, Deserialize)]
        struct Amount(#[serde(with = "super")] u128);

        pub fn serialize<S: Serializer>(values: &[u128], serializer: S) -> Result<S::Ok, S::Error> {
            let wrapped: Vec<Amount> = values.iter().map(|v| Amount(*v)).collect();
            wrapped.serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Vec<u128>, D::Error> {
            let wrapped: Vec<Amount> = Vec::deserialize(deserializer)?;
            Ok(wrapped.into_iter().map(|a| a.0).collect())
        }
    }
}

/// 256-bit on-chain words, as decimal strings.
pub mod raw_word {
    use ethnum::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => U256::from_str_radix(&s, 10).map_err(de::Error::custom),
            Raw::Number(n) => Ok(U256::from(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_is_lowercased() {
        let addr = Address::new("0xABCdef");
        assert_eq!(addr.as_str(), "0xabcdef");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0xabcdef\"");
        let back: Address = serde_json::from_str("\"0xABCDEF\"").unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_zero_address() {
        assert!(Address::zero().is_zero());
        assert!(Address::new("0x0").is_zero());
        assert!(!Address::new("0x01").is_zero());
    }

    #[test]
    fn test_timestamp_day() {
        let ts = Timestamp::new(86_400 * 3 + 100);
        assert_eq!(ts.day(), 3);
        assert_eq!(ts.day_start(), Timestamp::new(86_400 * 3));
    }

    #[test]
    fn test_raw_amount_serde() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Wrapper {
            #[serde(with = "raw_amount")]
            amount: u128,
            #[serde(with = "raw_amount::vec")]
            amounts: Vec<u128>,
        }
        let w = Wrapper {
            amount: 340_282_366_920_938_463_463_374_607_431_768_211_455,
            amounts: vec![1, 2],
        };
        let json = serde_json::to_string(&w).unwrap();
        assert!(json.contains("\"340282366920938463463374607431768211455\""));
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back, w);

        let numeric: Wrapper = serde_json::from_str(r#"{"amount":5,"amounts":["7"]}"#).unwrap();
        assert_eq!(numeric.amount, 5);
        assert_eq!(numeric.amounts, vec![7]);
    }
}
