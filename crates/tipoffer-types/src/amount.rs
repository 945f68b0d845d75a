//! Serde helpers for 128-bit amounts.
//!
//! Amounts are counted in the smallest unit of each asset and routinely
//! exceed `u64`. They are persisted as decimal strings so that any JSON
//! reader keeps full precision.
//!
//! ```ignore
//! #[serde(with = "tipoffer_types::amount")]
//! pub amount: u128,
//! ```

use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S: Serializer>(amount: &u128, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(amount)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

/// Same encoding for maps whose values are amounts.
pub mod map {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer, ser::SerializeMap};

    pub fn serialize<K, S>(map: &BTreeMap<K, u128>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Serialize,
        S: Serializer,
    {
        let mut out = serializer.serialize_map(Some(map.len()))?;
        for (key, amount) in map {
            out.serialize_entry(key, &amount.to_string())?;
        }
        out.end()
    }

    pub fn deserialize<'de, K, D>(deserializer: D) -> Result<BTreeMap<K, u128>, D::Error>
    where
        K: Deserialize<'de> + Ord,
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<K, String>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(key, amount)| {
                amount
                    .parse()
                    .map(|parsed| (key, parsed))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}
