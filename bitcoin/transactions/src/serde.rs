use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use bitcoin::consensus::encode;
use bitcoin::Transaction;
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};

pub fn serialize_u128<S>(num: &u128, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&num.to_string())
}

/// Accepts a JSON number or a decimal string.
pub fn deserialize_u128<'de, D>(deserializer: D) -> Result<u128, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(NumberOrString::<u128>(PhantomData))
}

pub fn serialize_u64<S>(num: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&num.to_string())
}

/// Accepts a JSON number or a decimal string.
pub fn deserialize_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(NumberOrString::<u64>(PhantomData))
}

struct NumberOrString<T>(PhantomData<T>);

impl<'de, T> Visitor<'de> for NumberOrString<T>
where
    T: FromStr + TryFrom<u64>,
    <T as FromStr>::Err: fmt::Display,
{
    type Value = T;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a non-negative integer or a decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<T, E> {
        T::try_from(v).map_err(|_| E::custom(format!("{v} is out of range")))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<T, E> {
        let v = u64::try_from(v).map_err(|_| E::custom(format!("{v} is negative")))?;
        self.visit_u64(v)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<T, E> {
        v.parse::<T>().map_err(E::custom)
    }
}

/// Optional previous transaction as consensus-encoded hex.
pub mod hex_transaction {
    use super::*;
    use serde::Deserialize;

    pub fn serialize<S>(tx: &Option<Transaction>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match tx {
            Some(tx) => serializer.serialize_some(&encode::serialize_hex(tx)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Transaction>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(s) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if s.is_empty() {
            return Ok(None);
        }

        let bytes = hex::decode(&s).map_err(de::Error::custom)?;
        encode::deserialize(&bytes)
            .map(Some)
            .map_err(de::Error::custom)
    }
}
