use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RuneIdError;

/// Identifies a rune by the block and transaction index of its etching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RuneId {
    pub block: u64,
    pub tx: u32,
}

impl RuneId {
    pub const fn new(block: u64, tx: u32) -> Self {
        Self { block, tx }
    }

    /// Unpacks the `block << 16 | tx` integer form used by some indexers.
    pub fn from_u128(n: u128) -> Result<Self, RuneIdError> {
        let block = u64::try_from(n >> 16).map_err(|_| RuneIdError::OutOfRange(n))?;
        let tx = (n & 0xffff) as u32;
        Ok(Self { block, tx })
    }
}

impl fmt::Display for RuneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block, self.tx)
    }
}

impl FromStr for RuneId {
    type Err = RuneIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (block, tx) = s
            .split_once(':')
            .ok_or_else(|| RuneIdError::MissingSeparator(s.to_string()))?;

        let block = block
            .parse()
            .map_err(|_| RuneIdError::InvalidComponent(block.to_string()))?;
        let tx = tx
            .parse()
            .map_err(|_| RuneIdError::InvalidComponent(tx.to_string()))?;

        Ok(Self { block, tx })
    }
}

impl Serialize for RuneId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RuneId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
