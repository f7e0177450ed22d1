use std::fmt;

use ordwallet_math::{mul_div_ceil, safe_mul, MathError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TxBuildError;

const MSAT_PER_SAT: u64 = 1_000;
const WU_PER_VB: u64 = 4;

/// Fees are charged in sats, rates are kept at milli-sat resolution.
pub const FEE_SCALE: u64 = MSAT_PER_SAT * WU_PER_VB;

/// Keeps absurd inputs from overflowing fee arithmetic: 10 BTC per vbyte.
const MAX_SAT_PER_VB: f64 = 1_000_000_000.0;

/// Relative error tolerated when turning a float rate into msat.
const FLOAT_NOISE: f64 = 16.0 * f64::EPSILON;

/// A fee rate in sats per virtual byte, held exactly at 1/1000 sat
/// resolution so repeated charges never drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FeeRate {
    msat_per_vb: u64,
}

impl FeeRate {
    /// Whole sats per vbyte, or `None` when the rate does not fit in msat.
    pub const fn from_sat_per_vb(sat_per_vb: u64) -> Option<Self> {
        match sat_per_vb.checked_mul(MSAT_PER_SAT) {
            Some(msat_per_vb) => Some(Self { msat_per_vb }),
            None => None,
        }
    }

    pub const fn from_msat_per_vb(msat_per_vb: u64) -> Self {
        Self { msat_per_vb }
    }

    pub const fn msat_per_vb(&self) -> u64 {
        self.msat_per_vb
    }

    pub fn sat_per_vb(&self) -> f64 {
        self.msat_per_vb as f64 / MSAT_PER_SAT as f64
    }

    /// Fee for a transaction of `vsize` virtual bytes, rounded up.
    pub fn fee_for_vsize(&self, vsize: u64) -> Result<u64, MathError> {
        mul_div_ceil(vsize, self.msat_per_vb, MSAT_PER_SAT)
    }

    /// Fee for `weight` weight units, rounded up.
    pub fn fee_for_weight(&self, weight: u64) -> Result<u64, MathError> {
        mul_div_ceil(weight, self.msat_per_vb, FEE_SCALE)
    }

    /// Unrounded fee for `weight`, in units of 1/[`FEE_SCALE`] sat.
    pub fn scaled_fee_for_weight(&self, weight: u64) -> Result<u128, MathError> {
        safe_mul(weight as u128, self.msat_per_vb as u128)
    }
}

impl TryFrom<f64> for FeeRate {
    type Error = TxBuildError;

    fn try_from(sat_per_vb: f64) -> Result<Self, Self::Error> {
        if !sat_per_vb.is_finite() || sat_per_vb < 0.0 || sat_per_vb > MAX_SAT_PER_VB {
            return Err(TxBuildError::InvalidFeeRate(sat_per_vb.to_string()));
        }

        // Round up so the stored rate is never below the requested one, but
        // let products like 0.1 * 1000 that land next to an integer snap to it.
        let scaled = sat_per_vb * MSAT_PER_SAT as f64;
        let nearest = scaled.round();
        let msat_per_vb = if (scaled - nearest).abs() <= scaled.max(1.0) * FLOAT_NOISE {
            nearest
        } else {
            scaled.ceil()
        };
        Ok(Self {
            msat_per_vb: msat_per_vb as u64,
        })
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sat/vB", self.sat_per_vb())
    }
}

impl Serialize for FeeRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.sat_per_vb())
    }
}

impl<'de> Deserialize<'de> for FeeRate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let sat_per_vb = f64::deserialize(deserializer)?;
        FeeRate::try_from(sat_per_vb).map_err(serde::de::Error::custom)
    }
}
