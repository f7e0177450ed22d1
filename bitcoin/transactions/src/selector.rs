//! Greedy funding of a transaction from plain outputs.
//!
//! Selection runs in three steps over an explicit [`PlanningState`]:
//! [`CoinSelector::seed`] measures the fee once with an oversized placeholder
//! input, [`CoinSelector::accumulate`] adds inputs while charging each its
//! marginal weight, and [`CoinSelector::settle`] sizes or drops the change.

use ordwallet_math::{ceil_div, safe_add, safe_mul, safe_sub};
use tracing::{debug, warn};

use crate::address_type::dust_limit_for_script;
use crate::builder::TransactionBuilder;
use crate::calc_fee::FeeEstimator;
use crate::classifier::select_plain;
use crate::error::TxBuildError;
use crate::fee_rate::FEE_SCALE;
use crate::signer::ToSignInput;
use crate::utxo::SpendableOutput;

/// Value of the placeholder input used to seed the fee: all bitcoin that
/// will ever exist, so it always covers the outputs.
pub const PLACEHOLDER_SATOSHIS: u64 = 2_100_000_000_000_000;

/// Scratch state of one selection run, kept outside the builder.
#[derive(Debug, Clone)]
pub struct PlanningState {
    pending: Vec<SpendableOutput>,
    /// Running fee in 1/`FEE_SCALE` sats.
    planned_fee: u128,
    to_sign_inputs: Vec<ToSignInput>,
}

impl PlanningState {
    /// Running fee rounded up to whole sats.
    pub fn planned_fee(&self) -> Result<u64, TxBuildError> {
        let fee = ceil_div(self.planned_fee, FEE_SCALE as u128)?;
        u64::try_from(fee).map_err(|_| TxBuildError::CalcOverflow)
    }

    pub fn to_sign_inputs(&self) -> &[ToSignInput] {
        &self.to_sign_inputs
    }

    pub fn into_to_sign_inputs(self) -> Vec<ToSignInput> {
        self.to_sign_inputs
    }
}

pub struct CoinSelector<'a> {
    estimator: &'a FeeEstimator,
}

impl<'a> CoinSelector<'a> {
    pub fn new(estimator: &'a FeeEstimator) -> Self {
        Self { estimator }
    }

    /// Adds inputs from `funding` until the builder pays its outputs and
    /// fee, then sets the change. Outputs carrying assets are skipped.
    ///
    /// With `force_as_fee` an empty funding set is an error; otherwise the
    /// inputs already bound must cover the fee on their own.
    pub async fn fund(
        &self,
        builder: &mut TransactionBuilder,
        funding: &[SpendableOutput],
        force_as_fee: bool,
    ) -> Result<Vec<ToSignInput>, TxBuildError> {
        let plain: Vec<SpendableOutput> = funding.iter().filter(|u| u.is_plain()).cloned().collect();
        if plain.len() < funding.len() {
            warn!(
                skipped = funding.len() - plain.len(),
                "skipping funding utxos that carry assets"
            );
        }

        if plain.is_empty() {
            if force_as_fee {
                let shortfall = self.shortfall_without_funding(builder).await?;
                return Err(TxBuildError::InsufficientFundingUtxo { shortfall });
            }
            self.fund_from_bound_inputs(builder).await?;
            return Ok(Vec::new());
        }

        let mut state = self.seed(builder, plain).await?;
        self.accumulate(builder, &mut state)?;
        self.settle(builder, &state)?;

        Ok(state.into_to_sign_inputs())
    }

    /// Measures the fee with a change slot and a placeholder input shaped
    /// like the first candidate, then takes the placeholder back out.
    pub async fn seed(
        &self,
        builder: &mut TransactionBuilder,
        pending: Vec<SpendableOutput>,
    ) -> Result<PlanningState, TxBuildError> {
        let first = pending.first().ok_or(TxBuildError::InsufficientFundingUtxo {
            shortfall: builder.total_output()?,
        })?;

        let mut placeholder = first.clone();
        placeholder.satoshis = PLACEHOLDER_SATOSHIS;
        placeholder.prev_tx = None;

        builder.add_change_output(0);
        let index = builder.add_estimation_input(placeholder)?;
        let estimate = self.estimator.estimate_size(builder).await;
        builder.remove_last_input();
        let estimate = estimate?;

        let fee_rate = builder.fee_rate();
        let base_fee = fee_rate.fee_for_vsize(estimate.vsize)?;
        let placeholder_weight = estimate
            .input_weights
            .get(index)
            .copied()
            .unwrap_or_else(|| first.input_weight());

        let planned_fee = safe_mul(base_fee as u128, FEE_SCALE as u128)?
            .saturating_sub(fee_rate.scaled_fee_for_weight(placeholder_weight)?);

        debug!(base_fee, placeholder_weight, "seeded fee estimate");

        Ok(PlanningState {
            pending,
            planned_fee,
            to_sign_inputs: Vec::new(),
        })
    }

    /// Adds pending inputs until inputs cover outputs plus the running fee.
    pub fn accumulate(
        &self,
        builder: &mut TransactionBuilder,
        state: &mut PlanningState,
    ) -> Result<(), TxBuildError> {
        let fee_rate = builder.fee_rate();
        let mut cursor = 0;

        loop {
            let target = safe_add(builder.total_output()?, state.planned_fee()?)?;
            let total_input = builder.total_input()?;
            if total_input >= target {
                break;
            }

            let shortfall = target - total_input;
            let (selected, _) = select_plain(&state.pending[cursor..], shortfall);
            if selected.is_empty() {
                return Err(TxBuildError::InsufficientFundingUtxo { shortfall });
            }
            cursor += selected.len();

            for utxo in selected {
                let index = builder.add_input(utxo.clone())?;
                state.to_sign_inputs.push(ToSignInput::new(index, utxo.pubkey));

                let marginal = utxo.input_weight();
                state.planned_fee = safe_add(state.planned_fee, fee_rate.scaled_fee_for_weight(marginal)?)?;

                debug!(
                    index,
                    outpoint = %utxo.outpoint(),
                    satoshis = utxo.satoshis,
                    "added funding input"
                );
            }
        }

        state.pending.drain(..cursor);
        Ok(())
    }

    /// Sets the change to whatever the running fee leaves over, or drops it
    /// when that is not above the change address's dust limit.
    pub fn settle(
        &self,
        builder: &mut TransactionBuilder,
        state: &PlanningState,
    ) -> Result<(), TxBuildError> {
        let fee = state.planned_fee()?;
        builder.remove_change_output();
        let available = safe_sub(builder.total_input()?, builder.total_output()?)?;
        let change = available.saturating_sub(fee);
        set_or_drop_change(builder, change);
        debug!(fee, change, "settled change");
        Ok(())
    }

    /// Pays the fee out of the inputs already bound, using one exact
    /// estimate.
    async fn fund_from_bound_inputs(
        &self,
        builder: &mut TransactionBuilder,
    ) -> Result<(), TxBuildError> {
        if builder.inputs().is_empty() {
            return Err(TxBuildError::InsufficientFundingUtxo {
                shortfall: builder.total_output()?,
            });
        }

        builder.add_change_output(0);
        let fee = self.estimator.estimate_fee(builder).await?;
        builder.remove_change_output();

        let available = safe_sub(builder.total_input()?, builder.total_output()?).unwrap_or(0);
        if available < fee {
            return Err(TxBuildError::InsufficientFundingUtxo {
                shortfall: fee - available,
            });
        }

        set_or_drop_change(builder, available - fee);
        Ok(())
    }

    async fn shortfall_without_funding(
        &self,
        builder: &TransactionBuilder,
    ) -> Result<u64, TxBuildError> {
        if builder.inputs().is_empty() {
            return Ok(builder.total_output()?.max(1));
        }
        let fee = self.estimator.estimate_fee(builder).await?;
        let available = safe_sub(builder.total_input()?, builder.total_output()?).unwrap_or(0);
        Ok(fee.saturating_sub(available).max(1))
    }
}

fn set_or_drop_change(builder: &mut TransactionBuilder, change: u64) {
    let dust = dust_limit_for_script(&builder.change_address().script_pubkey());
    if change > dust {
        builder.add_change_output(change);
    } else {
        builder.remove_change_output();
    }
}
