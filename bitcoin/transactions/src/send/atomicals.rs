use serde::{Deserialize, Serialize};

use super::{default_true, ensure_only, Draft, SendOutcome};
use crate::calc_fee::FeeEstimator;
use crate::classifier::{total_value, AssetKind};
use crate::config::TxOptions;
use crate::error::{TxBuildError, UnsafeReason};
use crate::utxo::SpendableOutput;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAtomicalsFtRequest {
    pub asset_utxos: Vec<SpendableOutput>,
    pub btc_utxos: Vec<SpendableOutput>,
    pub to_address: String,
    /// Receives the token remainder.
    pub change_asset_address: String,
    /// Token amount, one unit per sat.
    #[serde(
        serialize_with = "crate::serde::serialize_u64",
        deserialize_with = "crate::serde::deserialize_u64"
    )]
    pub send_amount: u64,
    pub change_address: String,
    /// Fail instead of letting the token inputs pay the fee.
    #[serde(default = "default_true")]
    pub force_as_fee: bool,
    #[serde(flatten)]
    pub options: TxOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAtomicalsNftRequest {
    pub asset_utxo: SpendableOutput,
    pub btc_utxos: Vec<SpendableOutput>,
    pub to_address: String,
    pub change_address: String,
    #[serde(flatten)]
    pub options: TxOptions,
}

/// Sends `send_amount` fungible-token sats and returns the remainder to the
/// asset change address.
pub async fn send_atomicals_ft(
    request: &SendAtomicalsFtRequest,
    estimator: &FeeEstimator,
) -> Result<SendOutcome, TxBuildError> {
    let mut draft = Draft::new(
        &request.options,
        &request.change_address,
        &request.btc_utxos,
        estimator,
    )?;
    ensure_only(&request.asset_utxos, AssetKind::FungibleToken)?;

    let available = total_value(&request.asset_utxos);
    if request.send_amount > available {
        return Err(TxBuildError::InsufficientAssetUtxo {
            required: request.send_amount.into(),
            available: available.into(),
        });
    }

    for asset in &request.asset_utxos {
        draft.add_asset_input(asset)?;
    }

    let to_address = draft.address(&request.to_address)?;
    draft.builder.add_output(to_address, request.send_amount);

    let change = available - request.send_amount;
    if change > 0 {
        let change_asset_address = draft.address(&request.change_asset_address)?;
        draft.builder.add_output(change_asset_address, change);
    }

    draft.fund(&request.btc_utxos, request.force_as_fee).await
}

/// Moves the output holding exactly one non-fungible token.
pub async fn send_atomicals_nft(
    request: &SendAtomicalsNftRequest,
    estimator: &FeeEstimator,
) -> Result<SendOutcome, TxBuildError> {
    let mut draft = Draft::new(
        &request.options,
        &request.change_address,
        &request.btc_utxos,
        estimator,
    )?;

    let asset = &request.asset_utxo;
    ensure_only(std::slice::from_ref(asset), AssetKind::NonFungibleToken)?;
    match asset.atomicals.len() {
        0 => return Err(TxBuildError::UnsafeUtxoSet(UnsafeReason::NoAssetToSend)),
        1 => {}
        _ => return Err(TxBuildError::MultipleAssetsInOneOutput { index: 0 }),
    }

    draft.add_asset_input(asset)?;
    let to_address = draft.address(&request.to_address)?;
    draft.builder.add_output(to_address, asset.satoshis);

    draft.fund(&request.btc_utxos, true).await
}
