use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ensure_plain_funding, Draft, SendOutcome};
use crate::address_type::dust_limit_for_script;
use crate::builder::{parse_address, TransactionBuilder};
use crate::calc_fee::FeeEstimator;
use crate::config::TxOptions;
use crate::error::TxBuildError;
use crate::signer::ToSignInput;
use crate::utxo::SpendableOutput;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub address: String,
    #[serde(
        serialize_with = "crate::serde::serialize_u64",
        deserialize_with = "crate::serde::deserialize_u64"
    )]
    pub satoshis: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBtcRequest {
    pub btc_utxos: Vec<SpendableOutput>,
    pub tos: Vec<Recipient>,
    pub change_address: String,
    /// Appended as an `OP_RETURN` output. Lowercase hex is pushed as bytes,
    /// anything else as UTF-8 text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(flatten)]
    pub options: TxOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAllBtcRequest {
    pub btc_utxos: Vec<SpendableOutput>,
    pub to_address: String,
    #[serde(flatten)]
    pub options: TxOptions,
}

/// Pays every recipient from `btc_utxos`, returning the rest as change.
pub async fn send_btc(
    request: &SendBtcRequest,
    estimator: &FeeEstimator,
) -> Result<SendOutcome, TxBuildError> {
    let mut draft = Draft::new(
        &request.options,
        &request.change_address,
        &request.btc_utxos,
        estimator,
    )?;

    for to in &request.tos {
        let address = draft.address(&to.address)?;
        draft.builder.add_output(address, to.satoshis);
    }

    if let Some(memo) = request.memo.as_deref().filter(|m| !m.is_empty()) {
        draft.builder.add_op_return(&memo_bytes(memo))?;
    }

    draft.fund(&request.btc_utxos, false).await
}

/// Sweeps every utxo into one output at `to_address`, paying the exact fee
/// out of it.
pub async fn send_all_btc(
    request: &SendAllBtcRequest,
    estimator: &FeeEstimator,
) -> Result<SendOutcome, TxBuildError> {
    ensure_plain_funding(&request.btc_utxos)?;
    if request.btc_utxos.is_empty() {
        return Err(TxBuildError::NoInputs);
    }

    let to_address = parse_address(&request.to_address, request.options.network)?;
    let dust = dust_limit_for_script(&to_address.script_pubkey());

    let mut builder = TransactionBuilder::new(&request.options, to_address.clone());
    let output = builder.add_output(to_address, dust);

    let mut to_sign_inputs = Vec::with_capacity(request.btc_utxos.len());
    for utxo in &request.btc_utxos {
        let index = builder.add_input(utxo.clone())?;
        to_sign_inputs.push(ToSignInput::new(index, utxo.pubkey));
    }

    let fee = estimator.estimate_fee(&builder).await?;
    let total = builder.total_input()?;
    let value = total.saturating_sub(fee);
    if value < dust {
        return Err(TxBuildError::InsufficientFundingUtxo {
            shortfall: fee.saturating_add(dust) - total,
        });
    }
    builder.set_output_value(output, value);
    debug!(total, fee, value, "sweeping all utxos");

    Draft {
        builder,
        to_sign_inputs,
        estimator,
    }
    .finish()
}

fn memo_bytes(memo: &str) -> Vec<u8> {
    match hex::decode(memo) {
        Ok(bytes) if hex::encode(&bytes) == memo => bytes,
        _ => memo.as_bytes().to_vec(),
    }
}
