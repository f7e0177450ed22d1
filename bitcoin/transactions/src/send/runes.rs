use std::collections::BTreeSet;

use bitcoin::opcodes::all::{OP_PUSHNUM_13, OP_RETURN};
use bitcoin::script::{Builder, PushBytesBuf};
use ordwallet_runes::{encipher_transfer, RuneId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{default_output_value, ensure_only, Draft, SendOutcome};
use crate::calc_fee::FeeEstimator;
use crate::classifier::AssetKind;
use crate::config::TxOptions;
use crate::error::TxBuildError;
use crate::utxo::SpendableOutput;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRunesRequest {
    pub asset_utxos: Vec<SpendableOutput>,
    pub btc_utxos: Vec<SpendableOutput>,
    /// Receives the rune remainder.
    pub asset_address: String,
    /// Receives the btc change.
    pub btc_address: String,
    pub to_address: String,
    #[serde(rename = "runeid")]
    pub rune_id: RuneId,
    #[serde(
        serialize_with = "crate::serde::serialize_u128",
        deserialize_with = "crate::serde::deserialize_u128"
    )]
    pub rune_amount: u128,
    /// Value of the receiving and rune change outputs.
    #[serde(
        default = "default_output_value",
        serialize_with = "crate::serde::serialize_u64",
        deserialize_with = "crate::serde::deserialize_u64"
    )]
    pub output_value: u64,
    #[serde(flatten)]
    pub options: TxOptions,
}

/// Transfers `rune_amount` of `rune_id` with a runestone edict.
///
/// Outputs are the runestone, the rune change when any rune is left over,
/// then the receiver.
pub async fn send_runes(
    request: &SendRunesRequest,
    estimator: &FeeEstimator,
) -> Result<SendOutcome, TxBuildError> {
    let mut draft = Draft::new(
        &request.options,
        &request.btc_address,
        &request.btc_utxos,
        estimator,
    )?;
    ensure_only(&request.asset_utxos, AssetKind::Rune)?;

    for asset in &request.asset_utxos {
        draft.add_asset_input(asset)?;
    }

    let available: u128 = request
        .asset_utxos
        .iter()
        .map(|u| u.rune_amount(&request.rune_id))
        .fold(0, u128::saturating_add);
    if request.rune_amount > available {
        return Err(TxBuildError::InsufficientAssetUtxo {
            required: request.rune_amount,
            available,
        });
    }

    let kinds: BTreeSet<RuneId> = request
        .asset_utxos
        .iter()
        .flat_map(|u| u.runes.iter().map(|r| r.rune_id))
        .collect();
    let needs_change = kinds.len() > 1 || available > request.rune_amount;
    debug!(
        rune_id = %request.rune_id,
        amount = request.rune_amount,
        available,
        needs_change,
        "building runestone"
    );

    let payload = encipher_transfer(request.rune_id, request.rune_amount, needs_change);
    draft.builder.add_script_output(runestone_script(payload)?, 0);

    if needs_change {
        let asset_address = draft.address(&request.asset_address)?;
        draft.builder.add_output(asset_address, request.output_value);
    }
    let to_address = draft.address(&request.to_address)?;
    draft.builder.add_output(to_address, request.output_value);

    draft.fund(&request.btc_utxos, true).await
}

fn runestone_script(payload: Vec<u8>) -> Result<bitcoin::ScriptBuf, TxBuildError> {
    let payload = PushBytesBuf::try_from(payload).map_err(|_| TxBuildError::CalcOverflow)?;
    Ok(Builder::new()
        .push_opcode(OP_RETURN)
        .push_opcode(OP_PUSHNUM_13)
        .push_slice(payload)
        .into_script())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnsafeReason;
    use crate::test_utils::{
        assert_fee_rate, dummy_utxo, inscribed_utxo, options, psbt_fee, rune_utxo,
        sign_and_extract, TestWallet,
    };
    use crate::AddressType;
    use bitcoin::script::Instruction;
    use ordwallet_runes::varint;

    const RUNE: RuneId = RuneId::new(840_000, 3);
    const OTHER_RUNE: RuneId = RuneId::new(840_001, 7);

    struct Setup {
        wallet: TestWallet,
        to: TestWallet,
        asset_change: TestWallet,
    }

    impl Setup {
        fn new() -> Self {
            Self {
                wallet: TestWallet::new(AddressType::P2tr),
                to: TestWallet::new(AddressType::P2tr),
                asset_change: TestWallet::new(AddressType::P2tr),
            }
        }

        fn request(&self, balances: &[&[(RuneId, u128)]], amount: u128) -> SendRunesRequest {
            SendRunesRequest {
                asset_utxos: balances
                    .iter()
                    .map(|b| rune_utxo(&self.wallet, 546, b))
                    .collect(),
                btc_utxos: vec![dummy_utxo(&self.wallet, 10_000)],
                asset_address: self.asset_change.address.to_string(),
                btc_address: self.wallet.address.to_string(),
                to_address: self.to.address.to_string(),
                rune_id: RUNE,
                rune_amount: amount,
                output_value: 546,
                options: options(3.0),
            }
        }
    }

    fn edict_fields(outcome: &SendOutcome) -> Vec<u128> {
        let script = &outcome.psbt.unsigned_tx.output[0].script_pubkey;
        let instructions: Vec<_> = script.instructions().map(|i| i.unwrap()).collect();
        assert_eq!(instructions[0], Instruction::Op(OP_RETURN));
        assert_eq!(instructions[1], Instruction::Op(OP_PUSHNUM_13));
        let Instruction::PushBytes(payload) = &instructions[2] else {
            panic!("runestone without payload");
        };
        varint::decode_all(payload.as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn whole_balance_goes_to_output_one() {
        let estimator = FeeEstimator::new().unwrap();
        let setup = Setup::new();
        let request = setup.request(&[&[(RUNE, 1_000)]], 1_000);

        let outcome = send_runes(&request, &estimator).await.unwrap();
        assert_eq!(edict_fields(&outcome), vec![0, 840_000, 3, 1_000, 1]);

        let tx = &outcome.psbt.unsigned_tx;
        assert_eq!(tx.output[0].value.to_sat(), 0);
        assert_eq!(tx.output[1].script_pubkey, setup.to.script_pk);
        assert_eq!(tx.output[1].value.to_sat(), 546);
        assert_eq!(tx.output[2].script_pubkey, setup.wallet.script_pk);

        check_fee(&setup, outcome).await;
    }

    #[tokio::test]
    async fn remainder_stays_on_output_one() {
        let estimator = FeeEstimator::new().unwrap();
        let setup = Setup::new();
        let request = setup.request(&[&[(RUNE, 600)], &[(RUNE, 400)]], 700);

        let outcome = send_runes(&request, &estimator).await.unwrap();
        assert_eq!(edict_fields(&outcome), vec![0, 840_000, 3, 700, 2]);

        let tx = &outcome.psbt.unsigned_tx;
        assert_eq!(tx.output[1].script_pubkey, setup.asset_change.script_pk);
        assert_eq!(tx.output[2].script_pubkey, setup.to.script_pk);
        assert_eq!(outcome.to_sign_inputs.len(), 3);

        check_fee(&setup, outcome).await;
    }

    #[tokio::test]
    async fn other_runes_force_change() {
        let estimator = FeeEstimator::new().unwrap();
        let setup = Setup::new();
        let request = setup.request(&[&[(RUNE, 1_000), (OTHER_RUNE, 5)]], 1_000);

        let outcome = send_runes(&request, &estimator).await.unwrap();
        assert_eq!(edict_fields(&outcome), vec![0, 840_000, 3, 1_000, 2]);
        assert_eq!(
            outcome.psbt.unsigned_tx.output[1].script_pubkey,
            setup.asset_change.script_pk
        );
    }

    #[tokio::test]
    async fn rejects_amount_above_balance() {
        let estimator = FeeEstimator::new().unwrap();
        let setup = Setup::new();
        let request = setup.request(&[&[(RUNE, 1_000), (OTHER_RUNE, 5_000)]], 1_001);

        assert_eq!(
            send_runes(&request, &estimator).await.unwrap_err(),
            TxBuildError::InsufficientAssetUtxo {
                required: 1_001,
                available: 1_000
            }
        );
    }

    #[tokio::test]
    async fn rejects_inscribed_rune_output() {
        let estimator = FeeEstimator::new().unwrap();
        let setup = Setup::new();
        let mut request = setup.request(&[&[(RUNE, 1_000)]], 1_000);
        request.asset_utxos[0].inscriptions = inscribed_utxo(&setup.wallet, 546, &[0]).inscriptions;

        assert_eq!(
            send_runes(&request, &estimator).await.unwrap_err(),
            TxBuildError::UnsafeUtxoSet(UnsafeReason::InscriptionInAssetSet)
        );
    }

    async fn check_fee(setup: &Setup, outcome: SendOutcome) {
        let fee = psbt_fee(&outcome.psbt);
        let tx = sign_and_extract(&setup.wallet, outcome.psbt, outcome.to_sign_inputs).await;
        assert_fee_rate(&tx, fee, 3.0, 4);
    }
}
