use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{default_output_value, ensure_only, Draft, SendOutcome};
use crate::address_type::DEFAULT_DUST;
use crate::calc_fee::FeeEstimator;
use crate::classifier::AssetKind;
use crate::config::TxOptions;
use crate::error::{TxBuildError, UnsafeReason};
use crate::splitter::InscriptionSplitter;
use crate::utxo::SpendableOutput;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendInscriptionRequest {
    pub asset_utxo: SpendableOutput,
    pub btc_utxos: Vec<SpendableOutput>,
    pub to_address: String,
    pub change_address: String,
    /// Value of the receiving output. Defaults to the asset utxo's value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_value: Option<u64>,
    /// Allow moving an output that holds several inscriptions at once.
    #[serde(default)]
    pub enable_mixed: bool,
    #[serde(flatten)]
    pub options: TxOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendInscriptionsRequest {
    pub asset_utxos: Vec<SpendableOutput>,
    pub btc_utxos: Vec<SpendableOutput>,
    pub to_address: String,
    pub change_address: String,
    #[serde(flatten)]
    pub options: TxOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitInscriptionRequest {
    pub asset_utxo: SpendableOutput,
    pub btc_utxos: Vec<SpendableOutput>,
    pub change_address: String,
    /// Size of each inscription-bearing output.
    #[serde(
        default = "default_output_value",
        serialize_with = "crate::serde::serialize_u64",
        deserialize_with = "crate::serde::deserialize_u64"
    )]
    pub output_value: u64,
    #[serde(flatten)]
    pub options: TxOptions,
}

#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub outcome: SendOutcome,
    /// Number of outputs now holding inscriptions.
    pub split_count: usize,
}

/// Moves one inscribed output to `to_address`.
pub async fn send_inscription(
    request: &SendInscriptionRequest,
    estimator: &FeeEstimator,
) -> Result<SendOutcome, TxBuildError> {
    let mut draft = Draft::new(
        &request.options,
        &request.change_address,
        &request.btc_utxos,
        estimator,
    )?;

    let asset = &request.asset_utxo;
    ensure_only(std::slice::from_ref(asset), AssetKind::Inscription)?;
    if !request.enable_mixed && asset.inscriptions.len() > 1 {
        return Err(TxBuildError::MultipleAssetsInOneOutput { index: 0 });
    }
    let max_offset = asset
        .max_inscription_offset()
        .ok_or(TxBuildError::UnsafeUtxoSet(UnsafeReason::NoAssetToSend))?;

    let output_value = request.output_value.unwrap_or(asset.satoshis);
    if output_value <= max_offset {
        return Err(TxBuildError::AssetMayBeLost {
            offset: max_offset,
            output_value,
        });
    }

    draft.add_asset_input(asset)?;
    let to_address = draft.address(&request.to_address)?;
    draft.builder.add_output(to_address, output_value);

    draft.fund(&request.btc_utxos, false).await
}

/// Moves several inscribed outputs to `to_address`, one output each, keeping
/// their values.
pub async fn send_inscriptions(
    request: &SendInscriptionsRequest,
    estimator: &FeeEstimator,
) -> Result<SendOutcome, TxBuildError> {
    let mut draft = Draft::new(
        &request.options,
        &request.change_address,
        &request.btc_utxos,
        estimator,
    )?;
    ensure_only(&request.asset_utxos, AssetKind::Inscription)?;
    let to_address = draft.address(&request.to_address)?;

    for (index, asset) in request.asset_utxos.iter().enumerate() {
        if asset.inscriptions.len() > 1 {
            return Err(TxBuildError::MultipleAssetsInOneOutput { index });
        }
        draft.add_asset_input(asset)?;
        draft.builder.add_output(to_address.clone(), asset.satoshis);
    }

    draft.fund(&request.btc_utxos, false).await
}

/// Re-partitions an inscribed output so each inscription sits in its own
/// small output at the change address.
///
/// Units up to the last inscribed one become outputs; a trailing plain unit
/// is left unassigned and comes back through the change output.
pub async fn split_inscription_utxo(
    request: &SplitInscriptionRequest,
    estimator: &FeeEstimator,
) -> Result<SplitOutcome, TxBuildError> {
    let mut draft = Draft::new(
        &request.options,
        &request.change_address,
        &request.btc_utxos,
        estimator,
    )?;

    let asset = &request.asset_utxo;
    ensure_only(std::slice::from_ref(asset), AssetKind::Inscription)?;

    let units = InscriptionSplitter::new(request.output_value, DEFAULT_DUST)
        .split(asset.satoshis, &asset.inscriptions)?;
    let emitted = units
        .iter()
        .rposition(|unit| unit.has_inscriptions())
        .map_or(0, |last| last + 1);

    draft.add_asset_input(asset)?;
    let change_address = draft.builder.change_address().clone();
    for unit in &units[..emitted] {
        draft.builder.add_output(change_address.clone(), unit.satoshis);
    }

    let split_count = units.iter().filter(|u| u.has_inscriptions()).count();
    debug!(units = units.len(), emitted, split_count, "split inscription utxo");

    let outcome = draft.fund(&request.btc_utxos, false).await?;
    Ok(SplitOutcome {
        outcome,
        split_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::ToSignInput;
    use crate::test_utils::{
        assert_fee_rate, atomical_utxo, dummy_utxo, inscribed_utxo, options, psbt_fee,
        sign_and_extract, TestWallet,
    };
    use crate::utxo::AtomicalKind;
    use crate::AddressType;

    async fn check_fee(wallet: &TestWallet, outcome: SendOutcome, rate: f64) {
        let fee = psbt_fee(&outcome.psbt);
        let tx = sign_and_extract(wallet, outcome.psbt, outcome.to_sign_inputs).await;
        assert_fee_rate(&tx, fee, rate, 4);
    }

    mod send_inscription {
        use super::*;

        fn request(wallet: &TestWallet, to: &TestWallet, asset: SpendableOutput) -> SendInscriptionRequest {
            SendInscriptionRequest {
                asset_utxo: asset,
                btc_utxos: vec![dummy_utxo(wallet, 10_000)],
                to_address: to.address.to_string(),
                change_address: wallet.address.to_string(),
                output_value: None,
                enable_mixed: false,
                options: options(2.0),
            }
        }

        #[tokio::test]
        async fn asset_input_and_output_come_first() {
            let estimator = FeeEstimator::new().unwrap();
            let wallet = TestWallet::new(AddressType::P2tr);
            let to = TestWallet::new(AddressType::P2tr);
            let asset = inscribed_utxo(&wallet, 1_000, &[300]);
            let request = request(&wallet, &to, asset.clone());

            let outcome = send_inscription(&request, &estimator).await.unwrap();
            let tx = &outcome.psbt.unsigned_tx;
            assert_eq!(tx.input[0].previous_output, asset.outpoint());
            assert_eq!(tx.output[0].script_pubkey, to.script_pk);
            assert_eq!(tx.output[0].value.to_sat(), 1_000);
            assert_eq!(outcome.to_sign_inputs[0], ToSignInput::new(0, asset.pubkey));
            assert_eq!(outcome.to_sign_inputs.len(), 2);

            check_fee(&wallet, outcome, 2.0).await;
        }

        #[tokio::test]
        async fn custom_output_value_must_hold_every_inscription() {
            let estimator = FeeEstimator::new().unwrap();
            let wallet = TestWallet::new(AddressType::P2wpkh);
            let to = TestWallet::new(AddressType::P2wpkh);

            let mut mixed = request(&wallet, &to, inscribed_utxo(&wallet, 2_000, &[0, 700]));
            mixed.enable_mixed = true;
            mixed.output_value = Some(546);
            assert_eq!(
                send_inscription(&mixed, &estimator).await.unwrap_err(),
                TxBuildError::AssetMayBeLost {
                    offset: 700,
                    output_value: 546
                }
            );

            mixed.output_value = Some(701);
            let outcome = send_inscription(&mixed, &estimator).await.unwrap();
            assert_eq!(outcome.psbt.unsigned_tx.output[0].value.to_sat(), 701);
        }

        #[tokio::test]
        async fn several_inscriptions_need_mixed_mode() {
            let estimator = FeeEstimator::new().unwrap();
            let wallet = TestWallet::new(AddressType::P2tr);
            let to = TestWallet::new(AddressType::P2tr);
            let request = request(&wallet, &to, inscribed_utxo(&wallet, 2_000, &[0, 700]));

            let err = send_inscription(&request, &estimator).await.unwrap_err();
            assert_eq!(err, TxBuildError::MultipleAssetsInOneOutput { index: 0 });
            assert_eq!(err.code(), -6);
        }

        #[tokio::test]
        async fn rejects_tokens_on_the_asset() {
            let estimator = FeeEstimator::new().unwrap();
            let wallet = TestWallet::new(AddressType::P2tr);
            let to = TestWallet::new(AddressType::P2tr);
            let mut asset = inscribed_utxo(&wallet, 1_000, &[0]);
            asset.atomicals = atomical_utxo(&wallet, 1_000, AtomicalKind::Fungible).atomicals;

            assert_eq!(
                send_inscription(&request(&wallet, &to, asset), &estimator)
                    .await
                    .unwrap_err(),
                TxBuildError::UnsafeUtxoSet(UnsafeReason::FungibleTokenInAssetSet)
            );
        }

        #[tokio::test]
        async fn rejects_uninscribed_asset() {
            let estimator = FeeEstimator::new().unwrap();
            let wallet = TestWallet::new(AddressType::P2tr);
            let to = TestWallet::new(AddressType::P2tr);
            let request = request(&wallet, &to, dummy_utxo(&wallet, 1_000));

            assert_eq!(
                send_inscription(&request, &estimator).await.unwrap_err(),
                TxBuildError::UnsafeUtxoSet(UnsafeReason::NoAssetToSend)
            );
        }
    }

    mod send_inscriptions {
        use super::*;

        fn request(wallet: &TestWallet, to: &TestWallet, assets: Vec<SpendableOutput>) -> SendInscriptionsRequest {
            SendInscriptionsRequest {
                asset_utxos: assets,
                btc_utxos: vec![dummy_utxo(wallet, 5_000), dummy_utxo(wallet, 5_000)],
                to_address: to.address.to_string(),
                change_address: wallet.address.to_string(),
                options: options(3.0),
            }
        }

        #[tokio::test]
        async fn one_output_per_asset() {
            let estimator = FeeEstimator::new().unwrap();
            let wallet = TestWallet::new(AddressType::P2wpkh);
            let to = TestWallet::new(AddressType::P2tr);
            let assets = vec![
                inscribed_utxo(&wallet, 546, &[0]),
                inscribed_utxo(&wallet, 10_000, &[9_000]),
            ];

            let outcome = send_inscriptions(&request(&wallet, &to, assets), &estimator)
                .await
                .unwrap();
            let tx = &outcome.psbt.unsigned_tx;
            assert_eq!(tx.output[0].value.to_sat(), 546);
            assert_eq!(tx.output[1].value.to_sat(), 10_000);
            assert!(tx.output[..2].iter().all(|o| o.script_pubkey == to.script_pk));
            assert_eq!(outcome.to_sign_inputs[0].index, 0);
            assert_eq!(outcome.to_sign_inputs[1].index, 1);

            check_fee(&wallet, outcome, 3.0).await;
        }

        #[tokio::test]
        async fn names_the_mixed_output() {
            let estimator = FeeEstimator::new().unwrap();
            let wallet = TestWallet::new(AddressType::P2wpkh);
            let to = TestWallet::new(AddressType::P2tr);
            let assets = vec![
                inscribed_utxo(&wallet, 546, &[0]),
                inscribed_utxo(&wallet, 2_000, &[0, 1_000]),
            ];

            assert_eq!(
                send_inscriptions(&request(&wallet, &to, assets), &estimator)
                    .await
                    .unwrap_err(),
                TxBuildError::MultipleAssetsInOneOutput { index: 1 }
            );
        }
    }

    mod split_inscription_utxo {
        use super::*;

        fn request(wallet: &TestWallet, asset: SpendableOutput, funding: Vec<SpendableOutput>) -> SplitInscriptionRequest {
            SplitInscriptionRequest {
                asset_utxo: asset,
                btc_utxos: funding,
                change_address: wallet.address.to_string(),
                output_value: 546,
                options: options(1.0),
            }
        }

        #[tokio::test]
        async fn single_anchor_yields_two_unit_outputs() {
            let estimator = FeeEstimator::new().unwrap();
            let wallet = TestWallet::new(AddressType::P2tr);
            let asset = inscribed_utxo(&wallet, 10_000, &[1_000]);

            let split = split_inscription_utxo(&request(&wallet, asset, Vec::new()), &estimator)
                .await
                .unwrap();
            assert_eq!(split.split_count, 1);

            let tx = &split.outcome.psbt.unsigned_tx;
            assert_eq!(tx.input.len(), 1);
            assert_eq!(tx.output.len(), 3);
            assert_eq!(tx.output[0].value.to_sat(), 1_000);
            assert_eq!(tx.output[1].value.to_sat(), 546);
            assert!(tx.output[2].value.to_sat() < 8_454);
            assert!(tx.output.iter().all(|o| o.script_pubkey == wallet.script_pk));

            check_fee(&wallet, split.outcome, 1.0).await;
        }

        #[tokio::test]
        async fn separates_distant_inscriptions() {
            let estimator = FeeEstimator::new().unwrap();
            let wallet = TestWallet::new(AddressType::P2wpkh);
            let asset = inscribed_utxo(&wallet, 10_000, &[0, 5_000]);
            let funding = vec![dummy_utxo(&wallet, 3_000)];

            let split = split_inscription_utxo(&request(&wallet, asset, funding), &estimator)
                .await
                .unwrap();
            assert_eq!(split.split_count, 2);

            let values: Vec<u64> = split
                .outcome
                .psbt
                .unsigned_tx
                .output
                .iter()
                .map(|o| o.value.to_sat())
                .collect();
            assert_eq!(&values[..3], &[546, 4_454, 546]);
            assert_eq!(values.len(), 4);

            check_fee(&wallet, split.outcome, 1.0).await;
        }

        #[tokio::test]
        async fn keeps_close_inscriptions_together() {
            let estimator = FeeEstimator::new().unwrap();
            let wallet = TestWallet::new(AddressType::P2tr);
            let asset = inscribed_utxo(&wallet, 600, &[0, 100]);
            let funding = vec![dummy_utxo(&wallet, 3_000)];

            let split = split_inscription_utxo(&request(&wallet, asset, funding), &estimator)
                .await
                .unwrap();
            assert_eq!(split.split_count, 1);
            assert_eq!(split.outcome.psbt.unsigned_tx.output[0].value.to_sat(), 600);
        }
    }
}
