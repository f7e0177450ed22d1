//! One builder per asset class. Every operation checks its utxo sets, binds
//! the asset inputs first, appends its outputs and lets the coin selector
//! pay for the rest.

mod atomicals;
mod btc;
mod inscription;
mod runes;

pub use atomicals::{send_atomicals_ft, send_atomicals_nft, SendAtomicalsFtRequest, SendAtomicalsNftRequest};
pub use btc::{send_all_btc, send_btc, Recipient, SendAllBtcRequest, SendBtcRequest};
pub use inscription::{
    send_inscription, send_inscriptions, split_inscription_utxo, SendInscriptionRequest,
    SendInscriptionsRequest, SplitInscriptionRequest, SplitOutcome,
};
pub use runes::{send_runes, SendRunesRequest};

use bitcoin::{Address, Psbt};

use crate::builder::{parse_address, BuildWarning, TransactionBuilder};
use crate::calc_fee::FeeEstimator;
use crate::classifier::AssetKind;
use crate::config::TxOptions;
use crate::error::{TxBuildError, UnsafeReason};
use crate::selector::CoinSelector;
use crate::signer::ToSignInput;
use crate::utxo::SpendableOutput;

/// A built transaction and what is still needed to broadcast it.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub psbt: Psbt,
    /// Inputs the caller has to sign, asset inputs first.
    pub to_sign_inputs: Vec<ToSignInput>,
    pub warnings: Vec<BuildWarning>,
}

/// Output value used for asset outputs when the caller gives none.
pub(crate) fn default_output_value() -> u64 {
    crate::splitter::DEFAULT_UNIT_SIZE
}

pub(crate) fn default_true() -> bool {
    true
}

fn ensure_plain_funding(utxos: &[SpendableOutput]) -> Result<(), TxBuildError> {
    if utxos.iter().any(|u| !u.is_plain()) {
        return Err(TxBuildError::UnsafeUtxoSet(UnsafeReason::AssetInFundingSet));
    }
    Ok(())
}

/// Rejects asset outputs carrying anything other than `allowed`.
fn ensure_only(utxos: &[SpendableOutput], allowed: AssetKind) -> Result<(), TxBuildError> {
    let forbidden = [
        (AssetKind::Inscription, UnsafeReason::InscriptionInAssetSet),
        (AssetKind::FungibleToken, UnsafeReason::FungibleTokenInAssetSet),
        (AssetKind::NonFungibleToken, UnsafeReason::NonFungibleTokenInAssetSet),
        (AssetKind::Rune, UnsafeReason::RuneInAssetSet),
    ];

    for (kind, reason) in forbidden {
        if kind != allowed && utxos.iter().any(|u| u.has_asset(kind)) {
            return Err(TxBuildError::UnsafeUtxoSet(reason));
        }
    }
    Ok(())
}

/// Common start of every operation: safety checks and an empty builder.
struct Draft<'a> {
    builder: TransactionBuilder,
    to_sign_inputs: Vec<ToSignInput>,
    estimator: &'a FeeEstimator,
}

impl<'a> Draft<'a> {
    fn new(
        options: &TxOptions,
        change_address: &str,
        funding: &[SpendableOutput],
        estimator: &'a FeeEstimator,
    ) -> Result<Self, TxBuildError> {
        ensure_plain_funding(funding)?;
        let change_address = parse_address(change_address, options.network)?;
        Ok(Self {
            builder: TransactionBuilder::new(options, change_address),
            to_sign_inputs: Vec::new(),
            estimator,
        })
    }

    fn address(&self, address: &str) -> Result<Address, TxBuildError> {
        parse_address(address, self.builder.network())
    }

    fn add_asset_input(&mut self, utxo: &SpendableOutput) -> Result<usize, TxBuildError> {
        let index = self.builder.add_input(utxo.clone())?;
        self.to_sign_inputs.push(ToSignInput::new(index, utxo.pubkey));
        Ok(index)
    }

    async fn fund(
        mut self,
        funding: &[SpendableOutput],
        force_as_fee: bool,
    ) -> Result<SendOutcome, TxBuildError> {
        let selected = CoinSelector::new(self.estimator)
            .fund(&mut self.builder, funding, force_as_fee)
            .await?;
        self.to_sign_inputs.extend(selected);
        self.finish()
    }

    fn finish(self) -> Result<SendOutcome, TxBuildError> {
        self.builder.dump();
        Ok(SendOutcome {
            psbt: self.builder.to_psbt()?,
            to_sign_inputs: self.to_sign_inputs,
            warnings: self.builder.warnings(),
        })
    }
}
