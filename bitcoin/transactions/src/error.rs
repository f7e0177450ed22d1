use ordwallet_math::MathError;
use ordwallet_runes::{RuneIdError, VarintError};
use thiserror::Error;

use crate::signer::SignerError;

/// Why a set of outputs was refused for the role it was given.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnsafeReason {
    /// A funding output carries an inscription, token or rune.
    AssetInFundingSet,
    /// An asset output carries an inscription.
    InscriptionInAssetSet,
    /// An asset output carries a fungible token.
    FungibleTokenInAssetSet,
    /// An asset output carries a non-fungible token.
    NonFungibleTokenInAssetSet,
    /// An asset output carries a rune balance.
    RuneInAssetSet,
    /// The asset output holds none of the asset being transferred.
    NoAssetToSend,
}

impl std::fmt::Display for UnsafeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            UnsafeReason::AssetInFundingSet => "funding utxos must not carry assets",
            UnsafeReason::InscriptionInAssetSet => "asset utxos must not carry inscriptions",
            UnsafeReason::FungibleTokenInAssetSet => {
                "asset utxos must not carry fungible tokens"
            }
            UnsafeReason::NonFungibleTokenInAssetSet => {
                "asset utxos must not carry non-fungible tokens"
            }
            UnsafeReason::RuneInAssetSet => "asset utxos must not carry runes",
            UnsafeReason::NoAssetToSend => "asset utxo holds no asset to send",
        };
        f.write_str(msg)
    }
}

/// Errors raised while building a transaction. Nothing is ever returned
/// alongside an error: a failed build produces no PSBT.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TxBuildError {
    #[error("Insufficient btc utxos to pay the outputs and fee, short by {shortfall} sats")]
    InsufficientFundingUtxo { shortfall: u64 },

    #[error("Insufficient asset utxos: required {required}, available {available}")]
    InsufficientAssetUtxo { required: u128, available: u128 },

    #[error("Unsafe utxos: {0}")]
    UnsafeUtxoSet(UnsafeReason),

    #[error("Asset may be lost: offset {offset} does not fit in an output of {output_value} sats")]
    AssetMayBeLost { offset: u64, output_value: u64 },

    #[error("Utxo at index {index} carries more than one asset")]
    MultipleAssetsInOneOutput { index: usize },

    #[error("Malformed varint: {0}")]
    Varint(#[from] VarintError),

    #[error("Invalid rune id: {0}")]
    RuneId(#[from] RuneIdError),

    #[error("Invalid utxo at index {index}: {reason}")]
    InvalidUtxo { index: usize, reason: String },

    #[error("Legacy utxo at index {index} has no previous transaction")]
    MissingPreviousTransaction { index: usize },

    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Invalid fee rate {0}")]
    InvalidFeeRate(String),

    #[error("Invalid memo: {0}")]
    InvalidMemo(String),

    #[error("The transaction has no inputs")]
    NoInputs,

    #[error("Psbt error: {0}")]
    Psbt(String),

    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),

    #[error("An arithmetic error ocurred")]
    CalcOverflow,
}

impl TxBuildError {
    /// Stable numeric code, shared with the wallet SDK error table.
    pub fn code(&self) -> i32 {
        match self {
            TxBuildError::InsufficientFundingUtxo { .. } => -2,
            TxBuildError::InsufficientAssetUtxo { .. } => -3,
            TxBuildError::UnsafeUtxoSet(_) => -4,
            TxBuildError::AssetMayBeLost { .. } => -5,
            TxBuildError::MultipleAssetsInOneOutput { .. } => -6,
            TxBuildError::Varint(_) | TxBuildError::RuneId(_) => -7,
            TxBuildError::InvalidUtxo { .. }
            | TxBuildError::MissingPreviousTransaction { .. }
            | TxBuildError::InvalidAddress(_)
            | TxBuildError::InvalidFeeRate(_)
            | TxBuildError::InvalidMemo(_)
            | TxBuildError::NoInputs => -8,
            TxBuildError::Psbt(_) | TxBuildError::Signer(_) => -9,
            TxBuildError::CalcOverflow => -10,
        }
    }
}

// === Conversions ============================================================

impl From<MathError> for TxBuildError {
    fn from(error: MathError) -> Self {
        match error {
            MathError::AdditionOverflow
            | MathError::SubtractionOverflow
            | MathError::MultiplicationOverflow
            | MathError::DivisionOverflow
            | MathError::ConversionError => TxBuildError::CalcOverflow,
        }
    }
}

impl From<bitcoin::psbt::Error> for TxBuildError {
    fn from(error: bitcoin::psbt::Error) -> Self {
        TxBuildError::Psbt(error.to_string())
    }
}
