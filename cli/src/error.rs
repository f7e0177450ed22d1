use ordwallet::runes::VarintError;
use ordwallet::TxBuildError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0} (code {})", .0.code())]
    Build(#[from] TxBuildError),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("Malformed varint: {0}")]
    Varint(#[from] VarintError),

    #[error("Signing failed: {0}")]
    Signer(#[from] ordwallet::SignerError),
}
