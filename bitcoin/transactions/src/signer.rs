use async_trait::async_trait;
use bitcoin::{PublicKey, Psbt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("No key for public key {0}")]
    UnknownKey(PublicKey),

    #[error("Input {0} does not exist")]
    InputOutOfRange(usize),

    #[error("Input {index} is missing {what}")]
    MissingInputData { index: usize, what: &'static str },

    #[error("Unsupported sighash type {0:#x}")]
    UnsupportedSighash(u32),

    #[error("Unsupported message scheme {0:?}")]
    UnsupportedScheme(MessageScheme),

    #[error("Failed to compute sighash: {0}")]
    Sighash(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// An input the caller still has to sign, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToSignInput {
    pub index: usize,
    pub public_key: PublicKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sighash_types: Option<Vec<u32>>,
    /// Sign with the untweaked key, for taproot script-path spends.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disable_tweak_signer: bool,
}

impl ToSignInput {
    pub fn new(index: usize, public_key: PublicKey) -> Self {
        Self {
            index,
            public_key,
            sighash_types: None,
            disable_tweak_signer: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignPsbtOptions {
    pub to_sign_inputs: Vec<ToSignInput>,
    /// Replace signatures with final scriptSig/witness data.
    pub auto_finalized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageScheme {
    Ecdsa,
    Bip322Simple,
}

/// A backend able to authorize inputs. Implementations may be remote, so
/// every call is asynchronous; timeouts are the caller's business.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign_psbt(&self, psbt: &mut Psbt, options: &SignPsbtOptions)
        -> Result<(), SignerError>;

    async fn sign_message(&self, text: &str, scheme: MessageScheme)
        -> Result<String, SignerError>;
}
