//! Coin selection and transaction construction for ordinals-aware wallets.
//!
//! This crate builds unsigned PSBTs that move plain bitcoin, inscriptions,
//! atomicals and runes without ever spending an asset as fee. The central
//! pieces are the [`TransactionBuilder`], the [`FeeEstimator`] which signs a
//! throwaway copy of the transaction to measure its exact size, and the
//! [`CoinSelector`] which funds a builder from plain outputs.
//!
//! ## Key Features
//!
//! - **Exact fees**: fees are measured on a fully signed copy, never guessed
//! - **Asset safety**: funding sets carrying assets are refused up front
//! - **Inscription splitting**: inscribed outputs can be cut into small units
//! - **Signer agnostic**: callers get a PSBT plus the list of inputs to sign
//!
//! ## Quick Start
//!
//! ```rust
//! use ordwallet_transactions::fee_rate::FeeRate;
//! use ordwallet_transactions::splitter::InscriptionSplitter;
//! use ordwallet_transactions::utxo::InscriptionAnchor;
//!
//! // Fees round up at the point they are charged.
//! let rate = FeeRate::try_from(1.5)?;
//! assert_eq!(rate.fee_for_vsize(141)?, 212);
//!
//! let anchor = InscriptionAnchor {
//!     inscription_id: "inscription".into(),
//!     inscription_number: None,
//!     offset: 1_000,
//! };
//! let units = InscriptionSplitter::default().split(10_000, &[anchor])?;
//! let values: Vec<u64> = units.iter().map(|u| u.satoshis).collect();
//! assert_eq!(values, [1_000, 546, 8_454]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Building a transaction is asynchronous because fee estimation goes
//! through the [`Signer`] interface. See [`send`] for the ready-made
//! operations.

pub mod address_type;
pub mod builder;
pub mod calc_fee;
pub mod classifier;
pub mod config;
pub mod error;
pub mod fee_rate;
pub mod input_calc;
pub mod local_signer;
pub mod selector;
pub mod send;
pub mod serde;
pub mod signer;
pub mod splitter;
pub mod utxo;

#[cfg(test)]
pub(crate) mod test_utils;

pub use address_type::AddressType;
pub use builder::{BuildWarning, TransactionBuilder};
pub use calc_fee::FeeEstimator;
pub use config::{LegacyPolicy, TxOptions};
pub use error::{TxBuildError, UnsafeReason};
pub use fee_rate::FeeRate;
pub use local_signer::LocalSigner;
pub use selector::CoinSelector;
pub use send::SendOutcome;
pub use signer::{MessageScheme, SignPsbtOptions, Signer, SignerError, ToSignInput};
pub use splitter::{InscriptionSplitter, InscriptionUnit};
pub use utxo::SpendableOutput;
