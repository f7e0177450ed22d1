pub mod error;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use bitcoin::consensus::encode::serialize_hex;
use clap::{Parser, Subcommand};
use num::BigUint;
use ordwallet::runes::varint;
use ordwallet::send::{
    send_all_btc, send_atomicals_ft, send_atomicals_nft, send_btc, send_inscription,
    send_inscriptions, send_runes, split_inscription_utxo, SendAllBtcRequest,
    SendAtomicalsFtRequest, SendAtomicalsNftRequest, SendBtcRequest, SendInscriptionRequest,
    SendInscriptionsRequest, SendRunesRequest, SplitInscriptionRequest,
};
use ordwallet::{
    BuildWarning, FeeEstimator, LocalSigner, SendOutcome, SignPsbtOptions, Signer, ToSignInput,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::CliError;

#[derive(Parser, Debug)]
#[command(
    name = "ordwallet",
    version,
    about = "Builds ordinals-aware bitcoin transactions"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a PSBT from a JSON request file
    Build {
        /// Request file, a JSON object tagged by `operation`
        request: PathBuf,
        /// Sign and finalize the inputs owned by this key
        #[arg(long, env = "ORDWALLET_WIF", hide_env_values = true)]
        wif: Option<String>,
    },
    /// Encode or decode rune varints
    Varint {
        #[command(subcommand)]
        command: VarintCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum VarintCommand {
    /// Encode decimal integers into one hex buffer
    Encode { values: Vec<String> },
    /// Decode every varint in a hex buffer
    Decode { hex: String },
}

/// Everything `build` accepts, keyed by the `operation` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum BuildRequest {
    SendBtc(SendBtcRequest),
    SendAllBtc(SendAllBtcRequest),
    SendInscription(SendInscriptionRequest),
    SendInscriptions(SendInscriptionsRequest),
    SendAtomicalsFt(SendAtomicalsFtRequest),
    SendAtomicalsNft(SendAtomicalsNftRequest),
    SendRunes(SendRunesRequest),
    SplitInscriptionUtxo(SplitInscriptionRequest),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutput {
    /// Base64 PSBT.
    pub psbt: String,
    /// Inputs still waiting for a signature.
    pub to_sign_inputs: Vec<ToSignInput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<BuildWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_count: Option<usize>,
    /// Hex transaction, once every input is signed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_tx: Option<String>,
}

impl BuildRequest {
    pub fn operation(&self) -> &'static str {
        match self {
            BuildRequest::SendBtc(_) => "sendBtc",
            BuildRequest::SendAllBtc(_) => "sendAllBtc",
            BuildRequest::SendInscription(_) => "sendInscription",
            BuildRequest::SendInscriptions(_) => "sendInscriptions",
            BuildRequest::SendAtomicalsFt(_) => "sendAtomicalsFt",
            BuildRequest::SendAtomicalsNft(_) => "sendAtomicalsNft",
            BuildRequest::SendRunes(_) => "sendRunes",
            BuildRequest::SplitInscriptionUtxo(_) => "splitInscriptionUtxo",
        }
    }

    pub async fn build(
        &self,
        estimator: &FeeEstimator,
        wif: Option<&str>,
    ) -> Result<BuildOutput, CliError> {
        let mut split_count = None;
        let mut outcome = match self {
            BuildRequest::SendBtc(r) => send_btc(r, estimator).await?,
            BuildRequest::SendAllBtc(r) => send_all_btc(r, estimator).await?,
            BuildRequest::SendInscription(r) => send_inscription(r, estimator).await?,
            BuildRequest::SendInscriptions(r) => send_inscriptions(r, estimator).await?,
            BuildRequest::SendAtomicalsFt(r) => send_atomicals_ft(r, estimator).await?,
            BuildRequest::SendAtomicalsNft(r) => send_atomicals_nft(r, estimator).await?,
            BuildRequest::SendRunes(r) => send_runes(r, estimator).await?,
            BuildRequest::SplitInscriptionUtxo(r) => {
                let split = split_inscription_utxo(r, estimator).await?;
                split_count = Some(split.split_count);
                split.outcome
            }
        };

        let raw_tx = match wif {
            Some(wif) => sign_owned_inputs(&mut outcome, wif).await?,
            None => None,
        };

        Ok(BuildOutput {
            psbt: outcome.psbt.to_string(),
            to_sign_inputs: outcome.to_sign_inputs,
            warnings: outcome.warnings,
            split_count,
            raw_tx,
        })
    }
}

/// Signs the inputs `wif` owns and returns the raw transaction when nothing
/// is left to sign.
async fn sign_owned_inputs(outcome: &mut SendOutcome, wif: &str) -> Result<Option<String>, CliError> {
    let signer = LocalSigner::from_wif(wif)?;
    let (owned, others): (Vec<_>, Vec<_>) = outcome
        .to_sign_inputs
        .drain(..)
        .partition(|input| input.public_key == signer.public_key());

    let options = SignPsbtOptions {
        to_sign_inputs: owned,
        auto_finalized: true,
    };
    signer.sign_psbt(&mut outcome.psbt, &options).await?;
    outcome.to_sign_inputs = others;

    if !outcome.to_sign_inputs.is_empty() {
        return Ok(None);
    }
    let tx = outcome.psbt.clone().extract_tx_unchecked_fee_rate();
    Ok(Some(serialize_hex(&tx)))
}

pub fn encode_varints(values: &[String]) -> Result<String, CliError> {
    let mut buf = Vec::new();
    for value in values {
        let n = BigUint::from_str(value).map_err(|_| CliError::InvalidNumber(value.clone()))?;
        buf.extend(varint::encode_big(&n));
    }
    Ok(hex::encode(buf))
}

pub fn decode_varints(hex_str: &str) -> Result<Vec<BigUint>, CliError> {
    let bytes = hex::decode(hex_str)?;
    Ok(varint::decode_all_big(&bytes)?)
}

async fn build_from_file(path: &Path, wif: Option<&str>) -> Result<BuildOutput> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let request: BuildRequest = serde_json::from_str(&data)
        .with_context(|| format!("Invalid request in {}", path.display()))?;
    info!(operation = request.operation(), "building transaction");

    let estimator = FeeEstimator::new().map_err(CliError::from)?;
    request
        .build(&estimator, wif)
        .await
        .with_context(|| format!("Failed to build {}", request.operation()))
}

pub fn logging_init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(filter)
        .init();
}

pub async fn entry(opts: Cli) -> Result<()> {
    match opts.command {
        Commands::Build { request, wif } => {
            let output = build_from_file(&request, wif.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Varint { command } => match command {
            VarintCommand::Encode { values } => println!("{}", encode_varints(&values)?),
            VarintCommand::Decode { hex } => {
                for value in decode_varints(&hex)? {
                    println!("{value}");
                }
            }
        },
    }
    Ok(())
}
