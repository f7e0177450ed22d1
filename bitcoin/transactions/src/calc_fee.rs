use tracing::trace;

use crate::builder::TransactionBuilder;
use crate::error::TxBuildError;
use crate::local_signer::LocalSigner;
use crate::signer::{SignPsbtOptions, Signer, ToSignInput};

/// Throwaway key used to sign estimation copies. Any valid key works since
/// only signature sizes matter; a fixed one keeps estimates reproducible.
const ESTIMATION_SECRET: [u8; 32] = [0x5a; 32];

/// Measured size of a fully signed copy of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeEstimate {
    pub vsize: u64,
    pub weight: u64,
    /// Weight of each signed input, in input order.
    pub input_weights: Vec<u64>,
}

/// Computes exact fees by signing a copy of the transaction with a
/// throwaway key and measuring the result.
pub struct FeeEstimator {
    signer: LocalSigner,
}

impl FeeEstimator {
    pub fn new() -> Result<Self, TxBuildError> {
        Ok(Self::with_signer(LocalSigner::from_slice(&ESTIMATION_SECRET)?))
    }

    pub fn with_signer(signer: LocalSigner) -> Self {
        Self { signer }
    }

    /// Signs and finalizes a copy of `builder` where every input is owned by
    /// the estimation key, then measures it.
    pub async fn estimate_size(
        &self,
        builder: &TransactionBuilder,
    ) -> Result<SizeEstimate, TxBuildError> {
        let pubkey = self.signer.public_key();
        // The estimation key is compressed; pad inputs whose real key is not.
        let padding: Vec<u64> = builder
            .inputs()
            .iter()
            .map(|input| input.utxo.extra_key_weight())
            .collect();
        let mut draft = builder.clone();
        draft.rebind_for_estimation(pubkey, |utxo| {
            self.signer.script_pubkey(utxo.address_type)
        })?;

        let mut psbt = draft.to_psbt()?;
        let options = SignPsbtOptions {
            to_sign_inputs: (0..draft.inputs().len())
                .map(|index| ToSignInput::new(index, pubkey))
                .collect(),
            auto_finalized: true,
        };
        self.signer.sign_psbt(&mut psbt, &options).await?;

        let tx = psbt.extract_tx_unchecked_fee_rate();
        let input_weights: Vec<u64> = tx
            .input
            .iter()
            .zip(&padding)
            .map(|(input, pad)| {
                let base = input.base_size() as u64;
                let total = input.total_size() as u64;
                base * 3 + total + pad
            })
            .collect();
        let weight = tx.weight().to_wu() + padding.iter().sum::<u64>();

        let estimate = SizeEstimate {
            vsize: weight.div_ceil(4),
            weight,
            input_weights,
        };
        trace!(vsize = estimate.vsize, weight = estimate.weight, "estimated signed size");

        Ok(estimate)
    }

    /// Fee for `builder` at its own fee rate, rounded up.
    pub async fn estimate_fee(&self, builder: &TransactionBuilder) -> Result<u64, TxBuildError> {
        let size = self.estimate_size(builder).await?;
        Ok(builder.fee_rate().fee_for_vsize(size.vsize)?)
    }
}
