//! Software signing backend holding a single secp256k1 key.

use async_trait::async_trait;
use bitcoin::ecdsa;
use bitcoin::hashes::Hash;
use bitcoin::key::{Keypair, TapTweak};
use bitcoin::psbt;
use bitcoin::script::PushBytesBuf;
use bitcoin::secp256k1::{All, Message, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, Prevouts, SighashCache, TapSighashType};
use bitcoin::sign_message::{signed_msg_hash, MessageSignature};
use bitcoin::taproot;
use bitcoin::{
    Address, Network, PrivateKey, Psbt, PublicKey, ScriptBuf, Transaction, TxOut, Witness,
};

use crate::address_type::{AddressType, SpendKind};
use crate::signer::{MessageScheme, SignPsbtOptions, Signer, SignerError, ToSignInput};

enum InputSignature {
    Ecdsa(ecdsa::Signature),
    Schnorr(taproot::Signature),
}

pub struct LocalSigner {
    secp: Secp256k1<All>,
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl LocalSigner {
    pub fn new(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::new(secret_key.public_key(&secp));
        Self {
            secp,
            secret_key,
            public_key,
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, SignerError> {
        SecretKey::from_slice(bytes)
            .map(Self::new)
            .map_err(|e| SignerError::InvalidKey(e.to_string()))
    }

    pub fn from_wif(wif: &str) -> Result<Self, SignerError> {
        let key = PrivateKey::from_wif(wif).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        if !key.compressed {
            return Err(SignerError::InvalidKey(
                "uncompressed keys are not supported".to_string(),
            ));
        }
        Ok(Self::new(key.inner))
    }

    pub fn random() -> Self {
        Self::new(SecretKey::new(&mut bitcoin::secp256k1::rand::thread_rng()))
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    pub fn script_pubkey(&self, address_type: AddressType) -> Option<ScriptBuf> {
        address_type.script_pubkey(&self.secp, &self.public_key)
    }

    pub fn address(&self, address_type: AddressType, network: Network) -> Option<Address> {
        let script = self.script_pubkey(address_type)?;
        Address::from_script(&script, network).ok()
    }

    fn sign_input(
        &self,
        tx: &Transaction,
        cache: &mut SighashCache<&Transaction>,
        prevouts: Option<&[TxOut]>,
        input: &psbt::Input,
        to_sign: &ToSignInput,
    ) -> Result<InputSignature, SignerError> {
        let index = to_sign.index;
        let sighash_err = |e: &dyn std::fmt::Display| SignerError::Sighash(e.to_string());

        match input_spend_kind(input, index)? {
            SpendKind::Legacy => {
                let ty = ecdsa_sighash_type(to_sign)?;
                let script = spent_output(tx, input, index)?.script_pubkey;
                let sighash = cache
                    .legacy_signature_hash(index, &script, ty.to_u32())
                    .map_err(|e| sighash_err(&e))?;
                Ok(self.sign_ecdsa(sighash.to_byte_array(), ty))
            }
            SpendKind::NativeSegwit => {
                let ty = ecdsa_sighash_type(to_sign)?;
                let utxo = witness_utxo(input, index)?;
                let sighash = cache
                    .p2wpkh_signature_hash(index, &utxo.script_pubkey, utxo.value, ty)
                    .map_err(|e| sighash_err(&e))?;
                Ok(self.sign_ecdsa(sighash.to_byte_array(), ty))
            }
            SpendKind::WrappedSegwit => {
                let ty = ecdsa_sighash_type(to_sign)?;
                let utxo = witness_utxo(input, index)?;
                let redeem = input
                    .redeem_script
                    .as_ref()
                    .ok_or(SignerError::MissingInputData {
                        index,
                        what: "redeem script",
                    })?;
                let sighash = cache
                    .p2wpkh_signature_hash(index, redeem, utxo.value, ty)
                    .map_err(|e| sighash_err(&e))?;
                Ok(self.sign_ecdsa(sighash.to_byte_array(), ty))
            }
            SpendKind::Taproot => {
                let ty = tap_sighash_type(to_sign)?;
                let prevouts = prevouts.ok_or(SignerError::MissingInputData {
                    index,
                    what: "spent outputs of every input",
                })?;
                let sighash = cache
                    .taproot_key_spend_signature_hash(index, &Prevouts::All(prevouts), ty)
                    .map_err(|e| sighash_err(&e))?;
                let msg = Message::from_digest(sighash.to_byte_array());

                let keypair = Keypair::from_secret_key(&self.secp, &self.secret_key);
                let keypair = if to_sign.disable_tweak_signer {
                    keypair
                } else {
                    keypair.tap_tweak(&self.secp, None).to_inner()
                };

                let signature = self.secp.sign_schnorr_no_aux_rand(&msg, &keypair);
                Ok(InputSignature::Schnorr(taproot::Signature {
                    signature,
                    sighash_type: ty,
                }))
            }
        }
    }

    fn sign_ecdsa(&self, digest: [u8; 32], sighash_type: EcdsaSighashType) -> InputSignature {
        let msg = Message::from_digest(digest);
        let signature = self.secp.sign_ecdsa_low_r(&msg, &self.secret_key);
        InputSignature::Ecdsa(ecdsa::Signature {
            signature,
            sighash_type,
        })
    }
}

#[async_trait]
impl Signer for LocalSigner {
    async fn sign_psbt(
        &self,
        psbt: &mut Psbt,
        options: &SignPsbtOptions,
    ) -> Result<(), SignerError> {
        let tx = psbt.unsigned_tx.clone();
        let prevouts = all_spent_outputs(psbt);
        let mut cache = SighashCache::new(&tx);

        for to_sign in &options.to_sign_inputs {
            if to_sign.public_key != self.public_key {
                return Err(SignerError::UnknownKey(to_sign.public_key));
            }

            let index = to_sign.index;
            let input = psbt
                .inputs
                .get(index)
                .ok_or(SignerError::InputOutOfRange(index))?;
            let signature = self.sign_input(&tx, &mut cache, prevouts.as_deref(), input, to_sign)?;

            let input = psbt
                .inputs
                .get_mut(index)
                .ok_or(SignerError::InputOutOfRange(index))?;
            match signature {
                InputSignature::Ecdsa(sig) => {
                    input.partial_sigs.insert(self.public_key, sig);
                }
                InputSignature::Schnorr(sig) => input.tap_key_sig = Some(sig),
            }

            if options.auto_finalized {
                finalize_input(psbt, index)?;
            }
        }

        Ok(())
    }

    async fn sign_message(&self, text: &str, scheme: MessageScheme) -> Result<String, SignerError> {
        match scheme {
            MessageScheme::Ecdsa => {
                let hash = signed_msg_hash(text);
                let msg = Message::from_digest(hash.to_byte_array());
                let signature = self.secp.sign_ecdsa_recoverable(&msg, &self.secret_key);
                Ok(MessageSignature::new(signature, self.public_key.compressed).to_base64())
            }
            MessageScheme::Bip322Simple => Err(SignerError::UnsupportedScheme(scheme)),
        }
    }
}

/// Turns the signature stored on input `index` into its final scriptSig or
/// witness and drops the signing-only fields.
pub fn finalize_input(psbt: &mut Psbt, index: usize) -> Result<(), SignerError> {
    let input = psbt
        .inputs
        .get_mut(index)
        .ok_or(SignerError::InputOutOfRange(index))?;
    let missing_sig = SignerError::MissingInputData {
        index,
        what: "signature",
    };

    if let Some(sig) = input.tap_key_sig {
        input.final_script_witness = Some(Witness::p2tr_key_spend(&sig));
    } else {
        let (pubkey, sig) = input
            .partial_sigs
            .iter()
            .next()
            .map(|(pk, sig)| (*pk, *sig))
            .ok_or(missing_sig)?;

        if let Some(redeem) = &input.redeem_script {
            let push = PushBytesBuf::try_from(redeem.to_bytes())
                .map_err(|e| SignerError::Sighash(e.to_string()))?;
            input.final_script_sig = Some(ScriptBuf::builder().push_slice(push).into_script());
            input.final_script_witness = Some(Witness::p2wpkh(&sig, &pubkey.inner));
        } else if input_spend_kind(input, index)? == SpendKind::Legacy {
            let push = PushBytesBuf::try_from(sig.to_vec())
                .map_err(|e| SignerError::Sighash(e.to_string()))?;
            input.final_script_sig = Some(
                ScriptBuf::builder()
                    .push_slice(push)
                    .push_key(&pubkey)
                    .into_script(),
            );
        } else {
            input.final_script_witness = Some(Witness::p2wpkh(&sig, &pubkey.inner));
        }
    }

    input.partial_sigs.clear();
    input.sighash_type = None;
    input.redeem_script = None;
    input.witness_script = None;
    input.bip32_derivation.clear();
    input.tap_key_sig = None;
    input.tap_internal_key = None;
    input.tap_key_origins.clear();

    Ok(())
}

fn input_spend_kind(input: &psbt::Input, index: usize) -> Result<SpendKind, SignerError> {
    if input.tap_internal_key.is_some() {
        return Ok(SpendKind::Taproot);
    }
    if input.redeem_script.is_some() {
        return Ok(SpendKind::WrappedSegwit);
    }
    if input.non_witness_utxo.is_some() {
        return Ok(SpendKind::Legacy);
    }

    let utxo = witness_utxo(input, index)?;
    let script = &utxo.script_pubkey;
    if script.is_p2pkh() {
        Ok(SpendKind::Legacy)
    } else if script.is_p2wpkh() {
        Ok(SpendKind::NativeSegwit)
    } else if script.is_p2tr() {
        Ok(SpendKind::Taproot)
    } else {
        Err(SignerError::MissingInputData {
            index,
            what: "a spendable script",
        })
    }
}

fn witness_utxo(input: &psbt::Input, index: usize) -> Result<&TxOut, SignerError> {
    input.witness_utxo.as_ref().ok_or(SignerError::MissingInputData {
        index,
        what: "witness utxo",
    })
}

fn spent_output(tx: &Transaction, input: &psbt::Input, index: usize) -> Result<TxOut, SignerError> {
    if let Some(utxo) = &input.witness_utxo {
        return Ok(utxo.clone());
    }

    let vout = tx
        .input
        .get(index)
        .ok_or(SignerError::InputOutOfRange(index))?
        .previous_output
        .vout;
    input
        .non_witness_utxo
        .as_ref()
        .and_then(|prev| prev.output.get(vout as usize))
        .cloned()
        .ok_or(SignerError::MissingInputData {
            index,
            what: "previous output",
        })
}

fn all_spent_outputs(psbt: &Psbt) -> Option<Vec<TxOut>> {
    psbt.inputs
        .iter()
        .enumerate()
        .map(|(i, input)| spent_output(&psbt.unsigned_tx, input, i).ok())
        .collect()
}

fn ecdsa_sighash_type(to_sign: &ToSignInput) -> Result<EcdsaSighashType, SignerError> {
    match to_sign.sighash_types.as_deref().and_then(|types| types.first()) {
        None => Ok(EcdsaSighashType::All),
        Some(&ty) => {
            EcdsaSighashType::from_standard(ty).map_err(|_| SignerError::UnsupportedSighash(ty))
        }
    }
}

fn tap_sighash_type(to_sign: &ToSignInput) -> Result<TapSighashType, SignerError> {
    match to_sign.sighash_types.as_deref().and_then(|types| types.first()) {
        None => Ok(TapSighashType::Default),
        Some(&ty) => u8::try_from(ty)
            .ok()
            .and_then(|b| TapSighashType::from_consensus_u8(b).ok())
            .ok_or(SignerError::UnsupportedSighash(ty)),
    }
}
