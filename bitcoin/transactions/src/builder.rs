use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::psbt::{self, raw::ProprietaryKey};
use bitcoin::script::PushBytesBuf;
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, Network, Psbt, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness,
    XOnlyPublicKey,
};
use ordwallet_math::safe_sum;
use serde::Serialize;
use tracing::{trace, warn};

use crate::address_type::SpendKind;
use crate::config::{LegacyPolicy, TxOptions};
use crate::error::TxBuildError;
use crate::fee_rate::FeeRate;
use crate::utxo::SpendableOutput;

/// Proprietary PSBT key prefix marking a legacy input described with a
/// witness-style value/script pair instead of its previous transaction.
pub const WITNESS_FALLBACK_PREFIX: &[u8] = b"ordwallet";
pub const WITNESS_FALLBACK_SUBTYPE: u8 = 0;

/// Largest `OP_RETURN` payload relayed by default policy.
pub const MAX_OP_RETURN_DATA: usize = 80;

pub fn witness_fallback_key() -> ProprietaryKey {
    ProprietaryKey {
        prefix: WITNESS_FALLBACK_PREFIX.to_vec(),
        subtype: WITNESS_FALLBACK_SUBTYPE,
        key: Vec::new(),
    }
}

/// Parses `address` and checks it belongs to `network`.
pub fn parse_address(address: &str, network: Network) -> Result<Address, TxBuildError> {
    Address::from_str(address)
        .map_err(|e| TxBuildError::InvalidAddress(format!("{address}: {e}")))?
        .require_network(network)
        .map_err(|e| TxBuildError::InvalidAddress(format!("{address}: {e}")))
}

/// Something the caller should know about a successfully built transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BuildWarning {
    /// A legacy input is described without its previous transaction, so its
    /// signature will not commit to the full previous transaction.
    #[serde(rename_all = "camelCase")]
    LegacyWitnessFallback { input_index: usize },
}

/// What the PSBT needs to know about an input for it to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputDescriptor {
    SegwitV0 {
        witness_utxo: TxOut,
    },
    WrappedSegwit {
        witness_utxo: TxOut,
        redeem_script: ScriptBuf,
    },
    Taproot {
        witness_utxo: TxOut,
        internal_key: XOnlyPublicKey,
    },
    Legacy {
        previous_tx: Transaction,
    },
    LegacyWitnessFallback {
        witness_utxo: TxOut,
    },
}

impl InputDescriptor {
    /// Derives the descriptor for `utxo`, the `index`-th input.
    ///
    /// With `estimate` set, legacy inputs always take the witness fallback:
    /// the placeholder key used for estimation cannot match any real
    /// previous transaction and the signature size does not change.
    pub fn from_utxo(
        index: usize,
        utxo: &SpendableOutput,
        policy: LegacyPolicy,
        estimate: bool,
    ) -> Result<Self, TxBuildError> {
        let invalid = |reason: &str| TxBuildError::InvalidUtxo {
            index,
            reason: reason.to_string(),
        };

        if !utxo.address_type.matches_script(&utxo.script_pk) {
            return Err(invalid("script does not match the address type"));
        }

        let witness_utxo = TxOut {
            value: Amount::from_sat(utxo.satoshis),
            script_pubkey: utxo.script_pk.clone(),
        };

        let kind = utxo.address_type.spend_kind();
        if kind != SpendKind::Legacy && !utxo.pubkey.compressed {
            return Err(invalid("segwit inputs need a compressed public key"));
        }

        let descriptor = match kind {
            SpendKind::NativeSegwit => InputDescriptor::SegwitV0 { witness_utxo },
            SpendKind::WrappedSegwit => {
                let wpkh = utxo
                    .pubkey
                    .wpubkey_hash()
                    .map_err(|_| invalid("segwit inputs need a compressed public key"))?;
                let redeem_script = ScriptBuf::new_p2wpkh(&wpkh);
                if ScriptBuf::new_p2sh(&redeem_script.script_hash()) != utxo.script_pk {
                    return Err(invalid("public key does not match the p2sh script"));
                }
                InputDescriptor::WrappedSegwit {
                    witness_utxo,
                    redeem_script,
                }
            }
            SpendKind::Taproot => InputDescriptor::Taproot {
                witness_utxo,
                internal_key: XOnlyPublicKey::from(utxo.pubkey.inner),
            },
            SpendKind::Legacy => match (&utxo.prev_tx, estimate) {
                (Some(previous_tx), false) => {
                    if previous_tx.compute_txid() != utxo.txid {
                        return Err(invalid("previous transaction does not match the txid"));
                    }
                    let spent = previous_tx
                        .output
                        .get(utxo.vout as usize)
                        .ok_or_else(|| invalid("previous transaction has no such output"))?;
                    if *spent != witness_utxo {
                        return Err(invalid("previous output differs from the utxo"));
                    }
                    InputDescriptor::Legacy {
                        previous_tx: previous_tx.clone(),
                    }
                }
                (_, true) => InputDescriptor::LegacyWitnessFallback { witness_utxo },
                (None, false) => match policy {
                    LegacyPolicy::Strict => {
                        return Err(TxBuildError::MissingPreviousTransaction { index })
                    }
                    LegacyPolicy::WitnessFallback => {
                        warn!(
                            index,
                            outpoint = %utxo.outpoint(),
                            "legacy input has no previous transaction, signing it witness-style"
                        );
                        InputDescriptor::LegacyWitnessFallback { witness_utxo }
                    }
                },
            },
        };

        Ok(descriptor)
    }

    pub fn is_witness_fallback(&self) -> bool {
        matches!(self, InputDescriptor::LegacyWitnessFallback { .. })
    }

    fn apply(&self, input: &mut psbt::Input) {
        match self {
            InputDescriptor::SegwitV0 { witness_utxo } => {
                input.witness_utxo = Some(witness_utxo.clone());
            }
            InputDescriptor::WrappedSegwit {
                witness_utxo,
                redeem_script,
            } => {
                input.witness_utxo = Some(witness_utxo.clone());
                input.redeem_script = Some(redeem_script.clone());
            }
            InputDescriptor::Taproot {
                witness_utxo,
                internal_key,
            } => {
                input.witness_utxo = Some(witness_utxo.clone());
                input.tap_internal_key = Some(*internal_key);
            }
            InputDescriptor::Legacy { previous_tx } => {
                input.non_witness_utxo = Some(previous_tx.clone());
            }
            InputDescriptor::LegacyWitnessFallback { witness_utxo } => {
                input.witness_utxo = Some(witness_utxo.clone());
                input.proprietary.insert(witness_fallback_key(), vec![1]);
            }
        }
    }
}

/// A spendable output together with the way it is described to signers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundInput {
    pub utxo: SpendableOutput,
    pub descriptor: InputDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Address(Address),
    Script(ScriptBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderOutput {
    pub target: OutputTarget,
    pub value: u64,
}

impl BuilderOutput {
    pub fn script_pubkey(&self) -> ScriptBuf {
        match &self.target {
            OutputTarget::Address(address) => address.script_pubkey(),
            OutputTarget::Script(script) => script.clone(),
        }
    }
}

/// Accumulates the inputs and outputs of one unsigned transaction.
///
/// ## Lifecycle
///
/// A builder is created empty for a single send operation, filled through
/// its `add_*` methods, and turned into a [`Psbt`] with
/// [`TransactionBuilder::to_psbt`]. It never talks to a signer; fee
/// estimation works on a [`Clone`] of it.
///
/// ## Change
///
/// At most one output is the change slot. [`TransactionBuilder::add_change_output`]
/// replaces the previous slot, and [`TransactionBuilder::remove_change_output`]
/// drops it so its value becomes fee.
///
/// ## Legacy inputs
///
/// P2PKH inputs are described by their full previous transaction when the
/// caller supplies it. Without it the [`LegacyPolicy`] in the options
/// decides between a witness-style fallback and an error.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    inputs: Vec<BoundInput>,
    outputs: Vec<BuilderOutput>,
    change_index: Option<usize>,
    change_address: Address,
    network: Network,
    fee_rate: FeeRate,
    enable_rbf: bool,
    legacy_policy: LegacyPolicy,
}

impl TransactionBuilder {
    pub fn new(options: &TxOptions, change_address: Address) -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
            change_index: None,
            change_address,
            network: options.network,
            fee_rate: options.fee_rate,
            enable_rbf: options.enable_rbf,
            legacy_policy: options.legacy_policy,
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn fee_rate(&self) -> FeeRate {
        self.fee_rate
    }

    pub fn change_address(&self) -> &Address {
        &self.change_address
    }

    pub fn inputs(&self) -> &[BoundInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[BuilderOutput] {
        &self.outputs
    }

    pub fn change_output(&self) -> Option<&BuilderOutput> {
        self.change_index.and_then(|i| self.outputs.get(i))
    }

    // === Inputs =============================================================

    /// Binds `utxo` as the next input and returns its index.
    pub fn add_input(&mut self, utxo: SpendableOutput) -> Result<usize, TxBuildError> {
        let index = self.inputs.len();
        let descriptor = InputDescriptor::from_utxo(index, &utxo, self.legacy_policy, false)?;
        self.inputs.push(BoundInput { utxo, descriptor });
        Ok(index)
    }

    /// Binds `utxo` the way estimation copies do, without legacy policy
    /// checks. Only used for the coin selector's placeholder input.
    pub(crate) fn add_estimation_input(
        &mut self,
        utxo: SpendableOutput,
    ) -> Result<usize, TxBuildError> {
        let index = self.inputs.len();
        let descriptor = InputDescriptor::from_utxo(index, &utxo, self.legacy_policy, true)?;
        self.inputs.push(BoundInput { utxo, descriptor });
        Ok(index)
    }

    pub fn remove_last_input(&mut self) -> Option<BoundInput> {
        self.inputs.pop()
    }

    /// Points every input at `pubkey` with a script of the input's own type,
    /// keeping sizes identical. Used on estimation copies only.
    pub(crate) fn rebind_for_estimation<F>(
        &mut self,
        pubkey: bitcoin::PublicKey,
        mut script_for: F,
    ) -> Result<(), TxBuildError>
    where
        F: FnMut(&SpendableOutput) -> Option<ScriptBuf>,
    {
        for (index, input) in self.inputs.iter_mut().enumerate() {
            let mut utxo = input.utxo.clone();
            utxo.pubkey = pubkey;
            utxo.script_pk = script_for(&utxo).ok_or_else(|| TxBuildError::InvalidUtxo {
                index,
                reason: "no script for the estimation key".to_string(),
            })?;
            utxo.prev_tx = None;

            let descriptor = InputDescriptor::from_utxo(index, &utxo, self.legacy_policy, true)?;
            *input = BoundInput { utxo, descriptor };
        }
        Ok(())
    }

    /// Indices of inputs described through the legacy witness fallback.
    pub fn witness_fallback_inputs(&self) -> Vec<usize> {
        self.inputs
            .iter()
            .enumerate()
            .filter(|(_, input)| input.descriptor.is_witness_fallback())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn warnings(&self) -> Vec<BuildWarning> {
        self.witness_fallback_inputs()
            .into_iter()
            .map(|input_index| BuildWarning::LegacyWitnessFallback { input_index })
            .collect()
    }

    // === Outputs ============================================================

    pub fn add_output(&mut self, address: Address, value: u64) -> usize {
        self.push_output(OutputTarget::Address(address), value)
    }

    pub fn add_script_output(&mut self, script_pubkey: ScriptBuf, value: u64) -> usize {
        self.push_output(OutputTarget::Script(script_pubkey), value)
    }

    /// Appends a zero-value `OP_RETURN <data>` output. `data` is limited to
    /// [`MAX_OP_RETURN_DATA`] bytes.
    pub fn add_op_return(&mut self, data: &[u8]) -> Result<usize, TxBuildError> {
        if data.len() > MAX_OP_RETURN_DATA {
            return Err(TxBuildError::InvalidMemo(format!(
                "{} bytes exceeds the {MAX_OP_RETURN_DATA} byte limit",
                data.len()
            )));
        }
        let push = PushBytesBuf::try_from(data.to_vec())
            .map_err(|_| TxBuildError::InvalidMemo(format!("{} bytes is too long", data.len())))?;
        Ok(self.add_script_output(ScriptBuf::new_op_return(push), 0))
    }

    /// Appends a change output paying `value` to the change address. Any
    /// previous change output is removed first.
    pub fn add_change_output(&mut self, value: u64) -> usize {
        self.remove_change_output();
        let index = self.add_output(self.change_address.clone(), value);
        self.change_index = Some(index);
        index
    }

    pub fn remove_change_output(&mut self) -> Option<BuilderOutput> {
        let index = self.change_index.take()?;
        Some(self.outputs.remove(index))
    }

    /// Overwrites the value of the output at `index`, returning the old one.
    pub fn set_output_value(&mut self, index: usize, value: u64) -> Option<u64> {
        let output = self.outputs.get_mut(index)?;
        Some(std::mem::replace(&mut output.value, value))
    }

    fn push_output(&mut self, target: OutputTarget, value: u64) -> usize {
        self.outputs.push(BuilderOutput { target, value });
        self.outputs.len() - 1
    }

    // === Totals =============================================================

    pub fn total_input(&self) -> Result<u64, TxBuildError> {
        Ok(safe_sum(self.inputs.iter().map(|i| i.utxo.satoshis))?)
    }

    pub fn total_output(&self) -> Result<u64, TxBuildError> {
        Ok(safe_sum(self.outputs.iter().map(|o| o.value))?)
    }

    /// Input value not assigned to any output, negative while underfunded.
    pub fn unspent(&self) -> Result<i128, TxBuildError> {
        Ok(self.total_input()? as i128 - self.total_output()? as i128)
    }

    // === Serialization ======================================================

    pub fn to_unsigned_tx(&self) -> Result<Transaction, TxBuildError> {
        if self.inputs.is_empty() {
            return Err(TxBuildError::NoInputs);
        }

        let sequence = if self.enable_rbf {
            Sequence::ENABLE_RBF_NO_LOCKTIME
        } else {
            Sequence::MAX
        };

        Ok(Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: self
                .inputs
                .iter()
                .map(|input| TxIn {
                    previous_output: input.utxo.outpoint(),
                    script_sig: ScriptBuf::new(),
                    sequence,
                    witness: Witness::new(),
                })
                .collect(),
            output: self
                .outputs
                .iter()
                .map(|output| TxOut {
                    value: Amount::from_sat(output.value),
                    script_pubkey: output.script_pubkey(),
                })
                .collect(),
        })
    }

    /// Produces the unsigned PSBT with every input's signing data filled in.
    pub fn to_psbt(&self) -> Result<Psbt, TxBuildError> {
        let mut psbt = Psbt::from_unsigned_tx(self.to_unsigned_tx()?)?;
        for (input, bound) in psbt.inputs.iter_mut().zip(&self.inputs) {
            bound.descriptor.apply(input);
        }
        Ok(psbt)
    }

    /// Logs the inputs, outputs and implied fee at trace level.
    pub fn dump(&self) {
        for (i, input) in self.inputs.iter().enumerate() {
            trace!(
                index = i,
                outpoint = %input.utxo.outpoint(),
                satoshis = input.utxo.satoshis,
                address_type = ?input.utxo.address_type,
                "input"
            );
        }
        for (i, output) in self.outputs.iter().enumerate() {
            trace!(
                index = i,
                script = %output.script_pubkey(),
                satoshis = output.value,
                change = self.change_index == Some(i),
                "output"
            );
        }
        trace!(
            total_input = ?self.total_input(),
            total_output = ?self.total_output(),
            fee = ?self.unspent(),
            fee_rate = %self.fee_rate,
            "transaction summary"
        );
    }
}
