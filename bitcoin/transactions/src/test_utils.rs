use std::sync::atomic::{AtomicU32, Ordering};

use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, Network, OutPoint, Psbt, PublicKey, ScriptBuf, Sequence, Transaction, TxIn,
    TxOut, Txid, Witness,
};
use ordwallet_runes::RuneId;

use crate::address_type::AddressType;
use crate::config::TxOptions;
use crate::fee_rate::FeeRate;
use crate::local_signer::LocalSigner;
use crate::signer::{SignPsbtOptions, Signer, ToSignInput};
use crate::utxo::{AtomicalAnchor, AtomicalKind, InscriptionAnchor, RuneBalance, SpendableOutput};

static NEXT_OUTPOINT: AtomicU32 = AtomicU32::new(1);

pub struct TestWallet {
    pub signer: LocalSigner,
    pub address_type: AddressType,
    pub pubkey: PublicKey,
    pub script_pk: ScriptBuf,
    pub address: Address,
}

impl TestWallet {
    pub fn new(address_type: AddressType) -> Self {
        let network = Network::Bitcoin;
        let signer = LocalSigner::random();
        let pubkey = signer.public_key();
        let script_pk = signer.script_pubkey(address_type).unwrap();
        let address = signer.address(address_type, network).unwrap();
        Self {
            signer,
            address_type,
            pubkey,
            script_pk,
            address,
        }
    }
}

pub fn options(sat_per_vb: f64) -> TxOptions {
    TxOptions::new(Network::Bitcoin, FeeRate::try_from(sat_per_vb).unwrap())
}

/// A fresh output owned by `wallet`. Legacy outputs come with a matching
/// previous transaction.
pub fn dummy_utxo(wallet: &TestWallet, satoshis: u64) -> SpendableOutput {
    let n = NEXT_OUTPOINT.fetch_add(1, Ordering::Relaxed);

    let (txid, vout, prev_tx) = if wallet.address_type == AddressType::P2pkh {
        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::from_consensus(n),
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(satoshis),
                script_pubkey: wallet.script_pk.clone(),
            }],
        };
        (tx.compute_txid(), 0, Some(tx))
    } else {
        let mut bytes = [0u8; 32];
        bytes[..4].copy_from_slice(&n.to_le_bytes());
        (Txid::from_byte_array(bytes), n % 4, None)
    };

    SpendableOutput {
        txid,
        vout,
        satoshis,
        script_pk: wallet.script_pk.clone(),
        pubkey: wallet.pubkey,
        address_type: wallet.address_type,
        inscriptions: Vec::new(),
        atomicals: Vec::new(),
        runes: Vec::new(),
        prev_tx,
    }
}

pub fn inscribed_utxo(wallet: &TestWallet, satoshis: u64, offsets: &[u64]) -> SpendableOutput {
    let mut utxo = dummy_utxo(wallet, satoshis);
    utxo.inscriptions = offsets
        .iter()
        .enumerate()
        .map(|(i, offset)| InscriptionAnchor {
            inscription_id: format!("{}i{i}", utxo.txid),
            inscription_number: Some(i as i64),
            offset: *offset,
        })
        .collect();
    utxo
}

pub fn atomical_utxo(wallet: &TestWallet, satoshis: u64, kind: AtomicalKind) -> SpendableOutput {
    let mut utxo = dummy_utxo(wallet, satoshis);
    utxo.atomicals.push(AtomicalAnchor {
        atomical_id: format!("{}i0", utxo.txid),
        atomical_number: u64::from(utxo.vout),
        kind,
        ticker: (kind == AtomicalKind::Fungible).then(|| "atom".to_string()),
        atomical_value: (kind == AtomicalKind::Fungible).then_some(satoshis),
    });
    utxo
}

pub fn rune_utxo(wallet: &TestWallet, satoshis: u64, balances: &[(RuneId, u128)]) -> SpendableOutput {
    let mut utxo = dummy_utxo(wallet, satoshis);
    utxo.runes = balances
        .iter()
        .map(|(rune_id, amount)| RuneBalance {
            rune_id: *rune_id,
            amount: *amount,
        })
        .collect();
    utxo
}

/// Signs every listed input with `wallet`, finalizes and extracts.
pub async fn sign_and_extract(
    wallet: &TestWallet,
    mut psbt: Psbt,
    to_sign_inputs: Vec<ToSignInput>,
) -> Transaction {
    let options = SignPsbtOptions {
        to_sign_inputs,
        auto_finalized: true,
    };
    wallet.signer.sign_psbt(&mut psbt, &options).await.unwrap();
    psbt.extract_tx_unchecked_fee_rate()
}

/// Fee actually paid by `psbt`, from its recorded previous outputs.
pub fn psbt_fee(psbt: &Psbt) -> u64 {
    let tx = &psbt.unsigned_tx;
    let total_in: u64 = psbt
        .inputs
        .iter()
        .zip(&tx.input)
        .map(|(input, txin)| match (&input.witness_utxo, &input.non_witness_utxo) {
            (Some(out), _) => out.value.to_sat(),
            (None, Some(prev)) => prev.output[txin.previous_output.vout as usize].value.to_sat(),
            (None, None) => panic!("input without previous output"),
        })
        .sum();
    let total_out: u64 = tx.output.iter().map(|o| o.value.to_sat()).sum();
    total_in - total_out
}

/// `fee` pays at least `sat_per_vb` for the signed `tx`, give or take one
/// sat of signature-length jitter, and overpays by at most `slack_vb`.
pub fn assert_fee_rate(tx: &Transaction, fee: u64, sat_per_vb: f64, slack_vb: u64) {
    let rate = FeeRate::try_from(sat_per_vb).unwrap();
    let floor = rate.fee_for_weight(tx.weight().to_wu()).unwrap();
    let ceiling = rate.fee_for_vsize(tx.vsize() as u64 + slack_vb).unwrap();
    assert!(
        fee + 1 >= floor,
        "fee {fee} below {floor} for weight {}",
        tx.weight()
    );
    assert!(
        fee <= ceiling,
        "fee {fee} above {ceiling} for vsize {}",
        tx.vsize()
    );
}
