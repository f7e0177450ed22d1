use bitcoin::{OutPoint, PublicKey, ScriptBuf, Transaction, Txid};
use ordwallet_runes::RuneId;
use serde::{Deserialize, Serialize};

use crate::address_type::{AddressType, SpendKind};
use crate::input_calc::UNCOMPRESSED_KEY_EXTRA_WEIGHT;

/// An unspent output the caller can spend, together with everything
/// attached to its sats.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendableOutput {
    pub txid: Txid,
    pub vout: u32,
    #[serde(
        serialize_with = "crate::serde::serialize_u64",
        deserialize_with = "crate::serde::deserialize_u64"
    )]
    pub satoshis: u64,
    pub script_pk: ScriptBuf,
    pub pubkey: PublicKey,
    pub address_type: AddressType,
    #[serde(default)]
    pub inscriptions: Vec<InscriptionAnchor>,
    #[serde(default)]
    pub atomicals: Vec<AtomicalAnchor>,
    #[serde(default)]
    pub runes: Vec<RuneBalance>,
    /// Full previous transaction, needed to sign legacy inputs safely.
    #[serde(
        default,
        rename = "rawtx",
        with = "crate::serde::hex_transaction",
        skip_serializing_if = "Option::is_none"
    )]
    pub prev_tx: Option<Transaction>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InscriptionAnchor {
    pub inscription_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inscription_number: Option<i64>,
    /// Position of the inscribed sat inside the output value.
    #[serde(
        serialize_with = "crate::serde::serialize_u64",
        deserialize_with = "crate::serde::deserialize_u64"
    )]
    pub offset: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtomicalKind {
    #[serde(rename = "FT")]
    Fungible,
    #[serde(rename = "NFT")]
    NonFungible,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomicalAnchor {
    pub atomical_id: String,
    pub atomical_number: u64,
    #[serde(rename = "type")]
    pub kind: AtomicalKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atomical_value: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuneBalance {
    #[serde(rename = "runeid")]
    pub rune_id: RuneId,
    #[serde(
        serialize_with = "crate::serde::serialize_u128",
        deserialize_with = "crate::serde::deserialize_u128"
    )]
    pub amount: u128,
}

impl SpendableOutput {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid, self.vout)
    }

    /// Largest inscription offset, if the output carries any inscription.
    pub fn max_inscription_offset(&self) -> Option<u64> {
        self.inscriptions.iter().map(|i| i.offset).max()
    }

    /// Weight spending this output adds beyond what a compressed key of the
    /// same type would.
    pub fn extra_key_weight(&self) -> u64 {
        if self.address_type.spend_kind() == SpendKind::Legacy && !self.pubkey.compressed {
            UNCOMPRESSED_KEY_EXTRA_WEIGHT
        } else {
            0
        }
    }

    /// Weight one more signed input spending this output adds.
    pub fn input_weight(&self) -> u64 {
        self.address_type.marginal_input_weight() + self.extra_key_weight()
    }

    /// Balance of `rune_id` held by this output.
    pub fn rune_amount(&self, rune_id: &RuneId) -> u128 {
        self.runes
            .iter()
            .filter(|r| r.rune_id == *rune_id)
            .map(|r| r.amount)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = r#"{
        "txid": "0000000000000000000000000000000000000000000000000000000000000001",
        "vout": 3,
        "satoshis": "10000",
        "scriptPk": "0014751e76e8199196d454941c45d1b3a323f1433bd6",
        "pubkey": "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
        "addressType": "P2WPKH",
        "inscriptions": [{"inscriptionId": "abc i0", "offset": 1000}],
        "atomicals": [{"atomicalId": "atom_id", "atomicalNumber": 0, "type": "FT", "ticker": "atom"}],
        "runes": [{"runeid": "840000:3", "amount": "1000"}]
    }"#;

    #[test]
    fn parses_wallet_sdk_json() {
        let utxo: SpendableOutput = serde_json::from_str(JSON).unwrap();
        assert_eq!(utxo.vout, 3);
        assert_eq!(utxo.satoshis, 10_000);
        assert_eq!(utxo.address_type, AddressType::P2wpkh);
        assert_eq!(utxo.inscriptions[0].offset, 1000);
        assert_eq!(utxo.atomicals[0].kind, AtomicalKind::Fungible);
        assert_eq!(utxo.rune_amount(&RuneId::new(840_000, 3)), 1000);
        assert_eq!(utxo.rune_amount(&RuneId::new(1, 0)), 0);
        assert_eq!(utxo.max_inscription_offset(), Some(1000));
        assert!(utxo.prev_tx.is_none());
    }

    #[test]
    fn missing_asset_lists_default_to_empty() {
        let json = r#"{
            "txid": "0000000000000000000000000000000000000000000000000000000000000001",
            "vout": 0,
            "satoshis": 546,
            "scriptPk": "0014751e76e8199196d454941c45d1b3a323f1433bd6",
            "pubkey": "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
            "addressType": "P2WPKH"
        }"#;
        let utxo: SpendableOutput = serde_json::from_str(json).unwrap();
        assert!(utxo.inscriptions.is_empty());
        assert!(utxo.atomicals.is_empty());
        assert!(utxo.runes.is_empty());
    }

    #[test]
    fn uncompressed_legacy_keys_weigh_more() {
        let mut utxo: SpendableOutput = serde_json::from_str(JSON).unwrap();
        assert_eq!(utxo.input_weight(), 272);

        utxo.pubkey.compressed = false;
        assert_eq!(utxo.extra_key_weight(), 0);

        utxo.address_type = AddressType::P2pkh;
        assert_eq!(utxo.extra_key_weight(), 128);
        assert_eq!(utxo.input_weight(), 596 + 128);
    }

    #[test]
    fn amounts_serialize_as_strings() {
        let anchor = InscriptionAnchor {
            inscription_id: "x".to_string(),
            inscription_number: None,
            offset: 1000,
        };
        assert_eq!(
            serde_json::to_string(&anchor).unwrap(),
            r#"{"inscriptionId":"x","offset":"1000"}"#
        );

        let utxo: SpendableOutput = serde_json::from_str(JSON).unwrap();
        let value = serde_json::to_value(&utxo).unwrap();
        assert_eq!(value["satoshis"], "10000");
        assert_eq!(value["runes"][0]["amount"], "1000");
    }

    #[test]
    fn json_round_trip_preserves_value() {
        let utxo: SpendableOutput = serde_json::from_str(JSON).unwrap();
        let again: SpendableOutput =
            serde_json::from_str(&serde_json::to_string(&utxo).unwrap()).unwrap();
        assert_eq!(utxo, again);
    }
}
