use bitcoin::secp256k1::{Secp256k1, Verification};
use bitcoin::{PublicKey, Script, ScriptBuf, XOnlyPublicKey};
use serde::{Deserialize, Serialize};

use crate::input_calc::{
    P2PKH_INPUT_WEIGHT, P2SH_P2WPKH_INPUT_WEIGHT, P2TR_INPUT_WEIGHT, P2WPKH_INPUT_WEIGHT,
};

pub const P2WPKH_DUST: u64 = 294;
pub const P2TR_DUST: u64 = 330;
pub const DEFAULT_DUST: u64 = 546;

/// How an output is locked, and therefore how it must be spent.
///
/// The `M44*` kinds are the same scripts derived under a BIP44 path; they
/// spend exactly like their plain counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressType {
    #[serde(rename = "P2PKH")]
    P2pkh,
    #[serde(rename = "P2WPKH")]
    P2wpkh,
    #[serde(rename = "P2TR")]
    P2tr,
    #[serde(rename = "P2SH_P2WPKH")]
    P2shP2wpkh,
    #[serde(rename = "M44_P2WPKH")]
    M44P2wpkh,
    #[serde(rename = "M44_P2TR")]
    M44P2tr,
}

/// The distinct spending paths behind [`AddressType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpendKind {
    Legacy,
    WrappedSegwit,
    NativeSegwit,
    Taproot,
}

impl AddressType {
    pub const ALL: [AddressType; 6] = [
        AddressType::P2pkh,
        AddressType::P2wpkh,
        AddressType::P2tr,
        AddressType::P2shP2wpkh,
        AddressType::M44P2wpkh,
        AddressType::M44P2tr,
    ];

    pub fn spend_kind(&self) -> SpendKind {
        match self {
            AddressType::P2pkh => SpendKind::Legacy,
            AddressType::P2shP2wpkh => SpendKind::WrappedSegwit,
            AddressType::P2wpkh | AddressType::M44P2wpkh => SpendKind::NativeSegwit,
            AddressType::P2tr | AddressType::M44P2tr => SpendKind::Taproot,
        }
    }

    /// Smallest relayable output value for this type.
    pub fn dust_limit(&self) -> u64 {
        match self.spend_kind() {
            SpendKind::NativeSegwit => P2WPKH_DUST,
            SpendKind::Taproot => P2TR_DUST,
            SpendKind::Legacy | SpendKind::WrappedSegwit => DEFAULT_DUST,
        }
    }

    /// Weight one more signed input of this type adds to a transaction.
    pub fn marginal_input_weight(&self) -> u64 {
        match self.spend_kind() {
            SpendKind::NativeSegwit => P2WPKH_INPUT_WEIGHT,
            SpendKind::Taproot => P2TR_INPUT_WEIGHT,
            SpendKind::Legacy => P2PKH_INPUT_WEIGHT,
            SpendKind::WrappedSegwit => P2SH_P2WPKH_INPUT_WEIGHT,
        }
    }

    /// [`Self::marginal_input_weight`] in virtual bytes.
    pub fn marginal_input_vsize(&self) -> f64 {
        self.marginal_input_weight() as f64 / 4.0
    }

    pub fn is_segwit(&self) -> bool {
        !matches!(self.spend_kind(), SpendKind::Legacy)
    }

    /// Locking script for `pubkey` under this type. Fails for segwit kinds
    /// when the key is uncompressed.
    pub fn script_pubkey<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        pubkey: &PublicKey,
    ) -> Option<ScriptBuf> {
        let script = match self.spend_kind() {
            SpendKind::Legacy => ScriptBuf::new_p2pkh(&pubkey.pubkey_hash()),
            SpendKind::NativeSegwit => ScriptBuf::new_p2wpkh(&pubkey.wpubkey_hash().ok()?),
            SpendKind::WrappedSegwit => {
                let redeem = ScriptBuf::new_p2wpkh(&pubkey.wpubkey_hash().ok()?);
                ScriptBuf::new_p2sh(&redeem.script_hash())
            }
            SpendKind::Taproot => {
                ScriptBuf::new_p2tr(secp, XOnlyPublicKey::from(pubkey.inner), None)
            }
        };
        Some(script)
    }

    /// Whether `script` has the template this type spends.
    pub fn matches_script(&self, script: &Script) -> bool {
        match self.spend_kind() {
            SpendKind::Legacy => script.is_p2pkh(),
            SpendKind::NativeSegwit => script.is_p2wpkh(),
            SpendKind::WrappedSegwit => script.is_p2sh(),
            SpendKind::Taproot => script.is_p2tr(),
        }
    }
}

/// Dust limit for an arbitrary locking script, used for outputs that are
/// only known by address.
pub fn dust_limit_for_script(script: &Script) -> u64 {
    if script.is_p2wpkh() {
        P2WPKH_DUST
    } else if script.is_p2tr() {
        P2TR_DUST
    } else {
        DEFAULT_DUST
    }
}
