//! Pure predicates over sets of spendable outputs.

use crate::utxo::{AtomicalKind, SpendableOutput};

/// Asset families an output can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Inscription,
    FungibleToken,
    NonFungibleToken,
    Rune,
    Any,
}

impl SpendableOutput {
    pub fn has_asset(&self, kind: AssetKind) -> bool {
        match kind {
            AssetKind::Inscription => !self.inscriptions.is_empty(),
            AssetKind::FungibleToken => self
                .atomicals
                .iter()
                .any(|a| a.kind == AtomicalKind::Fungible),
            AssetKind::NonFungibleToken => self
                .atomicals
                .iter()
                .any(|a| a.kind == AtomicalKind::NonFungible),
            AssetKind::Rune => !self.runes.is_empty(),
            AssetKind::Any => {
                !self.inscriptions.is_empty() || !self.atomicals.is_empty() || !self.runes.is_empty()
            }
        }
    }

    pub fn is_plain(&self) -> bool {
        !self.has_asset(AssetKind::Any)
    }
}

/// Whether any output in `utxos` carries an asset of `kind`.
pub fn has_asset(utxos: &[SpendableOutput], kind: AssetKind) -> bool {
    utxos.iter().any(|u| u.has_asset(kind))
}

/// Splits `utxos` at the shortest prefix whose value reaches `target`,
/// keeping the caller's order. If the whole set falls short, the prefix is
/// the whole set and the remainder is empty. A zero target selects nothing.
pub fn select_plain(
    utxos: &[SpendableOutput],
    target: u64,
) -> (&[SpendableOutput], &[SpendableOutput]) {
    let mut total: u64 = 0;
    let mut end = 0;

    for utxo in utxos {
        if total >= target {
            break;
        }
        total = total.saturating_add(utxo.satoshis);
        end += 1;
    }

    utxos.split_at(end)
}

/// Sum of output values.
pub fn total_value(utxos: &[SpendableOutput]) -> u64 {
    utxos.iter().map(|u| u.satoshis).fold(0, u64::saturating_add)
}
