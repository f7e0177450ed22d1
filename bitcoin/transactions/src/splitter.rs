use tracing::{debug, warn};

use crate::address_type::DEFAULT_DUST;
use crate::error::TxBuildError;
use crate::utxo::InscriptionAnchor;

/// Default value of an output created to hold an inscription.
pub const DEFAULT_UNIT_SIZE: u64 = 546;

/// A contiguous slice of an output's value and the inscriptions inside it,
/// with offsets relative to the slice start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InscriptionUnit {
    pub satoshis: u64,
    pub inscriptions: Vec<InscriptionAnchor>,
}

impl InscriptionUnit {
    fn plain(satoshis: u64) -> Self {
        Self {
            satoshis,
            inscriptions: Vec::new(),
        }
    }

    fn holding(satoshis: u64, anchor: &InscriptionAnchor, local_offset: u64) -> Self {
        Self {
            satoshis,
            inscriptions: vec![rebase(anchor, local_offset)],
        }
    }

    pub fn has_inscriptions(&self) -> bool {
        !self.inscriptions.is_empty()
    }
}

fn rebase(anchor: &InscriptionAnchor, local_offset: u64) -> InscriptionAnchor {
    InscriptionAnchor {
        offset: local_offset,
        ..anchor.clone()
    }
}

/// Cuts an inscribed output into units so that each inscription can be moved
/// without dragging unrelated value or other inscriptions along.
///
/// Inscriptions closer together than one unit cannot be separated and end up
/// in the same unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InscriptionSplitter {
    unit_size: u64,
    dust_limit: u64,
}

impl Default for InscriptionSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_UNIT_SIZE, DEFAULT_DUST)
    }
}

impl InscriptionSplitter {
    pub fn new(unit_size: u64, dust_limit: u64) -> Self {
        Self {
            unit_size: unit_size.max(1),
            dust_limit,
        }
    }

    pub fn unit_size(&self) -> u64 {
        self.unit_size
    }

    /// Splits `satoshis` around `anchors`. The units come back in offset
    /// order and their values add up to `satoshis`.
    pub fn split(
        &self,
        satoshis: u64,
        anchors: &[InscriptionAnchor],
    ) -> Result<Vec<InscriptionUnit>, TxBuildError> {
        let mut anchors = anchors.to_vec();
        anchors.sort_by_key(|a| a.offset);

        if let Some(outside) = anchors.iter().find(|a| a.offset >= satoshis) {
            return Err(TxBuildError::AssetMayBeLost {
                offset: outside.offset,
                output_value: satoshis,
            });
        }

        let mut units: Vec<InscriptionUnit> = Vec::new();
        let mut consumed: u64 = 0;

        for anchor in &anchors {
            let remaining = satoshis - consumed;

            if anchor.offset < consumed || remaining < self.unit_size {
                let Some(last) = units.last_mut() else {
                    // The whole output is smaller than one unit.
                    units.push(InscriptionUnit::holding(remaining, anchor, anchor.offset));
                    consumed = satoshis;
                    continue;
                };

                let start = consumed - last.satoshis;
                if anchor.offset < consumed {
                    warn!(
                        inscription_id = %anchor.inscription_id,
                        offset = anchor.offset,
                        "inscription is too close to the previous one to be split off"
                    );
                } else {
                    debug!(
                        inscription_id = %anchor.inscription_id,
                        remaining,
                        "absorbing tail shorter than one unit"
                    );
                    last.satoshis += remaining;
                    consumed = satoshis;
                }
                last.inscriptions.push(rebase(anchor, anchor.offset - start));
                continue;
            }

            let local_offset = anchor.offset - consumed;
            let needed = local_offset.saturating_add(self.unit_size);

            if remaining < needed {
                // No room for a full unit after the anchor, it keeps the rest.
                units.push(InscriptionUnit::holding(remaining, anchor, local_offset));
                consumed = satoshis;
            } else if local_offset >= self.unit_size {
                units.push(InscriptionUnit::plain(local_offset));
                units.push(InscriptionUnit::holding(self.unit_size, anchor, 0));
                consumed += needed;
            } else {
                units.push(InscriptionUnit::holding(needed, anchor, local_offset));
                consumed += needed;
            }
        }

        let rest = satoshis - consumed;
        if rest > self.dust_limit {
            units.push(InscriptionUnit::plain(rest));
        } else if rest > 0 {
            match units.last_mut() {
                Some(last) => last.satoshis += rest,
                None => units.push(InscriptionUnit::plain(rest)),
            }
        }

        Ok(units)
    }
}
