use crate::rune_id::RuneId;
use crate::varint;

/// Runestone tag that introduces the edict body.
pub const TAG_BODY: u128 = 0;

/// Transfer of `amount` units of `id` to the output at `output`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edict {
    pub id: RuneId,
    pub amount: u128,
    pub output: u32,
}

impl Edict {
    /// Appends this edict to `buf` with its id delta-encoded against `previous`.
    fn encode_to_vec(&self, previous: RuneId, buf: &mut Vec<u8>) {
        let block = self.id.block - previous.block;
        let tx = if block == 0 {
            self.id.tx - previous.tx
        } else {
            self.id.tx
        };

        varint::encode_to_vec(block as u128, buf);
        varint::encode_to_vec(tx as u128, buf);
        varint::encode_to_vec(self.amount, buf);
        varint::encode_to_vec(self.output as u128, buf);
    }
}

/// Builds the runestone payload for a list of edicts. Edicts are sorted by
/// id first so the delta encoding never goes negative.
pub fn encipher(edicts: &[Edict]) -> Vec<u8> {
    let mut sorted = edicts.to_vec();
    sorted.sort_by_key(|edict| edict.id);

    let mut payload = Vec::new();
    varint::encode_to_vec(TAG_BODY, &mut payload);

    let mut previous = RuneId::default();
    for edict in &sorted {
        edict.encode_to_vec(previous, &mut payload);
        previous = edict.id;
    }

    payload
}

/// Payload for a single transfer. With `has_change` the remainder stays on
/// output 1 and the transfer goes to output 2; otherwise it goes to output 1.
pub fn encipher_transfer(id: RuneId, amount: u128, has_change: bool) -> Vec<u8> {
    let output = if has_change { 2 } else { 1 };
    encipher(&[Edict { id, amount, output }])
}
