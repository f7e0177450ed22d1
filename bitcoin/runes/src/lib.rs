//! Rune protocol primitives: the LEB128-style varint codec, rune ids and the
//! transfer payload embedded after `OP_RETURN OP_13`.

pub mod edict;
pub mod error;
pub mod rune_id;
pub mod varint;

pub use edict::{encipher_transfer, Edict, TAG_BODY};
pub use error::{RuneIdError, VarintError};
pub use rune_id::RuneId;
