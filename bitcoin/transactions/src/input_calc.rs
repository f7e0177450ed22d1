//! Size of one more input of each ownership type, in weight units.
//!
//! Signatures are assumed to be 72 byte DER ECDSA (with sighash flag) or 64
//! byte schnorr, so these are upper bounds for ECDSA kinds.

// Sizes of the non-witness data (base data)
const INPUT_OUTPOINT_SIZE: u64 = 36; // 32-byte txid + 4-byte vout
const INPUT_SEQUENCE_SIZE: u64 = 4; // nSequence
const INPUT_SCRIPT_SIG_LEN_SIZE: u64 = 1; // varint for scriptSig length

/// Outpoint, empty script length and sequence: 36 + 1 + 4 = 41 bytes.
pub const INPUT_BASE_SIZE: u64 = INPUT_OUTPOINT_SIZE + INPUT_SCRIPT_SIG_LEN_SIZE + INPUT_SEQUENCE_SIZE;

pub const ECDSA_SIGNATURE_SIZE: u64 = 72;
pub const SCHNORR_SIGNATURE_SIZE: u64 = 64;
pub const COMPRESSED_PUBKEY_SIZE: u64 = 33;
pub const UNCOMPRESSED_PUBKEY_SIZE: u64 = 65;

/// Extra scriptSig weight of a P2PKH spend by an uncompressed key. The push
/// opcode and scriptSig length prefix stay one byte each.
pub const UNCOMPRESSED_KEY_EXTRA_WEIGHT: u64 =
    (UNCOMPRESSED_PUBKEY_SIZE - COMPRESSED_PUBKEY_SIZE) * 4;

/// `OP_0 <20 byte hash>` pushed in the scriptSig of a wrapped segwit spend,
/// with its length prefixes.
const P2SH_P2WPKH_SCRIPT_SIG_SIZE: u64 = 24;

// Item count, then length-prefixed signature and pubkey: 1 + 1 + 72 + 1 + 33 = 108 bytes
const P2WPKH_WITNESS_SIZE: u64 = 1 + 1 + ECDSA_SIGNATURE_SIZE + 1 + COMPRESSED_PUBKEY_SIZE;

// Item count, then length-prefixed signature: 1 + 1 + 64 = 66 bytes
const P2TR_KEY_SPEND_WITNESS_SIZE: u64 = 1 + 1 + SCHNORR_SIGNATURE_SIZE;

// Signature and pubkey pushes inside the scriptSig, counted like the p2wpkh witness stack
const P2PKH_SCRIPT_SIG_SIZE: u64 = 1 + 1 + ECDSA_SIGNATURE_SIZE + 1 + COMPRESSED_PUBKEY_SIZE;

// Non-witness data counts as 4 WU per byte, witness data as 1 WU per byte.

/// 41 * 4 + 108 = 272 WU (68 vB)
pub const P2WPKH_INPUT_WEIGHT: u64 = INPUT_BASE_SIZE * 4 + P2WPKH_WITNESS_SIZE;

/// 41 * 4 + 66 = 230 WU (57.5 vB)
pub const P2TR_INPUT_WEIGHT: u64 = INPUT_BASE_SIZE * 4 + P2TR_KEY_SPEND_WITNESS_SIZE;

/// (41 + 108) * 4 = 596 WU (149 vB)
pub const P2PKH_INPUT_WEIGHT: u64 = (INPUT_BASE_SIZE + P2PKH_SCRIPT_SIG_SIZE) * 4;

/// (41 + 24) * 4 + 108 = 368 WU (92 vB)
pub const P2SH_P2WPKH_INPUT_WEIGHT: u64 =
    (INPUT_BASE_SIZE + P2SH_P2WPKH_SCRIPT_SIG_SIZE) * 4 + P2WPKH_WITNESS_SIZE;
