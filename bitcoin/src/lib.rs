// Re-export core crates so downstream users can access everything from `ordwallet`

pub use ordwallet_math as math;
pub use ordwallet_runes as runes;

pub use ordwallet_transactions::*;
