use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VarintError {
    #[error("Varint buffer ended before a terminating byte")]
    Truncated,

    #[error("Varint value does not fit in {bits} bits")]
    Overflow { bits: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuneIdError {
    #[error("Rune id must be formatted as block:tx, got `{0}`")]
    MissingSeparator(String),

    #[error("Invalid rune id component `{0}`")]
    InvalidComponent(String),

    #[error("Rune id {0} does not fit a 64 bit block and a 16 bit tx index")]
    OutOfRange(u128),
}
