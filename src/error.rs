use thiserror::Error;

pub type Result<T> = std::result::Result<T, CipherError>;

/// Errors returned by the cipher, codec and key search.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("block size must be positive, got {block_size}")]
    InvalidBlockSize { block_size: usize },
    #[error("invalid permutation key: {0}")]
    InvalidPermutation(#[from] KeyError),
    #[error("ciphertext length {len} is not a multiple of block size {block_size}")]
    PartialFinalBlock { len: usize, block_size: usize },
    #[error("searching {block_size}! keys exceeds the ceiling of {ceiling} keys")]
    SearchSpaceTooLarge { block_size: usize, ceiling: u64 },
    #[error("key range {start}..{end} is not within 0..{total}")]
    RangeOutOfBounds { start: u64, end: u64, total: u64 },
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Why a sequence was rejected as a permutation key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("expected {expected} positions, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("position {value} appears more than once")]
    Duplicate { value: usize },
    #[error("position {value} is outside 1..={block_size}")]
    OutOfRange { value: usize, block_size: usize },
    #[error("cannot parse {token:?} as a position")]
    Parse { token: String },
}
