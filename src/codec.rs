//! Splits text into fixed-size blocks and runs each through a key.
//!
//! Text is handled per `char`, so multi-byte scripts are transposed symbol
//! by symbol rather than byte by byte.

use tracing::{debug, warn};

use crate::config::{CipherConfig, PartialBlockPolicy};
use crate::error::{CipherError, KeyError, Result};
use crate::permutation::Permutation;

pub(crate) fn check_key(block_size: usize, key: &Permutation) -> Result<()> {
    if block_size == 0 {
        return Err(CipherError::InvalidBlockSize { block_size });
    }
    if key.len() != block_size {
        return Err(KeyError::LengthMismatch {
            expected: block_size,
            actual: key.len(),
        }
        .into());
    }
    Ok(())
}

/// Applies the partial final block policy to a ciphertext of `len` symbols.
pub(crate) fn check_alignment(
    len: usize,
    block_size: usize,
    policy: PartialBlockPolicy,
) -> Result<()> {
    if len % block_size == 0 {
        return Ok(());
    }
    match policy {
        PartialBlockPolicy::Reject => Err(CipherError::PartialFinalBlock { len, block_size }),
        PartialBlockPolicy::Compact => {
            warn!(len, block_size, "compacting short final block");
            Ok(())
        }
    }
}

/// Appends `fill` until the length is a multiple of `block_size`. Empty input
/// stays empty.
pub fn pad<T: Copy>(symbols: &mut Vec<T>, block_size: usize, fill: T) -> Result<()> {
    if block_size == 0 {
        return Err(CipherError::InvalidBlockSize { block_size });
    }
    let rem = symbols.len() % block_size;
    if rem != 0 {
        symbols.resize(symbols.len() + block_size - rem, fill);
    }
    Ok(())
}

/// Transforms every block of `symbols` with `key`.
///
/// Full blocks go through [`Permutation::apply`]. A trailing short block is
/// compacted: its symbols are placed as in a full block and the empty slots
/// are dropped.
pub fn transform_blocks<T: Copy>(symbols: &[T], key: &Permutation) -> Vec<T> {
    let mut out = Vec::with_capacity(symbols.len());
    for block in symbols.chunks(key.len()) {
        if block.len() == key.len() {
            key.apply_into(block, &mut out);
        } else {
            key.apply_partial_into(block, &mut out);
        }
    }
    out
}

/// Encrypts `text` under `key`, padding the final block with
/// `config.pad_char`.
///
/// The output length is the padded input length. Padding is not marked, so
/// decryption returns the padded text.
pub fn encrypt(
    text: &str,
    block_size: usize,
    key: &Permutation,
    config: &CipherConfig,
) -> Result<String> {
    check_key(block_size, key)?;

    let mut symbols: Vec<char> = text.chars().collect();
    pad(&mut symbols, block_size, config.pad_char)?;
    debug!(block_size, blocks = symbols.len() / block_size, "encrypting");

    Ok(transform_blocks(&symbols, key).into_iter().collect())
}

/// Decrypts `ciphertext` that was encrypted under `key`.
///
/// The inverse key is derived once per call. A ciphertext whose length is
/// not a multiple of `block_size` is handled according to
/// `config.partial_block`.
pub fn decrypt(
    ciphertext: &str,
    block_size: usize,
    key: &Permutation,
    config: &CipherConfig,
) -> Result<String> {
    check_key(block_size, key)?;

    let symbols: Vec<char> = ciphertext.chars().collect();
    check_alignment(symbols.len(), block_size, config.partial_block)?;
    debug!(block_size, blocks = symbols.len().div_ceil(block_size), "decrypting");

    let inverse = key.invert();
    Ok(transform_blocks(&symbols, &inverse).into_iter().collect())
}
