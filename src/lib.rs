//! Block transposition cipher.
//!
//! Text is cut into blocks of `n` symbols and every block is rearranged by a
//! permutation key of size `n`. The scheme offers no real secrecy; it exists
//! for teaching and for puzzles.
//!
//! ```
//! let ct = permute_cipher::encrypt("HELLO!", 3, &[2, 3, 1]).unwrap();
//! assert_eq!(ct, "LHE!LO");
//! assert_eq!(permute_cipher::decrypt(&ct, 3, &[2, 3, 1]).unwrap(), "HELLO!");
//! ```
//!
//! When the key is unknown, [`search`] tries all `n!` keys lazily.

pub mod codec;
pub mod config;
mod error;
pub mod permutation;
pub mod search;

pub use config::{CipherConfig, PartialBlockPolicy};
pub use error::{CipherError, KeyError, Result};
pub use permutation::{factorial, Permutation};
pub use search::{Candidate, Candidates, KeySearch};

#[derive(Debug, Clone, Default)]
pub struct Cipher {
    config: CipherConfig,
}

impl Cipher {
    pub fn new(config: CipherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CipherConfig {
        &self.config
    }

    pub fn encrypt(&self, text: &str, block_size: usize, key: &Permutation) -> Result<String> {
        codec::encrypt(text, block_size, key, &self.config)
    }

    pub fn decrypt(&self, ciphertext: &str, block_size: usize, key: &Permutation) -> Result<String> {
        codec::decrypt(ciphertext, block_size, key, &self.config)
    }

    pub fn search(&self, ciphertext: &str, block_size: usize) -> Result<KeySearch> {
        KeySearch::new(ciphertext, block_size, &self.config)
    }
}

/// Encrypts `text` with the default configuration. `key` is validated as a
/// permutation of `1..=block_size`.
pub fn encrypt(text: &str, block_size: usize, key: &[usize]) -> Result<String> {
    let key = Permutation::new(block_size, key.to_vec())?;
    Cipher::default().encrypt(text, block_size, &key)
}

/// Decrypts `ciphertext` with the default configuration.
pub fn decrypt(ciphertext: &str, block_size: usize, key: &[usize]) -> Result<String> {
    let key = Permutation::new(block_size, key.to_vec())?;
    Cipher::default().decrypt(ciphertext, block_size, &key)
}

/// Prepares an exhaustive search with the default configuration.
pub fn search(ciphertext: &str, block_size: usize) -> Result<KeySearch> {
    Cipher::default().search(ciphertext, block_size)
}
