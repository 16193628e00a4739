//! Permutation keys and the per-block transform.
//!
//! A key of size `n` lists, for every source position of a block, the
//! 1-indexed position that symbol moves to. `apply` scatters a block
//! through the key and `invert` derives the key that undoes it.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{CipherError, KeyError, Result};

/// `FACTORIALS[n] == n!` for every `n` whose factorial fits in a `u64`.
static FACTORIALS: Lazy<Vec<u64>> = Lazy::new(|| {
    let mut table = vec![1u64];
    let mut acc = 1u64;
    for n in 1u64.. {
        match acc.checked_mul(n) {
            Some(next) => {
                acc = next;
                table.push(acc);
            }
            None => break,
        }
    }
    table
});

/// Returns `n!`, or `None` when it does not fit in a `u64` (`n > 20`).
pub fn factorial(n: usize) -> Option<u64> {
    FACTORIALS.get(n).copied()
}

/// A validated permutation of `1..=n`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Permutation {
    positions: Vec<usize>,
}

impl Permutation {
    /// Validates `positions` as a key for blocks of `block_size` symbols.
    ///
    /// The key must contain every value in `1..=block_size` exactly once.
    /// Nothing is corrected: the first violation found is returned.
    pub fn new(block_size: usize, positions: Vec<usize>) -> Result<Self> {
        if block_size == 0 {
            return Err(CipherError::InvalidBlockSize { block_size });
        }
        if positions.len() != block_size {
            return Err(KeyError::LengthMismatch {
                expected: block_size,
                actual: positions.len(),
            }
            .into());
        }

        let mut seen = vec![false; block_size];
        for &value in &positions {
            if value == 0 || value > block_size {
                return Err(KeyError::OutOfRange { value, block_size }.into());
            }
            if std::mem::replace(&mut seen[value - 1], true) {
                return Err(KeyError::Duplicate { value }.into());
            }
        }

        Ok(Self { positions })
    }

    /// The key `(1, 2, ..., n)`, which leaves every block unchanged.
    pub fn identity(block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(CipherError::InvalidBlockSize { block_size });
        }
        Ok(Self {
            positions: (1..=block_size).collect(),
        })
    }

    /// Draws a key uniformly at random from all `block_size!` keys.
    pub fn random<R: Rng + ?Sized>(block_size: usize, rng: &mut R) -> Result<Self> {
        let mut key = Self::identity(block_size)?;
        key.positions.shuffle(rng);
        Ok(key)
    }

    /// Builds the key with lexicographic index `rank` among all keys of size
    /// `block_size` (rank 0 is the identity).
    pub fn unrank(block_size: usize, rank: u64) -> Result<Self> {
        if block_size == 0 {
            return Err(CipherError::InvalidBlockSize { block_size });
        }
        let total = factorial(block_size).ok_or(CipherError::SearchSpaceTooLarge {
            block_size,
            ceiling: u64::MAX,
        })?;
        if rank >= total {
            return Err(CipherError::RangeOutOfBounds {
                start: rank,
                end: rank.saturating_add(1),
                total,
            });
        }

        let mut pool: Vec<usize> = (1..=block_size).collect();
        let mut positions = Vec::with_capacity(block_size);
        let mut rest = rank;
        for remaining in (0..block_size).rev() {
            // remaining < block_size <= 20, so the factorial is in the table
            let weight = FACTORIALS[remaining];
            let idx = (rest / weight) as usize;
            rest %= weight;
            positions.push(pool.remove(idx));
        }

        Ok(Self { positions })
    }

    /// Lexicographic index of this key, or `None` when `n!` overflows a `u64`.
    pub fn rank(&self) -> Option<u64> {
        let n = self.len();
        factorial(n)?;
        let mut rank = 0u64;
        for (i, &value) in self.positions.iter().enumerate() {
            let smaller_after = self.positions[i + 1..]
                .iter()
                .filter(|&&later| later < value)
                .count() as u64;
            rank += smaller_after * FACTORIALS[n - 1 - i];
        }
        Some(rank)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    pub fn into_positions(self) -> Vec<usize> {
        self.positions
    }

    /// Moves `block[idx]` to output index `key[idx] - 1`.
    pub fn apply<T: Copy>(&self, block: &[T]) -> Result<Vec<T>> {
        if block.len() != self.len() {
            return Err(KeyError::LengthMismatch {
                expected: self.len(),
                actual: block.len(),
            }
            .into());
        }
        let mut out = Vec::with_capacity(block.len());
        self.apply_into(block, &mut out);
        Ok(out)
    }

    /// Appends the transformed `block` to `out`. `block` must be a full block.
    pub(crate) fn apply_into<T: Copy>(&self, block: &[T], out: &mut Vec<T>) {
        debug_assert_eq!(block.len(), self.len());
        let base = out.len();
        out.extend_from_slice(block);
        for (&symbol, &target) in block.iter().zip(&self.positions) {
            out[base + target - 1] = symbol;
        }
    }

    /// Transforms a block shorter than the key.
    ///
    /// Symbols land in a key-sized buffer as usual and the slots nobody wrote
    /// to are squeezed out, so every input symbol survives.
    pub(crate) fn apply_partial_into<T: Copy>(&self, block: &[T], out: &mut Vec<T>) {
        debug_assert!(block.len() < self.len());
        let mut slots: Vec<Option<T>> = vec![None; self.len()];
        for (&symbol, &target) in block.iter().zip(&self.positions) {
            slots[target - 1] = Some(symbol);
        }
        out.extend(slots.into_iter().flatten());
    }

    /// The key that undoes this one: if `key[i] = j` then `inverse[j - 1] = i + 1`.
    pub fn invert(&self) -> Permutation {
        let mut inverse = vec![0; self.len()];
        for (i, &target) in self.positions.iter().enumerate() {
            inverse[target - 1] = i + 1;
        }
        Permutation { positions: inverse }
    }

    /// Steps to the lexicographic successor in place.
    ///
    /// Returns `false` and leaves the key untouched when it is already the
    /// last key `(n, n - 1, ..., 1)`.
    pub fn advance(&mut self) -> bool {
        let p = &mut self.positions;
        let Some(pivot) = p.windows(2).rposition(|w| w[0] < w[1]) else {
            return false;
        };
        // p[pivot + 1..] is non-increasing, so the rightmost larger value is
        // the smallest one exceeding the pivot
        let pivot_value = p[pivot];
        let successor = p
            .iter()
            .rposition(|&value| value > pivot_value)
            .unwrap_or(pivot + 1);
        p.swap(pivot, successor);
        p[pivot + 1..].reverse();
        true
    }
}

impl TryFrom<Vec<usize>> for Permutation {
    type Error = CipherError;

    fn try_from(positions: Vec<usize>) -> Result<Self> {
        Self::new(positions.len(), positions)
    }
}

impl AsRef<[usize]> for Permutation {
    fn as_ref(&self) -> &[usize] {
        &self.positions
    }
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.positions.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, ")")
    }
}

/// Accepts `2,3,1`, `2 3 1`, `(2, 3, 1)` and `[2, 3, 1]`.
impl FromStr for Permutation {
    type Err = CipherError;

    fn from_str(s: &str) -> Result<Self> {
        let inner = s
            .trim()
            .trim_start_matches(['(', '['])
            .trim_end_matches([')', ']']);
        let positions = inner
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(|token| {
                token.parse::<usize>().map_err(|_| KeyError::Parse {
                    token: token.to_string(),
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::try_from(positions)
    }
}
