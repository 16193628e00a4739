//! Exhaustive key search.
//!
//! Every key of a given block size is tried in lexicographic order and the
//! resulting decryption is handed to the caller as soon as it is produced.
//! Nothing is scored or ranked; the candidates are meant for a reader.

use std::iter::FusedIterator;
use std::ops::Range;

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::codec::{check_alignment, check_key, transform_blocks};
use crate::config::CipherConfig;
use crate::error::{CipherError, Result};
use crate::permutation::{factorial, Permutation};

/// A key paired with the text obtained by decrypting under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub key: Permutation,
    pub text: String,
}

/// The space of all `n!` keys for one ciphertext.
///
/// Construction does the validation; iterating is infallible. Each call to
/// [`KeySearch::iter`] restarts from the identity key.
#[derive(Debug, Clone)]
pub struct KeySearch {
    ciphertext: Vec<char>,
    block_size: usize,
    total: u64,
}

impl KeySearch {
    /// Prepares a search over every key of size `block_size`.
    ///
    /// Fails fast with [`CipherError::SearchSpaceTooLarge`] when `block_size!`
    /// exceeds `config.max_search_keys`.
    pub fn new(ciphertext: &str, block_size: usize, config: &CipherConfig) -> Result<Self> {
        if block_size == 0 {
            return Err(CipherError::InvalidBlockSize { block_size });
        }
        let ceiling = config.max_search_keys;
        let total = factorial(block_size)
            .filter(|&total| total <= ceiling)
            .ok_or(CipherError::SearchSpaceTooLarge { block_size, ceiling })?;

        let ciphertext: Vec<char> = ciphertext.chars().collect();
        check_alignment(ciphertext.len(), block_size, config.partial_block)?;

        debug!(block_size, total, ceiling, len = ciphertext.len(), "key search ready");

        Ok(Self {
            ciphertext,
            block_size,
            total,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn total_keys(&self) -> u64 {
        self.total
    }

    /// Decrypts the ciphertext under one key of size `block_size`.
    pub fn candidate(&self, key: Permutation) -> Result<Candidate> {
        check_key(self.block_size, &key)?;
        Ok(self.decrypt_with(key))
    }

    fn decrypt_with(&self, key: Permutation) -> Candidate {
        let inverse = key.invert();
        let text = transform_blocks(&self.ciphertext, &inverse).into_iter().collect();
        Candidate { key, text }
    }

    /// All candidates in lexicographic key order.
    pub fn iter(&self) -> Candidates<'_> {
        self.candidates(0..self.total)
    }

    /// The candidates whose key has lexicographic rank in `range`.
    pub fn range(&self, range: Range<u64>) -> Result<Candidates<'_>> {
        if range.start > range.end || range.end > self.total {
            return Err(CipherError::RangeOutOfBounds {
                start: range.start,
                end: range.end,
                total: self.total,
            });
        }
        Ok(self.candidates(range))
    }

    fn candidates(&self, range: Range<u64>) -> Candidates<'_> {
        let next = if range.is_empty() {
            None
        } else {
            // block_size! fits in a u64 and start < total, so unranking succeeds
            Permutation::unrank(self.block_size, range.start).ok()
        };
        Candidates {
            search: self,
            next,
            rank: range.start,
            end: range.end,
        }
    }

    /// Splits `0..total_keys()` into at most `parts` disjoint, contiguous,
    /// non-empty ranges whose sizes differ by at most one.
    pub fn partition(&self, parts: usize) -> Vec<Range<u64>> {
        let parts = (parts.max(1) as u64).min(self.total);
        let chunk = self.total / parts;
        let extra = self.total % parts;

        let mut ranges = Vec::with_capacity(parts as usize);
        let mut start = 0;
        for i in 0..parts {
            let len = chunk + u64::from(i < extra);
            ranges.push(start..start + len);
            start += len;
        }
        ranges
    }

    /// All candidates, produced on the rayon pool.
    ///
    /// The key space is partitioned into a few ranges per worker thread and
    /// each range is walked sequentially. The iterator is not indexed, so
    /// `enumerate` and `zip` are unavailable; `collect` into a `Vec` still
    /// keeps the lexicographic order.
    pub fn par_iter(&self) -> impl ParallelIterator<Item = Candidate> + '_ {
        let parts = rayon::current_num_threads() * 4;
        self.partition(parts)
            .into_par_iter()
            .flat_map_iter(move |range| self.candidates(range))
    }
}

impl<'a> IntoIterator for &'a KeySearch {
    type Item = Candidate;
    type IntoIter = Candidates<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy sequence of candidates over a contiguous range of key ranks.
///
/// Dropping it is the only form of cancellation.
#[derive(Debug, Clone)]
pub struct Candidates<'a> {
    search: &'a KeySearch,
    next: Option<Permutation>,
    rank: u64,
    end: u64,
}

impl Iterator for Candidates<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rank >= self.end {
            return None;
        }
        let key = self.next.take()?;
        trace!(rank = self.rank, key = %key, "candidate");
        self.rank += 1;

        if self.rank < self.end {
            let mut successor = key.clone();
            if successor.advance() {
                self.next = Some(successor);
            }
        }
        Some(self.search.decrypt_with(key))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.next.is_some() {
            self.end - self.rank
        } else {
            0
        };
        match usize::try_from(remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

impl FusedIterator for Candidates<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encrypt;
    use crate::config::PartialBlockPolicy;
    use crate::error::KeyError;
    use rstest::rstest;

    fn search(ciphertext: &str, block_size: usize) -> KeySearch {
        KeySearch::new(ciphertext, block_size, &CipherConfig::default()).unwrap()
    }

    #[test]
    fn test_yields_every_key_once_in_order() {
        let s = search("LHE!LO", 3);
        let keys: Vec<_> = s.iter().map(|c| c.key.into_positions()).collect();
        assert_eq!(
            keys,
            vec![
                vec![1, 2, 3],
                vec![1, 3, 2],
                vec![2, 1, 3],
                vec![2, 3, 1],
                vec![3, 1, 2],
                vec![3, 2, 1],
            ]
        );
    }

    #[test]
    fn test_true_key_recovers_plaintext() {
        let config = CipherConfig::default();
        let key = Permutation::try_from(vec![2, 3, 1]).unwrap();
        let ct = encrypt("HELLO!", 3, &key, &config).unwrap();

        let s = KeySearch::new(&ct, 3, &config).unwrap();
        let hit = s.iter().find(|c| c.key == key).unwrap();
        assert_eq!(hit.text, "HELLO!");
        // identity key leaves the ciphertext as is
        assert_eq!(s.iter().next().unwrap().text, ct);
    }

    #[test]
    fn test_candidate_checks_key_size() {
        let s = search("ABCDEF", 3);
        let short = Permutation::try_from(vec![2, 1]).unwrap();
        assert_eq!(
            s.candidate(short),
            Err(CipherError::InvalidPermutation(KeyError::LengthMismatch {
                expected: 3,
                actual: 2
            }))
        );

        let key = Permutation::try_from(vec![2, 3, 1]).unwrap();
        let hit = s.candidate(key.clone()).unwrap();
        assert_eq!(hit, s.iter().find(|c| c.key == key).unwrap());
    }

    #[test]
    fn test_restartable() {
        let s = search("ABCDEFGH", 4);
        let first: Vec<_> = s.iter().take(5).collect();
        let again: Vec<_> = s.iter().take(5).collect();
        assert_eq!(first, again);
        assert_eq!(s.iter().count(), 24);
        assert_eq!(s.iter().count(), 24);
    }

    #[test]
    fn test_size_hint_tracks_progress() {
        let s = search("ABCD", 4);
        let mut it = s.iter();
        assert_eq!(it.size_hint(), (24, Some(24)));
        it.nth(9);
        assert_eq!(it.size_hint(), (14, Some(14)));
        it.by_ref().for_each(drop);
        assert_eq!(it.size_hint(), (0, Some(0)));
        assert!(it.next().is_none());
    }

    #[rstest]
    #[case::even(24, 4)]
    #[case::uneven(24, 5)]
    #[case::single(24, 1)]
    #[case::more_parts_than_keys(24, 100)]
    #[case::zero_parts(24, 0)]
    fn test_partition_covers_key_space(#[case] total: u64, #[case] parts: usize) {
        let s = search("ABCD", 4);
        assert_eq!(s.total_keys(), total);

        let ranges = s.partition(parts);
        assert!(ranges.len() <= parts.max(1));
        assert!(ranges.iter().all(|r| !r.is_empty()));
        assert_eq!(ranges.first().unwrap().start, 0);
        assert_eq!(ranges.last().unwrap().end, total);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        let sizes: Vec<u64> = ranges.iter().map(|r| r.end - r.start).collect();
        let (min, max) = (sizes.iter().min().unwrap(), sizes.iter().max().unwrap());
        assert!(max - min <= 1);
    }

    #[test]
    fn test_ranges_concatenate_to_full_search() {
        let s = search("ABCDEFGHIJ", 5);
        let stitched: Vec<_> = s
            .partition(7)
            .into_iter()
            .flat_map(|r| s.range(r).unwrap())
            .collect();
        let full: Vec<_> = s.iter().collect();
        assert_eq!(stitched, full);
    }

    #[test]
    fn test_range_bounds() {
        let s = search("ABC", 3);
        assert_eq!(s.range(2..2).unwrap().count(), 0);
        assert_eq!(s.range(4..6).unwrap().count(), 2);
        assert_eq!(
            s.range(3..7).err(),
            Some(CipherError::RangeOutOfBounds {
                start: 3,
                end: 7,
                total: 6
            })
        );
        let (start, end) = (4, 2);
        assert!(s.range(start..end).is_err());
    }

    #[test]
    fn test_par_iter_matches_sequential() {
        let s = search("ABCDEFGHIJKL", 6);
        let sequential: Vec<_> = s.iter().collect();
        let parallel: Vec<_> = s.par_iter().collect();
        assert_eq!(parallel.len(), 720);
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_ceiling() {
        let config = CipherConfig::default().with_max_search_keys(120);
        assert!(KeySearch::new("ABCDE", 5, &config).is_ok());
        assert_eq!(
            KeySearch::new("ABCDEF", 6, &config).err(),
            Some(CipherError::SearchSpaceTooLarge {
                block_size: 6,
                ceiling: 120
            })
        );

        let unbounded = CipherConfig::default().with_max_search_keys(u64::MAX);
        assert!(matches!(
            KeySearch::new("A", 21, &unbounded),
            Err(CipherError::SearchSpaceTooLarge { block_size: 21, .. })
        ));
    }

    #[test]
    fn test_rejects_bad_input() {
        let config = CipherConfig::default();
        assert_eq!(
            KeySearch::new("ABC", 0, &config).err(),
            Some(CipherError::InvalidBlockSize { block_size: 0 })
        );
        assert_eq!(
            KeySearch::new("ABCD", 3, &config).err(),
            Some(CipherError::PartialFinalBlock {
                len: 4,
                block_size: 3
            })
        );

        let compact = config.with_partial_block(PartialBlockPolicy::Compact);
        let s = KeySearch::new("ABCD", 3, &compact).unwrap();
        assert!(s.iter().all(|c| c.text.chars().count() == 4));
    }
}
