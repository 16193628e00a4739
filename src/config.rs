//! Cipher configuration, loadable from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CipherError, Result};
use crate::permutation::factorial;

/// How `decrypt` treats ciphertext whose length is not a multiple of the
/// block size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialBlockPolicy {
    /// Fail with `PartialFinalBlock`.
    #[default]
    Reject,
    /// Decrypt the short final block into a full-size buffer and drop the
    /// slots left empty. Output length equals input length.
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    /// Symbol appended to fill the final block on encryption.
    pub pad_char: char,

    pub partial_block: PartialBlockPolicy,

    /// Largest number of keys a single search may enumerate.
    pub max_search_keys: u64,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            pad_char: ' ',
            partial_block: PartialBlockPolicy::default(),
            max_search_keys: default_max_search_keys(),
        }
    }
}

/// `12!`: beyond this block size the search runs for hours.
fn default_max_search_keys() -> u64 {
    factorial(12).unwrap_or(u64::MAX)
}

impl CipherConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| CipherError::Config(format!("{}: {err}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string. Missing keys take their
    /// defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| CipherError::Config(err.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|err| CipherError::Config(err.to_string()))
    }

    pub fn with_pad_char(mut self, pad_char: char) -> Self {
        self.pad_char = pad_char;
        self
    }

    pub fn with_partial_block(mut self, policy: PartialBlockPolicy) -> Self {
        self.partial_block = policy;
        self
    }

    pub fn with_max_search_keys(mut self, max_search_keys: u64) -> Self {
        self.max_search_keys = max_search_keys;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CipherConfig::default();
        assert_eq!(config.pad_char, ' ');
        assert_eq!(config.partial_block, PartialBlockPolicy::Reject);
        assert_eq!(config.max_search_keys, 479_001_600);
    }

    #[test]
    fn test_from_toml() {
        let config = CipherConfig::from_toml(
            r#"
            pad_char = "_"
            partial_block = "compact"
            max_search_keys = 720
            "#,
        )
        .unwrap();
        assert_eq!(
            config,
            CipherConfig::default()
                .with_pad_char('_')
                .with_partial_block(PartialBlockPolicy::Compact)
                .with_max_search_keys(720)
        );
    }

    #[test]
    fn test_from_toml_partial_uses_defaults() {
        let config = CipherConfig::from_toml("max_search_keys = 24").unwrap();
        assert_eq!(config.pad_char, ' ');
        assert_eq!(config.partial_block, PartialBlockPolicy::Reject);
        assert_eq!(config.max_search_keys, 24);

        assert_eq!(CipherConfig::from_toml("").unwrap(), CipherConfig::default());
    }

    #[test]
    fn test_from_toml_rejects_bad_values() {
        assert!(matches!(
            CipherConfig::from_toml(r#"partial_block = "truncate""#),
            Err(CipherError::Config(_))
        ));
        assert!(matches!(
            CipherConfig::from_toml(r#"pad_char = "ab""#),
            Err(CipherError::Config(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = CipherConfig::default().with_partial_block(PartialBlockPolicy::Compact);
        let text = config.to_toml().unwrap();
        assert_eq!(CipherConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_from_missing_file() {
        let err = CipherConfig::from_file(Path::new("/nonexistent/permute-cipher.toml"));
        assert!(matches!(err, Err(CipherError::Config(_))));
    }
}
