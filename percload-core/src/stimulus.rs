use serde::{Deserialize, Serialize};
use std::fmt;

/// The letter participants search for.
pub const TARGET_LETTER: char = 'X';

/// Every search string has this many letters.
pub const LETTER_COUNT: usize = 6;

/// Identifier of a background image, as registered in the asset pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Number of target letters in a search string
pub fn target_count(letters: &str) -> usize {
    letters.chars().filter(|&c| c == TARGET_LETTER).count()
}

/// True when every character of a non-empty string is the same
pub fn is_uniform(letters: &str) -> bool {
    let mut chars = letters.chars();
    match chars.next() {
        Some(first) => chars.all(|c| c == first),
        None => false,
    }
}
