//! Search-string generators for the two perceptual load levels.
//!
//! Low load is homogeneous: six copies of one letter, either a filler or the
//! target. High load is heterogeneous: six distinct fillers, one of which may
//! be replaced by the target.

use percload_core::{ConfigurationError, LETTER_COUNT, Load, TARGET_LETTER};
use rand::Rng;
use rand::seq::index;

#[derive(Debug, Clone, PartialEq)]
pub struct LetterGenerator {
    fillers: Vec<char>,
}

impl LetterGenerator {
    /// Builds from an alphabet; the target, non-letters and repeats are dropped.
    pub fn new(alphabet: &str) -> Result<Self, ConfigurationError> {
        let mut fillers: Vec<char> = Vec::new();
        for c in alphabet.chars().map(|c| c.to_ascii_uppercase()) {
            if c.is_ascii_alphabetic() && c != TARGET_LETTER && !fillers.contains(&c) {
                fillers.push(c);
            }
        }
        if fillers.len() < LETTER_COUNT {
            return Err(ConfigurationError::FillerAlphabetTooSmall {
                needed: LETTER_COUNT,
                found: fillers.len(),
            });
        }
        Ok(Self { fillers })
    }

    pub fn fillers(&self) -> &[char] {
        &self.fillers
    }

    pub fn generate<R: Rng + ?Sized>(&self, load: Load, target_present: bool, rng: &mut R) -> String {
        match load {
            Load::Low => self.low_load(target_present, rng),
            Load::High => self.high_load(target_present, rng),
        }
    }

    pub fn low_load<R: Rng + ?Sized>(&self, target_present: bool, rng: &mut R) -> String {
        let filler = self.fillers[rng.random_range(0..self.fillers.len())];
        low_load_string(filler, target_present)
    }

    pub fn high_load<R: Rng + ?Sized>(&self, target_present: bool, rng: &mut R) -> String {
        let letters: Vec<char> = index::sample(rng, self.fillers.len(), LETTER_COUNT)
            .iter()
            .map(|i| self.fillers[i])
            .collect();
        let target_pos = target_present.then(|| rng.random_range(0..LETTER_COUNT));
        high_load_string(&letters, target_pos)
    }
}

/// Six copies of `filler`, or six targets when the target is present.
pub fn low_load_string(filler: char, target_present: bool) -> String {
    let letter = if target_present { TARGET_LETTER } else { filler };
    std::iter::repeat(letter).take(LETTER_COUNT).collect()
}

/// `letters` with the target written over `target_pos`, if any.
pub fn high_load_string(letters: &[char], target_pos: Option<usize>) -> String {
    letters
        .iter()
        .enumerate()
        .map(|(i, &c)| if Some(i) == target_pos { TARGET_LETTER } else { c })
        .collect()
}
