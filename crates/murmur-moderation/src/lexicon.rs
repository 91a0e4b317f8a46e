//! Local profanity lexicon — the first, cheapest moderation gate.

use std::collections::HashSet;

use unicode_segmentation::UnicodeSegmentation;

/// Seed word list. Deliberately mild: operators extend it via config.
const DEFAULT_WORDS: &[&str] = &["fuck", "shit", "ass", "asshole", "bitch", "bastard", "damn"];

/// Case-insensitive, word-boundary profanity screen.
///
/// Matching is per *word*, not per substring: "class" does not trip a
/// lexicon containing "ass". Words are compared on their lowercased form,
/// with word boundaries taken from Unicode segmentation rather than ASCII
/// whitespace, so "ass," and "ASS!" both match.
#[derive(Debug, Clone)]
pub struct Lexicon {
    words: HashSet<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::with_words(DEFAULT_WORDS.iter().map(|w| (*w).to_owned()))
    }
}

impl Lexicon {
    /// Build a lexicon from an explicit word list, replacing the default.
    ///
    /// Entries are lowercased on the way in; an empty iterator yields a
    /// lexicon that matches nothing.
    pub fn with_words<I>(words: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let words = words
            .into_iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    /// True when any word of `line` appears in the lexicon.
    #[must_use]
    pub fn is_profane(&self, line: &str) -> bool {
        if self.words.is_empty() {
            return false;
        }
        let lowered = line.to_lowercase();
        lowered
            .unicode_words()
            .any(|word| self.words.contains(word))
    }
}
