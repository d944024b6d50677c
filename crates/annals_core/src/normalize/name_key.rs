//! Name canonicalization for identity matching.
//!
//! # Responsibility
//! - Turn a raw display name into the comparable key used by the entity store.
//! - Own the single alias table and honorific lists used by every insert path.
//!
//! # Invariants
//! - `normalize` is deterministic and never fails; blank input yields `""`.
//! - Diacritics are composed (NFC), never stripped.
//! - `bare_key` only removes whole honorific tokens and never empties a key.

use crate::normalize::mojibake::repair_mojibake;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

/// Military, royal and clerical titles seen wrapping names in the corpus.
pub const DEFAULT_HONORIFIC_PREFIXES: &[&str] = &[
    "vua",
    "hoàng đế",
    "thủy sư đô đốc",
    "đô đốc",
    "đề đốc",
    "thống tướng",
    "trung tướng",
    "thiếu tướng",
    "tướng",
    "đại tá",
    "trung tá",
    "thiếu tá",
    "đại úy",
    "thuyền trưởng",
    "hạm trưởng",
    "lãnh binh",
    "chánh tổng",
    "tổng đốc",
    "tuần phủ",
    "giám mục",
    "linh mục",
    "amiral",
    "admiral",
    "général",
    "general",
    "colonel",
    "capitaine",
    "captain",
    "commandant",
    "monseigneur",
    "mgr",
    "père",
];

pub const DEFAULT_HONORIFIC_SUFFIXES: &[&str] = &["tiên sinh", "jr.", "jr", "sr."];

/// Normalized key plus its honorific-free form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameKey {
    /// Most specific key: repaired, whitespace-collapsed, NFC, lowercase, aliased.
    pub key: String,
    /// `key` with honorific prefixes/suffixes removed. Equal to `key` when the
    /// name carries no title.
    pub bare: String,
}

impl NameKey {
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    /// Whether the raw name carried an honorific.
    pub fn is_titled(&self) -> bool {
        self.key != self.bare
    }
}

/// Configurable name normalizer.
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Token sequences, longest first.
    prefixes: Vec<Vec<String>>,
    suffixes: Vec<Vec<String>>,
    /// Normalized variant key -> normalized canonical key.
    aliases: HashMap<String, String>,
    /// Configured corrupted -> correct pairs applied before the built-in table.
    extra_repairs: Vec<(String, String)>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_HONORIFIC_PREFIXES, DEFAULT_HONORIFIC_SUFFIXES)
    }
}

impl Normalizer {
    /// Creates a normalizer with the given honorific lists and no aliases.
    pub fn new<P, S>(prefixes: &[P], suffixes: &[S]) -> Self
    where
        P: AsRef<str>,
        S: AsRef<str>,
    {
        let mut normalizer = Self {
            prefixes: Vec::new(),
            suffixes: Vec::new(),
            aliases: HashMap::new(),
            extra_repairs: Vec::new(),
        };
        normalizer.prefixes = normalizer.tokenize_titles(prefixes);
        normalizer.suffixes = normalizer.tokenize_titles(suffixes);
        normalizer
    }

    /// Registers `variant` as another spelling of `canonical`.
    ///
    /// Both sides are normalized; chains are not followed. A variant that
    /// normalizes to the same key as its canonical form is ignored.
    pub fn add_alias(&mut self, variant: &str, canonical: &str) {
        let variant_key = self.canonicalize(variant);
        let canonical_key = self.canonicalize(canonical);
        if variant_key.is_empty() || canonical_key.is_empty() || variant_key == canonical_key {
            return;
        }
        self.aliases.insert(variant_key, canonical_key);
    }

    /// Registers an extra corrupted -> correct substring pair.
    pub fn add_repair(&mut self, corrupted: impl Into<String>, correct: impl Into<String>) {
        let corrupted = corrupted.into();
        if corrupted.is_empty() {
            return;
        }
        self.extra_repairs.push((corrupted, correct.into()));
        self.extra_repairs
            .sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    /// Canonicalizes `raw` into its most specific comparable key.
    pub fn normalize(&self, raw: &str) -> String {
        let key = self.canonicalize(raw);
        match self.aliases.get(&key) {
            Some(canonical) => canonical.clone(),
            None => key,
        }
    }

    /// Computes both the specific and the honorific-free key.
    pub fn name_key(&self, raw: &str) -> NameKey {
        let key = self.normalize(raw);
        let bare = self.bare_key(&key);
        NameKey { key, bare }
    }

    /// Strips honorific tokens from an already normalized key.
    pub fn bare_key(&self, key: &str) -> String {
        let mut tokens: Vec<&str> = key.split(' ').filter(|token| !token.is_empty()).collect();
        loop {
            let before = tokens.len();
            if let Some(prefix) = self
                .prefixes
                .iter()
                .find(|prefix| tokens.len() > prefix.len() && starts_with_tokens(&tokens, prefix))
            {
                tokens.drain(..prefix.len());
            }
            if let Some(suffix) = self
                .suffixes
                .iter()
                .find(|suffix| tokens.len() > suffix.len() && ends_with_tokens(&tokens, suffix))
            {
                tokens.truncate(tokens.len() - suffix.len());
            }
            if tokens.len() == before {
                break;
            }
        }
        tokens.join(" ")
    }

    /// Repaired, whitespace-collapsed, NFC display form with case preserved.
    pub fn display_form(&self, raw: &str) -> String {
        let repaired = self.repair(raw);
        let collapsed = repaired.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.nfc().collect()
    }

    /// File-name friendly form of a name (`nguyễn-trung-trực`).
    pub fn slug(&self, raw: &str) -> String {
        self.normalize(raw).replace(' ', "-")
    }

    /// Repair, whitespace collapse, NFC and case folding. No alias lookup.
    fn canonicalize(&self, raw: &str) -> String {
        self.display_form(raw).to_lowercase()
    }

    fn repair(&self, raw: &str) -> String {
        let mut repaired = raw.to_string();
        for (corrupted, correct) in &self.extra_repairs {
            if repaired.contains(corrupted.as_str()) {
                repaired = repaired.replace(corrupted.as_str(), correct);
            }
        }
        repair_mojibake(&repaired).into_owned()
    }

    fn tokenize_titles<T: AsRef<str>>(&self, titles: &[T]) -> Vec<Vec<String>> {
        let mut tokenized: Vec<Vec<String>> = titles
            .iter()
            .map(|title| {
                self.canonicalize(title.as_ref())
                    .split(' ')
                    .filter(|token| !token.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|tokens| !tokens.is_empty())
            .collect();
        tokenized.sort_by(|a, b| b.len().cmp(&a.len()));
        tokenized.dedup();
        tokenized
    }
}

fn starts_with_tokens(tokens: &[&str], prefix: &[String]) -> bool {
    tokens.iter().zip(prefix).all(|(token, title)| *token == title)
}

fn ends_with_tokens(tokens: &[&str], suffix: &[String]) -> bool {
    tokens
        .iter()
        .rev()
        .zip(suffix.iter().rev())
        .all(|(token, title)| *token == title)
}
