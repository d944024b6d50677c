//! Repair of UTF-8 text that was mis-decoded as Windows-1252.
//!
//! # Responsibility
//! - Hold the shared corrupted→correct substring table.
//! - Rewrite corrupted sequences back to the intended characters.
//!
//! # Invariants
//! - The table is built once per process and never mutated.
//! - Pure ASCII input is returned unchanged without allocation.
//! - Longer corrupted sequences win over shorter ones at the same position,
//!   so a shortened form only applies where no full form matches.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::HashMap;

/// Windows-1252 code points for bytes 0x80..=0x9F. Bytes the code page leaves
/// undefined decode to the matching C1 control, as WHATWG decoders do.
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

/// Characters whose corrupted forms are repaired.
const REPAIRED_RANGES: &[(char, char)] = &[
    ('\u{00C0}', '\u{00FF}'), // Latin-1 letters
    ('\u{0100}', '\u{017F}'), // Latin Extended-A (Đ đ ă ĩ ũ ...)
    ('\u{01A0}', '\u{01A1}'), // Ơ ơ
    ('\u{01AF}', '\u{01B0}'), // Ư ư
    ('\u{1EA0}', '\u{1EF9}'), // Vietnamese tone-marked letters
    ('\u{2013}', '\u{2014}'), // en/em dash
    ('\u{2018}', '\u{2019}'),
    ('\u{201C}', '\u{201D}'),
    ('\u{2026}', '\u{2026}'),
];

/// Letters also repaired from their shortened form, where a lossy decoder
/// dropped the bytes cp1252 leaves undefined (`Đ` becomes a bare `Ä`).
/// `Á`, `Í` and `Ý` shorten to `Ã`, which is a letter in its own right, and
/// `ề ọ ỏ Ố ờ` all shorten to `á»`, so neither form is listed.
const SHORTENED_LETTERS: &[char] = &['Đ'];

struct RepairTable {
    pattern: Regex,
    replacements: HashMap<String, char>,
}

static REPAIR_TABLE: Lazy<RepairTable> = Lazy::new(build_table);

fn build_table() -> RepairTable {
    let mut replacements = HashMap::new();
    for &(first, last) in REPAIRED_RANGES {
        for code in u32::from(first)..=u32::from(last) {
            if let Some(intended) = char::from_u32(code) {
                replacements.insert(simulate_mojibake(intended.encode_utf8(&mut [0; 4])), intended);
            }
        }
    }

    for &letter in SHORTENED_LETTERS {
        replacements
            .entry(simulate_lossy_mojibake(letter.encode_utf8(&mut [0; 4])))
            .or_insert(letter);
    }

    let mut corrupted: Vec<&String> = replacements.keys().collect();
    corrupted.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
    let alternation = corrupted
        .iter()
        .map(|value| regex::escape(value))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = Regex::new(&alternation).expect("valid mojibake regex");

    RepairTable {
        pattern,
        replacements,
    }
}

/// Returns the text a Windows-1252 decoder produces for the UTF-8 bytes of
/// `text`.
pub fn simulate_mojibake(text: &str) -> String {
    text.bytes().map(decode_cp1252_byte).collect()
}

/// Like [`simulate_mojibake`], but drops bytes cp1252 leaves undefined
/// instead of mapping them to C1 controls.
pub fn simulate_lossy_mojibake(text: &str) -> String {
    text.bytes()
        .filter(|byte| !is_undefined_cp1252(*byte))
        .map(decode_cp1252_byte)
        .collect()
}

fn is_undefined_cp1252(byte: u8) -> bool {
    matches!(byte, 0x81 | 0x8D | 0x8F | 0x90 | 0x9D)
}

fn decode_cp1252_byte(byte: u8) -> char {
    match byte {
        0x80..=0x9F => CP1252_HIGH[usize::from(byte - 0x80)],
        other => char::from(other),
    }
}

/// Rewrites every known corrupted sequence in `raw` to its intended character.
pub fn repair_mojibake(raw: &str) -> Cow<'_, str> {
    if raw.is_ascii() {
        return Cow::Borrowed(raw);
    }
    let table = &*REPAIR_TABLE;
    table.pattern.replace_all(raw, |caps: &Captures<'_>| {
        let matched = &caps[0];
        table
            .replacements
            .get(matched)
            .map_or_else(|| matched.to_string(), |intended| intended.to_string())
    })
}

/// Number of corrupted sequences the built-in table knows.
pub fn repair_table_len() -> usize {
    REPAIR_TABLE.replacements.len()
}

#[cfg(test)]
mod tests {
    use super::{repair_mojibake, repair_table_len, simulate_lossy_mojibake, simulate_mojibake};

    #[test]
    fn simulate_matches_observed_corruption() {
        assert_eq!(simulate_mojibake("Nguyễn"), "Nguyá»…n");
        assert_eq!(simulate_mojibake("Phương"), "PhÆ°Æ¡ng");
        assert_eq!(simulate_mojibake("François"), "FranÃ§ois");
    }

    #[test]
    fn repair_restores_vietnamese_and_french_names() {
        assert_eq!(repair_mojibake("Nguyá»…n Tri PhÆ°Æ¡ng"), "Nguyễn Tri Phương");
        assert_eq!(repair_mojibake("FranÃ§ois Page"), "François Page");
        assert_eq!(repair_mojibake(&simulate_mojibake("Đại tá")), "Đại tá");
    }

    #[test]
    fn repair_leaves_clean_text_untouched() {
        assert_eq!(repair_mojibake("Trương Định"), "Trương Định");
        assert_eq!(repair_mojibake("Paul Bert"), "Paul Bert");
    }

    #[test]
    fn lossy_decoding_drops_undefined_bytes() {
        assert_eq!(simulate_lossy_mojibake("Đinh"), "Äinh");
        assert_eq!(simulate_mojibake("Đinh"), "Ä\u{90}inh");
    }

    #[test]
    fn repair_restores_capital_d_stroke_without_its_dropped_byte() {
        assert_eq!(repair_mojibake("Äáº¡i tÃ¡ Lanzarote"), "Đại tá Lanzarote");
        assert_eq!(repair_mojibake("Äá»™i Cáº¥n"), "Đội Cấn");
        assert_eq!(repair_mojibake("\"Äinh"), "\"Đinh");
        assert_eq!(repair_mojibake("Ä\u{90}inh"), "Đinh");
        assert_eq!(repair_mojibake("Ä‘á»‹nh"), "định");
    }

    #[test]
    fn ambiguous_shortened_forms_are_left_alone() {
        assert_eq!(repair_mojibake("NGÃ"), "NGÃ");
        assert_eq!(repair_mojibake("ngÃ£"), "ngã");
    }

    #[test]
    fn table_covers_every_repaired_character() {
        assert_eq!(repair_table_len(), 294);
    }
}
