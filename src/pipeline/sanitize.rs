//! Filename sanitisation for staged uploads.
//!
//! Client-supplied names are arbitrary text: accents, spaces, path
//! separators, shell metacharacters. Staged files are named
//! `{unix_millis}-{kebab-base}{ext}` where the base has been folded to
//! unaccented letters and kebab-cased. The extension is kept as sent so the
//! decoder and the download content type still see it.
//!
//! Two uploads with the same base name in the same millisecond sanitise to
//! the same string; the stager resolves that by suffixing, not this module.

use std::time::{SystemTime, UNIX_EPOCH};
use unicode_normalization::UnicodeNormalization;

/// Combining Diacritical Marks block.
const COMBINING_MARKS: std::ops::RangeInclusive<char> = '\u{0300}'..='\u{036F}';

/// Derive an on-disk filename from a client-supplied one, stamped with the
/// current time.
pub fn sanitize(original_name: &str) -> String {
    sanitize_at(original_name, now_millis())
}

/// Same as [`sanitize`] with an explicit millisecond timestamp.
pub fn sanitize_at(original_name: &str, millis: u128) -> String {
    let (base, ext) = split_name(original_name);
    let ext: String = ext.chars().filter(|c| !c.is_control()).collect();
    format!("{millis}-{}{ext}", kebab_case(&fold_diacritics(base)))
}

/// Split into `(base, extension)` using only the final path component.
///
/// The extension includes its leading dot. Dot-files such as `.env` have no
/// extension.
pub fn split_name(name: &str) -> (&str, &str) {
    let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
    if file == "." || file == ".." {
        return (file, "");
    }
    match file.rfind('.') {
        None | Some(0) => (file, ""),
        Some(i) => (&file[..i], &file[i..]),
    }
}

/// Decompose, drop combining marks, and map the stroke letters that
/// Unicode normalisation leaves intact.
pub fn fold_diacritics(s: &str) -> String {
    s.nfd()
        .filter(|c| !COMBINING_MARKS.contains(c))
        .map(|c| match c {
            'đ' => 'd',
            'Đ' => 'D',
            c => c,
        })
        .collect()
}

/// Lowercase words joined by hyphens.
///
/// Words break on any non-alphanumeric run, on lower→upper case changes,
/// before the last capital of an acronym that starts a new word
/// (`XMLHttp` → `xml`, `http`), and between letters and digits.
/// Apostrophes are dropped without breaking a word.
pub fn kebab_case(s: &str) -> String {
    split_words(s)
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

fn split_words(s: &str) -> Vec<String> {
    let chars: Vec<char> = s
        .chars()
        .filter(|c| !matches!(c, '\'' | '\u{2019}'))
        .collect();

    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            flush(&mut words, &mut current);
            continue;
        }
        let prev = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();
        if let Some(prev) = prev {
            if prev.is_alphanumeric() && is_word_boundary(prev, c, next) {
                flush(&mut words, &mut current);
            }
        }
        current.push(c);
    }
    flush(&mut words, &mut current);

    words
}

fn is_word_boundary(prev: char, cur: char, next: Option<char>) -> bool {
    (prev.is_lowercase() && cur.is_uppercase())
        || (prev.is_numeric() != cur.is_numeric())
        || (prev.is_uppercase() && cur.is_uppercase() && next.is_some_and(char::is_lowercase))
}

fn flush(words: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        words.push(std::mem::take(current));
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
