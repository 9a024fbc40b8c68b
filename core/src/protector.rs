//! Markup protection and translatability screening.
//!
//! Hytale mod strings mix prose with markup that must survive translation
//! verbatim: rich-text tags (`<color is="...">`, `</color>`, `<item ... />`),
//! bracket tags (`[TMP]`, `[WIP]`) and literal `\n` sequences. This module
//! splits a string into text and protected fragments, extracts the ordered
//! token list carried on a translation unit, and verifies token parity on
//! provider output. It also screens out strings that must never reach a
//! provider at all: translation keys, substitution templates, identifiers.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

static MARKUP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:<[^>]+>|\[[A-Z]+\]| \\n |\\n)").expect("valid markup regex")
});

// {var}, {count}, {%s}-style substitution openers
static TEMPLATE_BRACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[A-Za-z_%]").expect("valid template brace regex"));

static DANGLING_BRACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_\s*\}|\{\s*_").expect("valid dangling brace regex"));

/// A slice of a source string, tagged with whether it is protected markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub text: &'a str,
    pub protected: bool,
}

/// Splits a string into alternating text and markup fragments.
///
/// Concatenating the fragment texts in order reproduces the input exactly.
pub fn split_markup(text: &str) -> Vec<Fragment<'_>> {
    let mut fragments = Vec::new();
    let mut last_end = 0;

    for found in MARKUP_REGEX.find_iter(text) {
        if found.start() > last_end {
            fragments.push(Fragment {
                text: &text[last_end..found.start()],
                protected: false,
            });
        }
        fragments.push(Fragment {
            text: found.as_str(),
            protected: true,
        });
        last_end = found.end();
    }

    if last_end < text.len() {
        fragments.push(Fragment {
            text: &text[last_end..],
            protected: false,
        });
    }

    fragments
}

/// Returns true when the string contains any protected markup.
pub fn has_markup(text: &str) -> bool {
    MARKUP_REGEX.is_match(text)
}

/// The ordered list of protected tokens in a source string.
pub fn protected_tokens(text: &str) -> Vec<String> {
    MARKUP_REGEX
        .find_iter(text)
        .map(|found| found.as_str().to_string())
        .collect()
}

/// Checks that a translation kept every protected token of its source.
///
/// Tokens are compared as multisets; reordering is tolerated (providers move
/// tags around freely) but losing an occurrence is not. On failure returns
/// the missing tokens with their deficit counts.
pub fn verify_protected(original: &str, translated: &str) -> Result<(), Vec<String>> {
    let expected = count_tokens(original);
    let actual = count_tokens(translated);

    let missing: Vec<String> = expected
        .iter()
        .filter_map(|(token, expected_count)| {
            let actual_count = actual.get(token.as_str()).copied().unwrap_or_default();
            if actual_count < *expected_count {
                Some(format!("{token} (missing {})", expected_count - actual_count))
            } else {
                None
            }
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(missing)
    }
}

fn count_tokens(text: &str) -> BTreeMap<String, usize> {
    protected_tokens(text)
        .into_iter()
        .fold(BTreeMap::new(), |mut acc, token| {
            *acc.entry(normalize_token(&token)).or_insert(0_usize) += 1;
            acc
        })
}

// " \n " and "\n" count as the same token for parity
fn normalize_token(token: &str) -> String {
    token.trim().to_string()
}

/// Why a string was excluded from translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Empty,
    TranslationKey,
    Template,
    Identifier,
    RepeatedWord,
}

impl SkipReason {
    pub fn describe(&self) -> &'static str {
        match self {
            SkipReason::Empty => "empty or whitespace-only",
            SkipReason::TranslationKey => "dotted translation key, not display text",
            SkipReason::Template => "contains substitution template",
            SkipReason::Identifier => "bare identifier",
            SkipReason::RepeatedWord => "repeated filler word",
        }
    }
}

/// Detects `items.Ingredient_Voidheart.name`-style keys: no spaces, at least
/// two dot-separated parts, every part alphanumeric plus `_`/`-`.
pub fn looks_like_translation_key(text: &str) -> bool {
    let s = text.trim();
    if s.is_empty() || s.contains(' ') {
        return false;
    }
    let parts: Vec<&str> = s.split('.').collect();
    if parts.len() < 2 {
        return false;
    }
    parts.iter().all(|part| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    })
}

/// Screens a source string; `None` means it should be translated.
pub fn skip_reason(text: &str) -> Option<SkipReason> {
    let s = text.trim();
    if s.is_empty() {
        return Some(SkipReason::Empty);
    }
    if looks_like_translation_key(s) {
        return Some(SkipReason::TranslationKey);
    }
    if s.contains('{') && s.contains('}') && TEMPLATE_BRACE_REGEX.is_match(s) {
        return Some(SkipReason::Template);
    }
    if s.contains("%s") || s.contains("%d") || s.contains("%(") {
        return Some(SkipReason::Template);
    }
    if DANGLING_BRACE_REGEX.is_match(s) {
        return Some(SkipReason::Template);
    }
    if s.chars().all(|c| c == '_' || c.is_whitespace()) {
        return Some(SkipReason::Empty);
    }
    let single_word = !s.contains(' ') && !s.contains('\n');
    if single_word && s.contains('_') && s.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Some(SkipReason::Identifier);
    }
    if single_word && is_repeated_word(s) {
        return Some(SkipReason::RepeatedWord);
    }
    None
}

// AliveAlive, TestTestTest: a short alphabetic prefix repeated to fill the
// whole string
fn is_repeated_word(s: &str) -> bool {
    if !s.chars().all(char::is_alphabetic) {
        return false;
    }
    let chars: Vec<char> = s.chars().collect();
    let n = chars.len();
    if n < 2 {
        return false;
    }
    for width in 1..=n / 2 {
        if n % width != 0 {
            continue;
        }
        if chars.chunks(width).all(|chunk| chunk == &chars[..width]) {
            return true;
        }
    }
    false
}
