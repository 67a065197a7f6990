#![forbid(unsafe_code)]

use super::QualityError;
use super::lexicon::Replacement;
use regex::{Captures, Regex};
use std::collections::BTreeSet;

/// A lexicon phrase compiled to a case-insensitive regex.
#[derive(Clone, Debug)]
pub(crate) struct Phrase {
    pub text: String,
    pub re: Regex,
    pub replacement: Option<String>,
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Word boundaries are only added at edges that are word characters, so
/// phrases such as `±` or `>=` still match.
pub(crate) fn phrase_regex(phrase: &str) -> Result<Regex, QualityError> {
    let phrase = phrase.trim();
    let (Some(first), Some(last)) = (phrase.chars().next(), phrase.chars().last()) else {
        return Err(QualityError::EmptyPhrase);
    };
    let mut pattern = String::from("(?i)");
    if is_word_char(first) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(phrase));
    if is_word_char(last) {
        pattern.push_str(r"\b");
    }
    Regex::new(&pattern).map_err(|err| QualityError::InvalidPattern {
        phrase: phrase.to_string(),
        message: err.to_string(),
    })
}

pub(crate) fn compile_phrases(list: &[String]) -> Result<Vec<Phrase>, QualityError> {
    list.iter()
        .map(|text| {
            Ok(Phrase {
                text: text.trim().to_string(),
                re: phrase_regex(text)?,
                replacement: None,
            })
        })
        .collect()
}

pub(crate) fn compile_replacements(list: &[Replacement]) -> Result<Vec<Phrase>, QualityError> {
    list.iter()
        .map(|entry| {
            Ok(Phrase {
                text: entry.phrase.trim().to_string(),
                re: phrase_regex(&entry.phrase)?,
                replacement: entry.replacement.clone(),
            })
        })
        .collect()
}

pub(crate) fn first_match<'a>(phrases: &'a [Phrase], text: &str) -> Option<&'a Phrase> {
    phrases.iter().find(|p| p.re.is_match(text))
}

pub(crate) fn any_match(phrases: &[Phrase], text: &str) -> bool {
    first_match(phrases, text).is_some()
}

/// Applies every replacement in table order. Returns `None` when nothing was
/// replaced.
pub(crate) fn rewrite(phrases: &[Phrase], text: &str) -> Option<String> {
    let mut out = text.to_string();
    let mut changed = false;
    for phrase in phrases {
        let Some(replacement) = &phrase.replacement else {
            continue;
        };
        if !phrase.re.is_match(&out) {
            continue;
        }
        out = phrase
            .re
            .replace_all(&out, |caps: &Captures<'_>| match_case(&caps[0], replacement))
            .into_owned();
        changed = true;
    }
    changed.then(|| collapse_whitespace(&out))
}

/// Capitalizes `replacement` when the matched text starts uppercase.
fn match_case(matched: &str, replacement: &str) -> String {
    let upper = matched.chars().next().is_some_and(char::is_uppercase);
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) if upper => first.to_uppercase().chain(chars).collect(),
        _ => replacement.to_string(),
    }
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Lowercased words of three or more characters that are not stopwords.
pub(crate) fn significant_words(text: &str, stopwords: &BTreeSet<String>) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|w| !stopwords.contains(w))
        .collect()
}

/// Share of the cause's significant words that also appear in the parent's.
pub(crate) fn overlap_ratio(cause: &BTreeSet<String>, parent: &BTreeSet<String>) -> f64 {
    if cause.is_empty() {
        return 0.0;
    }
    let shared = cause.intersection(parent).count();
    shared as f64 / cause.len() as f64
}
