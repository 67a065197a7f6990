#![forbid(unsafe_code)]

use std::collections::BTreeSet;

/// Trims, lowercases and de-duplicates node tags. A leading `#` is dropped so
/// `#bearing` and `bearing` are the same tag.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>, TagError> {
    let mut out = BTreeSet::new();
    for tag in tags {
        let trimmed = tag.trim();
        let trimmed = trimmed.strip_prefix('#').unwrap_or(trimmed).trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.chars().any(|c| c.is_control()) {
            return Err(TagError::ContainsControl);
        }
        if trimmed.chars().count() > 64 {
            return Err(TagError::TooLong);
        }
        out.insert(trimmed.to_lowercase());
    }
    Ok(out.into_iter().collect())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagError {
    TooLong,
    ContainsControl,
}

impl TagError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::TooLong => "tag is too long",
            Self::ContainsControl => "tag contains control characters",
        }
    }
}

impl std::fmt::Display for TagError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for TagError {}
