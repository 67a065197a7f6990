#![forbid(unsafe_code)]

/// Shared validation for node and edge ids. Ids are opaque to the engine but
/// must survive a round trip through storage keys and table cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdError {
    Empty,
    TooLong,
    ContainsPipe,
    ContainsControl,
}

impl IdError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "id must not be empty",
            Self::TooLong => "id is too long",
            Self::ContainsPipe => "id must not contain '|'",
            Self::ContainsControl => "id contains control characters",
        }
    }
}

impl std::fmt::Display for IdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for IdError {}

pub fn validate_id(value: &str) -> Result<(), IdError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(IdError::Empty);
    }
    if trimmed.len() > 256 {
        return Err(IdError::TooLong);
    }
    if trimmed.contains('|') {
        return Err(IdError::ContainsPipe);
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(IdError::ContainsControl);
    }
    Ok(())
}
