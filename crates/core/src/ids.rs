#![forbid(unsafe_code)]

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnalysisId(String);

impl AnalysisId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, AnalysisIdError> {
        let value = value.into();
        validate_analysis_id(&value)?;
        Ok(Self(value))
    }
}

impl std::fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalysisIdError {
    Empty,
    TooLong,
    InvalidFirstChar,
    InvalidChar { ch: char, index: usize },
}

impl std::fmt::Display for AnalysisIdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "analysis id must not be empty"),
            Self::TooLong => write!(f, "analysis id is too long"),
            Self::InvalidFirstChar => write!(f, "analysis id must start with [A-Za-z0-9]"),
            Self::InvalidChar { ch, index } => {
                write!(f, "analysis id has invalid char {ch:?} at {index}")
            }
        }
    }
}

impl std::error::Error for AnalysisIdError {}

fn validate_analysis_id(value: &str) -> Result<(), AnalysisIdError> {
    if value.is_empty() {
        return Err(AnalysisIdError::Empty);
    }
    if value.len() > 128 {
        return Err(AnalysisIdError::TooLong);
    }
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return Err(AnalysisIdError::Empty);
    };
    if !first.is_ascii_alphanumeric() {
        return Err(AnalysisIdError::InvalidFirstChar);
    }
    for (index, ch) in value.chars().enumerate().skip(1) {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            continue;
        }
        return Err(AnalysisIdError::InvalidChar { ch, index });
    }
    Ok(())
}
