#![forbid(unsafe_code)]

//! Engine configuration, read from YAML. Every key is optional; omitted keys
//! keep the built-in defaults.

use crate::fields::{FieldDefinition, FieldKind};
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::path::DEFAULT_MAX_HOPS;
use crate::quality::{Lexicons, QualityEngine, QualityError};
use crate::risk::{ApRule, RuleError, default_ap_rules, validate_rules};
use crate::table::{COLUMN_COUNT, DEFAULT_GROUPABLE_COLUMNS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub history_capacity: usize,
    pub max_path_hops: usize,
    pub groupable_columns: usize,
    pub ap_rules: Vec<ApRule>,
    pub lexicons: Lexicons,
    pub field_definitions: Vec<FieldDefinition>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_path_hops: DEFAULT_MAX_HOPS,
            groupable_columns: DEFAULT_GROUPABLE_COLUMNS,
            ap_rules: default_ap_rules(),
            lexicons: Lexicons::default(),
            field_definitions: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    Invalid {
        key: &'static str,
        message: String,
    },
    Rules(Vec<RuleError>),
    Lexicon(QualityError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Yaml(err) => write!(f, "yaml: {err}"),
            Self::Invalid { key, message } => write!(f, "{key}: {message}"),
            Self::Rules(errors) => {
                write!(f, "ap_rules:")?;
                for err in errors {
                    write!(f, " {err};")?;
                }
                Ok(())
            }
            Self::Lexicon(err) => write!(f, "lexicons: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Yaml(err) => Some(err),
            Self::Lexicon(err) => Some(err),
            Self::Invalid { .. } | Self::Rules(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Yaml(value)
    }
}

impl From<QualityError> for ConfigError {
    fn from(value: QualityError) -> Self {
        Self::Lexicon(value)
    }
}

impl EngineConfig {
    /// Parses and validates a YAML document.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = if raw.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&raw)?;
        tracing::debug!(
            path = %path.display(),
            rules = config.ap_rules.len(),
            fields = config.field_definitions.len(),
            "engine config loaded"
        );
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "history_capacity",
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_path_hops == 0 {
            return Err(ConfigError::Invalid {
                key: "max_path_hops",
                message: "must be at least 1".to_string(),
            });
        }
        if self.groupable_columns > COLUMN_COUNT {
            return Err(ConfigError::Invalid {
                key: "groupable_columns",
                message: format!("at most {COLUMN_COUNT} chain columns exist"),
            });
        }

        let errors = validate_rules(&self.ap_rules);
        if !errors.is_empty() {
            return Err(ConfigError::Rules(errors));
        }

        let mut keys = BTreeSet::new();
        for def in &self.field_definitions {
            if def.key.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    key: "field_definitions",
                    message: "field key must not be empty".to_string(),
                });
            }
            if !keys.insert(def.key.as_str()) {
                return Err(ConfigError::Invalid {
                    key: "field_definitions",
                    message: format!("duplicate field key {}", def.key),
                });
            }
            if let FieldKind::Select { options } | FieldKind::MultiSelect { options } = &def.kind
                && options.is_empty()
            {
                return Err(ConfigError::Invalid {
                    key: "field_definitions",
                    message: format!("{} has no options", def.key),
                });
            }
        }

        QualityEngine::new(&self.lexicons)?;
        Ok(())
    }

    pub fn quality_engine(&self) -> Result<QualityEngine, QualityError> {
        QualityEngine::new(&self.lexicons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_the_default() {
        assert_eq!(EngineConfig::from_yaml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let raw = r#"
history_capacity: 10
ap_rules:
  - condition:
      severity: { min: 9 }
    result: { category: Critical, priority: 1, color: red }
  - default: true
    result: { category: Low, priority: 4, color: green }
field_definitions:
  - key: line
    label: Production line
    type: select
    options: [A, B]
"#;
        let config = EngineConfig::from_yaml_str(raw).unwrap();
        assert_eq!(config.history_capacity, 10);
        assert_eq!(config.max_path_hops, DEFAULT_MAX_HOPS);
        assert_eq!(config.ap_rules.len(), 2);
        assert!(config.ap_rules[1].default);
        assert_eq!(config.field_definitions[0].kind.as_str(), "select");
        assert_eq!(config.lexicons, Lexicons::default());
    }

    #[test]
    fn invalid_documents_are_rejected() {
        assert!(matches!(
            EngineConfig::from_yaml_str("history_capacity: 0").unwrap_err(),
            ConfigError::Invalid {
                key: "history_capacity",
                ..
            }
        ));
        assert!(matches!(
            EngineConfig::from_yaml_str("groupable_columns: 11").unwrap_err(),
            ConfigError::Invalid { .. }
        ));
        assert!(matches!(
            EngineConfig::from_yaml_str("history_capacity: [1]").unwrap_err(),
            ConfigError::Yaml(_)
        ));
        let two_defaults = r#"
ap_rules:
  - default: true
    result: { category: Low }
  - default: true
    result: { category: Lower }
"#;
        assert!(matches!(
            EngineConfig::from_yaml_str(two_defaults).unwrap_err(),
            ConfigError::Rules(_)
        ));
        let dup_fields = r#"
field_definitions:
  - { key: a, label: A, type: boolean }
  - { key: a, label: A2, type: date }
"#;
        assert!(EngineConfig::from_yaml_str(dup_fields).is_err());
    }

    #[test]
    fn yaml_round_trips() {
        let config = EngineConfig::default();
        let raw = config.to_yaml_string().unwrap();
        assert_eq!(EngineConfig::from_yaml_str(&raw).unwrap(), config);
    }
}
