#![forbid(unsafe_code)]

//! Analysis-specific custom fields. The field kind is a closed set; the same
//! enum drives value validation and the rendering hint handed to the UI.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Date,
    Select {
        options: Vec<String>,
    },
    MultiSelect {
        options: Vec<String>,
    },
    Boolean,
    Url,
    Email,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub key: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::List(_) => "list",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RenderHint {
    pub input: &'static str,
    pub multiple: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<&'static str>,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Number { .. } => "number",
            Self::Date => "date",
            Self::Select { .. } => "select",
            Self::MultiSelect { .. } => "multi_select",
            Self::Boolean => "boolean",
            Self::Url => "url",
            Self::Email => "email",
        }
    }

    pub fn render_hint(&self) -> RenderHint {
        let (input, multiple, options, placeholder) = match self {
            Self::Text { .. } => ("text", false, Vec::new(), None),
            Self::Number { .. } => ("number", false, Vec::new(), None),
            Self::Date => ("date", false, Vec::new(), Some("YYYY-MM-DD")),
            Self::Select { options } => ("select", false, options.clone(), None),
            Self::MultiSelect { options } => ("select", true, options.clone(), None),
            Self::Boolean => ("checkbox", false, Vec::new(), None),
            Self::Url => ("url", false, Vec::new(), Some("https://")),
            Self::Email => ("email", false, Vec::new(), Some("name@example.com")),
        };
        RenderHint {
            input,
            multiple,
            options,
            placeholder,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldError {
    UnknownField { key: String },
    Required { key: String },
    TypeMismatch { key: String, expected: &'static str, got: &'static str },
    TooLong { key: String, max: usize },
    OutOfRange { key: String },
    InvalidDate { key: String },
    InvalidUrl { key: String },
    InvalidEmail { key: String },
    UnknownOption { key: String, value: String },
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownField { key } => write!(f, "{key}: unknown field"),
            Self::Required { key } => write!(f, "{key}: value is required"),
            Self::TypeMismatch { key, expected, got } => {
                write!(f, "{key}: expected {expected}, got {got}")
            }
            Self::TooLong { key, max } => write!(f, "{key}: longer than {max} characters"),
            Self::OutOfRange { key } => write!(f, "{key}: number out of range"),
            Self::InvalidDate { key } => write!(f, "{key}: date must be YYYY-MM-DD"),
            Self::InvalidUrl { key } => write!(f, "{key}: url must start with http:// or https://"),
            Self::InvalidEmail { key } => write!(f, "{key}: invalid email address"),
            Self::UnknownOption { key, value } => write!(f, "{key}: {value:?} is not an option"),
        }
    }
}

impl std::error::Error for FieldError {}

pub fn validate_field(def: &FieldDefinition, value: Option<&FieldValue>) -> Result<(), FieldError> {
    let key = || def.key.clone();
    let Some(value) = value else {
        return if def.required {
            Err(FieldError::Required { key: key() })
        } else {
            Ok(())
        };
    };
    let mismatch = |expected: &'static str| FieldError::TypeMismatch {
        key: key(),
        expected,
        got: value.type_name(),
    };

    match (&def.kind, value) {
        (FieldKind::Text { max_length }, FieldValue::Text(text)) => {
            if let Some(max) = *max_length
                && text.chars().count() > max
            {
                return Err(FieldError::TooLong { key: key(), max });
            }
            Ok(())
        }
        (FieldKind::Number { min, max }, FieldValue::Number(n)) => {
            if !n.is_finite() || min.is_some_and(|m| *n < m) || max.is_some_and(|m| *n > m) {
                return Err(FieldError::OutOfRange { key: key() });
            }
            Ok(())
        }
        (FieldKind::Date, FieldValue::Text(text)) => {
            let format = time::macros::format_description!("[year]-[month]-[day]");
            time::Date::parse(text.trim(), format)
                .map(|_| ())
                .map_err(|_| FieldError::InvalidDate { key: key() })
        }
        (FieldKind::Select { options }, FieldValue::Text(text)) => {
            if options.iter().any(|o| o == text) {
                Ok(())
            } else {
                Err(FieldError::UnknownOption {
                    key: key(),
                    value: text.clone(),
                })
            }
        }
        (FieldKind::MultiSelect { options }, FieldValue::List(values)) => {
            match values.iter().find(|v| !options.contains(*v)) {
                Some(value) => Err(FieldError::UnknownOption {
                    key: key(),
                    value: value.clone(),
                }),
                None => Ok(()),
            }
        }
        (FieldKind::Boolean, FieldValue::Bool(_)) => Ok(()),
        (FieldKind::Url, FieldValue::Text(text)) => {
            let text = text.trim();
            let rest = text
                .strip_prefix("https://")
                .or_else(|| text.strip_prefix("http://"));
            match rest {
                Some(rest) if !rest.is_empty() && !rest.contains(char::is_whitespace) => Ok(()),
                _ => Err(FieldError::InvalidUrl { key: key() }),
            }
        }
        (FieldKind::Email, FieldValue::Text(text)) => {
            if looks_like_email(text.trim()) {
                Ok(())
            } else {
                Err(FieldError::InvalidEmail { key: key() })
            }
        }
        (FieldKind::Text { .. }, _)
        | (FieldKind::Date, _)
        | (FieldKind::Select { .. }, _)
        | (FieldKind::Url, _)
        | (FieldKind::Email, _) => Err(mismatch("text")),
        (FieldKind::Number { .. }, _) => Err(mismatch("number")),
        (FieldKind::MultiSelect { .. }, _) => Err(mismatch("list")),
        (FieldKind::Boolean, _) => Err(mismatch("boolean")),
    }
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.contains(char::is_whitespace)
}

/// Validates a node's custom field map against the analysis definitions.
/// Returns every problem rather than stopping at the first.
pub fn validate_custom_fields(
    defs: &[FieldDefinition],
    values: &BTreeMap<String, FieldValue>,
) -> Vec<FieldError> {
    let mut errors = Vec::new();
    for def in defs {
        if let Err(err) = validate_field(def, values.get(&def.key)) {
            errors.push(err);
        }
    }
    for key in values.keys() {
        if !defs.iter().any(|d| &d.key == key) {
            errors.push(FieldError::UnknownField { key: key.clone() });
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(key: &str, kind: FieldKind) -> FieldDefinition {
        FieldDefinition {
            key: key.to_string(),
            label: key.to_string(),
            kind,
            required: false,
        }
    }

    #[test]
    fn definitions_parse_from_tagged_json() {
        let defs: Vec<FieldDefinition> = serde_json::from_value(serde_json::json!([
            {"key": "line", "label": "Line", "type": "select", "options": ["A", "B"]},
            {"key": "torque", "label": "Torque", "type": "number", "min": 0.0, "max": 50.0},
            {"key": "found", "label": "Found on", "type": "date", "required": true}
        ]))
        .unwrap();
        assert_eq!(defs[0].kind.as_str(), "select");
        assert_eq!(
            defs[1].kind,
            FieldKind::Number {
                min: Some(0.0),
                max: Some(50.0)
            }
        );
        assert!(defs[2].required);
    }

    #[test]
    fn values_are_checked_against_their_kind() {
        let date = def("found", FieldKind::Date);
        assert!(validate_field(&date, Some(&FieldValue::Text("2024-02-29".into()))).is_ok());
        assert_eq!(
            validate_field(&date, Some(&FieldValue::Text("2023-02-29".into()))),
            Err(FieldError::InvalidDate {
                key: "found".into()
            })
        );

        let torque = def(
            "torque",
            FieldKind::Number {
                min: Some(0.0),
                max: Some(50.0),
            },
        );
        assert!(validate_field(&torque, Some(&FieldValue::Number(12.5))).is_ok());
        assert!(validate_field(&torque, Some(&FieldValue::Number(80.0))).is_err());
        assert_eq!(
            validate_field(&torque, Some(&FieldValue::Text("12".into()))),
            Err(FieldError::TypeMismatch {
                key: "torque".into(),
                expected: "number",
                got: "text"
            })
        );

        let lines = def(
            "lines",
            FieldKind::MultiSelect {
                options: vec!["A".into(), "B".into()],
            },
        );
        assert!(validate_field(&lines, Some(&FieldValue::List(vec!["A".into()]))).is_ok());
        assert!(validate_field(&lines, Some(&FieldValue::List(vec!["C".into()]))).is_err());

        let email = def("owner", FieldKind::Email);
        assert!(validate_field(&email, Some(&FieldValue::Text("qa@plant.example".into()))).is_ok());
        assert!(validate_field(&email, Some(&FieldValue::Text("qa@plant".into()))).is_err());

        let url = def("doc", FieldKind::Url);
        let doc_link = FieldValue::Text("https://x.example/8d".into());
        assert!(validate_field(&url, Some(&doc_link)).is_ok());
        assert!(validate_field(&url, Some(&FieldValue::Text("ftp://x".into()))).is_err());
    }

    #[test]
    fn required_and_unknown_fields_are_reported() {
        let mut required = def("found", FieldKind::Date);
        required.required = true;
        let mut values = BTreeMap::new();
        values.insert("stray".to_string(), FieldValue::Bool(true));
        let errors = validate_custom_fields(&[required], &values);
        assert_eq!(
            errors,
            vec![
                FieldError::Required {
                    key: "found".into()
                },
                FieldError::UnknownField {
                    key: "stray".into()
                },
            ]
        );
    }

    #[test]
    fn render_hints_follow_kind() {
        let hint = FieldKind::MultiSelect {
            options: vec!["A".into()],
        }
        .render_hint();
        assert_eq!(hint.input, "select");
        assert!(hint.multiple);
        assert_eq!(FieldKind::Boolean.render_hint().input, "checkbox");
        assert_eq!(FieldKind::Date.render_hint().placeholder, Some("YYYY-MM-DD"));
    }
}
