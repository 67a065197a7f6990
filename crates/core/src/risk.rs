#![forbid(unsafe_code)]

//! Severity/Occurrence/Detection scoring and Action-Priority resolution.
//!
//! Rules are evaluated strictly in list order: the first rule whose bounds
//! all hold wins, regardless of how specific a later rule is. A rule flagged
//! `default` is only consulted when nothing else matched.

use serde::{Deserialize, Serialize};

pub const SCORE_MIN: u8 = 1;
pub const SCORE_MAX: u8 = 10;
pub const RPN_MAX: u32 = 1000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RiskScore {
    #[serde(default)]
    pub severity: Option<u8>,
    #[serde(default)]
    pub occurrence: Option<u8>,
    #[serde(default)]
    pub detection: Option<u8>,
}

impl RiskScore {
    pub fn new(severity: u8, occurrence: u8, detection: u8) -> Result<Self, RiskError> {
        let score = Self {
            severity: Some(severity),
            occurrence: Some(occurrence),
            detection: Some(detection),
        };
        score.validate()?;
        Ok(score)
    }

    pub fn is_scored(&self) -> bool {
        self.severity.is_some() && self.occurrence.is_some() && self.detection.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.severity.is_none() && self.occurrence.is_none() && self.detection.is_none()
    }

    pub fn rpn(&self) -> Option<u32> {
        compute_rpn(self.severity, self.occurrence, self.detection)
    }

    pub fn validate(&self) -> Result<(), RiskError> {
        for (field, value) in [
            ("severity", self.severity),
            ("occurrence", self.occurrence),
            ("detection", self.detection),
        ] {
            if let Some(value) = value
                && !(SCORE_MIN..=SCORE_MAX).contains(&value)
            {
                return Err(RiskError::OutOfRange { field, value });
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RiskError {
    OutOfRange { field: &'static str, value: u8 },
}

impl std::fmt::Display for RiskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { field, value } => {
                write!(f, "{field} must be within {SCORE_MIN}..={SCORE_MAX} (got {value})")
            }
        }
    }
}

impl std::error::Error for RiskError {}

/// `None` unless all three factors are present.
pub fn compute_rpn(
    severity: Option<u8>,
    occurrence: Option<u8>,
    detection: Option<u8>,
) -> Option<u32> {
    let (s, o, d) = (severity?, occurrence?, detection?);
    Some(u32::from(s) * u32::from(o) * u32::from(d))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bound {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

impl Bound {
    pub fn at_least(min: u32) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn at_most(max: u32) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub fn between(min: u32, max: u32) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn contains(&self, value: u32) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Bound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrence: Option<Bound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection: Option<Bound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpn: Option<Bound>,
}

impl ApCondition {
    pub fn matches(&self, severity: u8, occurrence: u8, detection: u8) -> bool {
        let factor = |bound: &Option<Bound>, value: u8| {
            bound.as_ref().is_none_or(|b| b.contains(u32::from(value)))
        };
        if !factor(&self.severity, severity)
            || !factor(&self.occurrence, occurrence)
            || !factor(&self.detection, detection)
        {
            return false;
        }
        match &self.rpn {
            Some(bound) => {
                let rpn = u32::from(severity) * u32::from(occurrence) * u32::from(detection);
                bound.contains(rpn)
            }
            None => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApResult {
    pub category: String,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub color: String,
}

impl ApResult {
    pub fn new(category: impl Into<String>, priority: u32, color: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            priority,
            color: color.into(),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// One entry of the ordered AP mapping. Wire shape is either
/// `{condition, result}` or `{default: true, result}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ApCondition>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub default: bool,
    pub result: ApResult,
}

impl ApRule {
    pub fn when(condition: ApCondition, result: ApResult) -> Self {
        Self {
            condition: Some(condition),
            default: false,
            result,
        }
    }

    pub fn fallback(result: ApResult) -> Self {
        Self {
            condition: None,
            default: true,
            result,
        }
    }
}

/// Resolves the AP category for a scored cause. Unscored input (any factor
/// unset) is undetermined and yields `None`, as does a rule list with no
/// match and no default.
pub fn resolve_ap_category<'a>(rules: &'a [ApRule], score: &RiskScore) -> Option<&'a ApResult> {
    let (s, o, d) = (score.severity?, score.occurrence?, score.detection?);
    rules
        .iter()
        .filter(|rule| !rule.default)
        .find(|rule| rule.condition.as_ref().is_none_or(|c| c.matches(s, o, d)))
        .or_else(|| rules.iter().find(|rule| rule.default))
        .map(|rule| &rule.result)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleError {
    pub index: usize,
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for RuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rule[{}] {}: {}", self.index, self.code, self.message)
    }
}

impl std::error::Error for RuleError {}

pub fn validate_rules(rules: &[ApRule]) -> Vec<RuleError> {
    let mut errors = Vec::new();
    let mut seen_default = false;
    for (index, rule) in rules.iter().enumerate() {
        if rule.result.category.trim().is_empty() {
            errors.push(RuleError {
                index,
                code: "EMPTY_CATEGORY",
                message: "result.category must not be empty".to_string(),
            });
        }
        if rule.default {
            if seen_default {
                errors.push(RuleError {
                    index,
                    code: "MULTIPLE_DEFAULTS",
                    message: "only one default rule is allowed".to_string(),
                });
            }
            seen_default = true;
            if rule.condition.is_some() {
                errors.push(RuleError {
                    index,
                    code: "DEFAULT_WITH_CONDITION",
                    message: "default rule condition is never evaluated".to_string(),
                });
            }
            continue;
        }
        let Some(condition) = &rule.condition else {
            continue;
        };
        let score_max = u32::from(SCORE_MAX);
        for (field, bound, limit) in [
            ("severity", condition.severity, score_max),
            ("occurrence", condition.occurrence, score_max),
            ("detection", condition.detection, score_max),
            ("rpn", condition.rpn, RPN_MAX),
        ] {
            let Some(bound) = bound else {
                continue;
            };
            if let (Some(min), Some(max)) = (bound.min, bound.max)
                && min > max
            {
                errors.push(RuleError {
                    index,
                    code: "BOUND_INVERTED",
                    message: format!("{field}.min ({min}) is greater than {field}.max ({max})"),
                });
            }
            for value in [bound.min, bound.max].into_iter().flatten() {
                if value < 1 || value > limit {
                    errors.push(RuleError {
                        index,
                        code: "BOUND_OUT_OF_RANGE",
                        message: format!("{field} bound {value} is outside 1..={limit}"),
                    });
                }
            }
        }
    }
    errors
}

/// Built-in mapping used when no configuration overrides it.
pub fn default_ap_rules() -> Vec<ApRule> {
    vec![
        ApRule::when(
            ApCondition {
                severity: Some(Bound::at_least(9)),
                occurrence: Some(Bound::at_least(4)),
                ..ApCondition::default()
            },
            ApResult::new("Critical", 1, "#d32f2f"),
        ),
        ApRule::when(
            ApCondition {
                rpn: Some(Bound::at_least(200)),
                ..ApCondition::default()
            },
            ApResult::new("High", 2, "#f57c00"),
        ),
        ApRule::when(
            ApCondition {
                rpn: Some(Bound::at_least(80)),
                ..ApCondition::default()
            },
            ApResult::new("Medium", 3, "#fbc02d"),
        ),
        ApRule::fallback(ApResult::new("Low", 4, "#388e3c")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(s: u8, o: u8, d: u8) -> RiskScore {
        RiskScore::new(s, o, d).expect("valid score")
    }

    #[test]
    fn rpn_requires_all_three_factors() {
        assert_eq!(compute_rpn(Some(7), Some(6), Some(4)), Some(168));
        assert_eq!(compute_rpn(Some(7), None, Some(4)), None);
        assert_eq!(compute_rpn(None, None, None), None);
        assert_eq!(scored(10, 10, 10).rpn(), Some(1000));
        assert_eq!(scored(1, 1, 1).rpn(), Some(1));
    }

    #[test]
    fn score_range_is_enforced() {
        assert_eq!(
            RiskScore::new(0, 5, 5).unwrap_err(),
            RiskError::OutOfRange {
                field: "severity",
                value: 0
            }
        );
        assert_eq!(
            RiskScore::new(5, 5, 11).unwrap_err(),
            RiskError::OutOfRange {
                field: "detection",
                value: 11
            }
        );
        let partial = RiskScore {
            severity: Some(3),
            ..RiskScore::default()
        };
        assert!(partial.validate().is_ok());
        assert!(!partial.is_scored());
        assert!(!partial.is_empty());
    }

    #[test]
    fn order_decides_not_specificity() {
        let rules = vec![
            ApRule::when(
                ApCondition {
                    severity: Some(Bound::at_least(9)),
                    ..ApCondition::default()
                },
                ApResult::new("Critical", 1, "red"),
            ),
            ApRule::fallback(ApResult::new("Low", 4, "green")),
        ];
        assert_eq!(
            resolve_ap_category(&rules, &scored(9, 1, 1)).map(|r| r.category.as_str()),
            Some("Critical")
        );
        // rpn=500, but no rpn rule exists: falls to default.
        assert_eq!(
            resolve_ap_category(&rules, &scored(5, 10, 10)).map(|r| r.category.as_str()),
            Some("Low")
        );
    }

    #[test]
    fn first_match_wins_when_several_hold() {
        let rules = vec![
            ApRule::when(
                ApCondition {
                    rpn: Some(Bound::at_least(100)),
                    ..ApCondition::default()
                },
                ApResult::new("R1", 2, ""),
            ),
            ApRule::when(
                ApCondition {
                    severity: Some(Bound::between(8, 10)),
                    rpn: Some(Bound::at_least(100)),
                    ..ApCondition::default()
                },
                ApResult::new("R2", 1, ""),
            ),
        ];
        assert_eq!(
            resolve_ap_category(&rules, &scored(9, 5, 5)).map(|r| r.category.as_str()),
            Some("R1")
        );
    }

    #[test]
    fn default_position_in_list_does_not_shadow_later_rules() {
        let rules = vec![
            ApRule::fallback(ApResult::new("Low", 4, "")),
            ApRule::when(
                ApCondition {
                    detection: Some(Bound::at_most(2)),
                    ..ApCondition::default()
                },
                ApResult::new("Watch", 3, ""),
            ),
        ];
        assert_eq!(
            resolve_ap_category(&rules, &scored(3, 3, 2)).map(|r| r.category.as_str()),
            Some("Watch")
        );
        assert_eq!(
            resolve_ap_category(&rules, &scored(3, 3, 5)).map(|r| r.category.as_str()),
            Some("Low")
        );
    }

    #[test]
    fn no_match_without_default_is_undetermined() {
        let rules = vec![ApRule::when(
            ApCondition {
                severity: Some(Bound::at_least(9)),
                ..ApCondition::default()
            },
            ApResult::new("Critical", 1, ""),
        )];
        assert_eq!(resolve_ap_category(&rules, &scored(2, 2, 2)), None);
        assert_eq!(resolve_ap_category(&rules, &RiskScore::default()), None);
    }

    #[test]
    fn unscored_cause_is_undetermined_even_with_default() {
        let rules = default_ap_rules();
        let partial = RiskScore {
            severity: Some(10),
            occurrence: Some(10),
            detection: None,
        };
        assert_eq!(resolve_ap_category(&rules, &partial), None);
    }

    #[test]
    fn rule_wire_shape_round_trips_from_json() {
        let rules: Vec<ApRule> = serde_json::from_value(serde_json::json!([
            {"condition": {"severity": {"min": 9}}, "result": {"category": "Critical", "priority": 1, "color": "#f00"}},
            {"condition": {"rpn": {"min": 100, "max": 1000}}, "result": {"category": "High", "priority": 2, "color": "#fa0"}},
            {"default": true, "result": {"category": "Low", "priority": 4, "color": "#0a0"}}
        ]))
        .unwrap();
        assert_eq!(rules.len(), 3);
        assert!(rules[2].default);
        assert_eq!(rules[0].condition.unwrap().severity, Some(Bound::at_least(9)));
        assert_eq!(
            resolve_ap_category(&rules, &scored(5, 5, 5)).map(|r| r.category.as_str()),
            Some("High")
        );
    }

    #[test]
    fn validate_rules_reports_structural_problems() {
        let rules = vec![
            ApRule::when(
                ApCondition {
                    severity: Some(Bound::between(8, 3)),
                    rpn: Some(Bound::at_least(2000)),
                    ..ApCondition::default()
                },
                ApResult::new("", 1, ""),
            ),
            ApRule::fallback(ApResult::new("Low", 4, "")),
            ApRule::fallback(ApResult::new("Lower", 5, "")),
        ];
        let codes: Vec<_> = validate_rules(&rules).into_iter().map(|e| (e.index, e.code)).collect();
        assert_eq!(
            codes,
            vec![
                (0, "EMPTY_CATEGORY"),
                (0, "BOUND_INVERTED"),
                (0, "BOUND_OUT_OF_RANGE"),
                (2, "MULTIPLE_DEFAULTS"),
            ]
        );
        assert!(validate_rules(&default_ap_rules()).is_empty());
    }
}
