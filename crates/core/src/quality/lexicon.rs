#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// A lexicon phrase and its fixed rewrite. Entries without a replacement
/// still flag, and fall back to the template suggestion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub phrase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

impl Replacement {
    fn new(phrase: &str, replacement: Option<&str>) -> Self {
        Self {
            phrase: phrase.to_string(),
            replacement: replacement.map(str::to_string),
        }
    }
}

/// Word lists behind the quality heuristics. Loaded from the engine config;
/// any list left out keeps its built-in value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lexicons {
    pub blame: Vec<Replacement>,
    pub vague: Vec<Replacement>,
    pub stopwords: Vec<String>,
    /// Units, comparisons and standards that make a statement checkable.
    pub testability_markers: Vec<String>,
    pub broad_phrases: Vec<String>,
    pub vague_verbs: Vec<String>,
    pub method_markers: Vec<String>,
    pub hypothesis_markers: Vec<String>,
    pub criteria_markers: Vec<String>,
    pub evidence_markers: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for Lexicons {
    fn default() -> Self {
        Self {
            blame: vec![
                Replacement::new("operator error", Some("procedure step not error-proofed")),
                Replacement::new("human error", Some("task design allows the wrong action")),
                Replacement::new("operator mistake", Some("procedure step not error-proofed")),
                Replacement::new("careless", Some("unverified")),
                Replacement::new("negligence", Some("missing process control")),
                Replacement::new("negligent", Some("uncontrolled")),
                Replacement::new("lazy", Some("unchecked")),
                Replacement::new("failed to follow", Some("did not apply")),
                Replacement::new("did not follow", Some("did not apply")),
                Replacement::new("worker fault", Some("process gap")),
                Replacement::new("blame", None),
            ],
            vague: vec![
                Replacement::new("poor", Some("below-specification")),
                Replacement::new("bad", Some("out-of-tolerance")),
                Replacement::new("improper", Some("non-conforming")),
                Replacement::new("inadequate", Some("below-requirement")),
                Replacement::new("insufficient", Some("below-specified")),
                Replacement::new("not good", Some("out of specification")),
                Replacement::new("wrong", Some("non-conforming")),
                Replacement::new("somehow", None),
                Replacement::new("various", None),
                Replacement::new("etc", None),
                Replacement::new("some kind of", None),
            ],
            stopwords: words(&[
                "the", "and", "for", "with", "due", "from", "that", "this", "was", "were", "are",
                "not", "has", "have", "had", "into", "onto", "over", "under", "its", "been",
                "being", "too", "very", "failure", "failed", "fails", "fault", "problem",
            ]),
            testability_markers: words(&[
                "mm", "cm", "µm", "um", "nm", "psi", "bar", "kpa", "mpa", "rpm", "hz", "°c", "°f",
                "kg", "ppm", "%", "hours", "cycles", "more than", "less than", "greater than",
                "exceeds", "exceeded", "below", "above", "outside", "within", "beyond",
                "tolerance", "limit", "specification", "spec", "iso", "astm", "din", "sae",
                "per drawing", "<", ">", "=", "±",
            ]),
            broad_phrases: words(&[
                "everything",
                "all aspects",
                "look into the problem",
                "look into it",
                "investigate the issue",
                "investigate the problem",
                "check all",
                "review everything",
                "find the root cause",
                "find out why",
            ]),
            vague_verbs: words(&[
                "check", "look at", "look into", "review", "investigate", "examine", "inspect",
            ]),
            method_markers: words(&[
                "using",
                "with a",
                "by measuring",
                "by testing",
                "measure",
                "gauge",
                "caliper",
                "micrometer",
                "analysis",
                "ultrasonic",
                "x-ray",
                "teardown",
                "thermography",
                "torque wrench",
                "spectrometer",
                "borescope",
            ]),
            hypothesis_markers: words(&[
                "whether",
                "if",
                "because",
                "due to",
                "caused by",
                "confirm",
                "hypothesis",
                "suspect",
                "to determine",
                "expected",
            ]),
            criteria_markers: words(&[
                "within",
                "less than",
                "more than",
                "greater than",
                "pass",
                "fail",
                "limit",
                "tolerance",
                "spec",
                "max",
                "min",
                "±",
                "<",
                ">",
            ]),
            evidence_markers: words(&[
                "photo",
                "image",
                "measurement",
                "record",
                "log",
                "report",
                "data",
                "sample",
                "certificate",
                "chart",
                "video",
                "printout",
                "test result",
            ]),
        }
    }
}
