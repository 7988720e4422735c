use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ValidationError;

pub const ALL_STATES: &str = "all";

const STATES_KEY: &str = "applicable_states";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Guideline,
    Regulation,
    Assessment,
    Policy,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guideline => "guideline",
            Self::Regulation => "regulation",
            Self::Assessment => "assessment",
            Self::Policy => "policy",
        }
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "guideline" => Ok(Self::Guideline),
            "regulation" => Ok(Self::Regulation),
            "assessment" => Ok(Self::Assessment),
            "policy" => Ok(Self::Policy),
            other => Err(ValidationError::new(
                "doc_type",
                format!("`{other}` must be one of guideline|regulation|assessment|policy"),
            )),
        }
    }
}

/// Underwriting reference material kept in the document store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub title: String,
    pub content: String,
    pub doc_type: DocType,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub applicable_states: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl Document {
    pub fn applies_to_state(&self, state: &str) -> bool {
        self.applicable_states.iter().any(|candidate| {
            candidate.eq_ignore_ascii_case(ALL_STATES) || candidate.eq_ignore_ascii_case(state)
        })
    }

    /// Flattened textual form of the metadata used by metadata search.
    pub fn metadata_text(&self) -> String {
        Value::Object(self.metadata.clone()).to_string()
    }

    pub fn business_type(&self) -> Option<&str> {
        self.metadata.get("business_type").and_then(Value::as_str)
    }

    /// Makes `metadata.applicable_states` the source of the top-level list.
    ///
    /// A document carrying only a top-level list (other than `["all"]`) has it
    /// copied into metadata first.
    pub fn reconcile_states(&mut self) {
        let listed = self.metadata.contains_key(STATES_KEY);
        let explicit = !self.applicable_states.is_empty() && self.applicable_states != all_states();
        if !listed && explicit {
            let states = Value::from(self.applicable_states.clone());
            self.metadata.insert(STATES_KEY.to_string(), states);
        }
        self.applicable_states = applicable_states_from(&self.metadata);
    }

    /// Replaces the applicable states in both metadata and the top-level list.
    pub fn set_applicable_states(&mut self, states: Value) {
        self.metadata.insert(STATES_KEY.to_string(), states);
        self.applicable_states = applicable_states_from(&self.metadata);
        let normalized = Value::from(self.applicable_states.clone());
        self.metadata.insert(STATES_KEY.to_string(), normalized);
    }
}

/// Reads `applicable_states` from document metadata, defaulting to `["all"]`.
///
/// Accepts either a list of codes or a single string.
pub fn applicable_states_from(metadata: &Map<String, Value>) -> Vec<String> {
    let states: Vec<String> = match metadata.get(STATES_KEY) {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_str)
            .map(normalize_state_entry)
            .filter(|state| !state.is_empty())
            .collect(),
        Some(Value::String(value)) => vec![normalize_state_entry(value)],
        _ => Vec::new(),
    };

    if states.is_empty() {
        all_states()
    } else {
        states
    }
}

fn normalize_state_entry(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case(ALL_STATES) {
        ALL_STATES.to_string()
    } else {
        trimmed.to_ascii_uppercase()
    }
}

fn all_states() -> Vec<String> {
    vec![ALL_STATES.to_string()]
}
