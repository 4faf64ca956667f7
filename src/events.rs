use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Analysis,
    Composition,
    Narration,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Analysis => "analysis",
            Stage::Composition => "composition",
            Stage::Narration => "narration",
        };
        f.write_str(name)
    }
}

/// Whether a stage's output came from the remote service or a local fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Remote,
    Fallback,
}

/// A stage result together with where it came from.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub provenance: Provenance,
}

impl<T> Outcome<T> {
    pub fn remote(value: T) -> Self {
        Self {
            value,
            provenance: Provenance::Remote,
        }
    }

    pub fn fallback(value: T) -> Self {
        Self {
            value,
            provenance: Provenance::Fallback,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEvent {
    pub stage: Stage,
    pub provenance: Provenance,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl StageEvent {
    pub fn new(stage: Stage, provenance: Provenance, detail: impl Into<String>) -> Self {
        Self {
            stage,
            provenance,
            detail: detail.into(),
            at: Utc::now(),
        }
    }
}
