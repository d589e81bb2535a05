//! Data models for research findings.

use serde::{Deserialize, Serialize};

/// A stored research finding, as persisted in the findings database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    pub id: String,
    pub url: String,
    pub source_type: String,
    pub claim: String,
    pub evidence: String,
    pub confidence: f64,
    pub tags: Vec<String>,
    pub workstream: Option<String>,
    pub retrieved_at: String,
}

/// A finding about to be inserted. The store assigns the id and the
/// retrieval timestamp.
#[derive(Debug, Clone, Default)]
pub struct NewFinding {
    pub url: String,
    pub source_type: String,
    pub claim: String,
    pub evidence: String,
    pub confidence: f64,
    pub tags: Vec<String>,
    pub workstream: Option<String>,
}

/// A partial update to an existing finding. `None` fields are left as-is.
#[derive(Debug, Clone, Default)]
pub struct FindingUpdate {
    pub url: Option<String>,
    pub source_type: Option<String>,
    pub claim: Option<String>,
    pub evidence: Option<String>,
    pub confidence: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub workstream: Option<String>,
}

/// A finding matched by a full-text query, with its bm25 rank.
/// Lower (more negative) ranks are better matches.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub finding: Finding,
    pub rank: f64,
}

/// Clamp a confidence score into `[0.0, 1.0]`, treating NaN as zero.
pub(crate) fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
