use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Tags parsed from a knowledge-base file name (`acme_success_True_industry_banking_size_large.md`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub client_industry: String,
    pub proposal_success: bool,
    pub project_size: String,
    pub key_differentiators: Vec<String>,
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            client_industry: "general".to_string(),
            proposal_success: true,
            project_size: "medium".to_string(),
            key_differentiators: vec!["quality".to_string(), "experience".to_string()],
        }
    }
}

/// One header-delimited section of a knowledge-base file.
///
/// All string fields are sanitized. `id` is the position in the loaded document
/// sequence and doubles as the row of its vectors in the embedding index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: usize,
    pub filename: String,
    pub section_name: String,
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// Section name to the ids of every document carrying that name, in load order.
pub type SectionIndex = HashMap<String, Vec<usize>>;

/// A retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Dense hits carry their L2 distance, sparse hits their cosine similarity.
    pub score: f32,
    pub document: KnowledgeDocument,
}

/// Outcome of scoring one analysis text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Normalized composite in `[0, 100]`.
    pub weighted_score: f64,
    /// `None` when the metric was missing from the text or reported as N/A.
    pub individual_scores: BTreeMap<String, Option<u32>>,
    /// `None` when no grading range contains the score.
    pub grade: Option<String>,
}

/// Gaps and risks found when comparing a proposal against requirements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapReport {
    /// Cosine similarity of the two texts; `None` when neither text had any terms.
    pub similarity: Option<f64>,
    pub gaps: Vec<String>,
    pub risks: Vec<String>,
}
