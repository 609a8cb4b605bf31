use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// --- Knowledge base ---

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LoadKnowledgeBaseParams {
    /// Directory of .md/.txt proposal files. Defaults to the currently loaded directory,
    /// or the configured knowledge base before the first load.
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoadKnowledgeBaseResponse {
    pub directory: String,
    pub document_count: usize,
    pub section_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DocumentMetadata {
    pub client_industry: String,
    pub proposal_success: bool,
    pub project_size: String,
    pub key_differentiators: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct KnowledgeDocument {
    pub id: usize,
    pub filename: String,
    pub section_name: String,
    pub content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SectionDocumentsParams {
    /// Section heading as it appears in the knowledge base, e.g. "Pricing".
    pub section_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SectionDocumentsResponse {
    pub section_name: String,
    pub documents: Vec<KnowledgeDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SectionNamesResponse {
    pub section_names: Vec<String>,
}

// --- Retrieval ---

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Free-text query, e.g. a proposal section name plus RFP context.
    pub query: String,
    /// Maximum number of results (default: 5, max: 50).
    pub k: Option<u32>,
    /// Append domain synonyms to the query before searching (default: false).
    pub expand: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchHit {
    /// Raw merge score. Dense hits carry an L2 distance, sparse hits a cosine similarity.
    pub score: f32,
    pub document: KnowledgeDocument,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
}

// --- Scoring ---

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ScoreAnalysisParams {
    /// Free-text vendor analysis containing lines such as "Compliance Score: 80/100".
    pub analysis_text: String,
    /// Metric weights. Defaults to the configured scoring system.
    pub weighting: Option<BTreeMap<String, f64>>,
    /// Grade label to [lower, upper] bounds. Defaults to the configured scoring system.
    pub grading_scale: Option<BTreeMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScoreResponse {
    pub weighted_score: f64,
    pub individual_scores: BTreeMap<String, Option<u32>>,
    /// `None` when the score falls outside every grading range.
    pub grade: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GapsRisksParams {
    pub candidate_text: String,
    pub requirements_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GapsRisksResponse {
    pub similarity: Option<f64>,
    pub gaps: Vec<String>,
    pub risks: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SummarizeScoresParams {
    /// Vendor analyses, each expected to contain a "Match Score: NN" line.
    pub analyses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MatchScoreSummary {
    pub scores: Vec<u32>,
    pub average: f64,
    pub max: u32,
    pub min: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SummarizeScoresResponse {
    pub summary: Option<MatchScoreSummary>,
}

// --- Pricing ---

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExtractPricingParams {
    /// Directory to scan. Defaults to the configured knowledge base.
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PricingResponse {
    pub prices: Vec<u64>,
}

// --- RFP analysis ---

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NamedSection {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SplitRfpParams {
    pub rfp_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RfpSectionsResponse {
    pub sections: Vec<NamedSection>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RfpAnalysisParams {
    /// LLM analysis of an RFP using headings such as KEY REQUIREMENTS and DELIVERABLES.
    pub analysis_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WeightedCriterion {
    pub criterion: String,
    pub weight: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RfpAnalysisResponse {
    pub mandatory_criteria: Vec<String>,
    pub weighted_criteria: Vec<WeightedCriterion>,
    pub deadlines: Vec<String>,
    pub deliverables: Vec<String>,
    pub required_sections: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ClientSpecificityParams {
    pub client_name: String,
    pub sections: Vec<NamedSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientSpecificityResponse {
    pub issues: Vec<String>,
}

// --- LLM-backed flows ---

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DraftSectionParams {
    /// Proposal section to draft, e.g. "Implementation Approach".
    pub section_name: String,
    /// Matching RFP section text, used to focus retrieval.
    pub rfp_section_text: Option<String>,
    pub client_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DraftSectionResponse {
    pub section_name: String,
    pub content: String,
    pub sources: Vec<SearchHit>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReviewVendorParams {
    pub vendor_proposal_text: String,
    pub requirements_text: String,
    pub client_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VendorReviewResponse {
    pub analysis: String,
    pub score: ScoreResponse,
    pub gaps: Vec<String>,
    pub risks: Vec<String>,
}
