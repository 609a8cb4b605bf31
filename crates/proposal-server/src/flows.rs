/// Completion-backed flows: drafting a proposal section and reviewing a vendor proposal.
///
/// Retrieval, scoring and gap analysis are deterministic and live in `proposal-core`;
/// these flows only assemble prompts around them and sanitize whatever the completion
/// provider returns.
use std::fmt::Write as _;
use std::sync::Arc;

use proposal_common::llm::CompletionProvider;
use proposal_core::expand::expand;
use proposal_core::gaps::identify_gaps_and_risks;
use proposal_core::model::{GapReport, ScoreResult, SearchHit};
use proposal_core::sanitize::sanitize;
use proposal_core::scoring::{format_metric_label, parse_and_score, ScoringConfiguration};
use proposal_core::store::KnowledgeBase;
use tracing::info;

use crate::error::AppError;

/// Sections retrieved to ground a draft.
const DRAFT_SOURCES: usize = 3;
/// Similarity above which a source is presented as highly relevant.
const STRONG_MATCH: f32 = 0.7;

pub struct Draft {
    pub content: String,
    pub sources: Vec<SearchHit>,
}

/// Draft `section_name` from the most relevant past proposal sections.
///
/// The query is the section name plus the RFP section text, expanded with domain
/// synonyms, run through multi-hop retrieval. Retrieved sections are condensed by one
/// completion call and the draft is written by a second.
pub async fn draft_section(
    knowledge_base: Arc<KnowledgeBase>,
    llm: &dyn CompletionProvider,
    section_name: &str,
    rfp_section_text: Option<&str>,
    client_name: Option<&str>,
) -> Result<Draft, AppError> {
    let section_name = sanitize(section_name);
    let rfp_section_text = rfp_section_text.map(sanitize).unwrap_or_default();
    let client_name = client_name.map(sanitize).unwrap_or_default();

    let query = expand(&format!("{section_name} {rfp_section_text}"));
    let sources = tokio::task::spawn_blocking(move || {
        let snapshot = knowledge_base.snapshot();
        knowledge_base
            .retriever(&snapshot)
            .multi_hop_search(&query, DRAFT_SOURCES)
    })
    .await
    .map_err(|e| AppError::Join(e.to_string()))??;

    let precedent = if sources.is_empty() {
        String::new()
    } else {
        sanitize(&llm.complete(&summary_prompt(&sources)).await?)
    };

    let content = sanitize(
        &llm.complete(&draft_prompt(&section_name, &rfp_section_text, &client_name, &precedent))
            .await?,
    );
    info!(section = %section_name, sources = sources.len(), chars = content.len(), "section drafted");

    Ok(Draft { content, sources })
}

fn summary_prompt(sources: &[SearchHit]) -> String {
    let mut prompt = String::from(
        "Condense the following past proposal excerpts into 5-7 actionable bullet points.\n",
    );
    for hit in sources {
        let relevance = if hit.score > STRONG_MATCH { "Very relevant" } else { "Relevant" };
        let _ = write!(
            prompt,
            "\n--- {relevance} past proposal ---\nFrom: {} | Section: {}\n{}\n",
            hit.document.filename, hit.document.section_name, hit.document.content
        );
    }
    prompt
}

fn draft_prompt(section_name: &str, rfp_section_text: &str, client_name: &str, precedent: &str) -> String {
    let mut prompt = format!("# Draft the proposal section: {section_name}\n");
    if !client_name.is_empty() {
        let _ = writeln!(prompt, "Client: {client_name}. Refer to the client by name.");
    }
    if !rfp_section_text.is_empty() {
        let _ = write!(prompt, "\n## RFP requirements to address\n{rfp_section_text}\n");
    }
    if !precedent.is_empty() {
        let _ = write!(prompt, "\n## Lessons from past proposals\n{precedent}\n");
    }
    prompt
}

pub struct VendorReview {
    pub analysis: String,
    pub score: ScoreResult,
    pub gaps: GapReport,
}

/// Ask for a per-metric analysis of a vendor proposal, then score it and compare it
/// against the requirements.
pub async fn review_vendor_proposal(
    llm: &dyn CompletionProvider,
    scoring: &ScoringConfiguration,
    vendor_proposal_text: &str,
    requirements_text: &str,
    client_name: Option<&str>,
) -> Result<VendorReview, AppError> {
    let vendor = sanitize(vendor_proposal_text);
    let requirements = sanitize(requirements_text);
    let client_name = client_name.map(sanitize).unwrap_or_default();

    let prompt = review_prompt(scoring, &vendor, &requirements, &client_name);
    let analysis = sanitize(&llm.complete(&prompt).await?);

    let score = parse_and_score(&analysis, scoring);
    let gaps = identify_gaps_and_risks(&vendor, &requirements);
    info!(
        weighted_score = score.weighted_score,
        grade = ?score.grade,
        gaps = gaps.gaps.len(),
        risks = gaps.risks.len(),
        "vendor proposal reviewed"
    );

    Ok(VendorReview { analysis, score, gaps })
}

fn review_prompt(
    scoring: &ScoringConfiguration,
    vendor: &str,
    requirements: &str,
    client_name: &str,
) -> String {
    let mut prompt = String::from(
        "# Vendor proposal evaluation\n\
         Score the vendor proposal against the requirements on each metric below, out of 100.\n\
         State every score on its own line as \"<Metric> Score: <score>/100\", or \"N/A\" when\n\
         the proposal gives no evidence, and support each score with quotes from both texts.\n\n\
         ## Metrics\n",
    );
    for metric in scoring.weighting.keys() {
        let _ = writeln!(prompt, "- {}", format_metric_label(metric));
    }
    if !client_name.is_empty() {
        let _ = writeln!(prompt, "\nClient: {client_name}");
    }
    let _ = write!(
        prompt,
        "\n## Requirements\n{requirements}\n\n## Vendor proposal\n{vendor}\n"
    );
    prompt
}
