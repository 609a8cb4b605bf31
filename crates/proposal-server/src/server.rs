/// MCP server for the RFP proposal assistant.
///
/// Knowledge base:
/// - `load_knowledge_base`: (re)load past proposals from a directory
/// - `hybrid_search` / `multi_hop_search`: hybrid and two-pass retrieval
/// - `get_section_documents` / `list_sections`: browse by section heading
/// - `extract_pricing`: prices from past commercial proposals
///
/// Analysis:
/// - `parse_and_score`, `identify_gaps_and_risks`, `summarize_match_scores`
/// - `split_rfp_sections`, `analyze_rfp_structure`, `validate_client_specificity`
///
/// Completion-backed:
/// - `draft_section`, `review_vendor_proposal`
use std::path::PathBuf;
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use tracing::info;

use crate::cache::{SearchCache, SearchMode};
use crate::config::Config;
use crate::flows;
use proposal_common::llm::CompletionProvider;
use proposal_common::mcp_api::{
    ClientSpecificityParams, ClientSpecificityResponse, DocumentMetadata as ApiMetadata,
    DraftSectionParams, DraftSectionResponse, ExtractPricingParams, GapsRisksParams,
    GapsRisksResponse, KnowledgeDocument as ApiDocument, LoadKnowledgeBaseParams,
    LoadKnowledgeBaseResponse, MatchScoreSummary as ApiMatchScoreSummary, NamedSection,
    PricingResponse, ReviewVendorParams, RfpAnalysisParams, RfpAnalysisResponse,
    RfpSectionsResponse, ScoreAnalysisParams, ScoreResponse, SearchHit as ApiSearchHit,
    SearchParams, SearchResponse, SectionDocumentsParams, SectionDocumentsResponse,
    SectionNamesResponse, SplitRfpParams, SummarizeScoresParams, SummarizeScoresResponse,
    VendorReviewResponse, WeightedCriterion as ApiWeightedCriterion,
};
use proposal_core::analysis::{summarize_match_scores, validate_client_specificity, RfpAnalysis};
use proposal_core::expand::expand;
use proposal_core::gaps::identify_gaps_and_risks;
use proposal_core::model::{KnowledgeDocument, ScoreResult, SearchHit};
use proposal_core::pricing::extract_pricing;
use proposal_core::rfp::split_rfp_sections;
use proposal_core::scoring::{parse_and_score, ScoringConfiguration};
use proposal_core::store::KnowledgeBase;

const DEFAULT_K: u32 = 5;
const MAX_K: u32 = 50;

#[derive(Clone)]
pub struct ProposalServer {
    knowledge_base: Arc<KnowledgeBase>,
    llm: Arc<dyn CompletionProvider>,
    cache: Arc<SearchCache>,
    config: Arc<Config>,
    tool_router: ToolRouter<ProposalServer>,
}

impl ProposalServer {
    pub fn new(
        knowledge_base: Arc<KnowledgeBase>,
        llm: Arc<dyn CompletionProvider>,
        cache: Arc<SearchCache>,
        config: Config,
    ) -> Self {
        Self {
            knowledge_base,
            llm,
            cache,
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }

    async fn run_search(&self, params: SearchParams, mode: SearchMode) -> Result<Json<SearchResponse>, String> {
        let query = params.query.trim().to_string();
        if query.is_empty() {
            return Err("query must not be empty".to_string());
        }
        let k = params.k.unwrap_or(DEFAULT_K).min(MAX_K) as usize;
        let query = if params.expand.unwrap_or(false) {
            expand(&query)
        } else {
            query
        };

        // The cache key and the search must see the same load.
        let snapshot = self.knowledge_base.snapshot();
        if let Some(hits) = self.cache.get(&snapshot.fingerprint, mode, &query, k).await {
            return Ok(Json(search_response(query, hits)));
        }

        let knowledge_base = Arc::clone(&self.knowledge_base);
        let searched = Arc::clone(&snapshot);
        let q = query.clone();
        let hits = tokio::task::spawn_blocking(move || {
            let retriever = knowledge_base.retriever(&searched);
            match mode {
                SearchMode::Hybrid => retriever.hybrid_search(&q, k),
                SearchMode::MultiHop => retriever.multi_hop_search(&q, k),
            }
        })
        .await
        .map_err(|e| format!("search task failed: {e}"))?
        .map_err(|e| format!("search failed: {e}"))?;

        self.cache.set(&snapshot.fingerprint, mode, &query, k, &hits).await;
        Ok(Json(search_response(query, hits)))
    }

    fn scoring_for(&self, params: &ScoreAnalysisParams) -> Result<ScoringConfiguration, String> {
        let scoring = ScoringConfiguration {
            weighting: params
                .weighting
                .clone()
                .unwrap_or_else(|| self.config.scoring.weighting.clone()),
            grading_scale: params
                .grading_scale
                .clone()
                .unwrap_or_else(|| self.config.scoring.grading_scale.clone()),
        };
        scoring.validate().map_err(|e| e.to_string())?;
        Ok(scoring)
    }
}

#[tool_router]
impl ProposalServer {
    #[tool(description = "Load (or reload) the knowledge base of past proposals from a directory of .md/.txt files. Every '# ' or '## ' heading starts a new section. Replaces the previous knowledge base entirely. Without a directory, reloads the current one (or the configured default on first load).")]
    async fn load_knowledge_base(
        &self,
        Parameters(params): Parameters<LoadKnowledgeBaseParams>,
    ) -> Result<Json<LoadKnowledgeBaseResponse>, String> {
        let directory = params
            .directory
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .map(PathBuf::from);
        info!(directory = ?directory, "load_knowledge_base tool invoked");

        let knowledge_base = Arc::clone(&self.knowledge_base);
        let default_dir = self.config.knowledge_base_dir.clone();
        let summary = tokio::task::spawn_blocking(move || match directory {
            Some(dir) => knowledge_base.load(&dir),
            None => match knowledge_base.reload()? {
                Some(summary) => Ok(summary),
                None => knowledge_base.load(&default_dir),
            },
        })
        .await
        .map_err(|e| format!("load task failed: {e}"))?
        .map_err(|e| format!("load failed: {e}"))?;

        self.cache.invalidate_all().await;

        Ok(Json(LoadKnowledgeBaseResponse {
            directory: summary.directory.display().to_string(),
            document_count: summary.documents,
            section_count: summary.sections,
        }))
    }

    #[tool(description = "Hybrid search over the knowledge base: dense embedding nearest neighbours merged with TF-IDF matches. Returns at most k sections (default 5, max 50).")]
    async fn hybrid_search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<Json<SearchResponse>, String> {
        self.run_search(params, SearchMode::Hybrid).await
    }

    #[tool(description = "Two-pass search: the top hybrid results extend the query for a second pass. Better recall for short queries such as a proposal section name.")]
    async fn multi_hop_search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<Json<SearchResponse>, String> {
        self.run_search(params, SearchMode::MultiHop).await
    }

    #[tool(description = "Get every knowledge-base section with the given heading (e.g. 'Executive Summary'), across all loaded files.")]
    async fn get_section_documents(
        &self,
        Parameters(params): Parameters<SectionDocumentsParams>,
    ) -> Result<Json<SectionDocumentsResponse>, String> {
        let section_name = params.section_name.trim().to_string();
        if section_name.is_empty() {
            return Err("section_name must not be empty".to_string());
        }
        let documents = self
            .knowledge_base
            .section_documents(&section_name)
            .iter()
            .map(to_api_document)
            .collect();
        Ok(Json(SectionDocumentsResponse {
            section_name,
            documents,
        }))
    }

    #[tool(description = "List the distinct section headings in the loaded knowledge base.")]
    async fn list_sections(&self) -> Result<Json<SectionNamesResponse>, String> {
        Ok(Json(SectionNamesResponse {
            section_names: self.knowledge_base.section_names(),
        }))
    }

    #[tool(description = "Extract prices (Rs. amounts) from the COMMERCIAL PROPOSAL section of each .md file in a directory. Defaults to the knowledge base directory.")]
    async fn extract_pricing(
        &self,
        Parameters(params): Parameters<ExtractPricingParams>,
    ) -> Result<Json<PricingResponse>, String> {
        let directory = params
            .directory
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| self.config.knowledge_base_dir.clone());

        let prices = tokio::task::spawn_blocking(move || extract_pricing(&directory))
            .await
            .map_err(|e| format!("pricing task failed: {e}"))?
            .map_err(|e| format!("pricing extraction failed: {e}"))?;
        Ok(Json(PricingResponse { prices }))
    }

    #[tool(description = "Parse per-metric scores from a free-text vendor analysis ('Compliance Score: 80/100'), compute the weighted score and grade. Weights and grading scale default to the server's scoring configuration.")]
    async fn parse_and_score(
        &self,
        Parameters(params): Parameters<ScoreAnalysisParams>,
    ) -> Result<Json<ScoreResponse>, String> {
        let scoring = self.scoring_for(&params)?;
        let result = parse_and_score(&params.analysis_text, &scoring);
        Ok(Json(to_api_score(result)))
    }

    #[tool(description = "Compare a candidate proposal with requirements text: TF-IDF similarity, coverage gaps and risk phrases.")]
    async fn identify_gaps_and_risks(
        &self,
        Parameters(params): Parameters<GapsRisksParams>,
    ) -> Result<Json<GapsRisksResponse>, String> {
        let report = identify_gaps_and_risks(&params.candidate_text, &params.requirements_text);
        Ok(Json(GapsRisksResponse {
            similarity: report.similarity,
            gaps: report.gaps,
            risks: report.risks,
        }))
    }

    #[tool(description = "Summarize 'Match Score: NN' values across several vendor analyses (average, max, min).")]
    async fn summarize_match_scores(
        &self,
        Parameters(params): Parameters<SummarizeScoresParams>,
    ) -> Result<Json<SummarizeScoresResponse>, String> {
        let summary = summarize_match_scores(&params.analyses).map(|s| ApiMatchScoreSummary {
            scores: s.scores,
            average: s.average,
            max: s.max,
            min: s.min,
        });
        Ok(Json(SummarizeScoresResponse { summary }))
    }

    #[tool(description = "Split plain RFP text into titled sections using numbered, all-caps and 'Section N:' headings. Text before the first heading is 'Overview'.")]
    async fn split_rfp_sections(
        &self,
        Parameters(params): Parameters<SplitRfpParams>,
    ) -> Result<Json<RfpSectionsResponse>, String> {
        let sections = split_rfp_sections(&params.rfp_text)
            .into_iter()
            .map(|(name, content)| NamedSection { name, content })
            .collect();
        Ok(Json(RfpSectionsResponse { sections }))
    }

    #[tool(description = "Extract mandatory criteria, weighted evaluation criteria, deadlines, deliverables and required sections from an RFP analysis written with KEY REQUIREMENTS / DELIVERABLES / REQUIRED SECTIONS / TIMELINE / EVALUATION CRITERIA headings.")]
    async fn analyze_rfp_structure(
        &self,
        Parameters(params): Parameters<RfpAnalysisParams>,
    ) -> Result<Json<RfpAnalysisResponse>, String> {
        let analysis = RfpAnalysis::extract(&params.analysis_text);
        Ok(Json(RfpAnalysisResponse {
            mandatory_criteria: analysis.mandatory_criteria,
            weighted_criteria: analysis
                .weighted_criteria
                .into_iter()
                .map(|c| ApiWeightedCriterion {
                    criterion: c.criterion,
                    weight: c.weight,
                })
                .collect(),
            deadlines: analysis.deadlines,
            deliverables: analysis.deliverables,
            required_sections: analysis.required_sections,
        }))
    }

    #[tool(description = "Check drafted proposal sections for too few client-name mentions and for generic boilerplate phrases.")]
    async fn validate_client_specificity(
        &self,
        Parameters(params): Parameters<ClientSpecificityParams>,
    ) -> Result<Json<ClientSpecificityResponse>, String> {
        let sections: Vec<(String, String)> = params
            .sections
            .into_iter()
            .map(|s| (s.name, s.content))
            .collect();
        let issues = validate_client_specificity(&sections, &params.client_name);
        Ok(Json(ClientSpecificityResponse { issues }))
    }

    #[tool(description = "Draft a proposal section from the most relevant past proposals (multi-hop search, k=3) using the completion provider.")]
    async fn draft_section(
        &self,
        Parameters(params): Parameters<DraftSectionParams>,
    ) -> Result<Json<DraftSectionResponse>, String> {
        let section_name = params.section_name.trim().to_string();
        if section_name.is_empty() {
            return Err("section_name must not be empty".to_string());
        }

        let draft = flows::draft_section(
            Arc::clone(&self.knowledge_base),
            self.llm.as_ref(),
            &section_name,
            params.rfp_section_text.as_deref(),
            params.client_name.as_deref(),
        )
        .await
        .map_err(|e| format!("draft failed: {e}"))?;

        Ok(Json(DraftSectionResponse {
            section_name,
            content: draft.content,
            sources: draft.sources.iter().map(to_api_hit).collect(),
        }))
    }

    #[tool(description = "Review a vendor proposal against requirements: completion-provider analysis, weighted score and grade, gaps and risks.")]
    async fn review_vendor_proposal(
        &self,
        Parameters(params): Parameters<ReviewVendorParams>,
    ) -> Result<Json<VendorReviewResponse>, String> {
        if params.vendor_proposal_text.trim().is_empty() {
            return Err("vendor_proposal_text must not be empty".to_string());
        }

        let review = flows::review_vendor_proposal(
            self.llm.as_ref(),
            &self.config.scoring,
            &params.vendor_proposal_text,
            &params.requirements_text,
            params.client_name.as_deref(),
        )
        .await
        .map_err(|e| format!("review failed: {e}"))?;

        Ok(Json(VendorReviewResponse {
            analysis: review.analysis,
            score: to_api_score(review.score),
            gaps: review.gaps.gaps,
            risks: review.gaps.risks,
        }))
    }
}

fn to_api_document(document: &KnowledgeDocument) -> ApiDocument {
    ApiDocument {
        id: document.id,
        filename: document.filename.clone(),
        section_name: document.section_name.clone(),
        content: document.content.clone(),
        metadata: ApiMetadata {
            client_industry: document.metadata.client_industry.clone(),
            proposal_success: document.metadata.proposal_success,
            project_size: document.metadata.project_size.clone(),
            key_differentiators: document.metadata.key_differentiators.clone(),
        },
    }
}

fn to_api_hit(hit: &SearchHit) -> ApiSearchHit {
    ApiSearchHit {
        score: hit.score,
        document: to_api_document(&hit.document),
    }
}

fn search_response(query: String, hits: Vec<SearchHit>) -> SearchResponse {
    SearchResponse {
        query,
        results: hits.iter().map(to_api_hit).collect(),
    }
}

fn to_api_score(result: ScoreResult) -> ScoreResponse {
    ScoreResponse {
        weighted_score: result.weighted_score,
        individual_scores: result.individual_scores,
        grade: result.grade,
    }
}

#[tool_handler]
impl ServerHandler for ProposalServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: "proposal-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "RFP proposal assistant. Load past proposals with load_knowledge_base, \
                 retrieve precedent with hybrid_search or multi_hop_search, \
                 analyse RFPs with split_rfp_sections and analyze_rfp_structure, draft \
                 sections with draft_section, and evaluate vendor proposals with \
                 review_vendor_proposal, parse_and_score and identify_gaps_and_risks."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proposal_common::embedding::EmbeddingProvider;
    use proposal_common::error::CommonError;
    use proposal_common::llm::CompletionError;
    use proposal_common::llm::OpenAiClientConfig;
    use proposal_core::search::MergeStrategyKind;
    use std::collections::BTreeMap;

    struct CountingEmbedder;

    impl EmbeddingProvider for CountingEmbedder {
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CommonError> {
            Ok(texts
                .iter()
                .map(|t| vec![t.split_whitespace().count() as f32, t.len() as f32])
                .collect())
        }
    }

    struct Echo;

    #[async_trait::async_trait]
    impl CompletionProvider for Echo {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            Ok(format!("echo {}", prompt.len()))
        }
    }

    fn server(knowledge_base_dir: PathBuf) -> ProposalServer {
        let config = Config {
            knowledge_base_dir,
            embedding_model: proposal_common::embedding::EmbeddingModelName::AllMiniLmL6V2,
            scoring: ScoringConfiguration::default(),
            merge_strategy: MergeStrategyKind::Raw,
            redis_url: None,
            completion: OpenAiClientConfig::from_env(),
        };
        let knowledge_base = Arc::new(KnowledgeBase::new(
            Arc::new(CountingEmbedder),
            config.merge_strategy.build(),
        ));
        ProposalServer::new(
            knowledge_base,
            Arc::new(Echo),
            Arc::new(SearchCache::disabled()),
            config,
        )
    }

    #[test]
    fn tools_publish_output_schemas() {
        let tools = ProposalServer::tool_router().list_all();
        for name in [
            "load_knowledge_base",
            "hybrid_search",
            "multi_hop_search",
            "get_section_documents",
            "list_sections",
            "extract_pricing",
            "parse_and_score",
            "identify_gaps_and_risks",
            "summarize_match_scores",
            "split_rfp_sections",
            "analyze_rfp_structure",
            "validate_client_specificity",
            "draft_section",
            "review_vendor_proposal",
        ] {
            let tool = tools
                .iter()
                .find(|t| t.name == name)
                .unwrap_or_else(|| panic!("missing tool: {name}"));
            assert!(
                tool.output_schema.is_some(),
                "tool {name} should publish output_schema"
            );
        }
    }

    #[tokio::test]
    async fn load_then_search_and_browse() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("acme.md"),
            "# Support\nround the clock support desk\n# COMMERCIAL PROPOSAL\nRs. 1,200 and Rs. 3,000\n# Team\nproject lead",
        )
        .unwrap();
        let server = server(dir.path().to_path_buf());

        let Json(loaded) = server
            .load_knowledge_base(Parameters(LoadKnowledgeBaseParams { directory: None }))
            .await
            .unwrap();
        assert_eq!(loaded.document_count, 3);

        let Json(found) = server
            .hybrid_search(Parameters(SearchParams {
                query: "support desk".to_string(),
                k: Some(2),
                expand: Some(true),
            }))
            .await
            .unwrap();
        assert!(found.results.len() <= 2);
        assert!(found.query.starts_with("support maintenance service assistance desk"));

        let Json(sections) = server.list_sections().await.unwrap();
        assert_eq!(sections.section_names, vec!["COMMERCIAL PROPOSAL", "Support", "Team"]);

        let Json(prices) = server
            .extract_pricing(Parameters(ExtractPricingParams { directory: None }))
            .await
            .unwrap();
        assert_eq!(prices.prices, vec![1200, 3000]);
    }

    #[tokio::test]
    async fn load_without_directory_reloads_current_one() {
        let configured = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        std::fs::write(other.path().join("a.md"), "# Scope\nmigration").unwrap();
        let server = server(configured.path().to_path_buf());

        let Json(first) = server
            .load_knowledge_base(Parameters(LoadKnowledgeBaseParams {
                directory: Some(other.path().display().to_string()),
            }))
            .await
            .unwrap();
        assert_eq!(first.document_count, 1);

        std::fs::write(other.path().join("b.md"), "# Team\nlead").unwrap();
        let Json(reloaded) = server
            .load_knowledge_base(Parameters(LoadKnowledgeBaseParams { directory: None }))
            .await
            .unwrap();
        assert_eq!(reloaded.document_count, 2);
        assert_eq!(reloaded.directory, other.path().display().to_string());
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path().to_path_buf());
        let result = server
            .multi_hop_search(Parameters(SearchParams {
                query: "   ".to_string(),
                k: None,
                expand: None,
            }))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn parse_and_score_uses_request_weights() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path().to_path_buf());
        let weighting: BTreeMap<String, f64> =
            [("a".to_string(), 0.5), ("b".to_string(), 0.5)].into_iter().collect();
        let grading_scale = serde_json::from_value(serde_json::json!({
            "good": [70, 100],
            "poor": [0, 69]
        }))
        .unwrap();

        let Json(score) = server
            .parse_and_score(Parameters(ScoreAnalysisParams {
                analysis_text: "A Score: 80/100\nB Score: 60/100".to_string(),
                weighting: Some(weighting),
                grading_scale: Some(grading_scale),
            }))
            .await
            .unwrap();
        assert!((score.weighted_score - 70.0).abs() < 1e-9);
        assert_eq!(score.grade.as_deref(), Some("good"));

        let negative: BTreeMap<String, f64> = [("a".to_string(), -1.0)].into_iter().collect();
        let rejected = server
            .parse_and_score(Parameters(ScoreAnalysisParams {
                analysis_text: String::new(),
                weighting: Some(negative),
                grading_scale: None,
            }))
            .await;
        assert!(rejected.is_err());
    }
}
