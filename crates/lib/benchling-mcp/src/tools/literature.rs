use std::sync::Arc;

use benchling_core::literature::{
    DEFAULT_MAX_RESULTS, LiteratureError, PubMedClient, SearchRequest, SortBy,
};
use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::helpers;
use crate::{BenchlingMcp, LITERATURE_FLAG};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Relevance,
    Date,
}

impl From<SortOrder> for SortBy {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Relevance => Self::Relevance,
            SortOrder::Date => Self::Date,
        }
    }
}

/// Publication date window, `YYYY-MM-DD` or `YYYY/MM/DD`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DateRangeParams {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Parameters for searching PubMed.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ListPubmedPapersParams {
    /// PubMed search query.
    pub query: String,
    /// Number of papers to return, 1 to 100 (default 10).
    pub max_results: Option<u32>,
    pub date_range: Option<DateRangeParams>,
    /// `relevance` (default) or `date`.
    pub sort_by: Option<SortOrder>,
    /// One of: clinical trial, review, meta-analysis, case report, letter, editorial,
    /// comment, systematic review.
    pub article_type: Option<String>,
    /// Journal name filter.
    pub journal: Option<String>,
}

impl From<ListPubmedPapersParams> for SearchRequest {
    fn from(params: ListPubmedPapersParams) -> Self {
        let date_range = params.date_range.unwrap_or_default();
        Self {
            query: params.query,
            max_results: params.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
            start_date: date_range.start,
            end_date: date_range.end,
            sort_by: params.sort_by.unwrap_or_default().into(),
            article_type: params.article_type,
            journal: params.journal,
        }
    }
}

/// Parameters for retrieving a paper's full text.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GetPubmedFulltextParams {
    /// PubMed id (digits only) as returned by list_pubmed_papers.
    #[serde(alias = "pubmed_id")]
    pub paper_id: String,
}

impl BenchlingMcp {
    fn literature_client(&self) -> Result<Arc<PubMedClient>, ErrorData> {
        self.literature.clone().ok_or_else(|| {
            helpers::invalid_request(format!(
                "literature search is disabled; restart the server with {LITERATURE_FLAG}"
            ))
        })
    }
}

#[tool_router(router = tool_router_literature, vis = "pub")]
impl BenchlingMcp {
    #[tool(
        description = "Searches PubMed for papers matching a query. Returns metadata and abstracts but not full text; use get_pubmed_fulltext for that. Optional filters: max_results, date_range {start, end}, sort_by (relevance|date), article_type, journal."
    )]
    async fn list_pubmed_papers(
        &self,
        Parameters(params): Parameters<ListPubmedPapersParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = self.literature_client()?;
        let request = SearchRequest::from(params);
        info!(query = %request.query, "searching PubMed");
        match client.search(&request).await {
            Ok(papers) => helpers::json_success(&papers),
            Err(LiteratureError::InvalidParams(message)) => Err(helpers::invalid_params(message)),
            Err(err) => {
                error!(error = %err, "PubMed search failed");
                Ok(helpers::tool_failure("Error searching PubMed", &err))
            }
        }
    }

    #[tool(
        description = "Retrieves the full text of a paper by PubMed id, preferring PubMed Central, then PDF links, then the abstract. Use after list_pubmed_papers has found the paper."
    )]
    async fn get_pubmed_fulltext(
        &self,
        Parameters(params): Parameters<GetPubmedFulltextParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = self.literature_client()?;
        let paper_id = params.paper_id.trim();
        info!(paper_id, "retrieving PubMed full text");
        match client.full_text(paper_id).await {
            Ok(paper) => helpers::json_success(&paper),
            Err(LiteratureError::InvalidParams(message)) => Err(helpers::invalid_params(message)),
            Err(err) => {
                error!(paper_id, error = %err, "PubMed full text retrieval failed");
                Ok(helpers::tool_failure("Error retrieving paper", &err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rmcp::model::ErrorCode;
    use serde_json::json;

    use super::*;
    use crate::test_support::{server, text};

    fn literature_server() -> BenchlingMcp {
        let settings = benchling_core::settings::LiteratureSettings {
            eutils_base_url: "http://127.0.0.1:9/eutils".to_string(),
            pmc_oai_url: "http://127.0.0.1:9/oai".to_string(),
            ..benchling_core::settings::LiteratureSettings::disabled()
        };
        server().with_literature(PubMedClient::new(&settings).expect("pubmed client"))
    }

    #[test]
    fn params_map_onto_search_request() {
        let params: ListPubmedPapersParams = serde_json::from_value(json!({
            "query": "base editing",
            "date_range": {"start": "2020-01-01"},
            "sort_by": "date",
            "journal": "Nature"
        }))
        .expect("params");
        let request = SearchRequest::from(params);
        assert_eq!(request.max_results, 10);
        assert_eq!(request.sort_by, SortBy::Date);
        assert_eq!(request.start_date.as_deref(), Some("2020-01-01"));
        assert_eq!(request.end_date, None);
        assert_eq!(request.journal.as_deref(), Some("Nature"));
    }

    #[test]
    fn unknown_sort_order_fails_to_deserialize() {
        let parsed = serde_json::from_value::<ListPubmedPapersParams>(json!({
            "query": "x",
            "sort_by": "citations"
        }));
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn invalid_search_is_invalid_params() {
        let err = literature_server()
            .list_pubmed_papers(Parameters(ListPubmedPapersParams {
                query: "x".to_string(),
                max_results: Some(0),
                date_range: None,
                sort_by: None,
                article_type: None,
                journal: None,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert!(err.message.contains("max_results"));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_tool_error() {
        let result = literature_server()
            .get_pubmed_fulltext(Parameters(GetPubmedFulltextParams {
                paper_id: "31452104".to_string(),
            }))
            .await
            .expect("tool result");
        assert_eq!(result.is_error, Some(true));
        assert!(text(&result).starts_with("Error retrieving paper: "));
    }

    #[tokio::test]
    async fn handlers_refuse_when_disabled() {
        let err = server()
            .get_pubmed_fulltext(Parameters(GetPubmedFulltextParams {
                paper_id: "1".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_REQUEST);
    }
}
