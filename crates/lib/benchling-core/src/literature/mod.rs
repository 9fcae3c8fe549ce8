//! PubMed literature search and full-text retrieval.
//!
//! Search goes through the NCBI E-utilities (`esearch` then `efetch`). Full
//! text is resolved in order of preference: PubMed Central OAI records, PDFs
//! behind DOI links, and finally the abstract.

mod client;
mod parse;
mod pdf;
pub mod search;

use reqwest::StatusCode;
use serde::Serialize;

pub use client::PubMedClient;
pub use parse::{parse_full_text_links, parse_pmc_full_text, parse_pubmed_articles};
pub use search::{ARTICLE_TYPES, DEFAULT_MAX_RESULTS, MAX_RESULTS, SearchRequest, SortBy};

#[derive(Debug, thiserror::Error)]
pub enum LiteratureError {
    #[error("invalid search parameters: {0}")]
    InvalidParams(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned {status} for {url}")]
    Status { status: StatusCode, url: String },
    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("failed to extract PDF text: {0}")]
    Pdf(String),
    #[error("paper {0} not found")]
    NotFound(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Author {
    pub last_name: String,
    pub first_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Journal {
    pub name: String,
    pub volume: String,
    pub issue: String,
    pub pages: String,
}

/// Metadata and abstract of a PubMed record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PaperSummary {
    pub pubmed_id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<Author>,
    pub journal: Journal,
    /// `Year-Month-Day`, with missing parts omitted.
    pub publication_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FullTextLink {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FullTextSource {
    #[serde(rename = "PMC")]
    Pmc,
    #[serde(rename = "PDF")]
    Pdf,
    #[serde(rename = "abstract")]
    Abstract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailableContent {
    FullText,
    Abstract,
}

/// A paper summary extended with the best text that could be retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FullTextPaper {
    #[serde(flatten)]
    pub summary: PaperSummary,
    pub full_text: String,
    pub full_text_source: FullTextSource,
    pub available_content: AvailableContent,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub full_text_links: Vec<FullTextLink>,
}

/// Returns true when `id` looks like a PubMed identifier.
#[must_use]
pub fn is_valid_pubmed_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pubmed_ids_are_digits() {
        assert!(is_valid_pubmed_id("31452104"));
        assert!(!is_valid_pubmed_id(""));
        assert!(!is_valid_pubmed_id("PMC123"));
    }

    #[test]
    fn full_text_paper_flattens_summary() {
        let paper = FullTextPaper {
            summary: PaperSummary {
                pubmed_id: "1".to_string(),
                abstract_text: "Short.".to_string(),
                ..PaperSummary::default()
            },
            full_text: "Short.".to_string(),
            full_text_source: FullTextSource::Abstract,
            available_content: AvailableContent::Abstract,
            full_text_links: Vec::new(),
        };
        let value = serde_json::to_value(&paper).unwrap();
        assert_eq!(value["pubmed_id"], "1");
        assert_eq!(value["abstract"], "Short.");
        assert_eq!(value["full_text_source"], "abstract");
        assert_eq!(value["available_content"], "abstract");
        assert!(value.get("full_text_links").is_none());
    }
}
