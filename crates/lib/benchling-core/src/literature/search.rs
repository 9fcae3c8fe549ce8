//! Validation of search requests and translation into `esearch` parameters.

use chrono::NaiveDate;

use super::LiteratureError;

pub const DEFAULT_MAX_RESULTS: u32 = 10;
pub const MAX_RESULTS: u32 = 100;

/// Publication types accepted by the `article_type` filter.
pub const ARTICLE_TYPES: [&str; 8] = [
    "clinical trial",
    "review",
    "meta-analysis",
    "case report",
    "letter",
    "editorial",
    "comment",
    "systematic review",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Relevance,
    Date,
}

impl SortBy {
    #[must_use]
    pub const fn as_param(self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::Date => "date",
        }
    }
}

/// A literature search as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: u32,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort_by: SortBy,
    pub article_type: Option<String>,
    pub journal: Option<String>,
}

impl SearchRequest {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: DEFAULT_MAX_RESULTS,
            start_date: None,
            end_date: None,
            sort_by: SortBy::default(),
            article_type: None,
            journal: None,
        }
    }

    /// Checks the request and builds the `esearch.fcgi` query parameters.
    ///
    /// # Errors
    /// Returns [`LiteratureError::InvalidParams`] describing the first invalid field.
    pub fn esearch_params(&self) -> Result<Vec<(&'static str, String)>, LiteratureError> {
        let query = self.query.trim();
        if query.is_empty() {
            return Err(invalid("query cannot be empty"));
        }
        if self.max_results == 0 {
            return Err(invalid("max_results must be greater than 0"));
        }
        if self.max_results > MAX_RESULTS {
            return Err(invalid(format!("max_results cannot exceed {MAX_RESULTS}")));
        }

        let mut term = query.to_string();
        if let Some(article_type) = &self.article_type {
            if !ARTICLE_TYPES.contains(&article_type.trim().to_lowercase().as_str()) {
                return Err(invalid(format!(
                    "invalid article_type; must be one of: {}",
                    ARTICLE_TYPES.join(", ")
                )));
            }
            term.push_str(&format!(" AND {}[Publication Type]", article_type.trim()));
        }
        if let Some(journal) = &self.journal {
            if journal.trim().is_empty() {
                return Err(invalid("journal cannot be empty"));
            }
            term.push_str(&format!(" AND {}[Journal]", journal.trim()));
        }

        let start = self.start_date.as_deref().map(parse_date).transpose()?;
        let end = self.end_date.as_deref().map(parse_date).transpose()?;
        if let (Some(start), Some(end)) = (start, end)
            && start > end
        {
            return Err(invalid("date_range start must not be after end"));
        }

        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("term", term),
            ("retmax", self.max_results.to_string()),
            ("retmode", "json".to_string()),
            ("sort", self.sort_by.as_param().to_string()),
        ];
        if let Some(start) = start {
            params.push(("mindate", start.format("%Y/%m/%d").to_string()));
        }
        if let Some(end) = end {
            params.push(("maxdate", end.format("%Y/%m/%d").to_string()));
        }
        Ok(params)
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, LiteratureError> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .ok_or_else(|| invalid(format!("invalid date `{raw}`; expected YYYY-MM-DD")))
}

fn invalid(message: impl Into<String>) -> LiteratureError {
    LiteratureError::InvalidParams(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn builds_default_params() {
        let params = SearchRequest::new("CRISPR base editing").esearch_params().unwrap();
        assert_eq!(param(&params, "db"), Some("pubmed"));
        assert_eq!(param(&params, "term"), Some("CRISPR base editing"));
        assert_eq!(param(&params, "retmax"), Some("10"));
        assert_eq!(param(&params, "sort"), Some("relevance"));
        assert_eq!(param(&params, "mindate"), None);
    }

    #[test]
    fn filters_extend_the_term() {
        let request = SearchRequest {
            article_type: Some("Review".to_string()),
            journal: Some("Nature".to_string()),
            sort_by: SortBy::Date,
            ..SearchRequest::new("antibody")
        };
        let params = request.esearch_params().unwrap();
        assert_eq!(
            param(&params, "term"),
            Some("antibody AND Review[Publication Type] AND Nature[Journal]")
        );
        assert_eq!(param(&params, "sort"), Some("date"));
    }

    #[test]
    fn dates_accept_both_separators() {
        let request = SearchRequest {
            start_date: Some("2020-01-05".to_string()),
            end_date: Some("2021/12/31".to_string()),
            ..SearchRequest::new("t cells")
        };
        let params = request.esearch_params().unwrap();
        assert_eq!(param(&params, "mindate"), Some("2020/01/05"));
        assert_eq!(param(&params, "maxdate"), Some("2021/12/31"));
    }

    #[test]
    fn rejects_invalid_requests() {
        let cases = [
            SearchRequest::new("   "),
            SearchRequest {
                max_results: 0,
                ..SearchRequest::new("x")
            },
            SearchRequest {
                max_results: 101,
                ..SearchRequest::new("x")
            },
            SearchRequest {
                article_type: Some("blog post".to_string()),
                ..SearchRequest::new("x")
            },
            SearchRequest {
                journal: Some(" ".to_string()),
                ..SearchRequest::new("x")
            },
            SearchRequest {
                start_date: Some("yesterday".to_string()),
                ..SearchRequest::new("x")
            },
            SearchRequest {
                start_date: Some("2022-01-01".to_string()),
                end_date: Some("2021-01-01".to_string()),
                ..SearchRequest::new("x")
            },
        ];
        for request in cases {
            assert!(
                matches!(request.esearch_params(), Err(LiteratureError::InvalidParams(_))),
                "accepted {request:?}"
            );
        }
    }
}
