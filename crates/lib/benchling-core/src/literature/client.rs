use serde_json::Value;
use tracing::{debug, info, warn};

use super::parse::{parse_full_text_links, parse_pmc_full_text, parse_pubmed_articles};
use super::pdf::extract_pdf_text;
use super::search::SearchRequest;
use super::{
    AvailableContent, FullTextPaper, FullTextSource, LiteratureError, PaperSummary,
    is_valid_pubmed_id,
};
use crate::settings::LiteratureSettings;

const USER_AGENT: &str = concat!("benchling-mcp/", env!("CARGO_PKG_VERSION"));

/// Client for the NCBI E-utilities and the PubMed Central OAI service.
#[derive(Debug, Clone)]
pub struct PubMedClient {
    http: reqwest::Client,
    eutils_base_url: String,
    pmc_oai_url: String,
    api_key: Option<String>,
}

impl PubMedClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: &LiteratureSettings) -> Result<Self, LiteratureError> {
        let http = reqwest::Client::builder()
            .timeout(settings.http_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            eutils_base_url: settings.eutils_base_url.trim_end_matches('/').to_string(),
            pmc_oai_url: settings.pmc_oai_url.clone(),
            api_key: settings.ncbi_api_key.clone(),
        })
    }

    /// Runs an `esearch` query and fetches summaries of the matching papers.
    ///
    /// # Errors
    /// Returns an error for invalid requests and failed upstream calls.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<PaperSummary>, LiteratureError> {
        let params = request.esearch_params()?;
        let result: Value = self
            .eutils("esearch.fcgi", params)
            .await?
            .json()
            .await
            .map_err(redacted)?;

        let ids: Vec<String> = result["esearchresult"]["idlist"]
            .as_array()
            .map(|ids| ids.iter().filter_map(json_id).collect())
            .unwrap_or_default();
        info!(query = %request.query, hits = ids.len(), "pubmed search finished");
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let xml = self.efetch(&ids).await?;
        parse_pubmed_articles(&xml)
    }

    /// Retrieves a paper with the most complete text available.
    ///
    /// Missing PMC records, failed PDF downloads and unreadable PDFs fall
    /// through to the next source; only the initial `efetch` is fatal.
    ///
    /// # Errors
    /// Returns an error for invalid ids, unknown papers and a failed `efetch`.
    pub async fn full_text(&self, pubmed_id: &str) -> Result<FullTextPaper, LiteratureError> {
        if !is_valid_pubmed_id(pubmed_id) {
            return Err(LiteratureError::InvalidParams(format!(
                "paper_id must contain only digits, got `{pubmed_id}`"
            )));
        }

        let xml = self.efetch(&[pubmed_id.to_string()]).await?;
        let mut summary = parse_pubmed_articles(&xml)?
            .into_iter()
            .next()
            .ok_or_else(|| LiteratureError::NotFound(pubmed_id.to_string()))?;
        summary.pubmed_id = pubmed_id.to_string();
        let links = parse_full_text_links(&xml)?;

        if let Some(text) = self.pmc_text(pubmed_id).await {
            return Ok(FullTextPaper {
                summary,
                full_text: text,
                full_text_source: FullTextSource::Pmc,
                available_content: AvailableContent::FullText,
                full_text_links: links,
            });
        }

        for link in links.iter().filter(|link| link.kind == "DOI") {
            if let Some(text) = self.pdf_text(&link.url).await {
                return Ok(FullTextPaper {
                    summary,
                    full_text: text,
                    full_text_source: FullTextSource::Pdf,
                    available_content: AvailableContent::FullText,
                    full_text_links: links,
                });
            }
        }

        debug!(pubmed_id, "no full text available; using abstract");
        Ok(FullTextPaper {
            full_text: summary.abstract_text.clone(),
            summary,
            full_text_source: FullTextSource::Abstract,
            available_content: AvailableContent::Abstract,
            full_text_links: links,
        })
    }

    async fn efetch(&self, ids: &[String]) -> Result<String, LiteratureError> {
        let params = vec![
            ("db", "pubmed".to_string()),
            ("id", ids.join(",")),
            ("retmode", "xml".to_string()),
        ];
        self.eutils("efetch.fcgi", params)
            .await?
            .text()
            .await
            .map_err(redacted)
    }

    async fn pmc_text(&self, pubmed_id: &str) -> Option<String> {
        let pmc_id = match self.pmc_id(pubmed_id).await {
            Ok(Some(pmc_id)) => pmc_id,
            Ok(None) => return None,
            Err(err) => {
                warn!(pubmed_id, error = %err, "PMC id lookup failed");
                return None;
            }
        };
        match self.pmc_record(&pmc_id).await {
            Ok(text) => text,
            Err(err) => {
                warn!(pmc_id = %pmc_id, error = %err, "PMC full text unavailable");
                None
            }
        }
    }

    async fn pmc_id(&self, pubmed_id: &str) -> Result<Option<String>, LiteratureError> {
        let params = vec![
            ("dbfrom", "pubmed".to_string()),
            ("db", "pmc".to_string()),
            ("id", pubmed_id.to_string()),
            ("retmode", "json".to_string()),
        ];
        let result: Value = self
            .eutils("elink.fcgi", params)
            .await?
            .json()
            .await
            .map_err(redacted)?;
        Ok(json_id(&result["linksets"][0]["linksetdbs"][0]["links"][0]))
    }

    async fn pmc_record(&self, pmc_id: &str) -> Result<Option<String>, LiteratureError> {
        let identifier = format!("oai:pubmedcentral.nih.gov:{pmc_id}");
        let response = self
            .http
            .get(&self.pmc_oai_url)
            .query(&[
                ("verb", "GetRecord"),
                ("identifier", identifier.as_str()),
                ("metadataPrefix", "pmc"),
            ])
            .send()
            .await?;
        let response = check_status(response, "PMC OAI")?;
        parse_pmc_full_text(&response.text().await?)
    }

    async fn pdf_text(&self, url: &str) -> Option<String> {
        match self.download_pdf(url).await {
            Ok(text) => text,
            Err(err) => {
                warn!(url, error = %err, "PDF full text unavailable");
                None
            }
        }
    }

    async fn download_pdf(&self, url: &str) -> Result<Option<String>, LiteratureError> {
        let response = self.http.get(url).send().await?;
        let bytes = check_status(response, url)?.bytes().await?;
        extract_pdf_text(bytes.to_vec()).await
    }

    async fn eutils(
        &self,
        endpoint: &str,
        mut params: Vec<(&'static str, String)>,
    ) -> Result<reqwest::Response, LiteratureError> {
        if let Some(api_key) = &self.api_key {
            params.push(("api_key", api_key.clone()));
        }
        let url = format!("{}/{endpoint}", self.eutils_base_url);
        let response = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(redacted)?;
        check_status(response, endpoint)
    }
}

/// E-utilities URLs may carry the NCBI API key.
fn redacted(err: reqwest::Error) -> LiteratureError {
    LiteratureError::Http(err.without_url())
}

fn check_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response, LiteratureError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(LiteratureError::Status {
            status,
            url: what.to_string(),
        })
    }
}

/// NCBI returns identifiers as strings or bare numbers depending on the endpoint.
fn json_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_accept_strings_and_numbers() {
        assert_eq!(json_id(&serde_json::json!("123")), Some("123".to_string()));
        assert_eq!(json_id(&serde_json::json!(456)), Some("456".to_string()));
        assert_eq!(json_id(&serde_json::json!("")), None);
        assert_eq!(json_id(&Value::Null), None);
    }
}
