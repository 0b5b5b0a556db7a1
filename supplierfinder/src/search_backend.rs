use serde::Serialize;
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::error::{FetchOutcome, SearchError};
use crate::result_set::ResultEnvelope;

/// Longest error body echoed into logs
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: QuerySpec,
    pub sort_spec: SortSpec,
    pub group_spec: GroupSpec,
    pub max_passages: u32,
    #[serde(rename = "l10N")]
    pub l10n: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub search_type: String,
    pub query_text: String,
    pub family_mode: String,
    pub page: u32,
    pub fix_typo_mode: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub sort_mode: String,
    pub sort_order: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSpec {
    pub group_mode: String,
    pub groups_on_page: u32,
    pub docs_in_group: u32,
}

/// Client for the paginated web-search API
#[derive(Clone)]
pub struct SearchBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    groups_per_page: u32,
}

impl SearchBackend {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            groups_per_page: config.groups_per_page,
        })
    }

    /// Relevance-sorted, one-doc-per-group request for `page` (zero-based)
    pub fn build_request(&self, query_text: &str, page: u32) -> SearchRequest {
        SearchRequest {
            query: QuerySpec {
                search_type: "SEARCH_TYPE_RU".to_string(),
                query_text: query_text.to_string(),
                family_mode: "FAMILY_MODE_NONE".to_string(),
                page,
                fix_typo_mode: "FIX_TYPO_MODE_ON".to_string(),
            },
            sort_spec: SortSpec {
                sort_mode: "SORT_MODE_BY_RELEVANCE".to_string(),
                sort_order: "SORT_ORDER_DESC".to_string(),
            },
            group_spec: GroupSpec {
                group_mode: "GROUP_MODE_DEEP".to_string(),
                groups_on_page: self.groups_per_page,
                docs_in_group: 1,
            },
            max_passages: 5,
            l10n: "LOCALIZATION_RU".to_string(),
        }
    }

    /// Submit one page of the query.
    ///
    /// A non-2xx answer is transient: the caller keeps what it has. Transport
    /// faults, timeouts and an undecodable envelope are fatal.
    pub async fn submit(&self, query_text: &str, page: u32) -> FetchOutcome<ResultEnvelope> {
        let request = self.build_request(query_text, page);
        debug!("Submitting search page {} for {:?}", page, query_text);

        let response = match self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .json(&request)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!("Search request for page {} failed: {}", page, e);
                return FetchOutcome::FatalFailure(e.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            warn!("Search backend returned {} on page {}: {}", status, page, snippet);
            return FetchOutcome::TransientFailure(format!("HTTP {}", status));
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read search response for page {}: {}", page, e);
                return FetchOutcome::FatalFailure(e.to_string());
            }
        };

        match ResultEnvelope::from_slice(&body) {
            Ok(envelope) => FetchOutcome::Success(envelope),
            Err(e) => {
                warn!("Undecodable search response on page {}: {}", page, e);
                FetchOutcome::FatalFailure(format!("undecodable response envelope: {}", e))
            }
        }
    }
}
