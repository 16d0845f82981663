use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ports::{WebSearchError, WebSearchParams, WebSearchProviderTrait, WebSearchResult};

static BRAVE_API_URL: &str = "https://api.search.brave.com/res/v1/web/search";

/// Brave caps `count` at 20
const MAX_RESULT_COUNT: u32 = 20;

pub struct BraveWebSearchProvider {
    api_key: String,
    client: reqwest::Client,
}

impl BraveWebSearchProvider {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, WebSearchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WebSearchError::WebSearchRequestFailed(e.to_string()))?;
        Ok(Self { api_key, client })
    }

    fn brave_get_builder(&self) -> reqwest::RequestBuilder {
        self.client
            .get(BRAVE_API_URL)
            .header("X-Subscription-Token", &self.api_key)
            .header("Accept", "application/json")
    }
}

/// Root response from Brave Search API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BraveSearchResponse {
    #[serde(default)]
    pub web: Option<BraveWebResults>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BraveWebResults {
    #[serde(default)]
    pub results: Vec<BraveWebSearchResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BraveWebSearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<BraveSearchResponse> for Vec<WebSearchResult> {
    fn from(response: BraveSearchResponse) -> Self {
        response
            .web
            .map(|web| {
                web.results
                    .into_iter()
                    .map(|result| WebSearchResult {
                        title: result.title,
                        url: result.url,
                        snippet: result.description.unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl WebSearchProviderTrait for BraveWebSearchProvider {
    async fn search(
        &self,
        params: WebSearchParams,
    ) -> Result<Vec<WebSearchResult>, WebSearchError> {
        tracing::debug!(query = %params.query, "Searching the web");

        let mut query: Vec<(&str, String)> = vec![("q", params.query)];
        if let Some(count) = params.count {
            query.push(("count", count.min(MAX_RESULT_COUNT).to_string()));
        }
        if let Some(freshness) = params.freshness {
            query.push(("freshness", freshness));
        }

        let response = self
            .brave_get_builder()
            .query(&query)
            .send()
            .await
            .map_err(|e| WebSearchError::WebSearchRequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            tracing::error!(status = %status, "Brave API error: {}", error_body);
            return Err(WebSearchError::WebSearchRequestFailed(format!(
                "HTTP {status}: {error_body}"
            )));
        }

        let brave_response: BraveSearchResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Brave response: {}", e);
            WebSearchError::WebSearchResponseParsingFailed(format!("JSON parsing error: {e}"))
        })?;

        let results: Vec<WebSearchResult> = brave_response.into();
        tracing::debug!("Found {} results", results.len());
        Ok(results)
    }
}
