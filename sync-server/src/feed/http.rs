//! Feed adapter for vendors exposing pre-normalized JSON pages
//!
//! `GET {base_url}/items?page=N[&since=RFC3339][&cursor=..]` returning a
//! [`FeedPage`] body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use shared::util::millis_to_rfc3339;
use thiserror::Error;

use super::{FeedError, FeedNormalizer, FeedPage, FeedRequest};

/// Why an HTTP feed could not be built from its configuration
#[derive(Debug, Error)]
pub enum FeedSetupError {
    #[error("invalid feed base_url {0}: {1}")]
    InvalidUrl(String, String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct HttpJsonFeed {
    client: Client,
    items_url: Url,
    api_key: Option<String>,
}

impl HttpJsonFeed {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FeedSetupError> {
        let items_url = Url::parse(&format!("{}/items", base_url.trim_end_matches('/')))
            .map_err(|e| FeedSetupError::InvalidUrl(base_url.to_string(), e.to_string()))?;
        if !matches!(items_url.scheme(), "http" | "https") {
            return Err(FeedSetupError::InvalidUrl(
                base_url.to_string(),
                format!("unsupported scheme {}", items_url.scheme()),
            ));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            items_url,
            api_key,
        })
    }

    fn page_url(&self, request: &FeedRequest, page: u32) -> Url {
        let mut url = self.items_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("page", &page.to_string());
            if let Some(since) = request.since {
                query.append_pair("since", &millis_to_rfc3339(since));
            }
            if let Some(cursor) = &request.cursor {
                query.append_pair("cursor", cursor);
            }
        }
        url
    }
}

#[async_trait]
impl FeedNormalizer for HttpJsonFeed {
    async fn fetch_page(&self, request: &FeedRequest, page: u32) -> Result<FeedPage, FeedError> {
        let mut builder = self.client.get(self.page_url(request, page));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FeedError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    FeedError::Authorization(format!("{status}: {text}"))
                }
                s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
                    FeedError::Transient(format!("{status}: {text}"))
                }
                _ => FeedError::Malformed(format!("unexpected status {status}: {text}")),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FeedError::Transient(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| FeedError::Malformed(e.to_string()))
    }
}
