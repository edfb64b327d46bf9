use std::time::Duration;

use reqwest::{Client, header::CONTENT_LENGTH};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::types::Headers;

pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36";

/// Body some catalogs return with a success status when nothing exists.
pub const NOT_FOUND_BODY: &str = "404: Not Found";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid url {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub text: String,
}

impl HttpResponse {
    /// False for error statuses and for the not-found sentinel body.
    pub fn has_data(&self) -> bool {
        self.status < 400 && self.text.trim() != NOT_FOUND_BODY
    }

    pub fn parsed<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        serde_json::from_str(&self.text).map_err(|source| FetchError::Decode {
            url: self.url.clone(),
            source,
        })
    }

    /// Decodes the body, or yields `None` when the response carries no data.
    pub fn parsed_if_found<T: DeserializeOwned>(&self) -> Result<Option<T>, FetchError> {
        if !self.has_data() {
            debug!(url = %self.url, status = self.status, "response carried no data");
            return Ok(None);
        }
        self.parsed().map(Some)
    }
}

/// The transport every provider and extractor goes through.
pub trait Fetch {
    async fn get(&self, url: &str, headers: &Headers) -> Result<HttpResponse, FetchError>;

    async fn post(&self, url: &str, headers: &Headers) -> Result<HttpResponse, FetchError>;

    /// Best-effort size probe; `None` when the host does not say.
    async fn content_length(&self, url: &str, headers: &Headers) -> Option<u64>;
}

pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|source| FetchError::Transport {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<HttpResponse, FetchError> {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(transport)?;
        debug!(%url, status, bytes = text.len(), "fetched");
        Ok(HttpResponse {
            url: url.to_string(),
            status,
            text,
        })
    }
}

fn with_headers(mut request: reqwest::RequestBuilder, headers: &Headers) -> reqwest::RequestBuilder {
    for (key, value) in headers {
        request = request.header(key, value);
    }
    request
}

impl Fetch for HttpClient {
    async fn get(&self, url: &str, headers: &Headers) -> Result<HttpResponse, FetchError> {
        let parsed = url::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        self.send(with_headers(self.client.get(parsed), headers), url)
            .await
    }

    async fn post(&self, url: &str, headers: &Headers) -> Result<HttpResponse, FetchError> {
        let parsed = url::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        self.send(with_headers(self.client.post(parsed), headers), url)
            .await
    }

    async fn content_length(&self, url: &str, headers: &Headers) -> Option<u64> {
        let response = with_headers(self.client.head(url), headers)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        response
            .headers()
            .get(CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .parse::<u64>()
            .ok()
    }
}
