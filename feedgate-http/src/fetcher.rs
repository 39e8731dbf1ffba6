use std::time::Duration;

use async_trait::async_trait;
use feedgate_core::{FeedError, FetchError, Fetcher, Params, ProbeReply, ProbeTarget};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use url::Url;

const ERROR_BODY_LIMIT: usize = 200;

/// `Fetcher` over a JSON HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    url: Url,
    health_url: Option<Url>,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    timeout: Option<Duration>,
}

/// Builder for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcherBuilder {
    base_url: String,
    path: String,
    health_path: Option<String>,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    timeout: Option<Duration>,
    client: Option<reqwest::Client>,
}

fn join(base: &str, path: &str) -> Result<Url, FeedError> {
    let full = if path.is_empty() {
        base.to_string()
    } else {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    };
    Url::parse(&full).map_err(|e| FeedError::InvalidConfig(format!("invalid url {full}: {e}")))
}

impl HttpFetcherBuilder {
    /// Endpoint path appended to the base URL for data calls.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Path of a cheap health endpoint; enables probing.
    #[must_use]
    pub fn health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = Some(path.into());
        self
    }

    /// Static header sent with every request (API keys and the like).
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Query parameter sent with every data call.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Per-request timeout enforced by the HTTP client.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use a preconfigured client.
    #[must_use]
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Validate URLs and headers and build the adapter.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for an unparsable URL or header.
    pub fn build(self) -> Result<HttpFetcher, FeedError> {
        let url = join(&self.base_url, &self.path)?;
        let health_url = self
            .health_path
            .as_deref()
            .map(|p| join(&self.base_url, p))
            .transpose()?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FeedError::InvalidConfig(format!("invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| FeedError::InvalidConfig(format!("invalid header value: {e}")))?;
            headers.insert(name, value);
        }

        Ok(HttpFetcher {
            client: self.client.unwrap_or_default(),
            url,
            health_url,
            headers,
            query: self.query,
            timeout: self.timeout,
        })
    }
}

impl HttpFetcher {
    /// Start building an adapter rooted at `base_url`.
    pub fn builder(base_url: impl Into<String>) -> HttpFetcherBuilder {
        HttpFetcherBuilder {
            base_url: base_url.into(),
            path: String::new(),
            health_path: None,
            headers: Vec::new(),
            query: Vec::new(),
            timeout: None,
            client: None,
        }
    }

    /// Data endpoint.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    fn request(&self, url: &Url) -> reqwest::RequestBuilder {
        let req = self.client.get(url.clone()).headers(self.headers.clone());
        match self.timeout {
            Some(t) => req.timeout(t),
            None => req,
        }
    }
}

fn map_transport(e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::timeout(e.to_string())
    } else if let Some(status) = e.status() {
        FetchError::from_status(status.as_u16(), e.to_string())
    } else {
        FetchError::unknown(e.to_string())
    }
}

fn truncate(body: &str) -> String {
    let mut s: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    if s.len() < body.len() {
        s.push_str("...");
    }
    s
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, params: &Params) -> Result<Value, FetchError> {
        let resp = self
            .request(&self.url)
            .query(&self.query)
            .query(&params.to_query_pairs())
            .send()
            .await
            .map_err(|e| map_transport(&e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| map_transport(&e))?;

        if !status.is_success() {
            #[cfg(feature = "tracing")]
            tracing::debug!(url = %self.url, status = status.as_u16(), "upstream returned error status");
            return Err(FetchError::from_status(
                status.as_u16(),
                format!("HTTP {}: {}", status.as_u16(), truncate(&body)),
            ));
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }

    fn as_probe_target(&self) -> Option<&dyn ProbeTarget> {
        self.health_url.as_ref().map(|_| self as &dyn ProbeTarget)
    }
}

#[async_trait]
impl ProbeTarget for HttpFetcher {
    async fn probe(&self) -> Result<ProbeReply, FetchError> {
        let url = self.health_url.as_ref().unwrap_or(&self.url);
        let resp = self
            .request(url)
            .send()
            .await
            .map_err(|e| map_transport(&e))?;
        Ok(ProbeReply::new(url.path(), resp.status().as_u16()))
    }
}
