use crate::error::Result;
use reqwest::Client;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; Scour/0.1)";

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
    /// Round trip including the body read
    pub elapsed: Duration,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Every value of a repeatable header such as `Set-Cookie`, joined with `; `.
    pub fn joined_header(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self
            .headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();

        if values.is_empty() {
            None
        } else {
            Some(values.join("; "))
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// Thin wrapper over a pooled `reqwest::Client` with a default per-call timeout.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(5))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.get_with_timeout(url, self.timeout).await
    }

    /// GET with a timeout that overrides the client default for this call only.
    pub async fn get_with_timeout(&self, url: &str, timeout: Duration) -> Result<HttpResponse> {
        debug!("GET {}", url);
        let start = Instant::now();
        let response = self.client.get(url).timeout(timeout).send().await?;
        Self::read(response, start).await
    }

    /// Submit fields as query parameters appended to `url`.
    pub async fn get_form(&self, url: &str, fields: &[(String, String)]) -> Result<HttpResponse> {
        debug!("GET {} ({} fields)", url, fields.len());
        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .query(fields)
            .timeout(self.timeout)
            .send()
            .await?;
        Self::read(response, start).await
    }

    /// Submit fields as an `application/x-www-form-urlencoded` body.
    pub async fn post_form(&self, url: &str, fields: &[(String, String)]) -> Result<HttpResponse> {
        debug!("POST {} ({} fields)", url, fields.len());
        let start = Instant::now();
        let response = self
            .client
            .post(url)
            .form(fields)
            .timeout(self.timeout)
            .send()
            .await?;
        Self::read(response, start).await
    }

    async fn read(response: reqwest::Response, start: Instant) -> Result<HttpResponse> {
        let url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(HttpResponse {
            url,
            status,
            headers,
            body,
            elapsed: start.elapsed(),
        })
    }
}
