use crate::{Error, Result};
use reqwest::cookie::Jar;
use reqwest::{Client, Method, header};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Desktop browser identity sent to every origin; some of them refuse
/// obvious non-browser clients.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_12_3) \
     AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/56.0.2924.87 Safari/537.36";

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Form(Vec<(String, String)>),
    Json(serde_json::Value),
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            ..Self::get(url)
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn form(mut self, fields: &[(&str, &str)]) -> Self {
        self.body = Body::Form(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = Body::Json(value);
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// URL after redirects; relative links on the page resolve against this.
    pub final_url: Url,
    pub status: u16,
    pub body: String,
}

/// HTTP capability the adapters are written against.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;

    /// A transport with its own, empty cookie jar.
    fn session(&self) -> Result<Arc<dyn Transport>>;
}

/// `reqwest`-backed transport.
pub struct HttpTransport {
    client: Client,
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Self::with_timeout(None)
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            client: builder.build()?,
            timeout,
        })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let FetchRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let mut builder = self.client.request(method, &url);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match body {
            Body::Empty => builder,
            Body::Form(fields) => builder.form(&fields),
            Body::Json(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(value.to_string()),
        };

        let resp = builder
            .send()
            .await
            .map_err(|e| Error::transport(&url, e))?
            .error_for_status()
            .map_err(|e| Error::transport(&url, e))?;

        let final_url = resp.url().clone();
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| Error::transport(&url, e))?;

        tracing::debug!(%url, %final_url, status, bytes = body.len(), "fetched");
        Ok(FetchResponse {
            final_url,
            status,
            body,
        })
    }

    fn session(&self) -> Result<Arc<dyn Transport>> {
        let mut builder = Client::builder().cookie_provider(Arc::new(Jar::default()));
        if let Some(t) = self.timeout {
            builder = builder.timeout(t);
        }
        Ok(Arc::new(Self {
            client: builder.build()?,
            timeout: self.timeout,
        }))
    }
}
