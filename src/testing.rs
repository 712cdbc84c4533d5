//! Scripted in-memory transport for adapter and aggregator tests.

use crate::transport::{FetchRequest, FetchResponse, Transport};
use crate::{Error, Result};
use reqwest::Method;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

enum Reply {
    Body {
        final_url: Option<String>,
        body: String,
    },
    Fail(String),
}

#[derive(Default)]
struct Script {
    replies: Mutex<HashMap<(Method, String), Reply>>,
    requests: Mutex<Vec<FetchRequest>>,
    sessions: AtomicUsize,
}

/// Cloning shares the script; sessions hand out clones and are counted.
#[derive(Clone, Default)]
pub struct FakeTransport {
    script: Arc<Script>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    pub fn on(&self, method: Method, url: &str, body: impl Into<String>) -> &Self {
        self.insert(
            method,
            url,
            Reply::Body {
                final_url: None,
                body: body.into(),
            },
        )
    }

    /// Reply as if the request was redirected to `final_url`.
    pub fn redirect(
        &self,
        method: Method,
        url: &str,
        final_url: &str,
        body: impl Into<String>,
    ) -> &Self {
        self.insert(
            method,
            url,
            Reply::Body {
                final_url: Some(final_url.to_string()),
                body: body.into(),
            },
        )
    }

    pub fn fail(&self, method: Method, url: &str, reason: &str) -> &Self {
        self.insert(method, url, Reply::Fail(reason.to_string()))
    }

    fn insert(&self, method: Method, url: &str, reply: Reply) -> &Self {
        self.script
            .replies
            .lock()
            .unwrap()
            .insert((method, url.to_string()), reply);
        self
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.script.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, url: &str) -> Vec<FetchRequest> {
        self.requests().into_iter().filter(|r| r.url == url).collect()
    }

    pub fn sessions(&self) -> usize {
        self.script.sessions.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        tokio::task::yield_now().await;
        self.script.requests.lock().unwrap().push(request.clone());

        let replies = self.script.replies.lock().unwrap();
        match replies.get(&(request.method.clone(), request.url.clone())) {
            Some(Reply::Body { final_url, body }) => Ok(FetchResponse {
                final_url: Url::parse(final_url.as_deref().unwrap_or(&request.url))?,
                status: 200,
                body: body.clone(),
            }),
            Some(Reply::Fail(reason)) => Err(Error::transport(&request.url, reason)),
            None => Err(Error::transport(&request.url, "404 Not Found")),
        }
    }

    fn session(&self) -> Result<Arc<dyn Transport>> {
        self.script.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(self.handle())
    }
}
