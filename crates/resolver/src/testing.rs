//! Scripted `HttpClient` for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use livewatch_common::error::HttpError;

use crate::http::{HttpClient, HttpResponse};

/// Replies to each URL from a queue of canned results.
///
/// The last queued result for a URL is sticky. Unknown URLs fail with
/// `HttpError::Request`. Every call is recorded.
#[derive(Default)]
pub struct ScriptedHttpClient {
    routes: Mutex<HashMap<String, VecDeque<Result<HttpResponse, HttpError>>>>,
    calls: Mutex<Vec<(String, bool)>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        self.push(url, Ok(HttpResponse::new(status, body)));
        self
    }

    pub fn fail(self, url: impl Into<String>, err: HttpError) -> Self {
        self.push(url, Err(err));
        self
    }

    pub fn push(&self, url: impl Into<String>, result: Result<HttpResponse, HttpError>) {
        self.routes
            .lock()
            .unwrap()
            .entry(url.into())
            .or_default()
            .push_back(result);
    }

    /// Every `(url, follow_redirects)` pair requested so far.
    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(u, _)| u == url).count()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn get(&self, url: &str, follow_redirects: bool) -> Result<HttpResponse, HttpError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), follow_redirects));

        let mut routes = self.routes.lock().unwrap();
        let Some(queue) = routes.get_mut(url) else {
            return Err(HttpError::Request(format!("no scripted response for {url}")));
        };

        if queue.len() > 1 {
            queue.pop_front().unwrap_or_else(|| Err(HttpError::Request("empty".into())))
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(HttpError::Request("empty".into())))
        }
    }
}
