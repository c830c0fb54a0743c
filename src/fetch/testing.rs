//! Canned HTTP responses for exercising the fetch seam without a network.

use std::sync::Mutex;

use async_trait::async_trait;

use super::HttpClient;

pub(crate) struct CannedClient {
    routes: Vec<(String, u16, String)>,
    requests: Mutex<Vec<String>>,
}

impl CannedClient {
    pub(crate) fn new() -> Self {
        Self {
            routes: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers every URL containing `pattern` with `status` and `body`; first match wins.
    pub(crate) fn route(mut self, pattern: &str, status: u16, body: &str) -> Self {
        self.routes
            .push((pattern.to_string(), status, body.to_string()));
        self
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for CannedClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let url = req.url().to_string();
        self.requests.lock().unwrap().push(url.clone());

        let (status, body) = self
            .routes
            .iter()
            .find(|(pattern, _, _)| url.contains(pattern.as_str()))
            .map(|(_, status, body)| (*status, body.clone()))
            .unwrap_or((404, String::new()));

        let response = http::Response::builder()
            .status(status)
            .body(body)
            .unwrap();
        Ok(reqwest::Response::from(response))
    }
}
