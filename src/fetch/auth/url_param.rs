use crate::fetch::client::HttpClient;
use async_trait::async_trait;

/// Query parameter carrying the API credential.
pub const SENDER_PARAM: &str = "sender";

/// An [`HttpClient`] wrapper that appends a credential as a URL query parameter.
///
/// With `key: None` requests pass through untouched, for deployments that need
/// no credential.
pub struct UrlParam<C> {
    pub inner: C,
    pub param_name: String,
    pub key: Option<String>,
}

impl<C> UrlParam<C> {
    /// Sends `key` as `sender=<key>`.
    pub fn sender(inner: C, key: Option<String>) -> Self {
        Self {
            inner,
            param_name: SENDER_PARAM.to_string(),
            key,
        }
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for UrlParam<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        if let Some(key) = &self.key {
            req.url_mut()
                .query_pairs_mut()
                .append_pair(&self.param_name, key);
        }
        self.inner.execute(req).await
    }
}
