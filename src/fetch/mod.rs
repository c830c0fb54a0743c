mod api;
mod basic;
mod client;
pub mod auth;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{
    ELEVATOR_INFO_NAME, INCIDENT_LONG_NAME, INCIDENT_SHORT_NAME, WienerLinienApi,
};
pub use basic::{BasicClient, DEFAULT_REQUEST_TIMEOUT};
pub use client::HttpClient;

use reqwest::Url;
use tracing::debug;

use crate::error::{EngineError, Endpoint};

/// Issues a GET to `url` and returns the body of a 2xx response.
///
/// # Errors
///
/// [`EngineError::Fetch`] on transport failure or timeout,
/// [`EngineError::HttpStatus`] for any non-2xx answer.
#[tracing::instrument(skip_all, fields(endpoint = %endpoint, url = %url))]
pub async fn fetch_bytes<C: HttpClient + ?Sized>(
    client: &C,
    endpoint: Endpoint,
    url: Url,
) -> Result<Vec<u8>, EngineError> {
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    let resp = client
        .execute(req)
        .await
        .map_err(|source| EngineError::Fetch { endpoint, source })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(EngineError::HttpStatus { endpoint, status });
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|source| EngineError::Fetch { endpoint, source })?;
    debug!(bytes = bytes.len(), "Response received");
    Ok(bytes.to_vec())
}
