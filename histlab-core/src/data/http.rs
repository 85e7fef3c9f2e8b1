//! Blocking HTTP plumbing shared by the provider adapters.

use super::provider::DataError;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Per-request timeout for every adapter.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("histlab/", env!("CARGO_PKG_VERSION"));

pub(crate) fn build_client() -> Result<Client, DataError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))
}

/// Send a GET and map transport and status failures.
///
/// `context` names the request in errors; it must not carry credentials.
/// A 404 comes back as `Ok(None)`.
pub(crate) fn get(client: &Client, url: &str, context: &str) -> Result<Option<Response>, DataError> {
    let resp = client.get(url).send().map_err(|e| transport_error(e, context))?;

    let status = resp.status();
    match status {
        StatusCode::NOT_FOUND => Ok(None),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
            DataError::AuthenticationRequired(format!("{context} returned {status}")),
        ),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            })
        }
        s if !s.is_success() => Err(DataError::Http {
            status: s.as_u16(),
            context: context.to_string(),
        }),
        _ => Ok(Some(resp)),
    }
}

/// Request URLs carry API keys, so transport errors never echo them.
fn transport_error(e: reqwest::Error, context: &str) -> DataError {
    let connect = e.is_connect() || e.is_timeout();
    let e = e.without_url();
    if connect {
        DataError::NetworkUnreachable(format!("{context}: {e}"))
    } else {
        DataError::Other(format!("{context}: {e}"))
    }
}

/// GET and decode a JSON body. 404 → `Ok(None)`.
pub(crate) fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    context: &str,
) -> Result<Option<T>, DataError> {
    match get(client, url, context)? {
        None => Ok(None),
        Some(resp) => resp.json::<T>().map(Some).map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse {context}: {}", e.without_url()))
        }),
    }
}
