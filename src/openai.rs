//! Shared plumbing for OpenAI-compatible HTTP endpoints.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Error payload returned by OpenAI-compatible APIs.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// A non-success HTTP response, reduced to what callers classify on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ApiFailure {
    pub status: u16,
    pub code: Option<String>,
    pub message: String,
}

/// Build a client that sends the bearer token and JSON content type on every request.
pub(crate) fn http_client(api_key: &SecretString) -> Result<reqwest::Client, String> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
        .map_err(|e| format!("API key is not a valid header value: {e}"))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);

    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .map_err(|e| format!("failed to build HTTP client: {e}"))
}

/// Read the body of a failed response and extract message and error code.
pub(crate) async fn read_failure(response: reqwest::Response) -> ApiFailure {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    parse_failure(status, &body)
}

pub(crate) fn parse_failure(status: u16, body: &str) -> ApiFailure {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) => ApiFailure {
            status,
            code: parsed.error.code,
            message: parsed.error.message,
        },
        Err(_) => ApiFailure {
            status,
            code: None,
            message: body.to_string(),
        },
    }
}
