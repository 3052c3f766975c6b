//! Shared request plumbing: transport error mapping and status checks.

use serde::de::DeserializeOwned;

use crate::error::ClientError;

/// Send a request, mapping transport failures to [`ClientError::Http`].
pub(crate) async fn send(
    request: reqwest::RequestBuilder,
    endpoint: &str,
) -> Result<reqwest::Response, ClientError> {
    request.send().await.map_err(|e| ClientError::Http {
        endpoint: endpoint.to_string(),
        source: e,
    })
}

/// Fail with [`ClientError::Api`] unless the response is 2xx.
pub(crate) async fn ensure_success(
    resp: reqwest::Response,
    endpoint: &str,
) -> Result<reqwest::Response, ClientError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::Api {
        endpoint: endpoint.to_string(),
        status,
        body: truncate(body),
    })
}

/// Check the status and decode a JSON body.
pub(crate) async fn decode<T: DeserializeOwned>(
    resp: reqwest::Response,
    endpoint: &str,
) -> Result<T, ClientError> {
    let resp = ensure_success(resp, endpoint).await?;
    let bytes = resp.bytes().await.map_err(|e| ClientError::Http {
        endpoint: endpoint.to_string(),
        source: e,
    })?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Deserialization {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}

/// Error bodies can be whole HTML pages from a proxy; keep the log readable.
fn truncate(mut body: String) -> String {
    const MAX: usize = 512;
    if body.len() > MAX {
        let mut cut = MAX;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}
