use thiserror::Error;

/// Transport-level failures talking to the backend.
///
/// These end a response in a degraded state; they never abort the client.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to reach {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("stream from {url} broke off: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("stream closed unexpectedly: {0}")]
    Closed(String),
}

pub fn map_api_request_error(error: reqwest::Error, request_url: &str) -> TransportError {
    let url = request_url.to_string();
    if let Some(status) = error.status() {
        return TransportError::Status {
            url,
            status: status.as_u16(),
        };
    }
    if error.is_body() || error.is_decode() {
        return TransportError::Body { url, source: error };
    }
    TransportError::Connect { url, source: error }
}
