use crate::config::Config;
use crate::error::{map_api_request_error, TransportError};
use crate::logging::{debug_payload_enabled, emit_debug_payload};
use crate::types::{ChatRequest, SessionDetail, SessionSummary};
use crate::util::{is_local_endpoint_url, join_api_path};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

pub const COMPLETIONS_PATH: &str = "/api/v1/chat/completions";
pub const SESSIONS_PATH: &str = "/api/v1/chat/sessions";

/// The parts of the backend the response assembler talks to.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Starts a completion and returns its raw event stream.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError>;

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>>;

    /// Stored messages of one session.
    async fn session_history(&self, session_id: &str) -> Result<SessionDetail>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    api_url: String,
    api_token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_token: config.api_token.clone(),
        })
    }

    pub fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.api_url)
    }

    fn endpoint(&self, path: &str) -> String {
        join_api_path(&self.api_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.header("authorization", format!("Bearer {token}")),
            None => request,
        }
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        let request_url = self.endpoint(COMPLETIONS_PATH);

        if debug_payload_enabled() {
            emit_debug_payload(&request_url, request);
        }

        let response = self
            .authorize(
                self.http
                    .post(&request_url)
                    .header("content-type", "application/json")
                    .header("accept", "text/event-stream")
                    .json(request),
            )
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_api_request_error(error, &request_url))?;

        let request_url_for_stream = request_url.clone();
        let stream = response.bytes_stream().map(move |item| {
            item.map_err(|error| map_api_request_error(error, &request_url_for_stream))
        });
        Ok(Box::pin(stream))
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let request_url = self.endpoint(SESSIONS_PATH);
        let sessions = self
            .authorize(self.http.get(&request_url))
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_api_request_error(error, &request_url))?
            .json::<Vec<SessionSummary>>()
            .await
            .with_context(|| format!("invalid session list from {request_url}"))?;
        Ok(sessions)
    }

    async fn session_history(&self, session_id: &str) -> Result<SessionDetail> {
        let request_url = self.endpoint(&format!("{SESSIONS_PATH}/{session_id}"));
        let detail = self
            .authorize(self.http.get(&request_url))
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_api_request_error(error, &request_url))?
            .json::<SessionDetail>()
            .await
            .with_context(|| format!("invalid session detail from {request_url}"))?;
        Ok(detail)
    }
}
