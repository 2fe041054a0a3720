use crate::api::client::{ByteStream, ChatBackend};
use crate::error::TransportError;
use crate::types::{ChatRequest, SessionDetail, SessionSummary};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::stream;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Chunk = Result<Bytes, TransportError>;

enum MockResponse {
    Chunks(Vec<Chunk>),
    Refused(String),
    Live(mpsc::UnboundedReceiver<Chunk>),
}

/// Formats one wire record: `data: {"event": ..., "payload": ...}\n`.
pub fn sse_record(event: &str, payload: Value) -> String {
    format!("data: {}\n", json!({ "event": event, "payload": payload }))
}

/// Sender side of a response stream that stays open until closed.
pub struct LiveStream {
    tx: mpsc::UnboundedSender<Chunk>,
}

impl LiveStream {
    pub fn send(&self, chunk: impl Into<String>) {
        let _ = self.tx.unbounded_send(Ok(Bytes::from(chunk.into())));
    }

    pub fn fail(&self, message: impl Into<String>) {
        let _ = self
            .tx
            .unbounded_send(Err(TransportError::Closed(message.into())));
    }

    pub fn close(self) {
        self.tx.close_channel();
    }
}

/// Scripted backend: each `open_stream` call consumes the next queued response.
#[derive(Clone, Default)]
pub struct MockBackend {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    sessions: Arc<Mutex<Vec<SessionSummary>>>,
    session_list_fails: Arc<Mutex<bool>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    session_list_calls: Arc<Mutex<usize>>,
    details: Arc<Mutex<HashMap<String, SessionDetail>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues raw chunks delivered exactly as given, newlines included.
    pub fn push_chunks<I, S>(&self, chunks: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let chunks = chunks
            .into_iter()
            .map(|chunk| Ok(Bytes::from(chunk.into())))
            .collect();
        lock(&self.responses).push_back(MockResponse::Chunks(chunks));
    }

    /// Queues one chunk per `(event, payload)` record.
    pub fn push_events<'a, I>(&self, records: I)
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        self.push_chunks(
            records
                .into_iter()
                .map(|(event, payload)| sse_record(event, payload)),
        );
    }

    /// Queues chunks followed by a mid-stream transport failure.
    pub fn push_broken_stream<I, S>(&self, chunks: I, message: &str)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut items: Vec<Chunk> = chunks
            .into_iter()
            .map(|chunk| Ok(Bytes::from(chunk.into())))
            .collect();
        items.push(Err(TransportError::Closed(message.to_string())));
        lock(&self.responses).push_back(MockResponse::Chunks(items));
    }

    /// Queues a request that fails before any byte arrives.
    pub fn push_refusal(&self, message: &str) {
        lock(&self.responses).push_back(MockResponse::Refused(message.to_string()));
    }

    /// Queues a stream fed by the returned handle.
    pub fn push_live(&self) -> LiveStream {
        let (tx, rx) = mpsc::unbounded();
        lock(&self.responses).push_back(MockResponse::Live(rx));
        LiveStream { tx }
    }

    pub fn set_sessions(&self, sessions: Vec<SessionSummary>) {
        *lock(&self.sessions) = sessions;
    }

    pub fn set_session_detail(&self, detail: SessionDetail) {
        lock(&self.details).insert(detail.id.clone(), detail);
    }

    pub fn fail_session_list(&self, fail: bool) {
        *lock(&self.session_list_fails) = fail;
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    pub fn session_list_calls(&self) -> usize {
        *lock(&self.session_list_calls)
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        lock(&self.requests).push(request.clone());
        let next = lock(&self.responses).pop_front();
        match next {
            Some(MockResponse::Chunks(chunks)) => Ok(Box::pin(stream::iter(chunks))),
            Some(MockResponse::Live(rx)) => Ok(Box::pin(rx)),
            Some(MockResponse::Refused(message)) => Err(TransportError::Closed(message)),
            None => Err(TransportError::Closed(
                "MockBackend: no more responses configured".to_string(),
            )),
        }
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        *lock(&self.session_list_calls) += 1;
        if *lock(&self.session_list_fails) {
            return Err(anyhow!("MockBackend: session list unavailable"));
        }
        Ok(lock(&self.sessions).clone())
    }

    async fn session_history(&self, session_id: &str) -> Result<SessionDetail> {
        lock(&self.details)
            .get(session_id)
            .cloned()
            .ok_or_else(|| anyhow!("MockBackend: session {session_id} not found"))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
