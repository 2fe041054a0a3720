use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::assembler::ResponseTurn;
use super::observer::ResponseObserver;
use crate::api::stream::DEFAULT_MAX_LINE_BYTES;
use crate::api::{ApiClient, ChatBackend};
use crate::config::Config;
use crate::settings::AppSettings;
use crate::state::TranscriptEntry;
use crate::types::{Attachment, ChatRequest, SessionDetail, SessionSummary};

/// Why `submit` did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Blank message and no attachments.
    EmptyInput,
    /// Another response is still streaming.
    Busy,
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Completed(TranscriptEntry),
    Rejected(Rejection),
}

/// Held by the active [`ResponseTurn`]; clears the flag on drop.
pub(crate) struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Application state shared by the assembler and the session list.
pub struct ChatContext {
    backend: Arc<dyn ChatBackend>,
    settings: AppSettings,
    session_id: String,
    busy: Arc<AtomicBool>,
    max_line_bytes: usize,
    sessions: Mutex<Vec<SessionSummary>>,
}

impl ChatContext {
    pub fn new(backend: Arc<dyn ChatBackend>, settings: AppSettings) -> Self {
        Self {
            backend,
            settings,
            session_id: new_session_id(),
            busy: Arc::new(AtomicBool::new(false)),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = AppSettings::load(config.settings_path.as_deref())?;
        let client = ApiClient::new(config)?;
        Ok(Self::new(Arc::new(client), settings).with_max_line_bytes(config.max_line_bytes))
    }

    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Starts a fresh conversation. Refused while a response is streaming.
    pub fn new_session(&mut self) -> bool {
        self.switch_session(new_session_id())
    }

    /// Continues an existing conversation. Refused while a response is streaming.
    pub fn switch_session(&mut self, session_id: String) -> bool {
        if self.is_busy() {
            return false;
        }
        debug!(from = %self.session_id, to = %session_id, "switching session");
        self.session_id = session_id;
        true
    }

    /// Switches to `session_id`, refreshes the list and loads its stored
    /// messages. `Ok(None)` means the switch happened but the history could
    /// not be loaded.
    pub async fn open_session(
        &mut self,
        session_id: String,
    ) -> Result<Option<SessionDetail>, Rejection> {
        if !self.switch_session(session_id) {
            return Err(Rejection::Busy);
        }
        self.refresh_sessions().await;
        match self.backend.session_history(&self.session_id).await {
            Ok(detail) => Ok(Some(detail)),
            Err(error) => {
                warn!(session_id = %self.session_id, error = %error, "failed to load session history");
                Ok(None)
            }
        }
    }

    /// Validates the input and takes the busy flag.
    pub fn begin_turn(
        &self,
        message: &str,
        attachments: &[Attachment],
    ) -> Result<ResponseTurn, Rejection> {
        let message = message.trim();
        if message.is_empty() && attachments.is_empty() {
            return Err(Rejection::EmptyInput);
        }
        let busy = BusyGuard::acquire(&self.busy).ok_or(Rejection::Busy)?;

        Ok(ResponseTurn::new(
            busy,
            self.session_id.clone(),
            message.to_string(),
            attachments.to_vec(),
            self.max_line_bytes,
        ))
    }

    pub fn build_request(&self, turn: &ResponseTurn) -> ChatRequest {
        ChatRequest {
            message: turn.message().to_string(),
            session_id: turn.session_id().to_string(),
            file_hashes: turn
                .attachments()
                .iter()
                .map(|attachment| attachment.hash.clone())
                .collect(),
            audit_mode: self.settings.audit_mode.clone(),
            custom_tools: self.settings.active_custom_tools(),
            mcp_servers: self.settings.active_mcp_servers(),
        }
    }

    /// Sends one message and assembles the streamed response.
    ///
    /// Transport failures never surface as errors here: they end the response
    /// in a degraded state that the returned entry reports.
    pub async fn submit(
        &self,
        message: &str,
        attachments: &[Attachment],
        observer: &mut dyn ResponseObserver,
    ) -> SubmitOutcome {
        let mut turn = match self.begin_turn(message, attachments) {
            Ok(turn) => turn,
            Err(rejection) => {
                debug!(?rejection, "submission ignored");
                return SubmitOutcome::Rejected(rejection);
            }
        };

        let request = self.build_request(&turn);
        info!(
            session_id = %request.session_id,
            attachments = request.file_hashes.len(),
            custom_tools = request.custom_tools.len(),
            mcp_servers = request.mcp_servers.len(),
            "submitting message"
        );

        observer.on_waiting();
        let outcome = match self.backend.open_stream(&request).await {
            Ok(stream) => turn.consume(stream, observer).await,
            Err(error) => Err(error),
        };
        let transport_error = match outcome {
            Ok(()) => None,
            Err(error) => {
                warn!(error = %error, "response stream failed");
                Some(error.to_string())
            }
        };

        let entry = turn.finalize(transport_error, observer);
        self.refresh_sessions().await;
        SubmitOutcome::Completed(entry)
    }

    /// Reloads the session list; titles may have been updated server-side.
    /// On failure the previous list is kept.
    pub async fn refresh_sessions(&self) -> bool {
        match self.backend.list_sessions().await {
            Ok(sessions) => {
                *self
                    .sessions
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = sessions;
                true
            }
            Err(error) => {
                warn!(error = %error, "failed to refresh session list");
                false
            }
        }
    }

    pub fn sessions(&self) -> Vec<SessionSummary> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}
