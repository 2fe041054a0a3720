use serde::{Deserialize, Serialize};

use super::render_state::{LogEntry, RenderState, ToolInvocation};
use crate::types::Attachment;

pub const TRANSPORT_ERROR_BANNER: &str = "Connection error: the response may be incomplete.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TranscriptLine {
    Status(String),
    Thought(String),
    Error(String),
    Tool(ToolInvocation),
}

/// A finished assistant response, frozen for display and persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptEntry {
    pub session_id: String,
    pub user_message: String,
    pub attachments: Vec<Attachment>,
    pub answer_text: String,
    pub answer_html: String,
    pub log: Vec<TranscriptLine>,
    /// Last `error` event received from the backend.
    pub error: Option<String>,
    /// Set when the request or the stream itself failed.
    pub transport_error: Option<String>,
}

impl TranscriptEntry {
    pub fn freeze(
        state: RenderState,
        session_id: String,
        user_message: String,
        attachments: Vec<Attachment>,
        transport_error: Option<String>,
    ) -> Self {
        let log = state
            .log()
            .iter()
            .filter_map(|entry| match entry {
                LogEntry::Status(text) => Some(TranscriptLine::Status(text.clone())),
                LogEntry::Thought(text) => Some(TranscriptLine::Thought(text.clone())),
                LogEntry::Error(text) => Some(TranscriptLine::Error(text.clone())),
                LogEntry::Tool(order) => state.tools().get(*order).cloned().map(TranscriptLine::Tool),
            })
            .collect();

        Self {
            session_id,
            user_message,
            attachments,
            answer_text: state.answer_text().to_string(),
            answer_html: state.answer_html().to_string(),
            log,
            error: state.error().map(ToOwned::to_owned),
            transport_error,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some() || self.transport_error.is_some()
    }

    /// The banner a front end shows under the answer, if any.
    pub fn banner(&self) -> Option<&str> {
        if self.transport_error.is_some() {
            return Some(TRANSPORT_ERROR_BANNER);
        }
        self.error.as_deref()
    }

    pub fn tools(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.log.iter().filter_map(|line| match line {
            TranscriptLine::Tool(tool) => Some(tool),
            _ => None,
        })
    }

    pub fn status_lines(&self) -> impl Iterator<Item = &str> {
        self.log.iter().filter_map(|line| match line {
            TranscriptLine::Status(text) => Some(text.as_str()),
            _ => None,
        })
    }
}
