use futures::StreamExt;
use tracing::{debug, info};

use super::context::BusyGuard;
use super::observer::{notify, ResponseObserver};
use crate::api::{ByteStream, StreamParser};
use crate::error::TransportError;
use crate::state::{RenderState, TranscriptEntry};
use crate::types::{Attachment, StreamEvent};

/// One in-flight assistant response.
///
/// Holds the busy flag of its [`ChatContext`](super::ChatContext) until it is
/// finalized or dropped, so at most one exists per context.
pub struct ResponseTurn {
    session_id: String,
    message: String,
    attachments: Vec<Attachment>,
    parser: StreamParser,
    state: RenderState,
    _busy: BusyGuard,
}

impl ResponseTurn {
    pub(crate) fn new(
        busy: BusyGuard,
        session_id: String,
        message: String,
        attachments: Vec<Attachment>,
        max_line_bytes: usize,
    ) -> Self {
        Self {
            session_id,
            message,
            attachments,
            parser: StreamParser::with_max_line_bytes(max_line_bytes),
            state: RenderState::new(),
            _busy: busy,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Feeds raw bytes; complete records are applied in arrival order.
    /// Returns how many events changed the state.
    pub fn ingest(&mut self, chunk: &[u8], observer: &mut dyn ResponseObserver) -> usize {
        let mut applied = 0;
        for event in self.parser.process(chunk) {
            if self.apply_event(event, observer) {
                applied += 1;
            }
        }
        applied
    }

    pub fn apply_event(&mut self, event: StreamEvent, observer: &mut dyn ResponseObserver) -> bool {
        let had_output = self.state.has_output();
        match self.state.apply(event) {
            Some(applied) => {
                if !had_output {
                    observer.on_first_output();
                }
                notify(&self.state, &applied, observer);
                true
            }
            None => false,
        }
    }

    /// Reads the stream to its end. A transport failure stops reading and is
    /// returned; everything applied before it is kept.
    pub async fn consume(
        &mut self,
        mut stream: ByteStream,
        observer: &mut dyn ResponseObserver,
    ) -> Result<(), TransportError> {
        while let Some(item) = stream.next().await {
            let chunk = item?;
            self.ingest(&chunk, observer);
        }
        Ok(())
    }

    /// Freezes the response and releases the busy flag.
    pub fn finalize(
        mut self,
        transport_error: Option<String>,
        observer: &mut dyn ResponseObserver,
    ) -> TranscriptEntry {
        let leftover = self.parser.flush();
        if !leftover.trim().is_empty() {
            debug!(bytes = leftover.len(), "discarding unterminated stream record");
        }
        let stats = self.parser.stats();

        let entry = TranscriptEntry::freeze(
            self.state,
            self.session_id,
            self.message,
            self.attachments,
            transport_error,
        );
        info!(
            session_id = %entry.session_id,
            events = stats.events,
            dropped = stats.ignored_lines + stats.malformed_lines + stats.oversized_lines,
            tools = entry.tools().count(),
            degraded = entry.is_degraded(),
            "response finalized"
        );
        observer.on_done(&entry);
        entry
    }
}
