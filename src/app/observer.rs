use tokio::sync::mpsc;

use crate::state::{Applied, RenderState, ToolInvocation, TranscriptEntry};

/// Front-end hooks, called synchronously after each applied event.
///
/// Every method has a no-op default so a front end only implements what it shows.
pub trait ResponseObserver: Send {
    /// The request was accepted and nothing has been applied yet.
    fn on_waiting(&mut self) {}
    /// The first event of the response was applied; called before its own callback.
    fn on_first_output(&mut self) {}
    fn on_status(&mut self, _caption: &str) {}
    fn on_thought(&mut self, _delta: &str, _thought: &str) {}
    fn on_tool_update(&mut self, _tool: &ToolInvocation) {}
    fn on_answer_chunk(&mut self, _delta: &str, _answer_html: &str) {}
    fn on_error(&mut self, _message: &str) {}
    fn on_done(&mut self, _entry: &TranscriptEntry) {}
}

pub struct NoopObserver;

impl ResponseObserver for NoopObserver {}

/// Owned form of each observer callback, for front ends that drain a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseUpdate {
    Waiting,
    OutputStarted,
    Status(String),
    Thought { delta: String, thought: String },
    ToolUpdate(ToolInvocation),
    AnswerChunk { delta: String, answer_html: String },
    Error(String),
    Done(Box<TranscriptEntry>),
}

impl ResponseObserver for mpsc::UnboundedSender<ResponseUpdate> {
    fn on_waiting(&mut self) {
        let _ = self.send(ResponseUpdate::Waiting);
    }

    fn on_first_output(&mut self) {
        let _ = self.send(ResponseUpdate::OutputStarted);
    }

    fn on_status(&mut self, caption: &str) {
        let _ = self.send(ResponseUpdate::Status(caption.to_string()));
    }

    fn on_thought(&mut self, delta: &str, thought: &str) {
        let _ = self.send(ResponseUpdate::Thought {
            delta: delta.to_string(),
            thought: thought.to_string(),
        });
    }

    fn on_tool_update(&mut self, tool: &ToolInvocation) {
        let _ = self.send(ResponseUpdate::ToolUpdate(tool.clone()));
    }

    fn on_answer_chunk(&mut self, delta: &str, answer_html: &str) {
        let _ = self.send(ResponseUpdate::AnswerChunk {
            delta: delta.to_string(),
            answer_html: answer_html.to_string(),
        });
    }

    fn on_error(&mut self, message: &str) {
        let _ = self.send(ResponseUpdate::Error(message.to_string()));
    }

    fn on_done(&mut self, entry: &TranscriptEntry) {
        let _ = self.send(ResponseUpdate::Done(Box::new(entry.clone())));
    }
}

pub(crate) fn notify(state: &RenderState, applied: &Applied, observer: &mut dyn ResponseObserver) {
    match applied {
        Applied::Status => {
            if let Some(caption) = state.status() {
                observer.on_status(caption);
            }
        }
        Applied::Thought { delta } => observer.on_thought(delta, state.thought().unwrap_or("")),
        Applied::Tool { order } => {
            if let Some(tool) = state.tools().get(*order) {
                observer.on_tool_update(tool);
            }
        }
        Applied::Answer { delta } => observer.on_answer_chunk(delta, state.answer_html()),
        Applied::Error => {
            if let Some(message) = state.error() {
                observer.on_error(message);
            }
        }
    }
}
