use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::render::render_markdown;
use crate::types::{StreamEvent, UNKNOWN_TOOL_NAME};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Running,
    Completed,
}

/// A server-side tool call reported for transparency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub input: Value,
    /// Absent until `tool_end`.
    pub output: Option<Value>,
    pub status: ToolStatus,
    /// Position among the tools of this response, by first appearance.
    pub order: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    Status(String),
    /// The single running thought buffer, kept where it first appeared.
    Thought(String),
    Error(String),
    /// Index into [`RenderState::tools`].
    Tool(usize),
}

/// What a successfully applied event changed.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Status,
    Thought { delta: String },
    Tool { order: usize },
    Answer { delta: String },
    Error,
}

/// Accumulator for one assistant response.
#[derive(Debug, Default)]
pub struct RenderState {
    status: Option<String>,
    log: Vec<LogEntry>,
    thought_slot: Option<usize>,
    tools: Vec<ToolInvocation>,
    tool_slots: HashMap<String, usize>,
    answer_text: String,
    answer_html: String,
    error: Option<String>,
    applied_events: usize,
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event. Returns `None` when the event leaves the state untouched.
    pub fn apply(&mut self, event: StreamEvent) -> Option<Applied> {
        let applied = match event {
            StreamEvent::StatusUpdate { text } => self.apply_status(text),
            StreamEvent::ThoughtDelta { delta } => Some(self.apply_thought(delta)),
            StreamEvent::ToolStart { id, name, input } => {
                Some(self.apply_tool_start(id, name, input))
            }
            StreamEvent::ToolEnd { id, name, output } => {
                Some(self.apply_tool_end(id, name, output))
            }
            StreamEvent::AnswerDelta { delta } => Some(self.apply_answer(delta)),
            StreamEvent::Error { message } => Some(self.apply_error(message)),
            StreamEvent::Unknown { kind } => {
                debug!(kind = %kind, "ignoring unhandled stream event kind");
                None
            }
        };
        if applied.is_some() {
            self.applied_events += 1;
        }
        applied
    }

    fn apply_status(&mut self, text: String) -> Option<Applied> {
        if text.is_empty() {
            return None;
        }
        self.status = Some(text.clone());
        self.log.push(LogEntry::Status(text));
        Some(Applied::Status)
    }

    fn apply_thought(&mut self, delta: String) -> Applied {
        match self.thought_slot.and_then(|slot| self.log.get_mut(slot)) {
            Some(LogEntry::Thought(buffer)) => buffer.push_str(&delta),
            _ => {
                self.thought_slot = Some(self.log.len());
                self.log.push(LogEntry::Thought(delta.clone()));
            }
        }
        Applied::Thought { delta }
    }

    fn apply_tool_start(&mut self, id: String, name: String, input: Value) -> Applied {
        if let Some(&order) = self.tool_slots.get(&id) {
            let tool = &mut self.tools[order];
            tool.name = name;
            tool.input = input;
            tool.output = None;
            tool.status = ToolStatus::Running;
            return Applied::Tool { order };
        }

        let order = self.push_tool(ToolInvocation {
            id,
            name,
            input,
            output: None,
            status: ToolStatus::Running,
            order: self.tools.len(),
        });
        Applied::Tool { order }
    }

    fn apply_tool_end(
        &mut self,
        id: String,
        name: Option<String>,
        output: Value,
    ) -> Applied {
        if let Some(&order) = self.tool_slots.get(&id) {
            let tool = &mut self.tools[order];
            tool.output = Some(output);
            tool.status = ToolStatus::Completed;
            return Applied::Tool { order };
        }

        // Server ordering is not guaranteed; an unseen id still gets a row.
        debug!(tool_id = %id, "tool_end without tool_start, creating completed entry");
        let order = self.push_tool(ToolInvocation {
            id,
            name: name.unwrap_or_else(|| UNKNOWN_TOOL_NAME.to_string()),
            input: Value::Null,
            output: Some(output),
            status: ToolStatus::Completed,
            order: self.tools.len(),
        });
        Applied::Tool { order }
    }

    fn push_tool(&mut self, tool: ToolInvocation) -> usize {
        let order = tool.order;
        self.tool_slots.insert(tool.id.clone(), order);
        self.tools.push(tool);
        self.log.push(LogEntry::Tool(order));
        order
    }

    fn apply_answer(&mut self, delta: String) -> Applied {
        self.answer_text.push_str(&delta);
        self.answer_html = render_markdown(&self.answer_text);
        Applied::Answer { delta }
    }

    fn apply_error(&mut self, message: String) -> Applied {
        self.log.push(LogEntry::Error(message.clone()));
        self.error = Some(message);
        Applied::Error
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn thought(&self) -> Option<&str> {
        match self.thought_slot.and_then(|slot| self.log.get(slot)) {
            Some(LogEntry::Thought(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn tools(&self) -> &[ToolInvocation] {
        &self.tools
    }

    pub fn tool(&self, id: &str) -> Option<&ToolInvocation> {
        self.tool_slots.get(id).map(|&order| &self.tools[order])
    }

    pub fn answer_text(&self) -> &str {
        &self.answer_text
    }

    pub fn answer_html(&self) -> &str {
        &self.answer_html
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn applied_events(&self) -> usize {
        self.applied_events
    }

    /// True once any event has been applied; front ends drop their waiting indicator.
    pub fn has_output(&self) -> bool {
        self.applied_events > 0
    }
}
