use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const UNKNOWN_TOOL_NAME: &str = "Unknown";

/// Body of `POST /api/v1/chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
    pub file_hashes: Vec<String>,
    pub audit_mode: String,
    pub custom_tools: Vec<CustomTool>,
    pub mcp_servers: Vec<McpServer>,
}

/// A previously uploaded document referenced by content hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub hash: String,
    pub name: String,
}

/// User-defined HTTP tool forwarded to the backend agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomTool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub desc: String,
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<String>>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

/// MCP server launch description forwarded to the backend agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpServer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// `stdio` or `sse`.
    #[serde(rename = "type")]
    pub transport: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// Row of `GET /api/v1/chat/sessions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl SessionSummary {
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or("New chat")
    }
}

/// Body of `GET /api/v1/chat/sessions/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionDetail {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Stored history may arrive as an array or as JSON text; anything
    /// unreadable becomes an empty history.
    #[serde(default, deserialize_with = "deserialize_history")]
    pub history: Vec<HistoryMessage>,
}

impl SessionDetail {
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            history: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Value>,
    #[serde(default)]
    pub thought_process: Vec<Value>,
}

fn deserialize_history<'de, D>(deserializer: D) -> Result<Vec<HistoryMessage>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Value::deserialize(deserializer)? {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::Null),
        other => other,
    };
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

/// One decoded `data: {"event": ..., "payload": ...}` record.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    StatusUpdate {
        text: String,
    },
    ThoughtDelta {
        delta: String,
    },
    ToolStart {
        id: String,
        name: String,
        input: Value,
    },
    ToolEnd {
        id: String,
        /// Present when the backend repeats the tool name on completion.
        name: Option<String>,
        output: Value,
    },
    AnswerDelta {
        delta: String,
    },
    Error {
        message: String,
    },
    /// Any kind this client does not render, e.g. the backend's trailing `done`.
    Unknown {
        kind: String,
    },
}

#[derive(Debug, Deserialize)]
struct WireRecord {
    event: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeltaPayload {
    delta: String,
}

#[derive(Debug, Deserialize)]
struct ToolStartPayload {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Value,
}

#[derive(Debug, Deserialize)]
struct ToolEndPayload {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    output: Value,
}

impl StreamEvent {
    /// Decodes the JSON text that follows the `data: ` marker.
    ///
    /// A payload whose shape does not match its kind is an error, the same as
    /// malformed JSON: the caller drops the record.
    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        let record: WireRecord = serde_json::from_str(data)?;
        let event = match record.event.as_str() {
            "status_update" => {
                let payload: StatusPayload = serde_json::from_value(record.payload)?;
                StreamEvent::StatusUpdate {
                    text: payload.text.unwrap_or_default(),
                }
            }
            "thought_delta" => {
                let payload: DeltaPayload = serde_json::from_value(record.payload)?;
                StreamEvent::ThoughtDelta {
                    delta: payload.delta,
                }
            }
            "tool_start" => {
                let payload: ToolStartPayload = serde_json::from_value(record.payload)?;
                StreamEvent::ToolStart {
                    id: payload.id,
                    name: payload
                        .name
                        .filter(|name| !name.is_empty())
                        .unwrap_or_else(|| UNKNOWN_TOOL_NAME.to_string()),
                    input: payload.input,
                }
            }
            "tool_end" => {
                let payload: ToolEndPayload = serde_json::from_value(record.payload)?;
                StreamEvent::ToolEnd {
                    id: payload.id,
                    name: payload.name.filter(|name| !name.is_empty()),
                    output: payload.output,
                }
            }
            "answer_delta" => {
                let payload: DeltaPayload = serde_json::from_value(record.payload)?;
                StreamEvent::AnswerDelta {
                    delta: payload.delta,
                }
            }
            "error" => StreamEvent::Error {
                message: error_payload_text(&record.payload),
            },
            other => StreamEvent::Unknown {
                kind: other.to_string(),
            },
        };
        Ok(event)
    }

    pub fn kind(&self) -> &str {
        match self {
            StreamEvent::StatusUpdate { .. } => "status_update",
            StreamEvent::ThoughtDelta { .. } => "thought_delta",
            StreamEvent::ToolStart { .. } => "tool_start",
            StreamEvent::ToolEnd { .. } => "tool_end",
            StreamEvent::AnswerDelta { .. } => "answer_delta",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Unknown { kind } => kind,
        }
    }
}

/// Error payloads are either a bare string or any serializable object.
pub fn error_payload_text(payload: &Value) -> String {
    match payload {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_start_defaults_name_and_input() {
        let event =
            StreamEvent::from_json(r#"{"event":"tool_start","payload":{"id":"t1"}}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::ToolStart {
                id: "t1".to_string(),
                name: UNKNOWN_TOOL_NAME.to_string(),
                input: Value::Null,
            }
        );
    }

    #[test]
    fn test_tool_end_carries_optional_name() {
        let named = StreamEvent::from_json(
            r#"{"event":"tool_end","payload":{"id":"run-9","name":"rag_search","output":"3 docs","status":"completed"}}"#,
        )
        .unwrap();
        assert_eq!(
            named,
            StreamEvent::ToolEnd {
                id: "run-9".to_string(),
                name: Some("rag_search".to_string()),
                output: json!("3 docs"),
            }
        );

        let blank = StreamEvent::from_json(
            r#"{"event":"tool_end","payload":{"id":"run-9","name":"","output":"x"}}"#,
        )
        .unwrap();
        assert!(matches!(blank, StreamEvent::ToolEnd { name: None, .. }));
    }

    #[test]
    fn test_error_payload_accepts_string_or_object() {
        let text = StreamEvent::from_json(r#"{"event":"error","payload":"boom"}"#).unwrap();
        assert_eq!(
            text,
            StreamEvent::Error {
                message: "boom".to_string()
            }
        );

        let object =
            StreamEvent::from_json(r#"{"event":"error","payload":{"code":500}}"#).unwrap();
        assert_eq!(
            object,
            StreamEvent::Error {
                message: r#"{"code":500}"#.to_string()
            }
        );
    }

    #[test]
    fn test_unknown_kind_is_preserved_not_rejected() {
        let event = StreamEvent::from_json(r#"{"event":"done","payload":""}"#).unwrap();
        assert_eq!(event.kind(), "done");
    }

    #[test]
    fn test_mismatched_payload_shape_is_an_error() {
        assert!(StreamEvent::from_json(r#"{"event":"answer_delta","payload":{"text":"x"}}"#)
            .is_err());
        assert!(StreamEvent::from_json(r#"{"payload":{"delta":"x"}}"#).is_err());
    }

    #[test]
    fn test_mcp_server_type_field_and_enabled_default() {
        let server: McpServer = serde_json::from_value(json!({
            "name": "fs",
            "type": "stdio",
            "command": "mcp-fs"
        }))
        .unwrap();
        assert_eq!(server.transport, "stdio");
        assert!(server.enabled);

        let encoded = serde_json::to_value(&server).unwrap();
        assert_eq!(encoded["type"], "stdio");
        assert!(encoded.get("args").is_none());
    }

    #[test]
    fn test_session_title_falls_back_when_blank() {
        let session = SessionSummary {
            id: "s1".to_string(),
            title: Some("  ".to_string()),
            created_at: None,
            updated_at: None,
        };
        assert_eq!(session.display_title(), "New chat");
    }

    #[test]
    fn test_session_detail_accepts_history_as_text_or_array() {
        let as_array: SessionDetail = serde_json::from_value(json!({
            "id": "s1",
            "title": "Subsidy",
            "history": [{"role": "user", "content": "hi"}, {"role": "assistant", "content": "hello"}]
        }))
        .unwrap();
        assert_eq!(as_array.history.len(), 2);
        assert_eq!(as_array.history[1].role, "assistant");

        let as_text: SessionDetail = serde_json::from_value(json!({
            "id": "s1",
            "history": "[{\"role\":\"user\",\"content\":\"hi\"}]"
        }))
        .unwrap();
        assert_eq!(as_text.history[0].content, "hi");

        let broken: SessionDetail =
            serde_json::from_value(json!({"id": "s1", "history": "not json"})).unwrap();
        assert!(broken.history.is_empty());
    }
}
