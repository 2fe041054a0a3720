use chatdesk::api::stream::StreamParser;
use chatdesk::state::RenderState;
use chatdesk::types::StreamEvent;
use serde_json::json;

#[test]
fn test_fragmented_record_waits_for_newline() {
    let mut parser = StreamParser::new();

    let chunk1 = b"data: {\"event\":\"answer_delta\",\"pay";
    assert!(parser.process(chunk1).is_empty());

    let chunk2 = b"load\":{\"delta\":\"Hi\"}}";
    assert!(parser.process(chunk2).is_empty());

    let events = parser.process(b"\n");
    assert_eq!(
        events,
        vec![StreamEvent::AnswerDelta {
            delta: "Hi".to_string()
        }]
    );
}

#[test]
fn test_multiple_records_in_one_chunk_keep_order() {
    let mut parser = StreamParser::new();
    let chunk = b"data: {\"event\":\"status_update\",\"payload\":{\"text\":\"thinking\"}}\n\
data: {\"event\":\"answer_delta\",\"payload\":{\"delta\":\"a\"}}\n\
data: {\"event\":\"answer_delta\",\"payload\":{\"delta\":\"b\"}}\n";

    let events = parser.process(chunk);
    let kinds: Vec<_> = events.iter().map(StreamEvent::kind).collect();
    assert_eq!(kinds, vec!["status_update", "answer_delta", "answer_delta"]);
}

#[test]
fn test_multibyte_character_split_across_chunks() {
    let mut parser = StreamParser::new();
    let record = "data: {\"event\":\"answer_delta\",\"payload\":{\"delta\":\"政策\"}}\n";
    let bytes = record.as_bytes();
    let split = record.find('政').unwrap() + 1;

    assert!(parser.process(&bytes[..split]).is_empty());
    let events = parser.process(&bytes[split..]);
    assert_eq!(
        events,
        vec![StreamEvent::AnswerDelta {
            delta: "政策".to_string()
        }]
    );
}

#[test]
fn test_parse_error_drops_only_that_record() {
    let mut parser = StreamParser::new();

    let chunk = b"data: {invalid json}\n\
data: {\"event\":\"answer_delta\",\"payload\":{\"delta\":\"still here\"}}\n";
    let events = parser.process(chunk);
    assert_eq!(events.len(), 1);
    assert_eq!(parser.stats().malformed_lines, 1);
}

#[test]
fn test_lines_without_data_marker_are_ignored() {
    let mut parser = StreamParser::new();
    let chunk = b"event: answer_delta\n\
data:{\"event\":\"answer_delta\",\"payload\":{\"delta\":\"no space\"}}\n\
: comment\n\
\n";
    assert!(parser.process(chunk).is_empty());
    assert_eq!(parser.stats().ignored_lines, 3);
}

#[test]
fn test_tool_records_decode_payloads() {
    let mut parser = StreamParser::new();
    let start = format!(
        "data: {}\n",
        json!({"event": "tool_start", "payload": {"id": "run-1", "name": "rag_search", "input": {"query": "subsidy"}}})
    );
    let end = format!(
        "data: {}\n",
        json!({"event": "tool_end", "payload": {"id": "run-1", "name": "rag_search", "output": "3 documents"}})
    );

    let mut events = parser.process(start.as_bytes());
    events.extend(parser.process(end.as_bytes()));

    assert_eq!(
        events,
        vec![
            StreamEvent::ToolStart {
                id: "run-1".to_string(),
                name: "rag_search".to_string(),
                input: json!({"query": "subsidy"}),
            },
            StreamEvent::ToolEnd {
                id: "run-1".to_string(),
                name: Some("rag_search".to_string()),
                output: json!("3 documents"),
            },
        ]
    );
}

#[test]
fn test_unterminated_trailing_record_is_never_parsed() {
    let mut parser = StreamParser::new();
    let events =
        parser.process(b"data: {\"event\":\"answer_delta\",\"payload\":{\"delta\":\"tail\"}}");
    assert!(events.is_empty());
    assert!(!parser.flush().is_empty());
    assert_eq!(parser.stats().events, 0);
}

#[test]
fn test_orphan_tool_end_keeps_backend_tool_name() {
    let mut parser = StreamParser::new();
    let mut state = RenderState::new();
    let line = b"data: {\"event\":\"tool_end\",\"payload\":{\"id\":\"run-9\",\"name\":\"rag_search\",\"output\":\"3 docs\",\"status\":\"completed\"}}\n\n";

    for event in parser.process(line) {
        state.apply(event);
    }

    let tool = state.tool("run-9").expect("tool row created");
    assert_eq!(tool.name, "rag_search");
    assert_eq!(tool.output, Some(json!("3 docs")));
    assert_eq!(parser.stats().ignored_lines, 0);
}
