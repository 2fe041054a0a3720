use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::util::parse_bool_flag;

const DEBUG_PAYLOAD_ENV: &str = "CHATDESK_DEBUG_PAYLOAD";
const DEFAULT_FILTER: &str = "warn";
const NOISE_PREVIEW_CHARS: usize = 160;

/// Installs the global subscriber. With a log path the fmt layer appends to
/// that file so log lines do not interleave with the streamed answer.
pub fn init_tracing(log_path: Option<&Path>) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match log_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()?;
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init()?;
        }
    }
    Ok(())
}

pub fn debug_payload_enabled() -> bool {
    std::env::var(DEBUG_PAYLOAD_ENV)
        .ok()
        .and_then(parse_bool_flag)
        .unwrap_or(false)
}

pub fn emit_debug_payload<T: Serialize>(request_url: &str, payload: &T) {
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    debug!(url = request_url, payload = %formatted_payload, "completion request");
}

pub fn emit_sse_parse_error(json_data: &str, parse_error: &serde_json::Error) {
    debug!(
        error = %parse_error,
        data = %preview(json_data),
        "dropping malformed stream record"
    );
}

pub fn emit_ignored_line(line: &str) {
    debug!(line = %preview(line), "ignoring non-data stream line");
}

pub fn emit_oversized_line(observed_bytes: usize, max_line_bytes: usize) {
    warn!(
        observed_bytes,
        max_line_bytes, "discarding stream record over the line bound"
    );
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(NOISE_PREVIEW_CHARS).collect();
    if text.chars().nth(NOISE_PREVIEW_CHARS).is_some() {
        out.push_str("...");
    }
    out
}
