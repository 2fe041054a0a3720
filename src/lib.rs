//! Client-side assembler for streamed chat completions.
//!
//! A [`ChatContext`](app::ChatContext) submits one message at a time to the
//! backend's `/api/v1/chat/completions` endpoint, turns the newline-delimited
//! `data: ` records it streams back into a [`RenderState`](state::RenderState),
//! reports every change to a [`ResponseObserver`](app::ResponseObserver), and
//! freezes the result into a [`TranscriptEntry`](state::TranscriptEntry).

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod render;
pub mod settings;
pub mod state;
pub mod types;
pub mod util;

#[cfg(test)]
mod test_support;
