pub mod render_state;
pub mod transcript;

pub use render_state::{Applied, LogEntry, RenderState, ToolInvocation, ToolStatus};
pub use transcript::{TranscriptEntry, TranscriptLine, TRANSPORT_ERROR_BANNER};
