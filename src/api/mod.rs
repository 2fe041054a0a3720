pub mod client;
pub mod mock_client;
pub mod stream;

pub use client::{ApiClient, ByteStream, ChatBackend};
pub use stream::StreamParser;
