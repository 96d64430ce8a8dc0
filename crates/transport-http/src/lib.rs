// HTTP transport for streaming audio

pub mod client;
pub mod memory;
pub mod remote_stream;

pub use client::{HttpClient, HttpConfig, HttpResponse, UreqClient};
pub use memory::MemoryOrigin;
pub use remote_stream::{RemoteStream, StreamCloser};
