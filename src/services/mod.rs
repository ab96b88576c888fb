//! Services module
//!
//! Outbound calls to the upstream API and the streaming relay.

pub mod relay;
pub mod upstream;

pub use relay::relay_stream;
pub use upstream::{ByteStream, ChatUpstream, HttpUpstream, UpstreamError, UpstreamResponse};
