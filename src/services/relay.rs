//! Streaming passthrough of the upstream body
//!
//! Chunks are forwarded as soon as they arrive, in order and unmodified, so
//! SSE framing produced upstream reaches the caller intact. Dropping the
//! returned stream (client went away) drops the upstream body, which closes
//! the upstream connection.

use async_stream::stream;
use axum::body::Bytes;
use futures::stream::{Stream, StreamExt};
use std::io;
use std::time::{Duration, Instant};

use super::upstream::ByteStream;

/// Wrap an upstream body for relaying
///
/// With `idle_timeout` set, a gap longer than that between two chunks ends
/// the relay with an error. The status line is already sent by then, so the
/// caller sees a truncated stream.
pub fn relay_stream(
    mut upstream: ByteStream,
    idle_timeout: Option<Duration>,
    request_id: String,
) -> impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static {
    stream! {
        let started = Instant::now();
        let mut chunks: u64 = 0;
        let mut bytes: u64 = 0;

        loop {
            let next = match idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, upstream.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        tracing::warn!(
                            request_id = %request_id,
                            idle_timeout_secs = limit.as_secs_f64(),
                            chunks,
                            "Upstream stream went idle, closing relay"
                        );
                        yield Err(io::Error::new(io::ErrorKind::TimedOut, "upstream stream idle"));
                        break;
                    }
                },
                None => upstream.next().await,
            };

            match next {
                Some(Ok(chunk)) => {
                    chunks += 1;
                    bytes += chunk.len() as u64;
                    yield Ok(chunk);
                }
                Some(Err(e)) => {
                    tracing::error!(request_id = %request_id, error = %e, chunks, "Upstream stream failed");
                    yield Err(io::Error::new(io::ErrorKind::Other, e.to_string()));
                    break;
                }
                None => {
                    tracing::info!(
                        request_id = %request_id,
                        chunks,
                        bytes,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Relay finished"
                    );
                    break;
                }
            }
        }
    }
}
