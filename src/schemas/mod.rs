//! Request and response payloads

pub mod chat;
pub mod health;

pub use chat::{apply_defaults, prepare_payload, PreparedPayload};
pub use health::{HealthResponse, LivenessResponse};
