pub mod types;

pub use types::{ErrorBody, ProxyError};
