//! Canonical types shared across the pipeline.

pub mod identity;
pub mod message;
pub mod request;
pub mod response;

pub use identity::Identity;
pub use message::{Message, Role};
pub use request::ChatRequest;
pub use response::{ChatResponse, FinishReason, Usage};
