//! Domain models for the chat service.

pub mod chat;
pub mod transcript;

pub use chat::{ChatRequest, ChatResponse, HealthResponse, HealthStatus};
pub use transcript::{Author, Turn};
