//! "Makena", the shopping assistant.
//!
//! A single-turn question/answer over an OpenAI-compatible chat completion
//! endpoint. Failures never reach the customer as errors; they get a short
//! apology instead.

mod client;
mod error;
mod types;

pub use client::{APOLOGY, AssistantClient, SYSTEM_PROMPT, product_prompt};
pub use error::AssistantError;
pub use types::{ChatMessage, CompletionRequest, CompletionResponse};
