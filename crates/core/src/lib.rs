//! # IronQuill Core
//!
//! Domain types, traits, and error definitions for the IronQuill streaming
//! chat gateway. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external capability (token generation, memory retrieval) is a trait
//! here. Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod memory;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{Error, MemoryError, ProviderError, Result, SessionError, ValidationError};
pub use memory::{MemoryFragment, MemoryQuery, MemoryStore};
pub use message::{Message, Role};
pub use provider::{
    CompletionChunk, CompletionRequest, CompletionStream, FinishReason, Provider, TokenUsage,
};
