//! Turn orchestration for IronQuill.
//!
//! This crate owns everything between a validated HTTP request and the
//! frames written to its SSE response: the session state machine, memory
//! retrieval, prompt assembly, the completion relay, usage finalization,
//! and the telemetry hand-off. It knows nothing about axum; the gateway
//! maps [`Frame`]s onto the transport.

pub mod event;
pub mod prompt;
pub mod relay;
pub mod retrieve;
pub mod session;
pub mod turn;
pub mod usage;
pub mod validate;

pub use event::{Frame, StreamEvent};
pub use relay::{ErrorNotice, RelayOutcome, classify_provider_error, relay_completion};
pub use retrieve::{MemoryContext, retrieve_context};
pub use session::{DONE_MARKER, SessionConfig, SessionState, StreamingSession};
pub use turn::TurnRunner;
pub use usage::{CHARS_PER_TOKEN, UsageRecord, estimate_tokens};
pub use validate::{ChatTurnRequest, MAX_MESSAGE_CHARS, TurnDefaults, ValidatedTurn, validate};
