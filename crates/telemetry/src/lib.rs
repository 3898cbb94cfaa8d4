//! Usage accounting for IronQuill.
//!
//! Records one `TurnRecord` per completed chat turn, keeps running totals,
//! and computes per-turn cost from a built-in (and overridable) model
//! pricing table. Everything here is best-effort bookkeeping: recording can
//! never fail a live stream.

pub mod engine;
pub mod model;
pub mod pricing;

pub use engine::TelemetryEngine;
pub use model::{TurnRecord, UsageSnapshot, UsageSource};
pub use pricing::{ModelPricing, PricingTable};
