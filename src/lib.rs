//! Transcript Extractor - Chat transcript extraction engine
//!
//! This crate watches a live, externally-mutated rendering of a chat page and
//! produces a clean, ordered, deduplicated transcript of human and agent
//! turns:
//!
//! - **Profiles**: Per-host selector heuristics (ChatGPT, Claude, Gemini)
//!   with a broad generic fallback
//! - **Scanning**: A five-strategy cascade from precise message selectors
//!   down to a paragraph-level last resort
//! - **Scheduling**: Change-driven scans with debounce, an adaptive poll
//!   timer, and a pause gate around user interaction
//!
//! # Architecture
//!
//! The host embedding pushes page snapshots and change notifications into a
//! [`engine::TranscriptEngine`]; the engine resolves the conversation root,
//! scans for candidate turns, folds them into the canonical transcript, and
//! emits a [`types::TranscriptUpdate`] on every non-empty delta.

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod extractor;
pub mod page;
pub mod profiles;
pub mod resolver;
pub mod scanner;
pub mod scheduler;
pub mod types;

// Re-export commonly used types
pub use aggregator::TranscriptAggregator;
pub use config::Config;
pub use engine::{EngineStatus, TranscriptEngine};
pub use page::PageSnapshot;
pub use profiles::{Profile, ProfileRegistry};
pub use resolver::HostResolver;
pub use scheduler::{ChangeScheduler, ScanReason};
pub use types::{
    Exchange, ExtractionError, Fingerprint, HostEvent, InteractionKind, Message, Role,
    ScanStrategy, TranscriptDelta, TranscriptUpdate,
};
