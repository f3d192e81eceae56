//! Core types used throughout the transcript extraction engine.
//!
//! This module defines the fundamental data structures for messages,
//! transcripts, host events, and scan bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a conversational turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Agent,
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Human => "human",
            Role::Agent => "agent",
            Role::Unknown => "unknown",
        }
    }
}

/// Which scanner path produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStrategy {
    /// Direct message-node selectors under the conversation root
    MessageSelectors,
    /// Union of human/agent role-indicator matches
    RoleIndicators,
    /// Generic cross-application message-shape selectors
    GenericShapes,
    /// Direct children of the root with substantial text
    RootChildren,
    /// Paragraph/span level fallback with alternating turns
    Paragraphs,
}

impl ScanStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStrategy::MessageSelectors => "message_selectors",
            ScanStrategy::RoleIndicators => "role_indicators",
            ScanStrategy::GenericShapes => "generic_shapes",
            ScanStrategy::RootChildren => "root_children",
            ScanStrategy::Paragraphs => "paragraphs",
        }
    }
}

/// One extracted conversational turn.
///
/// Value type; never mutated after creation, only superseded by a later scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who produced the turn
    pub role: Role,
    /// Normalized text content
    pub content: String,
    /// Position in document order, used purely for sorting
    pub origin_position: usize,
    /// When the engine first saw this message
    pub detected_at: DateTime<Utc>,
    /// Scanner path that produced it
    pub origin: ScanStrategy,
}

impl Message {
    pub fn new(role: Role, content: String, origin_position: usize, origin: ScanStrategy) -> Self {
        Self {
            role,
            content,
            origin_position,
            detected_at: Utc::now(),
            origin,
        }
    }

    /// Dedup key: role plus a bounded content prefix.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self.role, &self.content)
    }
}

/// Number of characters of content that participate in the fingerprint
pub const FINGERPRINT_PREFIX_CHARS: usize = 64;

/// Duplicate-detection key for a message: (role, content prefix)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub role: Role,
    pub prefix: String,
}

impl Fingerprint {
    pub fn of(role: Role, content: &str) -> Self {
        let prefix: String = content.chars().take(FINGERPRINT_PREFIX_CHARS).collect();
        Self { role, prefix }
    }
}

/// A paired human message and its following agent response.
///
/// `agent` is `None` for a trailing unanswered human turn; `human` is `None`
/// for an agent turn with no preceding human turn (e.g. a welcome banner).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub human: Option<Message>,
    pub agent: Option<Message>,
}

/// Net change produced by one merge, the unit handed to the notification sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptDelta {
    pub added: usize,
    pub removed: usize,
    pub changed: usize,
}

impl TranscriptDelta {
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.changed == 0
    }
}

/// Payload delivered to the notification sink on every non-empty delta
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptUpdate {
    pub transcript: Vec<Message>,
    pub exchanges: Vec<Exchange>,
    pub delta: TranscriptDelta,
}

/// User interaction kinds used by the pause gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    /// Keystroke inside an interactive control
    Typing,
    /// Click on an interactive control
    Click,
    /// An interactive control gained focus
    Focus,
    /// An interactive control lost focus
    Blur,
}

/// Change notifications delivered by the host embedding
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// Descendant nodes were added/removed or attributes changed under the root
    Mutation {
        added_nodes: usize,
        removed_nodes: usize,
    },
    /// Previously off-screen candidate nodes entered the viewport
    VisibilityChanged { visible_nodes: usize },
    /// The root's bounding size changed (new content appended)
    Resized,
    /// The addressable location changed (navigation)
    LocationChanged { url: String },
    /// User interacted with an interactive control
    Interaction(InteractionKind),
}

/// Errors that can occur during extraction.
///
/// None of these are fatal to the engine; every variant is handled by a
/// deterministic fallback somewhere in the cascade.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("selector failed to parse: {0}")]
    SelectorFailure(String),

    #[error("conversation root not found after {attempts} attempts")]
    RootNotFound { attempts: u32 },

    #[error("conversation root is stale (detached or superseded)")]
    StaleRoot,

    #[error("no content extracted")]
    ExtractionEmpty,

    #[error("no page snapshot available")]
    NoSnapshot,

    #[error("notification sink closed")]
    SinkClosed,
}
