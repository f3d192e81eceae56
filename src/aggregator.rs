//! Transcript aggregation: merging candidate batches into the canonical
//! deduplicated transcript.
//!
//! The transcript is the only mutable shared state in the engine and it is
//! owned exclusively by the aggregator; everything else sees read-only
//! snapshots or deltas. Merging is idempotent and commutative with respect to
//! already-seen fingerprints, so overlapping batches from redundant detection
//! paths collapse to a no-op.

use crate::scanner;
use crate::types::{Exchange, Fingerprint, Message, Role, TranscriptDelta};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Owns the canonical transcript and its dedup index
pub struct TranscriptAggregator {
    messages: Vec<Message>,
    seen: HashSet<Fingerprint>,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Merge one candidate batch into the transcript.
    ///
    /// Per raw message: reject empty or still-streaming content; discard
    /// fingerprint duplicates; replace an existing entry when the same slot
    /// (role + position) re-appears with different content (a superseded
    /// turn); otherwise append. The transcript is re-sorted by origin
    /// position after every merge that changed anything.
    pub fn merge(&mut self, batch: Vec<Message>) -> TranscriptDelta {
        let mut delta = TranscriptDelta::default();

        for msg in batch {
            if msg.content.is_empty() {
                continue;
            }
            if scanner::has_streaming_cursor(msg.content.trim_end()) {
                trace!("Rejecting streaming message at position {}", msg.origin_position);
                continue;
            }

            let fp = msg.fingerprint();
            if self.seen.contains(&fp) {
                continue;
            }

            // Same slot, different content: the turn was superseded
            if let Some(existing) = self
                .messages
                .iter_mut()
                .find(|m| m.origin_position == msg.origin_position && m.role == msg.role)
            {
                self.seen.remove(&existing.fingerprint());
                *existing = msg;
                self.seen.insert(fp);
                delta.changed += 1;
                continue;
            }

            self.seen.insert(fp);
            self.messages.push(msg);
            delta.added += 1;
        }

        if !delta.is_empty() {
            self.messages.sort_by_key(|m| m.origin_position);
            debug!(
                "Merge: +{} ~{} (transcript now {} messages)",
                delta.added,
                delta.changed,
                self.messages.len()
            );
        }

        delta
    }

    /// Read-only view of the canonical transcript
    pub fn transcript(&self) -> &[Message] {
        &self.messages
    }

    /// Owned copy of the transcript, for the control surface
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Pair turns into exchanges.
    ///
    /// A human message immediately followed by an agent message forms a
    /// pair; a trailing human message pairs with `None`; an agent message
    /// with no preceding human turn (welcome banner) becomes an agent-only
    /// exchange rather than being dropped.
    pub fn exchanges(&self) -> Vec<Exchange> {
        let mut out = Vec::new();
        let mut i = 0;

        while i < self.messages.len() {
            let current = &self.messages[i];
            match current.role {
                Role::Human => {
                    let answer = self
                        .messages
                        .get(i + 1)
                        .filter(|next| next.role == Role::Agent);
                    out.push(Exchange {
                        human: Some(current.clone()),
                        agent: answer.cloned(),
                    });
                    i += if answer.is_some() { 2 } else { 1 };
                }
                Role::Agent | Role::Unknown => {
                    out.push(Exchange {
                        human: None,
                        agent: Some(current.clone()),
                    });
                    i += 1;
                }
            }
        }

        out
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Clear all state; the returned delta reports everything as removed.
    pub fn reset(&mut self) -> TranscriptDelta {
        let removed = self.messages.len();
        self.messages.clear();
        self.seen.clear();
        TranscriptDelta {
            added: 0,
            removed,
            changed: 0,
        }
    }
}

impl Default for TranscriptAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScanStrategy;
    use pretty_assertions::assert_eq;

    fn msg(role: Role, content: &str, position: usize) -> Message {
        Message::new(role, content.to_string(), position, ScanStrategy::MessageSelectors)
    }

    #[test]
    fn test_basic_pairing() {
        let mut agg = TranscriptAggregator::new();
        let delta = agg.merge(vec![
            msg(Role::Human, "Hello", 0),
            msg(Role::Agent, "Hi there, how can I help?", 1),
        ]);
        assert_eq!(delta.added, 2);

        let exchanges = agg.exchanges();
        assert_eq!(exchanges.len(), 1);
        assert_eq!(exchanges[0].human.as_ref().unwrap().content, "Hello");
        assert_eq!(
            exchanges[0].agent.as_ref().unwrap().content,
            "Hi there, how can I help?"
        );
    }

    #[test]
    fn test_streaming_content_rejected() {
        let mut agg = TranscriptAggregator::new();
        let delta = agg.merge(vec![msg(Role::Agent, "Thinking▌", 0)]);
        assert!(delta.is_empty());
        assert!(agg.is_empty());
    }

    #[test]
    fn test_duplicate_across_batches_discarded() {
        let mut agg = TranscriptAggregator::new();
        agg.merge(vec![msg(Role::Human, "Explain recursion", 0)]);

        let mut second = msg(Role::Human, "Explain recursion", 0);
        second.origin = ScanStrategy::Paragraphs;
        let delta = agg.merge(vec![second]);

        assert!(delta.is_empty());
        assert_eq!(agg.len(), 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let batch = vec![
            msg(Role::Human, "One", 0),
            msg(Role::Agent, "Two", 1),
        ];
        let mut agg = TranscriptAggregator::new();
        agg.merge(batch.clone());
        let before = agg.snapshot();

        let delta = agg.merge(batch);
        assert!(delta.is_empty());
        assert_eq!(agg.snapshot().len(), before.len());
    }

    #[test]
    fn test_trailing_unanswered_human() {
        let mut agg = TranscriptAggregator::new();
        agg.merge(vec![
            msg(Role::Human, "Hello", 0),
            msg(Role::Agent, "Hi!", 1),
            msg(Role::Human, "One more thing?", 2),
        ]);

        let exchanges = agg.exchanges();
        assert_eq!(exchanges.len(), 2);
        assert!(exchanges[1].agent.is_none());
        assert_eq!(exchanges[1].human.as_ref().unwrap().content, "One more thing?");
    }

    #[test]
    fn test_leading_agent_banner_kept_unpaired() {
        let mut agg = TranscriptAggregator::new();
        agg.merge(vec![
            msg(Role::Agent, "Welcome! Ask me anything.", 0),
            msg(Role::Human, "What is Rust?", 1),
            msg(Role::Agent, "A systems programming language.", 2),
        ]);

        let exchanges = agg.exchanges();
        assert_eq!(exchanges.len(), 2);
        assert!(exchanges[0].human.is_none());
        assert_eq!(
            exchanges[0].agent.as_ref().unwrap().content,
            "Welcome! Ask me anything."
        );
        assert!(exchanges[1].human.is_some());
        assert!(exchanges[1].agent.is_some());
    }

    #[test]
    fn test_ordering_invariant() {
        let mut agg = TranscriptAggregator::new();
        agg.merge(vec![
            msg(Role::Agent, "answer two", 3),
            msg(Role::Human, "question one", 0),
            msg(Role::Agent, "answer one", 1),
            msg(Role::Human, "question two", 2),
        ]);

        let positions: Vec<usize> = agg.transcript().iter().map(|m| m.origin_position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_superseded_turn_replaced() {
        let mut agg = TranscriptAggregator::new();
        agg.merge(vec![msg(Role::Agent, "Recursion is", 1)]);
        let delta = agg.merge(vec![msg(
            Role::Agent,
            "Recursion is when a function calls itself.",
            1,
        )]);

        assert_eq!(delta.changed, 1);
        assert_eq!(delta.added, 0);
        assert_eq!(agg.len(), 1);
        assert_eq!(
            agg.transcript()[0].content,
            "Recursion is when a function calls itself."
        );
    }

    #[test]
    fn test_empty_content_rejected() {
        let mut agg = TranscriptAggregator::new();
        let delta = agg.merge(vec![msg(Role::Human, "", 0)]);
        assert!(delta.is_empty());
    }

    #[test]
    fn test_reset_reports_removed() {
        let mut agg = TranscriptAggregator::new();
        agg.merge(vec![msg(Role::Human, "Hello", 0)]);
        let delta = agg.reset();
        assert_eq!(delta.removed, 1);
        assert!(agg.is_empty());
    }
}
