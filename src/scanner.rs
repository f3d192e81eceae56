//! Candidate scanning: one pass over the conversation root.
//!
//! A cascade of five strategies, stopping at the first one that yields at
//! least one usable candidate:
//!
//! 1. The profile's direct message-node selectors.
//! 2. The union of human and agent role-indicator matches, with containment
//!    dedup (when one matched node contains another, only the outer one is
//!    kept).
//! 3. Generic cross-application message-shape selectors.
//! 4. The root's direct children with substantial visible text.
//! 5. Paragraph/span fallback treating alternating text blocks as
//!    alternating turns.
//!
//! Interactive controls and nodes still in a streaming/loading state are
//! never candidates. Positions are for ordering only, never for identity.

use crate::classifier;
use crate::config::ScannerConfig;
use crate::extractor;
use crate::page;
use crate::profiles::Profile;
use crate::types::{Message, Role, ScanStrategy};
use scraper::ElementRef;
use tracing::{debug, trace};

/// Message shapes seen across chat applications, used when the profile's own
/// selectors come up empty
const GENERIC_SHAPE_SELECTORS: &[&str] = &[
    "div[role=\"listitem\"]",
    ".message",
    ".chat-message",
    ".chat-turn",
    "div[data-message-id]",
    ".chat-entry",
    ".turn",
];

type CollectFn = for<'a> fn(ElementRef<'a>, &Profile, &ScannerConfig) -> Vec<ElementRef<'a>>;

/// Scan the root subtree and produce an ordered batch of raw messages.
pub fn scan(root: ElementRef<'_>, profile: &Profile, config: &ScannerConfig) -> Vec<Message> {
    let strategies: [(ScanStrategy, CollectFn); 5] = [
        (ScanStrategy::MessageSelectors, collect_message_nodes),
        (ScanStrategy::RoleIndicators, collect_role_indicator_nodes),
        (ScanStrategy::GenericShapes, collect_generic_shapes),
        (ScanStrategy::RootChildren, collect_root_children),
        (ScanStrategy::Paragraphs, collect_paragraphs),
    ];

    for (strategy, collect) in strategies {
        let candidates = collect(root, profile, config);
        if candidates.is_empty() {
            continue;
        }
        trace!(
            "Strategy {} found {} raw candidates",
            strategy.as_str(),
            candidates.len()
        );
        let messages = build_messages(candidates, profile, strategy, config);
        if !messages.is_empty() {
            debug!(
                "Scan produced {} messages via {}",
                messages.len(),
                strategy.as_str()
            );
            return messages;
        }
    }

    Vec::new()
}

fn collect_message_nodes<'a>(
    root: ElementRef<'a>,
    profile: &Profile,
    _config: &ScannerConfig,
) -> Vec<ElementRef<'a>> {
    page::keep_outermost(page::select_all(root, profile.message_selectors))
}

fn collect_role_indicator_nodes<'a>(
    root: ElementRef<'a>,
    profile: &Profile,
    _config: &ScannerConfig,
) -> Vec<ElementRef<'a>> {
    let combined: Vec<&str> = profile
        .human_selectors
        .iter()
        .chain(profile.agent_selectors.iter())
        .copied()
        .collect();
    page::keep_outermost(page::select_all(root, &combined))
}

fn collect_generic_shapes<'a>(
    root: ElementRef<'a>,
    _profile: &Profile,
    _config: &ScannerConfig,
) -> Vec<ElementRef<'a>> {
    page::keep_outermost(page::select_all(root, GENERIC_SHAPE_SELECTORS))
}

fn collect_root_children<'a>(
    root: ElementRef<'a>,
    _profile: &Profile,
    config: &ScannerConfig,
) -> Vec<ElementRef<'a>> {
    let children: Vec<_> = root
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| page::is_visible(*el))
        .filter(|el| page::flat_text(*el).trim().chars().count() >= config.min_child_text_len)
        .collect();
    // One substantial child is a wrapper, not a conversation
    if children.len() < 2 {
        return Vec::new();
    }
    children
}

fn collect_paragraphs<'a>(
    root: ElementRef<'a>,
    _profile: &Profile,
    config: &ScannerConfig,
) -> Vec<ElementRef<'a>> {
    let blocks: Vec<_> = page::select_all(root, &["p", "span"])
        .into_iter()
        .filter(|el| page::is_visible(*el))
        .filter(|el| page::flat_text(*el).trim().chars().count() >= config.min_paragraph_len)
        .collect();
    let blocks = page::keep_outermost(blocks);
    // A single block is not a conversation
    if blocks.len() < 2 {
        return Vec::new();
    }
    blocks
}

/// Classify and extract each candidate, skipping unusable nodes.
fn build_messages(
    candidates: Vec<ElementRef<'_>>,
    profile: &Profile,
    strategy: ScanStrategy,
    config: &ScannerConfig,
) -> Vec<Message> {
    let mut messages = Vec::new();

    for (index, el) in candidates.into_iter().take(config.max_candidates).enumerate() {
        if page::is_interactive(el) {
            continue;
        }
        if is_streaming(el, profile) {
            trace!("Skipping streaming candidate at index {}", index);
            continue;
        }

        let content = extractor::extract(el, profile);
        if content.is_empty() {
            // ExtractionEmpty: dropped silently, not an error
            continue;
        }

        let ordinal = turn_ordinal(el, profile);
        let position = ordinal.unwrap_or(index);

        let role = match strategy {
            // The paragraph fallback is alternation by definition
            ScanStrategy::Paragraphs => classifier::positional_role(index),
            _ => classifier::classify_explicit(el, profile).unwrap_or_else(|| {
                // Explicit ordinals (1-based, odd = human) beat the raw
                // enumeration index when the host encodes them
                match ordinal {
                    Some(n) => {
                        if n % 2 == 1 {
                            Role::Human
                        } else {
                            Role::Agent
                        }
                    }
                    None => classifier::positional_role(index),
                }
            }),
        };

        messages.push(Message::new(role, content, position, strategy));
    }

    messages
}

/// Whether the node is still rendering: a host-specific loading/typing
/// indicator is present, or the text ends in a streaming cursor glyph.
pub fn is_streaming(el: ElementRef<'_>, profile: &Profile) -> bool {
    let compiled: Vec<_> = profile
        .streaming_selectors
        .iter()
        .filter_map(|s| page::compile_selector(s))
        .collect();
    let marker_present = el
        .descendants()
        .filter_map(ElementRef::wrap)
        .any(|d| compiled.iter().any(|sel| sel.matches(&d)));
    if marker_present {
        return true;
    }

    let text = page::flat_text(el);
    has_streaming_cursor(text.trim_end())
}

/// Streaming cursor glyphs some hosts append to in-flight text. The trailing
/// ellipsis counts too; a withheld turn re-enters once its final text lands.
pub fn has_streaming_cursor(text: &str) -> bool {
    text.ends_with('▌')
        || text.ends_with('▍')
        || text.ends_with('█')
        || text.ends_with('…')
        || text.ends_with("...")
}

/// Explicit turn ordinal when the profile encodes one
/// (e.g. `data-testid="conversation-turn-7"`)
fn turn_ordinal(el: ElementRef<'_>, profile: &Profile) -> Option<usize> {
    let (attr, prefix) = profile.turn_ordinal?;
    let value = el.value().attr(attr)?;
    value.strip_prefix(prefix)?.parse().ok()
}
