//! Role classification for candidate message nodes.
//!
//! A cascade of checks, first match wins:
//!
//! 1. Explicit role indicators from the profile, on the node itself, an
//!    ancestor, or a descendant.
//! 2. If both human and agent indicators match, the conflict falls through to
//!    text inference.
//! 3. Text-pattern inference over the node's flattened text.
//! 4. Positional alternation by candidate index (even → human, odd → agent).
//!
//! Step 4 guarantees termination. It is a deterministic best-effort guess and
//! can be wrong, most visibly when a conversation opens with an agent welcome
//! banner; downstream exchange pairing handles that case explicitly.

use crate::page;
use crate::profiles::Profile;
use crate::types::Role;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::ElementRef;

lazy_static! {
    /// Question/request phrasing typical of a human turn
    static ref HUMAN_OPENER: Regex = Regex::new(
        r"(?i)^(what|how|why|when|where|who|which|can you|could you|would you|will you|please|do |does |did |is |are |should |explain|write|create|generate|fix|help|show me|tell me|give me)"
    ).unwrap();

    /// Explanatory/confirmatory phrasing typical of an agent turn
    static ref AGENT_OPENER: Regex = Regex::new(
        r"(?i)^(sure|certainly|of course|absolutely|great question|good question|here's|here is|here are|i can|i'd|i'll|i would|i will|to do (this|that)|let's|yes,|no,|as an ai|the (answer|reason|difference))"
    ).unwrap();

    /// "You:" / "Assistant:" style prefixes some hosts render into the text
    static ref HUMAN_PREFIX: Regex = Regex::new(r"^(You|User|Me):").unwrap();
    static ref AGENT_PREFIX: Regex = Regex::new(r"^(Assistant|ChatGPT|Claude|Gemini|AI|Bot):").unwrap();
}

/// Text longer than this with multiple sentences is assumed to be an agent
/// explanation.
const AGENT_LENGTH_THRESHOLD: usize = 200;

/// Assign a role to one candidate node. `index` is the node's index among the
/// scanned candidates, consumed only by the terminal positional fallback.
pub fn classify(el: ElementRef<'_>, profile: &Profile, index: usize) -> Role {
    classify_explicit(el, profile).unwrap_or(positional_role(index))
}

/// Steps 1–3 of the cascade: indicators, conflict fall-through, text
/// inference. Returns None when only the positional fallback is left.
pub fn classify_explicit(el: ElementRef<'_>, profile: &Profile) -> Option<Role> {
    let human_hit = indicator_present(el, profile.human_selectors);
    let agent_hit = indicator_present(el, profile.agent_selectors);

    match (human_hit, agent_hit) {
        (true, false) => return Some(Role::Human),
        (false, true) => return Some(Role::Agent),
        // Both or neither: fall through to inference
        _ => {}
    }

    let text = page::flat_text(el);
    infer_from_text(text.trim(), has_code_block(el))
}

/// Terminal fallback: even index → human, odd → agent. Deterministic,
/// guaranteed to decide, and documented as best-effort only.
pub fn positional_role(index: usize) -> Role {
    if index % 2 == 0 {
        Role::Human
    } else {
        Role::Agent
    }
}

/// Whether any selector matches the node itself, an ancestor, or a descendant
fn indicator_present(el: ElementRef<'_>, selectors: &[&str]) -> bool {
    let compiled: Vec<_> = selectors
        .iter()
        .filter_map(|s| page::compile_selector(s))
        .collect();
    if compiled.is_empty() {
        return false;
    }

    if compiled.iter().any(|sel| sel.matches(&el)) {
        return true;
    }
    if el
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|anc| compiled.iter().any(|sel| sel.matches(&anc)))
    {
        return true;
    }
    el.descendants()
        .filter_map(ElementRef::wrap)
        .filter(|d| d.id() != el.id())
        .any(|d| compiled.iter().any(|sel| sel.matches(&d)))
}

/// Whether the node carries a code block, a strong agent signal
fn has_code_block(el: ElementRef<'_>) -> bool {
    el.descendants()
        .filter_map(ElementRef::wrap)
        .any(|d| matches!(d.value().name(), "pre" | "code"))
}

/// Text-pattern inference. Returns None when the text gives no usable signal.
fn infer_from_text(text: &str, has_code: bool) -> Option<Role> {
    if text.is_empty() {
        return None;
    }

    if HUMAN_PREFIX.is_match(text) {
        return Some(Role::Human);
    }
    if AGENT_PREFIX.is_match(text) {
        return Some(Role::Agent);
    }

    if has_code || text.contains("```") {
        return Some(Role::Agent);
    }

    let char_count = text.chars().count();
    if char_count > AGENT_LENGTH_THRESHOLD && sentence_count(text) >= 2 {
        return Some(Role::Agent);
    }

    if AGENT_OPENER.is_match(text) {
        return Some(Role::Agent);
    }

    let short = char_count <= AGENT_LENGTH_THRESHOLD;
    if short && (HUMAN_OPENER.is_match(text) || text.ends_with('?')) {
        return Some(Role::Human);
    }

    None
}

fn sentence_count(text: &str) -> usize {
    text.chars().filter(|c| matches!(c, '.' | '!' | '?')).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::{CLAUDE, GENERIC};
    use scraper::Html;

    fn first_div(html: &Html) -> ElementRef<'_> {
        let sel = page::compile_selector("div.candidate").unwrap();
        html.select(&sel).next().unwrap()
    }

    #[test]
    fn test_explicit_human_indicator() {
        let html = Html::parse_document(
            r#"<div class="candidate"><span class="human">avatar</span>Hi</div>"#,
        );
        assert_eq!(classify(first_div(&html), &CLAUDE, 1), Role::Human);
    }

    #[test]
    fn test_explicit_agent_indicator_on_ancestor() {
        let html = Html::parse_document(
            r#"<div class="assistant"><div class="candidate">Certainly.</div></div>"#,
        );
        assert_eq!(classify(first_div(&html), &CLAUDE, 0), Role::Agent);
    }

    #[test]
    fn test_conflicting_indicators_fall_through_to_inference() {
        // Both markers present; question phrasing decides
        let html = Html::parse_document(
            r#"<div class="candidate human assistant">What is a monad?</div>"#,
        );
        assert_eq!(classify(first_div(&html), &CLAUDE, 1), Role::Human);
    }

    #[test]
    fn test_question_text_is_human() {
        let html = Html::parse_document(r#"<div class="candidate">Can you explain lifetimes?</div>"#);
        assert_eq!(classify(first_div(&html), &GENERIC, 1), Role::Human);
    }

    #[test]
    fn test_code_block_is_agent() {
        let html = Html::parse_document(
            r#"<div class="candidate">Use this: <pre><code>fn main() {}</code></pre></div>"#,
        );
        assert_eq!(classify(first_div(&html), &GENERIC, 0), Role::Agent);
    }

    #[test]
    fn test_long_multi_sentence_text_is_agent() {
        let body = "Lifetimes describe how long references are valid. \
                    The borrow checker uses them to reject dangling references. \
                    Most of the time they are inferred for you. \
                    Explicit annotations are only needed at API boundaries.";
        let html = Html::parse_document(&format!(r#"<div class="candidate">{body}</div>"#));
        assert_eq!(classify(first_div(&html), &GENERIC, 0), Role::Agent);
    }

    #[test]
    fn test_positional_fallback_is_deterministic() {
        let html = Html::parse_document(r#"<div class="candidate">mmm</div>"#);
        for _ in 0..3 {
            assert_eq!(classify(first_div(&html), &GENERIC, 0), Role::Human);
            assert_eq!(classify(first_div(&html), &GENERIC, 1), Role::Agent);
        }
    }

    #[test]
    fn test_role_prefix_in_text() {
        let html = Html::parse_document(r#"<div class="candidate">You: hello there</div>"#);
        assert_eq!(classify(first_div(&html), &GENERIC, 1), Role::Human);
    }
}
