//! End-to-end tests for the extraction pipeline.
//!
//! These drive the engine through its public surface the way a host embedding
//! would: push a snapshot, deliver change notifications, tick, and observe
//! transcript updates on the sink channel.

use tokio::sync::mpsc;
use transcript_extractor::{
    Config, HostEvent, InteractionKind, Role, TranscriptEngine, TranscriptUpdate,
};

fn engine_with(config: Config) -> (TranscriptEngine, mpsc::Receiver<TranscriptUpdate>) {
    let (tx, rx) = mpsc::channel(16);
    (TranscriptEngine::new(config, tx), rx)
}

fn engine() -> (TranscriptEngine, mpsc::Receiver<TranscriptUpdate>) {
    engine_with(Config::default())
}

/// A ChatGPT-shaped page with explicit turn ordinals produces a two-entry
/// transcript and one complete exchange.
#[tokio::test]
async fn test_chatgpt_page_yields_one_exchange() {
    let (mut engine, mut rx) = engine();
    engine.set_location("https://chatgpt.com/c/abc123");
    engine.push_snapshot(
        r#"<html><body><main>
            <article data-testid="conversation-turn-1">
                <div class="markdown">Explain recursion</div>
            </article>
            <article data-testid="conversation-turn-2">
                <div class="markdown">Recursion is when a function calls itself until a base case stops it.</div>
            </article>
        </main></body></html>"#
            .to_string(),
    );

    engine.scan_now().await.unwrap();

    let update = rx.try_recv().expect("expected a transcript update");
    assert_eq!(update.delta.added, 2);
    assert_eq!(update.transcript.len(), 2);
    assert_eq!(update.transcript[0].role, Role::Human);
    assert_eq!(update.transcript[0].content, "Explain recursion");
    assert_eq!(update.transcript[1].role, Role::Agent);

    assert_eq!(update.exchanges.len(), 1);
    assert!(update.exchanges[0].human.is_some());
    assert!(update.exchanges[0].agent.is_some());
}

/// A turn still rendering (streaming cursor in its text) is withheld; once a
/// later snapshot shows the settled text, it is added exactly once.
#[tokio::test]
async fn test_streaming_turn_withheld_until_settled() {
    let (mut engine, mut rx) = engine();
    engine.push_snapshot(
        r#"<html><body><main>
            <div class="message">What are lifetimes for?</div>
            <div class="message">Thinking▌</div>
        </main></body></html>"#
            .to_string(),
    );
    engine.scan_now().await.unwrap();

    let update = rx.try_recv().unwrap();
    assert_eq!(update.delta.added, 1);
    assert_eq!(update.transcript[0].content, "What are lifetimes for?");

    engine.push_snapshot(
        r#"<html><body><main>
            <div class="message">What are lifetimes for?</div>
            <div class="message">Lifetimes tell the compiler how long references must stay valid.</div>
        </main></body></html>"#
            .to_string(),
    );
    engine.scan_now().await.unwrap();

    let update = rx.try_recv().unwrap();
    assert_eq!(update.delta.added, 1);
    assert_eq!(update.transcript.len(), 2);
    assert_eq!(update.transcript[1].role, Role::Agent);
}

/// The same conversation found by a different detection strategy (markup
/// lost its message classes) adds nothing: fingerprints collapse the
/// duplicates.
#[tokio::test]
async fn test_cross_strategy_dedup() {
    let (mut engine, mut rx) = engine();
    engine.push_snapshot(
        r#"<html><body><main>
            <div class="message">What is a closure in Rust?</div>
            <div class="message">Certainly, a closure captures variables from its enclosing scope.</div>
        </main></body></html>"#
            .to_string(),
    );
    engine.scan_now().await.unwrap();
    let first = rx.try_recv().unwrap();
    assert_eq!(first.delta.added, 2);

    // Same text, structureless markup: a weaker fallback strategy finds it
    engine.push_snapshot(
        r#"<html><body><main>
            <p>What is a closure in Rust?</p>
            <p>Certainly, a closure captures variables from its enclosing scope.</p>
        </main></body></html>"#
            .to_string(),
    );
    engine.scan_now().await.unwrap();

    assert!(rx.try_recv().is_err(), "dedup should suppress the update");
    assert_eq!(engine.transcript_snapshot().len(), 2);
}

/// Re-scanning an unchanged page is a no-op at the sink.
#[tokio::test]
async fn test_rescan_is_idempotent() {
    let html = r#"<html><body><main>
        <div class="message">How do I read a file?</div>
        <div class="message">Here's the short version: use std::fs::read_to_string.</div>
    </main></body></html>"#;

    let (mut engine, mut rx) = engine();
    engine.push_snapshot(html.to_string());
    engine.scan_now().await.unwrap();
    let _ = rx.try_recv().unwrap();

    for _ in 0..3 {
        engine.push_snapshot(html.to_string());
        engine.scan_now().await.unwrap();
    }
    assert!(rx.try_recv().is_err());
    assert_eq!(engine.transcript_snapshot().len(), 2);
}

/// A trailing human turn with no answer yet becomes an exchange whose agent
/// side is empty.
#[tokio::test]
async fn test_trailing_human_turn_unpaired() {
    let (mut engine, mut rx) = engine();
    engine.push_snapshot(
        r#"<html><body><main>
            <div class="message">What is borrowing?</div>
            <div class="message">Borrowing lets you reference data without taking ownership of it.</div>
            <div class="message">Can you show an example?</div>
        </main></body></html>"#
            .to_string(),
    );
    engine.scan_now().await.unwrap();

    let update = rx.try_recv().unwrap();
    assert_eq!(update.exchanges.len(), 2);
    let last = update.exchanges.last().unwrap();
    assert_eq!(last.human.as_ref().unwrap().content, "Can you show an example?");
    assert!(last.agent.is_none());
}

/// When the conversation container disappears from the markup, extraction
/// degrades to the document body and keeps going.
#[tokio::test]
async fn test_detached_root_falls_back_to_body() {
    let mut config = Config::default();
    config.resolver.max_root_attempts = 1;
    let (mut engine, mut rx) = engine_with(config);

    engine.push_snapshot(
        r#"<html><body><main>
            <div class="message">Is the root stable here?</div>
            <div class="message">No container is permanent; everything gets re-resolved.</div>
        </main></body></html>"#
            .to_string(),
    );
    engine.scan_now().await.unwrap();
    assert_eq!(rx.try_recv().unwrap().delta.added, 2);

    // The host re-rendered without any recognizable root container
    engine.push_snapshot(
        r#"<html><body><section>
            <div class="message">Is the root stable here?</div>
            <div class="message">No container is permanent; everything gets re-resolved.</div>
            <div class="message">Good, then nothing was lost.</div>
        </section></body></html>"#
            .to_string(),
    );
    engine.scan_now().await.unwrap();

    let update = rx.try_recv().unwrap();
    assert_eq!(update.delta.added, 1);
    assert_eq!(update.transcript.len(), 3);
}

/// While no root container matches, repeated ticks wait out the configured
/// retry delay instead of burning the lookup budget at tick rate and bailing
/// out to the body fallback early.
#[tokio::test]
async fn test_root_lookup_misses_wait_out_retry_delay() {
    let mut config = Config::default();
    config.resolver.max_root_attempts = 3;
    config.resolver.retry_delay_ms = 60_000;
    // Zero base poll so every tick would poll if nothing held it back
    config.scheduler.poll_base_ms = 0;
    let (mut engine, mut rx) = engine_with(config);

    // No recognizable root container; a premature body fallback would
    // happily extract these messages
    engine.push_snapshot(
        r#"<html><body><section>
            <div class="message">Still looking for the container?</div>
            <div class="message">Yes, and the answer should not appear yet.</div>
        </section></body></html>"#
            .to_string(),
    );

    for _ in 0..20 {
        engine.tick().await.unwrap();
    }

    assert!(rx.try_recv().is_err(), "no update while the root is missing");
    assert!(engine.transcript_snapshot().is_empty());
}

/// Navigation starts a fresh conversation: old entries are gone and new ones
/// come from the new page only.
#[tokio::test]
async fn test_navigation_starts_fresh() {
    let (mut engine, mut rx) = engine();
    engine.set_location("https://claude.ai/chat/one");
    engine.push_snapshot(
        r#"<html><body><main>
            <div class="message">First conversation, first question?</div>
            <div class="message">And here is its complete answer.</div>
        </main></body></html>"#
            .to_string(),
    );
    engine.scan_now().await.unwrap();
    let _ = rx.try_recv().unwrap();

    engine.handle_event(HostEvent::LocationChanged {
        url: "https://claude.ai/chat/two".to_string(),
    });
    assert!(engine.transcript_snapshot().is_empty());

    engine.push_snapshot(
        r#"<html><body><main>
            <div class="message">Second conversation, different question?</div>
        </main></body></html>"#
            .to_string(),
    );
    engine.scan_now().await.unwrap();

    let update = rx.try_recv().unwrap();
    assert_eq!(update.transcript.len(), 1);
    assert_eq!(
        update.transcript[0].content,
        "Second conversation, different question?"
    );
}

/// Transcript positions stay non-decreasing as the conversation grows across
/// scans.
#[tokio::test]
async fn test_ordering_preserved_across_growth() {
    let (mut engine, mut rx) = engine();
    engine.set_location("https://chatgpt.com/c/ordered");

    engine.push_snapshot(
        r#"<html><body><main>
            <article data-testid="conversation-turn-1"><div class="markdown">First question here</div></article>
            <article data-testid="conversation-turn-2"><div class="markdown">First answer here.</div></article>
        </main></body></html>"#
            .to_string(),
    );
    engine.scan_now().await.unwrap();
    let _ = rx.try_recv().unwrap();

    engine.push_snapshot(
        r#"<html><body><main>
            <article data-testid="conversation-turn-1"><div class="markdown">First question here</div></article>
            <article data-testid="conversation-turn-2"><div class="markdown">First answer here.</div></article>
            <article data-testid="conversation-turn-3"><div class="markdown">Second question here</div></article>
            <article data-testid="conversation-turn-4"><div class="markdown">Second answer here.</div></article>
        </main></body></html>"#
            .to_string(),
    );
    engine.scan_now().await.unwrap();

    let update = rx.try_recv().unwrap();
    assert_eq!(update.delta.added, 2);
    let positions: Vec<usize> = update
        .transcript
        .iter()
        .map(|m| m.origin_position)
        .collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted);
    assert_eq!(update.exchanges.len(), 2);
}

/// With the mutation debounce zeroed, a mutation notification makes the next
/// tick scan; while the user is typing, the tick stays quiet, and the pending
/// scan fires after the gate releases.
#[tokio::test]
async fn test_interaction_gate_defers_change_scan() {
    let mut config = Config::default();
    config.scheduler.mutation_debounce_ms = 0;
    config.pause.blur_quiet_ms = 0;
    let (mut engine, mut rx) = engine_with(config);

    engine.push_snapshot(
        r#"<html><body><main>
            <div class="message">Did my keystrokes leak into the transcript?</div>
            <div class="message">No, scans hold off while you interact with the page.</div>
        </main></body></html>"#
            .to_string(),
    );

    // Focus holds the gate; the mutation deadline arms but cannot fire
    engine.handle_event(HostEvent::Interaction(InteractionKind::Focus));
    engine.handle_event(HostEvent::Mutation {
        added_nodes: 2,
        removed_nodes: 0,
    });
    engine.tick().await.unwrap();
    assert!(rx.try_recv().is_err());

    // Blur releases it (zero quiet period); the pending scan runs
    engine.handle_event(HostEvent::Interaction(InteractionKind::Blur));
    engine.tick().await.unwrap();

    let update = rx.try_recv().unwrap();
    assert_eq!(update.delta.added, 2);
}

/// Engine-level pause wins over everything until resume.
#[tokio::test]
async fn test_external_pause_blocks_scans() {
    let mut config = Config::default();
    config.scheduler.mutation_debounce_ms = 0;
    let (mut engine, mut rx) = engine_with(config);

    engine.push_snapshot(
        r#"<html><body><main>
            <div class="message">Anything happening while paused?</div>
            <div class="message">Nothing at all; ticks return immediately.</div>
        </main></body></html>"#
            .to_string(),
    );
    engine.pause();
    engine.handle_event(HostEvent::Mutation {
        added_nodes: 1,
        removed_nodes: 0,
    });
    engine.tick().await.unwrap();
    assert!(rx.try_recv().is_err());

    engine.resume();
    engine.tick().await.unwrap();
    let update = rx.try_recv().unwrap();
    assert_eq!(update.delta.added, 2);
}
