//! Conversation root resolution.
//!
//! Tries the active profile's root-container selectors in order and settles
//! on the first match that exists, has at least one child element, and is not
//! hidden. Single-page hosts render late, so failures are retried a bounded
//! number of times before degrading to the document body. The resolved root
//! is only valid for the snapshot generation it came from.

use crate::page;
use crate::profiles::Profile;
use crate::types::ExtractionError;
use scraper::{ElementRef, Html};
use tracing::{debug, info, warn};

/// Resolves and re-resolves the conversation root across snapshots
#[derive(Debug)]
pub struct HostResolver {
    max_attempts: u32,
    attempts: u32,
    /// Generation of the snapshot the last successful resolve ran against
    resolved_generation: Option<u64>,
    /// Selector that produced the last successful resolve
    resolved_selector: Option<&'static str>,
}

impl HostResolver {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            attempts: 0,
            resolved_generation: None,
            resolved_selector: None,
        }
    }

    /// Locate the conversation root in `doc`.
    ///
    /// Returns `RootNotFound` while attempts remain (the caller waits out the
    /// retry delay and tries again on a fresh snapshot); once the attempt
    /// budget is spent the whole document body is used instead, so resolution
    /// eventually always succeeds.
    pub fn resolve<'a>(
        &mut self,
        doc: &'a Html,
        generation: u64,
        profile: &Profile,
    ) -> Result<ElementRef<'a>, ExtractionError> {
        for raw in profile.root_selectors {
            let Some(sel) = page::compile_selector(raw) else {
                continue;
            };
            let candidate = doc
                .select(&sel)
                .find(|el| page::child_element_count(*el) > 0 && page::is_visible(*el));
            if let Some(root) = candidate {
                if self.resolved_selector != Some(raw) {
                    debug!("Resolved conversation root via '{}'", raw);
                }
                self.attempts = 0;
                self.resolved_generation = Some(generation);
                self.resolved_selector = Some(raw);
                return Ok(root);
            }
        }

        self.attempts += 1;
        if self.attempts < self.max_attempts {
            debug!(
                "No conversation root yet (attempt {}/{})",
                self.attempts, self.max_attempts
            );
            return Err(ExtractionError::RootNotFound {
                attempts: self.attempts,
            });
        }

        warn!(
            "No conversation root after {} attempts, falling back to document body",
            self.attempts
        );
        self.resolved_generation = Some(generation);
        self.resolved_selector = None;
        Ok(Self::body_or_root(doc))
    }

    fn body_or_root(doc: &Html) -> ElementRef<'_> {
        page::compile_selector("body")
            .and_then(|sel| doc.select(&sel).next())
            .unwrap_or_else(|| doc.root_element())
    }

    /// Whether a root resolved against `generation` is still usable
    pub fn is_stale(&self, generation: u64) -> bool {
        self.resolved_generation != Some(generation)
    }

    /// Forget everything and start a fresh resolution cycle (navigation,
    /// root detached)
    pub fn invalidate(&mut self) {
        if self.resolved_generation.is_some() {
            info!("Conversation root invalidated, will re-resolve");
        }
        self.attempts = 0;
        self.resolved_generation = None;
        self.resolved_selector = None;
    }

    /// Whether the resolver is still inside its retry budget
    pub fn retrying(&self) -> bool {
        self.attempts > 0 && self.attempts < self.max_attempts
    }
}
