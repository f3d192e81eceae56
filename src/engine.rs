//! Main orchestration for the transcript extraction engine.
//!
//! This module wires the pieces together: snapshots come in from the host
//! embedding, the scheduler decides when to look, the resolver finds the
//! conversation root, the scanner produces a candidate batch, and the
//! aggregator folds it into the canonical transcript. Non-empty deltas are
//! pushed to the notification sink.

use crate::aggregator::TranscriptAggregator;
use crate::config::Config;
use crate::page::PageSnapshot;
use crate::profiles::{Profile, ProfileRegistry};
use crate::resolver::HostResolver;
use crate::scanner;
use crate::scheduler::{ChangeScheduler, ScanReason};
use crate::types::{ExtractionError, HostEvent, Message, TranscriptUpdate};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};
use url::Url;

/// Main transcript extraction engine
pub struct TranscriptEngine {
    /// Configuration
    config: Config,
    /// Known host profiles
    registry: ProfileRegistry,
    /// Active profile for the current location
    profile: &'static Profile,
    /// Latest page snapshot, if any
    snapshot: Option<PageSnapshot>,
    /// Bumped on every snapshot push
    generation: u64,
    /// Current page location
    location: Option<Url>,
    /// Conversation root resolution
    resolver: HostResolver,
    /// Scan timing
    scheduler: ChangeScheduler,
    /// Canonical transcript state
    aggregator: TranscriptAggregator,
    /// Digest of the last snapshot actually scanned
    last_digest: Option<String>,
    /// Earliest instant a poll scan may retry root lookup after a miss
    root_retry_at: Option<Instant>,
    /// Channel for transcript updates
    update_tx: mpsc::Sender<TranscriptUpdate>,
    /// Whether the engine is paused by external control
    paused: bool,
    /// Total scans run
    scans_total: u64,
    /// Candidates produced by the most recent scan
    last_candidate_count: usize,
}

impl TranscriptEngine {
    /// Create a new engine
    pub fn new(config: Config, update_tx: mpsc::Sender<TranscriptUpdate>) -> Self {
        let registry = ProfileRegistry::new();
        let profile = registry.for_location(None);
        let resolver = HostResolver::new(config.resolver.max_root_attempts);
        let scheduler = ChangeScheduler::new(
            config.scheduler.clone(),
            config.pause.clone(),
            Instant::now(),
        );

        Self {
            config,
            registry,
            profile,
            snapshot: None,
            generation: 0,
            location: None,
            resolver,
            scheduler,
            aggregator: TranscriptAggregator::new(),
            last_digest: None,
            root_retry_at: None,
            update_tx,
            paused: false,
            scans_total: 0,
            last_candidate_count: 0,
        }
    }

    /// Accept a fresh capture of the page.
    ///
    /// Older snapshots and any roots resolved against them become stale
    /// immediately; nothing is scanned until the scheduler says so.
    pub fn push_snapshot(&mut self, html: String) {
        self.generation += 1;
        trace!(
            "Snapshot generation {} ({} bytes)",
            self.generation,
            html.len()
        );
        self.snapshot = Some(PageSnapshot::new(
            html,
            self.location.clone(),
            self.generation,
        ));
    }

    /// Handle a change in the page location.
    ///
    /// Navigation means a different conversation: the transcript, the
    /// resolver, and all timers start over, and the profile is re-matched
    /// against the new host.
    pub fn set_location(&mut self, url: &str) {
        let parsed = match Url::parse(url) {
            Ok(u) => Some(u),
            Err(e) => {
                warn!("Unparseable location '{}': {}", url, e);
                None
            }
        };

        let same = match (&self.location, &parsed) {
            (Some(old), Some(new)) => old == new,
            (None, None) => true,
            _ => false,
        };
        if same {
            return;
        }

        self.location = parsed;
        self.profile = self.registry.for_location(self.location.as_ref());
        info!(
            "Location changed, active profile: {}",
            self.profile.host
        );

        let removed = self.aggregator.reset();
        if removed.removed > 0 {
            debug!("Dropped {} messages from previous conversation", removed.removed);
        }
        self.resolver.invalidate();
        self.scheduler.reset(Instant::now());
        self.last_digest = None;
        self.root_retry_at = None;
    }

    /// Handle a change notification from the host embedding
    pub fn handle_event(&mut self, event: HostEvent) {
        if let HostEvent::LocationChanged { url } = &event {
            let url = url.clone();
            self.set_location(&url);
        }
        self.scheduler.note_event(&event, Instant::now());
    }

    /// Run one tick of the engine.
    ///
    /// Asks the scheduler whether a scan is due and runs it if so. Root
    /// lookup misses inside the retry budget are quiet; the next tick tries
    /// again on whatever snapshot is current then.
    pub async fn tick(&mut self) -> Result<(), ExtractionError> {
        if self.paused || !self.config.general.enabled {
            return Ok(());
        }

        let now = Instant::now();
        let Some(reason) = self.scheduler.due(now) else {
            return Ok(());
        };

        match self.scan(reason).await {
            Ok(()) => Ok(()),
            Err(ExtractionError::NoSnapshot) => {
                trace!("Scan due but no snapshot yet");
                self.scheduler.record_scan_result(false, Instant::now());
                Ok(())
            }
            Err(ExtractionError::RootNotFound { attempts }) => {
                trace!("Root lookup miss (attempt {}), will retry", attempts);
                self.scheduler.schedule_retry(
                    Duration::from_millis(self.config.resolver.retry_delay_ms),
                    Instant::now(),
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Run one scan immediately, regardless of the scheduler.
    pub async fn scan_now(&mut self) -> Result<(), ExtractionError> {
        self.scan(ScanReason::Change).await
    }

    async fn scan(&mut self, reason: ScanReason) -> Result<(), ExtractionError> {
        let snapshot = self.snapshot.as_ref().ok_or(ExtractionError::NoSnapshot)?;

        // Poll scans on byte-identical markup can't find anything new
        let digest = snapshot.digest();
        if reason == ScanReason::Poll && self.last_digest.as_ref() == Some(&digest) {
            trace!("Snapshot unchanged, skipping poll scan");
            self.scheduler.record_scan_result(false, Instant::now());
            return Ok(());
        }

        // A root lookup miss arms a retry deadline; poll scans wait it out
        // instead of burning resolver attempts at tick rate. Change scans
        // still try right away, since the host said something moved.
        if reason == ScanReason::Poll {
            if let Some(retry_at) = self.root_retry_at {
                let now = Instant::now();
                if now < retry_at {
                    trace!("Root retry delay still running, skipping poll scan");
                    self.scheduler.record_scan_result(false, now);
                    return Ok(());
                }
            }
        }

        // The parsed document is not Send; keep it out of scope before the
        // channel send below so the engine future stays spawnable
        let delta = {
            let doc = snapshot.parse();
            let root = match self
                .resolver
                .resolve(&doc, snapshot.generation(), self.profile)
            {
                Ok(root) => root,
                Err(e) => {
                    let now = Instant::now();
                    self.root_retry_at =
                        Some(now + Duration::from_millis(self.config.resolver.retry_delay_ms));
                    self.scheduler.record_scan_result(false, now);
                    return Err(e);
                }
            };
            self.root_retry_at = None;
            let batch = scanner::scan(root, self.profile, &self.config.scanner);
            self.last_candidate_count = batch.len();
            self.aggregator.merge(batch)
        };
        let changed = !delta.is_empty();
        self.last_digest = Some(digest);

        self.scans_total += 1;
        self.scheduler.record_scan_result(changed, Instant::now());
        debug!(
            "Scan #{} ({}) done: +{} ~{} ({} total)",
            self.scans_total,
            reason.as_str(),
            delta.added,
            delta.changed,
            self.aggregator.len()
        );

        if changed {
            let update = TranscriptUpdate {
                transcript: self.aggregator.snapshot(),
                exchanges: self.aggregator.exchanges(),
                delta,
            };
            if let Err(e) = self.update_tx.send(update).await {
                error!("Failed to deliver transcript update: {}", e);
                return Err(ExtractionError::SinkClosed);
            }
        }

        Ok(())
    }

    /// Owned copy of the current transcript
    pub fn transcript_snapshot(&self) -> Vec<Message> {
        self.aggregator.snapshot()
    }

    /// Drop all conversation state but keep the current location and profile
    pub fn reset(&mut self) {
        info!("Engine reset");
        self.aggregator.reset();
        self.resolver.invalidate();
        self.scheduler.reset(Instant::now());
        self.last_digest = None;
        self.root_retry_at = None;
    }

    /// Pause the engine
    pub fn pause(&mut self) {
        info!("Engine paused");
        self.paused = true;
    }

    /// Resume the engine
    pub fn resume(&mut self) {
        info!("Engine resumed");
        self.paused = false;
    }

    /// Check if the engine is paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Get engine status
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            paused: self.paused,
            profile: self.profile.host,
            messages: self.aggregator.len(),
            scans_total: self.scans_total,
            last_candidate_count: self.last_candidate_count,
        }
    }
}

/// Engine status information
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub paused: bool,
    pub profile: &'static str,
    pub messages: usize,
    pub scans_total: u64,
    pub last_candidate_count: usize,
}
