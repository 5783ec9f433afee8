use crate::IndexError;
use std::fmt;

/// Lifecycle of a single crawl
///
/// Phases only move forward: `Seeding → Draining → Finalizing → Done`.
/// `Seeding` may jump straight to `Finalizing` when the seed is never
/// dispatched (for example when the crawl is cancelled before it starts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CrawlPhase {
    /// Seed offered to the frontier, no worker dispatched yet
    Seeding,
    /// Workers fetch, extract, discover and chunk
    Draining,
    /// Outstanding embedding batches are flushed; no new pages
    Finalizing,
    /// Summary assembled
    Done,
}

impl CrawlPhase {
    /// Returns true if moving from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        matches!(
            (self, next),
            (Self::Seeding, Self::Draining)
                | (Self::Seeding, Self::Finalizing)
                | (Self::Draining, Self::Finalizing)
                | (Self::Finalizing, Self::Done)
        )
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Seeding => "seeding",
            Self::Draining => "draining",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Tracks the current phase and rejects backwards or skipping moves
#[derive(Debug)]
pub struct PhaseTracker {
    current: CrawlPhase,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: CrawlPhase::Seeding,
        }
    }

    pub fn current(&self) -> CrawlPhase {
        self.current
    }

    /// Moves to `next`, failing on an invalid transition
    pub fn advance(&mut self, next: CrawlPhase) -> Result<(), IndexError> {
        if !self.current.can_transition_to(next) {
            return Err(IndexError::InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        tracing::debug!("Crawl phase {} -> {}", self.current, next);
        self.current = next;
        Ok(())
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
