//! Crawl frontier
//!
//! The frontier owns the set of URLs already accepted for this crawl and the
//! queue of URLs waiting to be fetched. It is shared by all workers:
//! - `offer` is the only way a URL enters the crawl, and it checks depth,
//!   normalization, scope and the visited set in one critical section
//! - `next` hands out work until the page budget is spent or the crawl has
//!   nothing left (empty queue and no page in flight)
//! - `complete` must be called once per dispatched entry

use crate::url::{normalize_parsed, ScopePolicy};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use url::Url;

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: Url,
    /// Link distance from the seed (seed is 0)
    pub depth: u32,
    /// Page the link was discovered on
    pub parent: Option<Url>,
}

#[derive(Debug, Default)]
struct FrontierState {
    queue: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
    dispatched: u32,
    in_flight: u32,
    closed: bool,
}

/// Shared work queue with a visited set and a page budget
#[derive(Debug)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    notify: Notify,
    scope: Arc<ScopePolicy>,
    max_depth: u32,
    max_pages: u32,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `scope` - Policy every offered URL must satisfy
    /// * `max_depth` - Deepest link distance accepted
    /// * `max_pages` - Number of pages that may be dispatched in total
    pub fn new(scope: Arc<ScopePolicy>, max_depth: u32, max_pages: u32) -> Self {
        Self {
            state: Mutex::new(FrontierState::default()),
            notify: Notify::new(),
            scope,
            max_depth,
            max_pages,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Offers a discovered URL
    ///
    /// Returns true if the URL was new, in scope and within depth, and has
    /// been queued. A URL is accepted at most once per crawl.
    pub fn offer(&self, url: &Url, depth: u32, parent: Option<&Url>) -> bool {
        if depth > self.max_depth {
            return false;
        }

        let url = match normalize_parsed(url.clone()) {
            Ok(url) => url,
            Err(_) => return false,
        };

        if !self.scope.check(&url).is_allowed() {
            return false;
        }

        {
            let mut state = self.lock();
            if state.closed || !state.visited.insert(url.to_string()) {
                return false;
            }
            state.queue.push_back(FrontierEntry {
                url,
                depth,
                parent: parent.cloned(),
            });
        }

        self.notify.notify_waiters();
        true
    }

    /// Claims the page a redirected fetch landed on
    ///
    /// Returns false if `target` is a different page that was already
    /// accepted, in which case the fetched content duplicates it.
    pub fn claim_redirect(&self, requested: &Url, target: &Url) -> bool {
        let (requested, target) = match (
            normalize_parsed(requested.clone()),
            normalize_parsed(target.clone()),
        ) {
            (Ok(requested), Ok(target)) => (requested, target),
            _ => return true,
        };
        if requested == target {
            return true;
        }
        self.lock().visited.insert(target.to_string())
    }

    /// Waits for the next URL to fetch
    ///
    /// Returns `None` once the page budget is spent, the frontier is closed,
    /// or the queue is empty with no page in flight that could add more.
    /// Each `Some` counts against the page budget and must be matched by a
    /// call to [`Frontier::complete`].
    pub async fn next(&self) -> Option<FrontierEntry> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a wakeup between the check and the await is not lost
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed || state.dispatched >= self.max_pages {
                    return None;
                }
                if let Some(entry) = state.queue.pop_front() {
                    state.dispatched += 1;
                    state.in_flight += 1;
                    return Some(entry);
                }
                if state.in_flight == 0 {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Marks a dispatched entry as finished
    pub fn complete(&self) {
        {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Stops handing out work and wakes every waiting worker
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
    }

    /// Pages that may still be dispatched
    pub fn remaining_budget(&self) -> u32 {
        self.max_pages.saturating_sub(self.lock().dispatched)
    }

    /// Pages dispatched so far
    pub fn dispatched(&self) -> u32 {
        self.lock().dispatched
    }

    /// Number of queued URLs
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Number of distinct URLs accepted so far
    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }
}
