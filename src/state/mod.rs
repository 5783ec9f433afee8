//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: The orchestrator's forward-only lifecycle
//! - `PageState`: The outcome of each dispatched page

mod crawl_phase;
mod page_state;

// Re-export main types
pub use crawl_phase::{CrawlPhase, PhaseTracker};
pub use page_state::PageState;
