/// Page outcome definitions
///
/// Every dispatched fetch ends in exactly one of these states.
use crate::crawler::FetchError;
use std::fmt;

/// Final outcome of a dispatched page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageState {
    // ===== Terminal Success States =====
    /// Page was fetched, extracted and handed to the chunker
    Processed,

    /// Redirected to a page this crawl already accepted; content discarded
    DuplicateRedirect,

    // ===== Terminal Error States =====
    /// Page returned HTTP 4xx (other than 429)
    DeadLink,

    /// Page returned HTTP 429 on every attempt
    RateLimited,

    /// Page returned HTTP 5xx on every attempt
    ServerError,

    /// Page could not be reached (connection refused, DNS failure, timeout)
    Unreachable,

    /// Page Content-Type is not textual
    ContentMismatch,

    /// A redirect left the crawl scope
    OutOfScope,

    /// Page fetch failed for other reasons (body read, redirect loop, etc.)
    Failed,
}

impl PageState {
    /// Maps a fetch failure to the page outcome it produces
    pub fn from_fetch_error(error: &FetchError) -> Self {
        match error {
            FetchError::Status(429) => Self::RateLimited,
            FetchError::Status(code) if (400..500).contains(code) => Self::DeadLink,
            FetchError::Status(code) if *code >= 500 => Self::ServerError,
            FetchError::Timeout | FetchError::Connect(_) => Self::Unreachable,
            FetchError::UnsupportedContentType(_) => Self::ContentMismatch,
            FetchError::RedirectOutOfScope(_) => Self::OutOfScope,
            _ => Self::Failed,
        }
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Processed)
    }

    /// Returns true if this represents an error state
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Processed | Self::DuplicateRedirect)
    }

    /// Stable string form used in logs, summaries and JSON output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::DuplicateRedirect => "duplicate_redirect",
            Self::DeadLink => "dead_link",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::Unreachable => "unreachable",
            Self::ContentMismatch => "content_mismatch",
            Self::OutOfScope => "out_of_scope",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
