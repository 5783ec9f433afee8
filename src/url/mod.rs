//! URL handling module for Site-Index
//!
//! This module provides URL normalization, registrable-domain extraction,
//! wildcard matching and the crawl scope policy.

mod domain;
mod matcher;
mod normalize;

use crate::config::DomainEntry;
use crate::UrlError;
use url::Url;

// Re-export main functions
pub use domain::{extract_domain, registrable_domain};
pub use matcher::{matches_any, matches_wildcard};
pub use normalize::{normalize_parsed, normalize_url};

/// Outcome of checking a URL against the crawl scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeDecision {
    /// The URL may be fetched
    InScope,
    /// Same-domain crawling is on and the URL leaves the seed's registrable domain
    OffDomain,
    /// The host is on the deny list, or an allow list exists and does not cover it
    Denied,
}

impl ScopeDecision {
    /// Returns true if the URL may be fetched
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::InScope)
    }
}

/// Decides which URLs belong to a crawl
///
/// Checks are applied in priority order:
/// 1. Deny list (highest priority)
/// 2. Allow list, when non-empty
/// 3. Same-domain restriction against the seed's registrable domain
#[derive(Debug, Clone)]
pub struct ScopePolicy {
    seed_domain: String,
    same_domain: bool,
    allow: Vec<DomainEntry>,
    deny: Vec<DomainEntry>,
}

impl ScopePolicy {
    /// Creates a policy anchored on the seed URL
    ///
    /// # Arguments
    ///
    /// * `seed` - The crawl's seed URL
    /// * `same_domain` - Restrict the crawl to the seed's registrable domain
    /// * `allow` - Optional allow list (empty means everything)
    /// * `deny` - Deny list
    pub fn new(
        seed: &Url,
        same_domain: bool,
        allow: Vec<DomainEntry>,
        deny: Vec<DomainEntry>,
    ) -> Result<Self, UrlError> {
        let seed_domain = registrable_domain(seed).ok_or(UrlError::MissingDomain)?;
        Ok(Self {
            seed_domain,
            same_domain,
            allow,
            deny,
        })
    }

    /// The seed's registrable domain
    pub fn seed_domain(&self) -> &str {
        &self.seed_domain
    }

    /// Classifies a URL against this policy
    pub fn check(&self, url: &Url) -> ScopeDecision {
        let host = match extract_domain(url) {
            Some(host) => host,
            None => return ScopeDecision::Denied,
        };

        if matches_any(&self.deny, &host) {
            return ScopeDecision::Denied;
        }

        if !self.allow.is_empty() && !matches_any(&self.allow, &host) {
            return ScopeDecision::Denied;
        }

        if self.same_domain && registrable_domain(url).as_deref() != Some(self.seed_domain.as_str())
        {
            return ScopeDecision::OffDomain;
        }

        ScopeDecision::InScope
    }
}
