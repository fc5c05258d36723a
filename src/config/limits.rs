//! Paging and content limits.

use super::defaults::{
    default_home_count, default_max_comment_length, default_max_page_size, default_page_size,
    default_recent_text_answers, default_search_results,
};
use serde::Deserialize;

/// Listing and content limits applied by the services.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Page size used when a request does not specify one (default: 20).
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    /// Upper bound for any requested page size (default: 100).
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    /// Number of templates returned by the latest/popular listings (default: 6).
    #[serde(default = "default_home_count")]
    pub home_count: u32,
    /// Maximum number of search hits (default: 50).
    #[serde(default = "default_search_results")]
    pub search_results: u32,
    /// Maximum comment length in characters (default: 2000).
    #[serde(default = "default_max_comment_length")]
    pub max_comment_length: usize,
    /// Text answers included per question in template results (default: 10).
    #[serde(default = "default_recent_text_answers")]
    pub recent_text_answers: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            home_count: default_home_count(),
            search_results: default_search_results(),
            max_comment_length: default_max_comment_length(),
            recent_text_answers: default_recent_text_answers(),
        }
    }
}

impl LimitsConfig {
    /// Clamp an optional requested page size into `1..=max_page_size`.
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }

    /// Clamp an optional listing count into `1..=max_page_size`.
    pub fn listing_count(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.home_count)
            .clamp(1, self.max_page_size.max(1))
    }
}
