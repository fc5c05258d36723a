//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

// =============================================================================
// Server / Database Defaults
// =============================================================================

pub fn default_true() -> bool {
    true
}

pub fn default_database_path() -> String {
    "customforms.db".to_string()
}

pub fn default_max_connections() -> u32 {
    5
}

pub fn default_user_header() -> String {
    "x-user-id".to_string()
}

// =============================================================================
// Limits Defaults
// =============================================================================

pub fn default_page_size() -> u32 {
    20
}

pub fn default_max_page_size() -> u32 {
    100
}

pub fn default_home_count() -> u32 {
    6
}

pub fn default_search_results() -> u32 {
    50
}

pub fn default_max_comment_length() -> usize {
    2000
}

pub fn default_recent_text_answers() -> u32 {
    10
}

// =============================================================================
// Retry Defaults
// =============================================================================

pub fn default_retry_attempts() -> u32 {
    3
}

pub fn default_retry_backoff_ms() -> u64 {
    200
}

// =============================================================================
// Topic Defaults
// =============================================================================

pub fn default_topics() -> Vec<String> {
    [
        "General",
        "Education",
        "Business",
        "Feedback",
        "Events",
        "Survey",
        "Registration",
        "Customer",
        "Product",
        "Marketing",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
