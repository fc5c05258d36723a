//! Route handlers, grouped by entity.

pub mod admin;
pub mod catalog;
pub mod forms;
pub mod responses;
pub mod session;
pub mod social;
pub mod templates;

use crate::services::base::clamp_to_u32;
use serde::Deserialize;

/// `?limit=` for short listings.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    /// The requested count, negative values saturating to zero.
    pub fn count(&self) -> Option<u32> {
        self.limit.map(clamp_to_u32)
    }
}
