//! Span query model
//!
//! Declarative query structure accepted by the repository layer: filtering
//! by identity and time window, optional grouping that selects flat vs
//! tree-shaped results, and offset pagination.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::constants::QUERY_MAX_PAGE_SIZE;
use crate::data::error::DataError;

// ============================================================================
// QUERY STRUCTURE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Filtering {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub span_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earliest: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<DateTime<Utc>>,
}

/// Result shape selector. `Trace` focus asks for reconstructed trees,
/// `Node` focus for flat rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GroupingFocus {
    #[default]
    Node,
    Trace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Grouping {
    #[serde(default)]
    pub focus: GroupingFocus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, size: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SpanQuery {
    #[serde(default)]
    pub filtering: Filtering,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping: Option<Grouping>,
    #[serde(default)]
    pub pagination: Pagination,
}

impl SpanQuery {
    /// Validates pagination bounds before the query reaches a backend.
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.pagination.page == 0 {
            return Err(QueryError::validation("pagination.page must be >= 1"));
        }
        if self.pagination.size == 0 || self.pagination.size > QUERY_MAX_PAGE_SIZE {
            return Err(QueryError::validation(format!(
                "pagination.size must be in 1..={QUERY_MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }

    pub fn wants_trees(&self) -> bool {
        matches!(
            self.grouping,
            Some(Grouping {
                focus: GroupingFocus::Trace,
            })
        )
    }
}

// ============================================================================
// ANALYTICS
// ============================================================================

/// One metric to aggregate per time bucket, addressed by its dotted path
/// inside the metrics bag, e.g. "acc.costs.total".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub metric: String,
}

/// One time bucket of aggregated values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsBucket {
    pub timestamp: DateTime<Utc>,
    pub count: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, f64>,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid query: {0}")]
    Validation(String),
    #[error(transparent)]
    Data(#[from] DataError),
}

impl QueryError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
