//! Repository trait for span storage backends
//!
//! Defines the unified interface the domain layer uses to persist and read
//! spans. Backends implement this trait with their own storage logic; the
//! domain layer only ever sees `SpanRepository`.

use async_trait::async_trait;

use crate::data::error::DataError;
use crate::data::types::{AnalyticsBucket, MetricSpec, Span, SpanLink, SpanQuery};

// ============================================================================
// Span Repository Trait
// ============================================================================

/// Repository trait for span persistence, scoped by project
#[async_trait]
pub trait SpanRepository: Send + Sync {
    // ==================== Write Operations ====================

    /// Persist a single span, returning its identity
    async fn create_one(&self, project_id: &str, span: Span) -> Result<SpanLink, DataError>;

    /// Persist a batch of spans, returning their identities in input order
    async fn create_many(
        &self,
        project_id: &str,
        spans: Vec<Span>,
    ) -> Result<Vec<SpanLink>, DataError>;

    // ==================== Read Operations ====================

    /// Get a single span by identity
    async fn read_one(
        &self,
        project_id: &str,
        link: &SpanLink,
    ) -> Result<Option<Span>, DataError>;

    /// Get a batch of spans by identity; missing identities are skipped
    async fn read_many(
        &self,
        project_id: &str,
        links: &[SpanLink],
    ) -> Result<Vec<Span>, DataError>;

    // ==================== Delete Operations ====================

    /// Delete a single span by identity
    async fn delete_one(&self, project_id: &str, link: &SpanLink) -> Result<u64, DataError>;

    /// Delete a batch of spans by identity, returning the number removed
    async fn delete_many(&self, project_id: &str, links: &[SpanLink]) -> Result<u64, DataError>;

    // ==================== Query Operations ====================

    /// Query spans with filtering and pagination. Returns the page of flat
    /// rows plus the total matching row count.
    async fn query(
        &self,
        project_id: &str,
        query: &SpanQuery,
    ) -> Result<(Vec<Span>, u64), DataError>;

    /// Aggregate metric values into hourly time buckets
    async fn analytics(
        &self,
        project_id: &str,
        query: &SpanQuery,
        specs: &[MetricSpec],
    ) -> Result<Vec<AnalyticsBucket>, DataError>;
}
