//! Span ingestion service
//!
//! Normalizes flat producer spans into canonical spans, derives costs from
//! token counts, computes subtree rollups, and persists through the
//! repository either directly or via the buffer.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::data::types::{
    AnalyticsBucket, FlatSpan, Lifecycle, MetricSpec, QueryError, Span, SpanLink, SpanQuery,
    Status,
};
use crate::data::{DataError, SpanRepository};
use crate::domain::attributes::{self, AttributeAdapter};
use crate::domain::buffer::{codec, BufferedItem, CodecError, SpanBuffer};
use crate::domain::pricing::PricingService;
use crate::utils::string::{random_name_token, NAME_TOKEN_LENGTH};
use crate::utils::time::nanos_to_datetime;

pub mod tree;

// ============================================================================
// SERVICE
// ============================================================================

pub struct SpanService {
    repository: Arc<dyn SpanRepository>,
    pricing: Arc<PricingService>,
    adapters: Vec<Box<dyn AttributeAdapter>>,
}

impl SpanService {
    pub fn new(repository: Arc<dyn SpanRepository>, pricing: Arc<PricingService>) -> Self {
        Self {
            repository,
            pricing,
            adapters: attributes::default_adapters(),
        }
    }

    // ==================== Ingestion ====================

    /// Normalize and persist a batch of flat spans
    pub async fn ingest(
        &self,
        project_id: &str,
        flat_spans: Vec<FlatSpan>,
    ) -> Result<Vec<SpanLink>, DataError> {
        let spans = self.normalize_batch(flat_spans);
        self.repository.create_many(project_id, spans).await
    }

    /// Normalize a batch and enqueue it for deferred persistence.
    ///
    /// Returns false when the buffer rejected the batch; nothing is
    /// persisted in that case.
    pub fn ingest_buffered(
        &self,
        buffer: &SpanBuffer,
        organization_id: &str,
        project_id: &str,
        flat_spans: Vec<FlatSpan>,
    ) -> Result<bool, CodecError> {
        let spans = self.normalize_batch(flat_spans);
        let mut items = Vec::with_capacity(spans.len());
        for span in &spans {
            items.push(BufferedItem::new(codec::encode(
                organization_id,
                project_id,
                span,
            )?));
        }
        Ok(buffer.enqueue_batch(items))
    }

    /// Normalize a batch: canonicalize attributes, default missing fields,
    /// derive costs, then compute subtree rollups across the batch.
    fn normalize_batch(&self, flat_spans: Vec<FlatSpan>) -> Vec<Span> {
        let now = Utc::now();
        let mut spans: Vec<Span> = flat_spans
            .into_iter()
            .filter_map(|flat| {
                if flat.trace_id.is_empty() || flat.span_id.is_empty() {
                    tracing::warn!(
                        trace_id = %flat.trace_id,
                        span_id = %flat.span_id,
                        "Span missing identity, skipping"
                    );
                    return None;
                }
                Some(self.normalize_one(flat, now))
            })
            .collect();
        tree::rollup_metrics(&mut spans);
        spans
    }

    fn normalize_one(&self, flat: FlatSpan, now: DateTime<Utc>) -> Span {
        let mut span = Span {
            trace_id: flat.trace_id,
            span_id: flat.span_id,
            parent_id: flat.parent_id,
            ..Default::default()
        };

        attributes::canonicalize(&self.adapters, &flat.attributes, &mut span.attributes);

        // Timestamps: a one-sided span copies the known side, a timeless
        // span gets the ingestion instant
        let start = flat.start_time_unix_nano.map(nanos_to_datetime);
        let end = flat.end_time_unix_nano.map(nanos_to_datetime);
        (span.start_time, span.end_time) = match (start, end) {
            (Some(s), Some(e)) => (s, e),
            (Some(s), None) => (s, s),
            (None, Some(e)) => (e, e),
            (None, None) => (now, now),
        };

        span.name = match flat.name.filter(|n| !n.is_empty()) {
            Some(name) => name,
            None => random_name_token(NAME_TOKEN_LENGTH),
        };

        // Explicit flat fields win over adapter-derived type hints
        span.trace_type = flat
            .trace_type
            .or(span.attributes.types.trace)
            .unwrap_or_default();
        span.span_type = flat
            .span_type
            .or(span.attributes.types.node)
            .unwrap_or_default();
        span.span_kind = flat.span_kind.unwrap_or_default();
        span.status = Status {
            code: flat.status_code.unwrap_or_default(),
            message: flat.status_message,
        };

        span.references = flat.references;
        span.links = flat.links;
        span.events = flat.events;
        span.lifecycle = Lifecycle {
            created_at: Some(now),
            created_by_id: flat.created_by_id,
            ..Default::default()
        };

        self.derive_metrics(&mut span);
        span
    }

    /// Derive unit metrics the producer did not report: duration, error
    /// count, and token-based costs.
    fn derive_metrics(&self, span: &mut Span) {
        if span.end_time > span.start_time {
            let millis = (span.end_time - span.start_time).num_milliseconds() as f64;
            span.attributes
                .metrics
                .unit
                .entry("duration.total".into())
                .or_insert(millis);
        }
        if span.status.code == crate::data::types::StatusCode::Error {
            span.attributes
                .metrics
                .unit
                .entry("errors.count".into())
                .or_insert(1.0);
        }

        // Producer-reported costs are authoritative, partial ones included
        if span
            .attributes
            .metrics
            .unit
            .keys()
            .any(|key| key.starts_with("costs."))
        {
            return;
        }
        let Some(model) = span.attributes.model_id().map(String::from) else {
            return;
        };
        let unit = &span.attributes.metrics.unit;
        let prompt_tokens = unit.get("tokens.prompt").copied().unwrap_or(0.0);
        let completion_tokens = unit.get("tokens.completion").copied().unwrap_or(0.0);
        if prompt_tokens == 0.0 && completion_tokens == 0.0 {
            return;
        }

        let cost = self
            .pricing
            .calculate(&model, prompt_tokens, completion_tokens);
        if cost.is_calculated() {
            let metrics = &mut span.attributes.metrics;
            metrics.unit.insert("costs.prompt".into(), cost.prompt);
            metrics
                .unit
                .insert("costs.completion".into(), cost.completion);
            metrics.unit.insert("costs.total".into(), cost.total);
        }
    }

    // ==================== Writes ====================

    /// Store an already-normalized span without running it through ingestion.
    pub async fn create_one(&self, project_id: &str, span: Span) -> Result<SpanLink, DataError> {
        self.repository.create_one(project_id, span).await
    }

    pub async fn create_many(
        &self,
        project_id: &str,
        spans: Vec<Span>,
    ) -> Result<Vec<SpanLink>, DataError> {
        self.repository.create_many(project_id, spans).await
    }

    // ==================== Reads ====================

    pub async fn read_one(
        &self,
        project_id: &str,
        link: &SpanLink,
    ) -> Result<Option<Span>, DataError> {
        self.repository.read_one(project_id, link).await
    }

    pub async fn read_many(
        &self,
        project_id: &str,
        links: &[SpanLink],
    ) -> Result<Vec<Span>, DataError> {
        self.repository.read_many(project_id, links).await
    }

    // ==================== Deletes ====================

    pub async fn delete_one(&self, project_id: &str, link: &SpanLink) -> Result<u64, DataError> {
        self.repository.delete_one(project_id, link).await
    }

    pub async fn delete_many(
        &self,
        project_id: &str,
        links: &[SpanLink],
    ) -> Result<u64, DataError> {
        self.repository.delete_many(project_id, links).await
    }

    // ==================== Query ====================

    /// Query spans. Trace-focused grouping returns reconstructed trees; the
    /// returned count is always the flat row count.
    pub async fn query(
        &self,
        project_id: &str,
        query: &SpanQuery,
    ) -> Result<(Vec<Span>, u64), QueryError> {
        query.validate()?;
        let (rows, total) = self.repository.query(project_id, query).await?;
        if query.wants_trees() {
            return Ok((tree::reconstruct(rows), total));
        }
        Ok((rows, total))
    }

    pub async fn analytics(
        &self,
        project_id: &str,
        query: &SpanQuery,
        specs: &[MetricSpec],
    ) -> Result<Vec<AnalyticsBucket>, QueryError> {
        query.validate()?;
        Ok(self.repository.analytics(project_id, query, specs).await?)
    }
}

/// Convenience constructor for callers that only have raw attribute pairs
pub fn flat_span(
    trace_id: &str,
    span_id: &str,
    parent_id: Option<&str>,
    attributes: HashMap<String, serde_json::Value>,
) -> FlatSpan {
    FlatSpan {
        trace_id: trace_id.to_string(),
        span_id: span_id.to_string(),
        parent_id: parent_id.map(String::from),
        attributes,
        ..Default::default()
    }
}
