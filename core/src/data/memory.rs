//! In-memory span store
//!
//! Reference backend used in tests and single-process deployments. Spans are
//! kept per project in a BTreeMap keyed by "{trace_id}/{span_id}" so scans
//! are deterministic. All operations take the lock briefly and clone out.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use parking_lot::RwLock;

use crate::data::error::DataError;
use crate::data::traits::SpanRepository;
use crate::data::types::{
    AnalyticsBucket, MetricSpec, Span, SpanLink, SpanQuery,
};

/// In-memory implementation of [`SpanRepository`]
#[derive(Default)]
pub struct InMemorySpanStore {
    /// project_id -> span key -> span
    projects: RwLock<HashMap<String, BTreeMap<String, Span>>>,
}

impl InMemorySpanStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn span_key(link: &SpanLink) -> String {
        format!("{}/{}", link.trace_id, link.span_id)
    }

    /// Resolve a dotted metric path like "acc.costs.total" against a span
    fn metric_value(span: &Span, path: &str) -> Option<f64> {
        let (bucket, key) = path.split_once('.')?;
        match bucket {
            "acc" => span.attributes.metrics.acc.get(key).copied(),
            "unit" => span.attributes.metrics.unit.get(key).copied(),
            _ => None,
        }
    }

    fn matches(span: &Span, query: &SpanQuery) -> bool {
        let f = &query.filtering;
        if !f.trace_ids.is_empty() && !f.trace_ids.contains(&span.trace_id) {
            return false;
        }
        if !f.span_ids.is_empty() && !f.span_ids.contains(&span.span_id) {
            return false;
        }
        if let Some(earliest) = f.earliest {
            if span.start_time < earliest {
                return false;
            }
        }
        if let Some(latest) = f.latest {
            if span.start_time > latest {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl SpanRepository for InMemorySpanStore {
    async fn create_one(&self, project_id: &str, span: Span) -> Result<SpanLink, DataError> {
        let link = span.link();
        let mut projects = self.projects.write();
        projects
            .entry(project_id.to_string())
            .or_default()
            .insert(Self::span_key(&link), span);
        Ok(link)
    }

    async fn create_many(
        &self,
        project_id: &str,
        spans: Vec<Span>,
    ) -> Result<Vec<SpanLink>, DataError> {
        let mut links = Vec::with_capacity(spans.len());
        let mut projects = self.projects.write();
        let store = projects.entry(project_id.to_string()).or_default();
        for span in spans {
            let link = span.link();
            store.insert(Self::span_key(&link), span);
            links.push(link);
        }
        Ok(links)
    }

    async fn read_one(
        &self,
        project_id: &str,
        link: &SpanLink,
    ) -> Result<Option<Span>, DataError> {
        let projects = self.projects.read();
        Ok(projects
            .get(project_id)
            .and_then(|store| store.get(&Self::span_key(link)))
            .cloned())
    }

    async fn read_many(
        &self,
        project_id: &str,
        links: &[SpanLink],
    ) -> Result<Vec<Span>, DataError> {
        let projects = self.projects.read();
        let Some(store) = projects.get(project_id) else {
            return Ok(Vec::new());
        };
        Ok(links
            .iter()
            .filter_map(|link| store.get(&Self::span_key(link)).cloned())
            .collect())
    }

    async fn delete_one(&self, project_id: &str, link: &SpanLink) -> Result<u64, DataError> {
        self.delete_many(project_id, std::slice::from_ref(link)).await
    }

    async fn delete_many(&self, project_id: &str, links: &[SpanLink]) -> Result<u64, DataError> {
        let mut projects = self.projects.write();
        let Some(store) = projects.get_mut(project_id) else {
            return Ok(0);
        };
        let mut removed = 0u64;
        for link in links {
            if store.remove(&Self::span_key(link)).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn query(
        &self,
        project_id: &str,
        query: &SpanQuery,
    ) -> Result<(Vec<Span>, u64), DataError> {
        let projects = self.projects.read();
        let Some(store) = projects.get(project_id) else {
            return Ok((Vec::new(), 0));
        };

        let mut rows: Vec<Span> = store
            .values()
            .filter(|span| Self::matches(span, query))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.span_id.cmp(&b.span_id))
        });

        let total = rows.len() as u64;
        let page = query.pagination.page.max(1);
        let size = query.pagination.size;
        let offset = (page - 1).saturating_mul(size);
        let rows = if offset >= rows.len() {
            Vec::new()
        } else {
            rows.into_iter().skip(offset).take(size).collect()
        };
        Ok((rows, total))
    }

    async fn analytics(
        &self,
        project_id: &str,
        query: &SpanQuery,
        specs: &[MetricSpec],
    ) -> Result<Vec<AnalyticsBucket>, DataError> {
        let projects = self.projects.read();
        let Some(store) = projects.get(project_id) else {
            return Ok(Vec::new());
        };

        let mut buckets: BTreeMap<DateTime<Utc>, AnalyticsBucket> = BTreeMap::new();
        for span in store.values().filter(|span| Self::matches(span, query)) {
            let hour = span
                .start_time
                .with_minute(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(span.start_time);
            let bucket = buckets.entry(hour).or_insert_with(|| AnalyticsBucket {
                timestamp: hour,
                count: 0,
                values: BTreeMap::new(),
            });
            bucket.count += 1;
            for spec in specs {
                if let Some(value) = Self::metric_value(span, &spec.metric) {
                    *bucket.values.entry(spec.metric.clone()).or_insert(0.0) += value;
                }
            }
        }
        Ok(buckets.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::{Filtering, Pagination};
    use chrono::TimeZone;

    fn span(trace_id: &str, span_id: &str, hour: u32) -> Span {
        Span {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            name: span_id.into(),
            start_time: Utc.with_ymd_and_hms(2025, 6, 1, hour, 15, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 6, 1, hour, 15, 5).unwrap(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_read_round_trip() {
        let store = InMemorySpanStore::new();
        let link = store.create_one("p1", span("t1", "s1", 10)).await.unwrap();
        let found = store.read_one("p1", &link).await.unwrap();
        assert_eq!(found.unwrap().span_id, "s1");

        // Project isolation
        assert!(store.read_one("p2", &link).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_many_counts_removed() {
        let store = InMemorySpanStore::new();
        let links = store
            .create_many("p1", vec![span("t1", "s1", 10), span("t1", "s2", 10)])
            .await
            .unwrap();
        let removed = store.delete_many("p1", &links).await.unwrap();
        assert_eq!(removed, 2);
        let removed_again = store.delete_many("p1", &links).await.unwrap();
        assert_eq!(removed_again, 0);
    }

    #[tokio::test]
    async fn test_query_filters_and_paginates() {
        let store = InMemorySpanStore::new();
        store
            .create_many(
                "p1",
                vec![
                    span("t1", "s1", 10),
                    span("t1", "s2", 11),
                    span("t2", "s3", 12),
                ],
            )
            .await
            .unwrap();

        let query = SpanQuery {
            filtering: Filtering {
                trace_ids: vec!["t1".into()],
                ..Default::default()
            },
            pagination: Pagination { page: 1, size: 1 },
            ..Default::default()
        };
        let (rows, total) = store.query("p1", &query).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].span_id, "s1");
    }

    #[tokio::test]
    async fn test_query_time_window() {
        let store = InMemorySpanStore::new();
        store
            .create_many("p1", vec![span("t1", "s1", 10), span("t1", "s2", 14)])
            .await
            .unwrap();

        let query = SpanQuery {
            filtering: Filtering {
                earliest: Some(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()),
                ..Default::default()
            },
            ..Default::default()
        };
        let (rows, total) = store.query("p1", &query).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].span_id, "s2");
    }

    #[tokio::test]
    async fn test_analytics_buckets_by_hour() {
        let store = InMemorySpanStore::new();
        let mut a = span("t1", "s1", 10);
        a.attributes.metrics.acc.insert("costs.total".into(), 1.5);
        let mut b = span("t1", "s2", 10);
        b.attributes.metrics.acc.insert("costs.total".into(), 0.5);
        let c = span("t1", "s3", 11);
        store.create_many("p1", vec![a, b, c]).await.unwrap();

        let specs = vec![MetricSpec {
            metric: "acc.costs.total".into(),
        }];
        let buckets = store
            .analytics("p1", &SpanQuery::default(), &specs)
            .await
            .unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].count, 2);
        assert_eq!(buckets[0].values.get("acc.costs.total"), Some(&2.0));
        assert_eq!(buckets[1].count, 1);
        assert!(buckets[1].values.is_empty());
    }
}
