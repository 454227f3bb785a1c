//! Span repository: the durable, indexed span store
//!
//! Insertion is idempotent on (tenant_id, span_id): a duplicate returns
//! `Duplicate` without writing. Batch insertion is partial-success; one
//! failed row never fails the batch.

use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::data::error::DataError;
use crate::data::types::{InsertOutcome, NewSpan, SpanFilters, SpanKind, SpanStats, StoredSpan};
use crate::utils::time::{from_epoch_ms, to_epoch_ms};

pub struct SpanRepository<'a> {
    pool: &'a SqlitePool,
}

/// Per-item outcome of a batch insert
#[derive(Debug)]
pub enum BatchOutcome {
    Ok(InsertOutcome),
    /// The row was rejected by the store; the rest of the batch proceeds
    Failed(String),
}

impl<'a> SpanRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a single span. Duplicate span_ids are acknowledged without writing.
    pub async fn insert(&self, tenant_id: &str, span: &NewSpan) -> Result<InsertOutcome, DataError> {
        let now = chrono::Utc::now().timestamp_millis();
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO spans (
                tenant_id, trace_id, span_id, parent_span_id, service_name,
                operation, kind, start_time_ms, end_time_ms, latency_ms,
                status_code, error, downstream, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tenant_id)
        .bind(&span.trace_id)
        .bind(&span.span_id)
        .bind(&span.parent_span_id)
        .bind(&span.service_name)
        .bind(&span.operation)
        .bind(span.kind.as_str())
        .bind(to_epoch_ms(span.start_time))
        .bind(to_epoch_ms(span.end_time))
        .bind(span.latency_ms)
        .bind(span.status_code)
        .bind(&span.error)
        .bind(&span.downstream)
        .bind(now)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::trace!(tenant_id, span_id = %span.span_id, "Duplicate span ignored");
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    /// Insert a batch of spans with per-item outcomes.
    ///
    /// A storage failure is fatal to the specific span only.
    pub async fn insert_batch(
        &self,
        tenant_id: &str,
        spans: &[NewSpan],
    ) -> Result<Vec<BatchOutcome>, DataError> {
        let mut outcomes = Vec::with_capacity(spans.len());
        for span in spans {
            match self.insert(tenant_id, span).await {
                Ok(outcome) => outcomes.push(BatchOutcome::Ok(outcome)),
                Err(e) => {
                    tracing::warn!(
                        tenant_id,
                        span_id = %span.span_id,
                        error = %e,
                        "Span rejected by store"
                    );
                    outcomes.push(BatchOutcome::Failed(e.to_string()));
                }
            }
        }
        Ok(outcomes)
    }

    /// Query spans for a tenant with optional filters, ordered by start time
    pub async fn query(
        &self,
        tenant_id: &str,
        filters: &SpanFilters,
    ) -> Result<Vec<StoredSpan>, DataError> {
        let mut sql = String::from(
            "SELECT trace_id, span_id, parent_span_id, service_name, operation, kind, \
             start_time_ms, end_time_ms, latency_ms, status_code, error, downstream \
             FROM spans WHERE tenant_id = ?",
        );
        if filters.from.is_some() {
            sql.push_str(" AND start_time_ms >= ?");
        }
        if filters.to.is_some() {
            sql.push_str(" AND start_time_ms <= ?");
        }
        if filters.service_name.is_some() {
            sql.push_str(" AND service_name = ?");
        }
        if filters.trace_id.is_some() {
            sql.push_str(" AND trace_id = ?");
        }
        match filters.has_downstream {
            Some(true) => sql.push_str(" AND downstream IS NOT NULL"),
            Some(false) => sql.push_str(" AND downstream IS NULL"),
            None => {}
        }
        sql.push_str(" ORDER BY start_time_ms, id");

        let mut query = sqlx::query(&sql).bind(tenant_id);
        if let Some(from) = filters.from {
            query = query.bind(to_epoch_ms(from));
        }
        if let Some(to) = filters.to {
            query = query.bind(to_epoch_ms(to));
        }
        if let Some(ref service) = filters.service_name {
            query = query.bind(service);
        }
        if let Some(ref trace_id) = filters.trace_id {
            query = query.bind(trace_id);
        }

        let rows = query.fetch_all(self.pool).await?;
        rows.iter().map(row_to_span).collect()
    }

    /// Count spans for a tenant
    pub async fn count(&self, tenant_id: &str) -> Result<u64, DataError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM spans WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Aggregate span statistics for a tenant
    pub async fn stats(&self, tenant_id: &str) -> Result<SpanStats, DataError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_spans,
                COUNT(DISTINCT service_name) AS unique_services,
                COUNT(DISTINCT trace_id) AS unique_traces,
                SUM(CASE WHEN error IS NOT NULL OR status_code >= 500 THEN 1 ELSE 0 END) AS error_spans
            FROM spans WHERE tenant_id = ?
            "#,
        )
        .bind(tenant_id)
        .fetch_one(self.pool)
        .await?;

        Ok(SpanStats {
            total_spans: row.get::<i64, _>("total_spans") as u64,
            unique_services: row.get::<i64, _>("unique_services") as u64,
            unique_traces: row.get::<i64, _>("unique_traces") as u64,
            error_spans: row.get::<Option<i64>, _>("error_spans").unwrap_or(0) as u64,
        })
    }
}

fn row_to_span(row: &SqliteRow) -> Result<StoredSpan, DataError> {
    let kind_str: String = row.get("kind");
    let kind = SpanKind::parse(&kind_str).ok_or_else(|| {
        DataError::Database(sqlx::Error::ColumnDecode {
            index: "kind".into(),
            source: format!("unknown span kind: {}", kind_str).into(),
        })
    })?;

    Ok(StoredSpan {
        trace_id: row.get("trace_id"),
        span_id: row.get("span_id"),
        parent_span_id: row.get("parent_span_id"),
        service_name: row.get("service_name"),
        operation: row.get("operation"),
        kind,
        start_time: from_epoch_ms(row.get("start_time_ms")),
        end_time: from_epoch_ms(row.get("end_time_ms")),
        latency_ms: row.get("latency_ms"),
        status_code: row.get("status_code"),
        error: row.get("error"),
        downstream: row.get("downstream"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::SqliteService;
    use chrono::{TimeZone, Utc};

    fn make_span(span_id: &str, service: &str, downstream: Option<&str>) -> NewSpan {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        NewSpan {
            trace_id: "trace-1".into(),
            span_id: span_id.into(),
            parent_span_id: None,
            service_name: service.into(),
            operation: "GET /orders".into(),
            kind: SpanKind::Client,
            start_time: start,
            end_time: start + chrono::Duration::milliseconds(120),
            latency_ms: 120.0,
            status_code: Some(200),
            error: None,
            downstream: downstream.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_insert_and_query_roundtrip() {
        let db = SqliteService::init_in_memory().await.unwrap();
        let repo = SpanRepository::new(db.pool());

        let outcome = repo.insert("default", &make_span("s1", "checkout", Some("payments"))).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);

        let spans = repo.query("default", &SpanFilters::default()).await.unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].service_name, "checkout");
        assert_eq!(spans[0].downstream.as_deref(), Some("payments"));
        assert_eq!(spans[0].latency_ms, 120.0);
        assert_eq!(spans[0].kind, SpanKind::Client);
    }

    #[tokio::test]
    async fn test_insert_is_idempotent_on_span_id() {
        let db = SqliteService::init_in_memory().await.unwrap();
        let repo = SpanRepository::new(db.pool());

        let span = make_span("s1", "checkout", None);
        assert_eq!(repo.insert("default", &span).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(repo.insert("default", &span).await.unwrap(), InsertOutcome::Duplicate);

        assert_eq!(repo.count("default").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_same_span_id_different_tenant_both_stored() {
        let db = SqliteService::init_in_memory().await.unwrap();
        let repo = SpanRepository::new(db.pool());

        let span = make_span("s1", "checkout", None);
        assert_eq!(repo.insert("t1", &span).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(repo.insert("t2", &span).await.unwrap(), InsertOutcome::Inserted);

        assert_eq!(repo.count("t1").await.unwrap(), 1);
        assert_eq!(repo.count("t2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_is_tenant_scoped() {
        let db = SqliteService::init_in_memory().await.unwrap();
        let repo = SpanRepository::new(db.pool());

        repo.insert("t1", &make_span("s1", "checkout", None)).await.unwrap();
        repo.insert("t2", &make_span("s2", "billing", None)).await.unwrap();

        let spans = repo.query("t1", &SpanFilters::default()).await.unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].service_name, "checkout");
    }

    #[tokio::test]
    async fn test_query_filters() {
        let db = SqliteService::init_in_memory().await.unwrap();
        let repo = SpanRepository::new(db.pool());

        repo.insert("default", &make_span("s1", "checkout", Some("payments"))).await.unwrap();
        repo.insert("default", &make_span("s2", "billing", None)).await.unwrap();

        let by_service = repo
            .query(
                "default",
                &SpanFilters {
                    service_name: Some("billing".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(by_service.len(), 1);

        let with_downstream = repo
            .query(
                "default",
                &SpanFilters {
                    has_downstream: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(with_downstream.len(), 1);
        assert_eq!(with_downstream[0].span_id, "s1");

        let out_of_window = repo
            .query(
                "default",
                &SpanFilters {
                    from: Some(Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(out_of_window.is_empty());
    }

    #[tokio::test]
    async fn test_batch_insert_partial_success() {
        let db = SqliteService::init_in_memory().await.unwrap();
        let repo = SpanRepository::new(db.pool());

        let mut bad = make_span("s2", "billing", None);
        // Violates the CHECK constraint; only this row should fail
        bad.latency_ms = -1.0;

        let spans = vec![make_span("s1", "checkout", None), bad, make_span("s3", "search", None)];
        let outcomes = repo.insert_batch("default", &spans).await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[0], BatchOutcome::Ok(InsertOutcome::Inserted)));
        assert!(matches!(outcomes[1], BatchOutcome::Failed(_)));
        assert!(matches!(outcomes[2], BatchOutcome::Ok(InsertOutcome::Inserted)));
        assert_eq!(repo.count("default").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_stats() {
        let db = SqliteService::init_in_memory().await.unwrap();
        let repo = SpanRepository::new(db.pool());

        repo.insert("default", &make_span("s1", "checkout", None)).await.unwrap();
        let mut failed = make_span("s2", "checkout", None);
        failed.status_code = Some(500);
        repo.insert("default", &failed).await.unwrap();

        let stats = repo.stats("default").await.unwrap();
        assert_eq!(stats.total_spans, 2);
        assert_eq!(stats.unique_services, 1);
        assert_eq!(stats.unique_traces, 1);
        assert_eq!(stats.error_spans, 1);
    }

    #[tokio::test]
    async fn test_stats_empty_tenant() {
        let db = SqliteService::init_in_memory().await.unwrap();
        let repo = SpanRepository::new(db.pool());

        let stats = repo.stats("default").await.unwrap();
        assert_eq!(stats.total_spans, 0);
        assert_eq!(stats.error_spans, 0);
    }
}
