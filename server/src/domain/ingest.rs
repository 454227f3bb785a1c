//! Ingestion pipeline: per-tenant bounded queues in front of the span store
//!
//! Validation happens at the API edge; accepted spans are enqueued without
//! blocking on the durable write. Each tenant gets its own bounded queue and
//! drain task, so a runaway tenant fills only its own buffer. Overflow policy
//! is drop-newest: the caller gets a retryable rejection instead of a stalled
//! request thread. Correlation is by span ids, never by arrival order.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::core::ShutdownService;
use crate::data::cache::CacheService;
use crate::data::sqlite::SqliteService;
use crate::data::sqlite::repositories::SpanRepository;
use crate::data::types::NewSpan;

#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("ingestion queue is full")]
    QueueFull,
}

pub struct IngestPipeline {
    database: Arc<SqliteService>,
    cache: Arc<CacheService>,
    shutdown: ShutdownService,
    capacity: usize,
    queues: DashMap<String, mpsc::Sender<NewSpan>>,
}

impl IngestPipeline {
    pub fn new(
        database: Arc<SqliteService>,
        cache: Arc<CacheService>,
        shutdown: ShutdownService,
        capacity: usize,
    ) -> Self {
        Self {
            database,
            cache,
            shutdown,
            capacity,
            queues: DashMap::new(),
        }
    }

    /// Enqueue one validated span for durable persistence.
    ///
    /// Returns immediately. A full queue sheds the span with a retryable
    /// error. Acceptance invalidates the tenant's cached analyses.
    pub async fn enqueue(&self, tenant_id: &str, span: NewSpan) -> Result<(), EnqueueError> {
        let sender = self.sender_for(tenant_id).await;

        match sender.try_send(span) {
            Ok(()) => {
                self.cache.invalidate_tenant(tenant_id).await;
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(tenant_id, "Ingestion queue saturated; shedding span");
                Err(EnqueueError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(tenant_id, "Ingestion queue closed; shedding span");
                Err(EnqueueError::QueueFull)
            }
        }
    }

    async fn sender_for(&self, tenant_id: &str) -> mpsc::Sender<NewSpan> {
        if let Some(sender) = self.queues.get(tenant_id) {
            return sender.clone();
        }

        let (tx, rx) = mpsc::channel(self.capacity);

        // The map guard must not be held across an await point; spawn and
        // register only after it is released. A losing racer's channel is
        // simply dropped.
        match self.queues.entry(tenant_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                return existing.get().clone();
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(tx.clone());
            }
        }

        let handle = tokio::spawn(drain_queue(
            tenant_id.to_string(),
            rx,
            Arc::clone(&self.database),
            self.shutdown.subscribe(),
        ));
        self.shutdown.register(handle).await;
        tracing::debug!(tenant_id, capacity = self.capacity, "Ingestion queue created");
        tx
    }
}

/// Background task persisting one tenant's queue. On shutdown it drains the
/// remaining buffered spans before exiting.
async fn drain_queue(
    tenant_id: String,
    mut rx: mpsc::Receiver<NewSpan>,
    database: Arc<SqliteService>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            maybe_span = rx.recv() => {
                match maybe_span {
                    Some(span) => persist(&tenant_id, &database, span).await,
                    None => return,
                }
            }
        }
    }

    // Shutdown: flush whatever is still buffered
    rx.close();
    while let Some(span) = rx.recv().await {
        persist(&tenant_id, &database, span).await;
    }
    tracing::debug!(tenant_id = %tenant_id, "Ingestion queue drained");
}

async fn persist(tenant_id: &str, database: &SqliteService, span: NewSpan) {
    let repo = SpanRepository::new(database.pool());
    if let Err(e) = repo.insert(tenant_id, &span).await {
        // Storage failures are fatal to the specific span only
        tracing::error!(
            tenant_id,
            span_id = %span.span_id,
            error = %e,
            "Failed to persist span"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CacheConfig;
    use crate::data::cache::key;
    use crate::data::sqlite::repositories::SpanRepository;
    use crate::data::types::{SpanFilters, SpanKind};
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn make_span(span_id: &str) -> NewSpan {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        NewSpan {
            trace_id: "trace".into(),
            span_id: span_id.into(),
            parent_span_id: None,
            service_name: "checkout".into(),
            operation: "op".into(),
            kind: SpanKind::Server,
            start_time: t,
            end_time: t,
            latency_ms: 10.0,
            status_code: Some(200),
            error: None,
            downstream: None,
        }
    }

    async fn make_pipeline(capacity: usize) -> (IngestPipeline, Arc<SqliteService>, Arc<CacheService>) {
        let database = Arc::new(SqliteService::init_in_memory().await.unwrap());
        let cache = Arc::new(CacheService::new(&CacheConfig {
            ttl_secs: 60,
            max_entries: 100,
        }));
        let shutdown = ShutdownService::new(Arc::clone(&database));
        let pipeline = IngestPipeline::new(
            Arc::clone(&database),
            Arc::clone(&cache),
            shutdown,
            capacity,
        );
        (pipeline, database, cache)
    }

    #[tokio::test]
    async fn test_enqueue_persists_span() {
        let (pipeline, database, _cache) = make_pipeline(16).await;

        pipeline.enqueue("default", make_span("s1")).await.unwrap();

        // Wait for the drain task to pick it up
        let repo = SpanRepository::new(database.pool());
        for _ in 0..50 {
            if repo.count("default").await.unwrap() == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("span was not persisted");
    }

    #[tokio::test]
    async fn test_enqueue_invalidates_tenant_cache() {
        let (pipeline, _database, cache) = make_pipeline(16).await;

        let cached_key = key::analysis("default", "architecture");
        cache.set(&cached_key, b"doc".to_vec(), None).await;

        pipeline.enqueue("default", make_span("s1")).await.unwrap();

        assert_eq!(cache.get(&cached_key).await, None);
    }

    #[tokio::test]
    async fn test_queue_is_tenant_scoped() {
        let (pipeline, database, _cache) = make_pipeline(16).await;

        pipeline.enqueue("t1", make_span("s1")).await.unwrap();
        pipeline.enqueue("t2", make_span("s2")).await.unwrap();

        let repo = SpanRepository::new(database.pool());
        for _ in 0..50 {
            let t1 = repo.query("t1", &SpanFilters::default()).await.unwrap();
            let t2 = repo.query("t2", &SpanFilters::default()).await.unwrap();
            if t1.len() == 1 && t2.len() == 1 {
                assert_eq!(t1[0].span_id, "s1");
                assert_eq!(t2[0].span_id, "s2");
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("spans were not persisted to their tenants");
    }

    #[tokio::test]
    async fn test_duplicate_spans_store_once() {
        let (pipeline, database, _cache) = make_pipeline(16).await;

        pipeline.enqueue("default", make_span("s1")).await.unwrap();
        pipeline.enqueue("default", make_span("s1")).await.unwrap();

        let repo = SpanRepository::new(database.pool());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(repo.count("default").await.unwrap(), 1);
    }
}
