//! Fans collection work out across (entity, source) pairs (§4.8), grounded
//! in `sec_company_crawler::batch_crawl_companies`'s
//! `Arc<Semaphore>` + `futures::stream::iter(...).buffer_unordered(...)`
//! pattern. The orchestrator never writes to the database; its only shared
//! state is the progress record.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::{watch, Semaphore};

use pe_core::database::DatabasePool;
use pe_core::error::AppResult;
use pe_core::model::{CollectionConfig, CollectionResult};

use pe_collectors::{CollectArgs, CollectorRegistry};

use crate::entities::load_entities;
use crate::progress::{Progress, ProgressTracker};

pub struct Orchestrator {
    db: Arc<DatabasePool>,
    registry: Arc<CollectorRegistry>,
}

impl Orchestrator {
    pub fn new(db: Arc<DatabasePool>, registry: Arc<CollectorRegistry>) -> Self {
        Self { db, registry }
    }

    /// Resolves entities, builds one task per (entity, source) pair, and
    /// runs them `config.max_concurrent` at a time. Returns every
    /// `CollectionResult` once all tasks complete, plus a receiver a caller
    /// can poll for live progress while this future is still running.
    pub async fn run(&self, config: &CollectionConfig) -> AppResult<(Vec<CollectionResult>, watch::Receiver<Progress>)> {
        let entities = {
            let mut conn = self.db.get().await?;
            load_entities(&mut conn, config).await?
        };

        let mut tasks = Vec::with_capacity(entities.len() * config.sources.len());
        for entity in &entities {
            for source in &config.sources {
                tasks.push((entity.clone(), *source));
            }
        }

        let (tracker, receiver) = ProgressTracker::new(tasks.len());
        let tracker = Arc::new(tracker);
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        let started_at = Utc::now();

        let registry = Arc::clone(&self.registry);
        let entity_type = config.entity_type;
        let rate_limit_delay = config.rate_limit_delay;
        let max_retries = config.max_retries;

        let task_futures = tasks.into_iter().map(|(entity, source)| {
            let semaphore = Arc::clone(&semaphore);
            let registry = Arc::clone(&registry);
            let tracker = Arc::clone(&tracker);

            async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");

                let result = match registry.get(source) {
                    Some(collector) => {
                        let args = CollectArgs {
                            entity_id: entity.id,
                            entity_name: entity.name.clone(),
                            entity_type,
                            website_url: entity.website_url.clone(),
                            cik: entity.cik.clone(),
                            ticker: entity.ticker.clone(),
                            crd_number: entity.crd_number.clone(),
                            rate_limit_delay,
                            max_retries,
                        };
                        collector.collect(&args).await
                    }
                    None => {
                        tracing::warn!(?source, "no collector registered for this source");
                        CollectionResult::failed(
                            entity.id,
                            entity.name.clone(),
                            entity_type,
                            source,
                            started_at,
                            format!("no collector registered for {source:?}"),
                        )
                    }
                };

                tracker.record(&entity.name, source, result.success).await;
                result
            }
        });

        let results: Vec<CollectionResult> = stream::iter(task_futures)
            .buffer_unordered(config.max_concurrent.max(1))
            .collect()
            .await;

        Ok((results, receiver))
    }
}
