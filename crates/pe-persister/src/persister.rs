//! Two-phase persist orchestration (§4.9): every Phase 1 (entity) item is
//! committed before any Phase 2 (relationship) item is attempted, so a
//! Phase 2 item that references a freshly-created entity can resolve it.
//! Each item additionally runs inside its own savepoint so one bad item
//! doesn't roll back the rest of its phase.

use std::sync::Arc;

use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection};

use pe_core::database::DatabasePool;
use pe_core::error::{AppError, AppResult};
use pe_core::model::{CollectionResult, Item};

use crate::cache::FkCaches;
use crate::handlers::dispatch;
use crate::stats::PersistStats;

pub struct Persister {
    db: Arc<DatabasePool>,
}

impl Persister {
    pub fn new(db: Arc<DatabasePool>) -> Self {
        Self { db }
    }

    /// Flattens every item out of `results`, partitions it by commit phase,
    /// and runs each phase in its own transaction. Returns `Err` only if
    /// BOTH phases fail to commit; a single failed phase is folded into the
    /// returned stats instead (§4.9).
    pub async fn persist_results(&self, results: &[CollectionResult]) -> AppResult<PersistStats> {
        let mut phase_one = Vec::new();
        let mut phase_two = Vec::new();
        for result in results {
            for item in &result.items {
                if item.is_phase_one() {
                    phase_one.push(item.clone());
                } else {
                    phase_two.push(item.clone());
                }
            }
        }

        let mut conn = self.db.get().await?;
        let mut caches = FkCaches::warm(&mut conn).await?;
        let mut stats = PersistStats::default();

        tracing::info!(
            phase_one = phase_one.len(),
            phase_two = phase_two.len(),
            "starting persist run"
        );

        let phase_one_committed = self.run_phase(&mut conn, &mut caches, &phase_one, &mut stats).await;
        let phase_two_committed = self.run_phase(&mut conn, &mut caches, &phase_two, &mut stats).await;

        if !phase_one_committed && !phase_two_committed {
            return Err(AppError::persistence(
                "both the entity and relationship commit phases failed",
            ));
        }

        tracing::info!(
            persisted = stats.persisted,
            updated = stats.updated,
            skipped = stats.skipped,
            failed = stats.failed,
            "persist run complete"
        );
        Ok(stats)
    }

    /// Runs every item in `items` inside one outer transaction. Returns
    /// whether that transaction committed; a commit failure is recorded
    /// into `stats` rather than propagated, so the caller can still attempt
    /// the other phase.
    async fn run_phase(
        &self,
        conn: &mut AsyncPgConnection,
        caches: &mut FkCaches,
        items: &[Item],
        stats: &mut PersistStats,
    ) -> bool {
        if items.is_empty() {
            return true;
        }

        let commit_result: AppResult<()> = conn
            .transaction(|conn| {
                async move {
                    for item in items {
                        let item_result = conn
                            .transaction(|conn| {
                                let caches = &mut *caches;
                                async move { dispatch(conn, caches, item).await }.scope_boxed()
                            })
                            .await;

                        match item_result {
                            Ok(outcome) => stats.record(outcome),
                            Err(err) => {
                                err.log_with_context("persisting item");
                                stats.record_failure(&err.to_string());
                                caches.clear_non_firm();
                            }
                        }
                    }
                    Ok(())
                }
                .scope_boxed()
            })
            .await;

        match commit_result {
            Ok(()) => true,
            Err(err) => {
                err.log_with_context("committing persist phase");
                stats.record_failure(&err.to_string());
                false
            }
        }
    }
}
