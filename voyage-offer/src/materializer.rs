use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use voyage_core::repository::OfferSetRepository;
use voyage_core::{CoreResult, FilterSpec, RetryPolicy};
use crate::metrics::EngineMetrics;

/// Rebuilds a user's ranked offer set from the shared catalog.
pub struct Materializer {
    repo: Arc<dyn OfferSetRepository>,
    retry: RetryPolicy,
    candidate_limit: usize,
    metrics: EngineMetrics,
}

impl Materializer {
    pub fn new(
        repo: Arc<dyn OfferSetRepository>,
        retry: RetryPolicy,
        candidate_limit: usize,
        metrics: EngineMetrics,
    ) -> Self {
        Self {
            repo,
            retry,
            candidate_limit,
            metrics,
        }
    }

    /// Replaces the user's set with the catalog rows matching `spec`.
    ///
    /// Safe to repeat: each attempt deletes before inserting, so a retried
    /// rebuild converges on the same set.
    pub async fn materialize(&self, user_id: i64, spec: &FilterSpec) -> CoreResult<usize> {
        let query = spec.to_catalog_query()?;
        let started = Instant::now();

        let result = self
            .retry
            .run("materialize", || {
                self.repo.rebuild(user_id, &query, self.candidate_limit)
            })
            .await;

        match &result {
            Ok(count) => {
                self.metrics.materializations.with_label_values(&["ok"]).inc();
                self.metrics.materialized_rows.inc_by(*count as u64);
                info!(
                    "Materialized {} offers for user {} in {:?}",
                    count,
                    user_id,
                    started.elapsed()
                );
            }
            Err(e) => {
                self.metrics.materializations.with_label_values(&["error"]).inc();
                error!("Materialization failed for user {}: {}", user_id, e);
            }
        }
        result
    }
}
