use std::sync::Arc;
use serde::Serialize;
use tracing::debug;
use voyage_catalog::MaterializedOffer;
use voyage_core::repository::OfferSetRepository;
use voyage_core::{CoreError, CoreResult, RetryPolicy};
use crate::metrics::EngineMetrics;

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub offset: i64,
    pub number: i64,
    pub rows: Vec<MaterializedOffer>,
}

impl Page {
    /// Offset of the following page, or `None` once the tail was reached.
    pub fn next_offset(&self) -> Option<i64> {
        if self.number == 0 || (self.rows.len() as i64) < self.number {
            None
        } else {
            Some(self.offset.saturating_add(self.number))
        }
    }
}

/// Read-only windowed access to materialized sets. Never materializes.
pub struct Paginator {
    repo: Arc<dyn OfferSetRepository>,
    retry: RetryPolicy,
    metrics: EngineMetrics,
}

impl Paginator {
    pub fn new(
        repo: Arc<dyn OfferSetRepository>,
        retry: RetryPolicy,
        metrics: EngineMetrics,
    ) -> Self {
        Self {
            repo,
            retry,
            metrics,
        }
    }

    /// Any non-negative window is valid; windows past the tail are empty.
    pub fn check(&self, offset: i64, number: i64) -> CoreResult<()> {
        if offset < 0 {
            return Err(CoreError::InvalidPage(format!("offset must not be negative, got {}", offset)));
        }
        if number < 0 {
            return Err(CoreError::InvalidPage(format!("number must not be negative, got {}", number)));
        }
        Ok(())
    }

    pub async fn page(&self, user_id: i64, offset: i64, number: i64) -> CoreResult<Page> {
        self.check(offset, number)?;

        let rows = self
            .retry
            .run("page", || self.repo.page(user_id, offset, number))
            .await?;

        self.metrics.pages_served.inc();
        self.metrics.page_rows.inc_by(rows.len() as u64);
        debug!(
            "Served {} rows to user {} at offset {} (requested {})",
            rows.len(),
            user_id,
            offset,
            number
        );

        Ok(Page { offset, number, rows })
    }
}
