//! Summary record loading with retry
//!
//! The engine hands records over one at a time; the loader owns the retry
//! policy: up to five attempts per record with a fixed five-second delay,
//! then the record is abandoned with a diagnostic and the batch continues.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use octofhir_summary_model::SummaryStore;
use octofhir_summary_types::SummaryRecord;

const DEFAULT_ATTEMPTS: u32 = 5;
const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// Outcome of one batch load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub abandoned: usize,
}

/// Publishes summary records to a store, retrying per record
pub struct StoreLoader {
    store: Arc<dyn SummaryStore>,
    attempts: u32,
    delay: Duration,
}

impl StoreLoader {
    pub fn new(store: Arc<dyn SummaryStore>) -> Self {
        Self {
            store,
            attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }

    /// Override the retry policy; tests shrink the delay to zero
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.delay = delay;
        self
    }

    /// Upsert every record, abandoning an individual record only once its
    /// retry attempts are exhausted
    pub async fn load(&self, records: &[SummaryRecord]) -> LoadReport {
        let mut report = LoadReport::default();

        for record in records {
            let identifier = record
                .identifier_key()
                .map(|(_, value)| value.to_string())
                .unwrap_or_default();

            if self.load_one(record, &identifier).await {
                report.loaded += 1;
            } else {
                warn!(identifier, "too many retries, giving up on this record");
                report.abandoned += 1;
            }
        }

        info!(
            loaded = report.loaded,
            abandoned = report.abandoned,
            "summary load finished"
        );
        report
    }

    async fn load_one(&self, record: &SummaryRecord, identifier: &str) -> bool {
        for attempt in 1..=self.attempts {
            match self.store.upsert(record).await {
                Ok(()) => return true,
                Err(err) => {
                    warn!(identifier, attempt, %err, "summary upsert failed");
                    if attempt < self.attempts {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }
        false
    }
}
