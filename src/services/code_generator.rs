use crate::adapters::store::{RecordStore, bounded};
use crate::domain::share::{CODE_ALPHABET, CODE_LENGTH, ShareCode};
use crate::error::{AppError, Result};
use opentelemetry::{global, metrics::Counter};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Produces candidate codes. Candidates are not checked against anything.
pub trait CodeSource: Send + Sync + std::fmt::Debug + 'static {
    fn candidate(&self) -> ShareCode;
}

/// Uniform draw of each symbol from the 36-symbol alphabet.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeSource;

impl CodeSource for RandomCodeSource {
    fn candidate(&self) -> ShareCode {
        let mut rng = rand::thread_rng();
        let mut symbols = [0u8; CODE_LENGTH];
        for symbol in &mut symbols {
            *symbol = CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())];
        }
        ShareCode::from_symbols(symbols)
    }
}

#[derive(Clone, Debug)]
struct Metrics {
    collisions: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("codedrop-server");
        Self {
            collisions: meter
                .u64_counter("share_code_collisions_total")
                .with_description("Candidate codes rejected because a record already held them")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CodeGenerator {
    source: Arc<dyn CodeSource>,
    store: Arc<dyn RecordStore>,
    max_attempts: u32,
    store_timeout: Duration,
    metrics: Metrics,
}

impl CodeGenerator {
    #[must_use]
    pub fn new(
        source: Arc<dyn CodeSource>,
        store: Arc<dyn RecordStore>,
        max_attempts: u32,
        store_timeout: Duration,
    ) -> Self {
        Self { source, store, max_attempts: max_attempts.max(1), store_timeout, metrics: Metrics::new() }
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Draws candidates until one is not held by any stored record. Every
    /// draw spends one unit of `budget`, which callers share with their own
    /// retries.
    ///
    /// The returned code is only free at the moment of the check; the caller
    /// must still create the record with create-if-absent semantics.
    ///
    /// # Errors
    /// Returns `AppError::CodeSpaceExhausted` once `budget` is spent.
    /// Returns `AppError::StoreUnavailable` if the existence check fails or times out.
    #[tracing::instrument(err(level = "warn"), skip_all, fields(budget = *budget))]
    pub async fn generate(&self, budget: &mut u32) -> Result<ShareCode> {
        while *budget > 0 {
            *budget -= 1;
            let candidate = self.source.candidate();
            if !bounded(self.store_timeout, self.store.exists(&candidate)).await? {
                return Ok(candidate);
            }
            tracing::debug!(share.code = %candidate, remaining = *budget, "Candidate code already taken");
            self.metrics.collisions.add(1, &[]);
        }

        Err(AppError::CodeSpaceExhausted)
    }
}
