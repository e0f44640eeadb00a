use anyhow::Result;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::LimitsConfig;

/// Caps in-flight calls to the external model and embedding endpoints.
#[derive(Clone)]
pub struct Limiters {
    pub llm: Arc<Semaphore>,
    pub embedding: Arc<Semaphore>,
    pub acquire_timeout: Duration,
}

impl Limiters {
    pub fn new(cfg: &LimitsConfig) -> Self {
        Self {
            llm: Arc::new(Semaphore::new(cfg.llm_concurrency.max(1))),
            embedding: Arc::new(Semaphore::new(cfg.embedding_concurrency.max(1))),
            acquire_timeout: Duration::from_millis(cfg.acquire_timeout_ms.max(1)),
        }
    }

    pub async fn acquire_timed(
        sem: Arc<Semaphore>,
        acquire_timeout: Duration,
        op: &'static str,
    ) -> Result<(OwnedSemaphorePermit, Duration)> {
        let start = Instant::now();

        let permit = tokio::time::timeout(acquire_timeout, sem.acquire_owned())
            .await
            .map_err(|_| anyhow::anyhow!("Limiter acquire timeout for op={}", op))??;

        Ok((permit, start.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_times_out_when_exhausted() {
        let limiters = Limiters::new(&LimitsConfig {
            llm_concurrency: 1,
            embedding_concurrency: 1,
            acquire_timeout_ms: 20,
        });

        let (_held, _) = Limiters::acquire_timed(limiters.llm.clone(), limiters.acquire_timeout, "llm")
            .await
            .unwrap();

        let second = Limiters::acquire_timed(limiters.llm.clone(), limiters.acquire_timeout, "llm").await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_clamped() {
        let limiters = Limiters::new(&LimitsConfig {
            llm_concurrency: 0,
            embedding_concurrency: 0,
            acquire_timeout_ms: 0,
        });

        assert_eq!(limiters.llm.available_permits(), 1);
        assert!(Limiters::acquire_timed(limiters.embedding.clone(), limiters.acquire_timeout, "embed")
            .await
            .is_ok());
    }
}
