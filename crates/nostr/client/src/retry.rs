//! Retry queue for relay submissions.
//!
//! Tasks run with a fixed number of attempts and a flat delay between them.
//! A semaphore caps how many tasks are in flight; a task keeps its permit for
//! all of its attempts, so with the default ceiling of one, submissions run
//! strictly one after another.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Maximum number of tasks in flight. Raising it above 1 lets publishes
    /// from concurrent callers interleave.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Attempts per task, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts, in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_concurrent() -> usize {
    1
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Same policy without waiting between attempts.
    pub fn without_delay(mut self) -> Self {
        self.retry_delay_ms = 0;
        self
    }
}

/// Runs units of work on behalf of the publisher.
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    /// Run `task` until it succeeds or the executor gives up, returning the
    /// last error in the latter case. `name` is only used for logging.
    async fn execute<T, F, Fut>(&self, name: &str, task: F) -> Result<T>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send;
}

/// Bounded-concurrency executor with fixed attempts and a flat retry delay.
#[derive(Debug, Clone)]
pub struct RetryQueue {
    config: RetryConfig,
    permits: Arc<Semaphore>,
}

impl RetryQueue {
    pub fn new(config: RetryConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self { config, permits }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl Default for RetryQueue {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[async_trait]
impl Executor for RetryQueue {
    async fn execute<T, F, Fut>(&self, name: &str, mut task: F) -> Result<T>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ClientError::Protocol(format!("retry queue closed: {}", e)))?;

        let max_attempts = self.config.max_attempts.max(1);
        let delay = self.config.retry_delay();
        let mut attempt = 0;

        loop {
            attempt += 1;

            match task().await {
                Ok(value) => {
                    debug!("{} succeeded on attempt {}", name, attempt);
                    return Ok(value);
                }
                Err(err) => {
                    if attempt >= max_attempts {
                        warn!("{} failed after {} attempts: {}", name, attempt, err);
                        return Err(err);
                    }

                    warn!(
                        "{} attempt {}/{} failed: {}. Retrying in {:?}...",
                        name, attempt, max_attempts, err, delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Executor that runs each task exactly once, without delay or queueing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateExecutor;

#[async_trait]
impl Executor for ImmediateExecutor {
    async fn execute<T, F, Fut>(&self, _name: &str, mut task: F) -> Result<T>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        task().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn fail(msg: &str) -> ClientError {
        ClientError::PublishFailed(msg.to_string())
    }

    #[test]
    fn test_default_policy() {
        let config = RetryConfig::default();
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.retry_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: RetryConfig = serde_json::from_str(r#"{"maxAttempts":2}"#).unwrap();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.retry_delay_ms, 1000);
    }

    #[tokio::test]
    async fn test_retry_succeeds_on_third_attempt() {
        let queue = RetryQueue::new(RetryConfig::default().without_delay());
        let attempts = AtomicU32::new(0);

        let result = queue
            .execute("test_op", || {
                let current = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if current < 3 {
                        Err(fail("not yet"))
                    } else {
                        Ok("success")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_returns_last_error_after_max_attempts() {
        let queue = RetryQueue::new(RetryConfig::default().without_delay());
        let attempts = AtomicU32::new(0);

        let result: Result<()> = queue
            .execute("test_op", || {
                let current = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(fail(&format!("attempt {}", current))) }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 5);
        match result {
            Err(ClientError::PublishFailed(msg)) => assert_eq!(msg, "attempt 5"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let queue = RetryQueue::new(RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default().without_delay()
        });
        let attempts = AtomicU32::new(0);

        let _: Result<()> = queue
            .execute("test_op", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(fail("nope")) }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flat_delay_between_attempts() {
        let queue = RetryQueue::new(RetryConfig {
            max_attempts: 4,
            retry_delay_ms: 1000,
            ..Default::default()
        });
        let started = Instant::now();

        let _: Result<()> = queue
            .execute("test_op", || async { Err(fail("down")) })
            .await;

        // Three waits of exactly one second each, no growth
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_serializes_tasks() {
        let queue = RetryQueue::new(RetryConfig::default().without_delay());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let run = |queue: RetryQueue| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                queue
                    .execute("slow_op", || {
                        let in_flight = Arc::clone(&in_flight);
                        let peak = Arc::clone(&peak);
                        async move {
                            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                            Ok(())
                        }
                    })
                    .await
            }
        };

        let (a, b, c) = tokio::join!(run(queue.clone()), run(queue.clone()), run(queue.clone()));
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_immediate_executor_runs_once() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = ImmediateExecutor
            .execute("test_op", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(fail("once")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
