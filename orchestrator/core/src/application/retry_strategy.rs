// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Smart Retry Strategy
//!
//! Generic attempt loop with exponential backoff. The queen drives subtasks
//! through [`run_attempts`] directly; [`SmartRetryStrategy`] layers the
//! adaptive policy on top (attempt count from rolling statistics, one sample
//! recorded per attempt sequence).

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::retry::BackoffPolicy;
use crate::infrastructure::adaptive_params::AdaptiveParamsManager;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError {
    #[error("all {attempts} attempts failed; last error: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
    #[error("cancelled")]
    Cancelled,
}

/// Why an attempt sequence ended without a value.
#[derive(Debug)]
pub enum AttemptsFailed<E> {
    /// Every attempt failed; carries the last attempt's error.
    Exhausted(E),
    Cancelled,
}

#[derive(Debug)]
pub struct AttemptReport<T, E> {
    pub outcome: Result<T, AttemptsFailed<E>>,
    /// Attempts actually started.
    pub attempts: u32,
}

/// Run `action` up to `max_attempts` times, sleeping `backoff.delay(a)` after
/// failed attempt `a` when another attempt remains. Cancelling `cancel`
/// aborts both an in-flight attempt and a pending backoff.
pub async fn run_attempts<T, E, F, Fut>(
    max_attempts: u32,
    backoff: &BackoffPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut action: F,
) -> AttemptReport<T, E>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = max_attempts.max(1);
    let mut started = 0;
    let mut last_error = None;

    for attempt in 0..max_attempts {
        started += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return AttemptReport { outcome: Err(AttemptsFailed::Cancelled), attempts: started };
            }
            result = action(attempt) => result,
        };

        match result {
            Ok(value) => {
                debug!(label, attempt = attempt + 1, "Attempt succeeded");
                return AttemptReport {
                    outcome: Ok(value),
                    attempts: started,
                };
            }
            Err(e) => {
                if attempt + 1 < max_attempts {
                    let delay = backoff.delay(attempt);
                    warn!(
                        label,
                        attempt = attempt + 1,
                        max_attempts,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Attempt failed, retrying with backoff"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return AttemptReport { outcome: Err(AttemptsFailed::Cancelled), attempts: started };
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                } else {
                    warn!(
                        label,
                        attempt = attempt + 1,
                        max_attempts,
                        error = %e,
                        "Attempt failed, retries exhausted"
                    );
                }
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) => AttemptReport {
            outcome: Err(AttemptsFailed::Exhausted(e)),
            attempts: started,
        },
        // max_attempts >= 1, so at least one attempt ran and failed
        None => AttemptReport {
            outcome: Err(AttemptsFailed::Cancelled),
            attempts: started,
        },
    }
}

/// Retry wrapper whose attempt count comes from the adaptive statistics of
/// the named task type.
pub struct SmartRetryStrategy {
    params: Arc<AdaptiveParamsManager>,
    backoff: BackoffPolicy,
}

impl SmartRetryStrategy {
    pub fn new(params: Arc<AdaptiveParamsManager>, backoff: BackoffPolicy) -> Self {
        Self { params, backoff }
    }

    pub fn params(&self) -> &Arc<AdaptiveParamsManager> {
        &self.params
    }

    /// Exhaustion is returned as `Err(RetryError::Exhausted)`, never as an
    /// empty success. Exactly one sample is recorded for `task_type`.
    pub async fn execute_with_retry<T, E, F, Fut>(&self, task_type: &str, action: F) -> Result<T, RetryError>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_cancellation(task_type, &CancellationToken::new(), action)
            .await
    }

    pub async fn execute_with_cancellation<T, E, F, Fut>(
        &self,
        task_type: &str,
        cancel: &CancellationToken,
        action: F,
    ) -> Result<T, RetryError>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.params.get_retry_count(task_type);
        let started = Instant::now();
        let report = run_attempts(max_attempts, &self.backoff, cancel, task_type, action).await;

        match report.outcome {
            Ok(value) => {
                self.params.record(task_type, true, started.elapsed());
                Ok(value)
            }
            Err(AttemptsFailed::Exhausted(e)) => {
                self.params.record(task_type, false, started.elapsed());
                Err(RetryError::Exhausted {
                    attempts: report.attempts,
                    last_error: e.to_string(),
                })
            }
            Err(AttemptsFailed::Cancelled) => Err(RetryError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_backoff() -> BackoffPolicy {
        BackoffPolicy::new(1, 1.5, 5)
    }

    /// Push the type's success rate below 0.7 so the policy allows 5 attempts.
    fn primed_params(task_type: &str) -> Arc<AdaptiveParamsManager> {
        let params = Arc::new(AdaptiveParamsManager::new());
        for _ in 0..4 {
            params.record(task_type, false, Duration::from_millis(10));
        }
        for _ in 0..6 {
            params.record(task_type, true, Duration::from_millis(10));
        }
        assert_eq!(params.get_retry_count(task_type), 5);
        params
    }

    #[tokio::test]
    async fn recovers_after_transient_failures_with_one_sample() {
        let params = primed_params("ocr");
        let strategy = SmartRetryStrategy::new(Arc::clone(&params), fast_backoff());
        let calls = Arc::new(AtomicU32::new(0));

        let before = params.stats("ocr");
        let counter = Arc::clone(&calls);
        let result = strategy
            .execute_with_retry("ocr", move |_attempt| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                        Err("blurry frame")
                    } else {
                        Ok("text")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("text"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let after = params.stats("ocr");
        assert_eq!(after.total_count, before.total_count + 1);
        assert_eq!(after.success_count, before.success_count + 1);
    }

    #[tokio::test]
    async fn exhaustion_records_single_failure_sample() {
        let params = primed_params("match");
        let strategy = SmartRetryStrategy::new(Arc::clone(&params), fast_backoff());
        let before = params.stats("match");

        let result: Result<(), RetryError> = strategy
            .execute_with_retry("match", |attempt| async move { Err(format!("miss #{attempt}")) })
            .await;

        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 5,
                last_error: "miss #4".to_string()
            })
        );
        let after = params.stats("match");
        assert_eq!(after.total_count, before.total_count + 1);
        assert_eq!(after.success_count, before.success_count);
    }

    #[tokio::test]
    async fn unseen_type_gets_single_attempt() {
        let params = Arc::new(AdaptiveParamsManager::new());
        let strategy = SmartRetryStrategy::new(params, fast_backoff());
        let result: Result<u8, RetryError> = strategy
            .execute_with_retry("fresh", |_| async { Err("nope") })
            .await;
        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 1, .. })));
    }

    #[tokio::test]
    async fn cancellation_aborts_backoff() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report: AttemptReport<(), &str> = run_attempts(
            3,
            &BackoffPolicy::new(60_000, 1.0, 60_000),
            &cancel,
            "cancelled",
            |_| async { Err("fail") },
        )
        .await;
        assert!(matches!(report.outcome, Err(AttemptsFailed::Cancelled)));
        assert_eq!(report.attempts, 1);
    }
}
