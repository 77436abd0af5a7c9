//! Bounded polling loop shared by every readiness gate.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{GateError, GateResult, ProbeError};

/// Outcome of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady,
    /// The target could not be reached within the probe's sub-timeout.
    Unavailable,
}

/// When to poll, when to give up, and which probe errors to retry.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub deadline: Duration,
    pub retryable: fn(&ProbeError) -> bool,
}

impl RetryPolicy {
    /// Poll every `interval` until `deadline`, retrying every probe error.
    pub fn new(interval: Duration, deadline: Duration) -> Self {
        Self {
            interval,
            deadline,
            retryable: retry_all,
        }
    }

    /// Coordination tier: every 10s for up to 10 minutes.
    pub fn coordination() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(600))
    }

    /// Search tier: every 30s for up to 10 minutes.
    pub fn search() -> Self {
        Self::new(Duration::from_secs(30), Duration::from_secs(600))
    }

    pub fn with_retryable(mut self, retryable: fn(&ProbeError) -> bool) -> Self {
        self.retryable = retryable;
        self
    }
}

fn retry_all(_: &ProbeError) -> bool {
    true
}

/// Poll `probe` until it reports ready or `policy.deadline` elapses.
///
/// Probes are spaced `policy.interval` apart. Retryable probe errors and
/// `Unavailable` readings count as not-ready. A probe is always attempted
/// at the deadline itself and is given at least one interval to answer;
/// the timeout error is raised only once elapsed time has reached the
/// deadline and that probe was not ready. Returns the number of probes
/// made.
pub async fn wait_until<F, Fut>(what: &str, policy: &RetryPolicy, mut probe: F) -> GateResult<u32>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Readiness, ProbeError>>,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let budget = policy
            .deadline
            .saturating_sub(start.elapsed())
            .max(policy.interval);

        let reading = match tokio::time::timeout(budget, probe()).await {
            Ok(Ok(reading)) => reading,
            Ok(Err(e)) if (policy.retryable)(&e) => {
                debug!(%what, attempt = attempts, error = %e, "probe failed, retrying");
                Readiness::NotReady
            }
            Ok(Err(e)) => {
                return Err(GateError::Probe {
                    what: what.to_string(),
                    source: e,
                });
            }
            Err(_) => {
                debug!(%what, attempt = attempts, "probe did not answer in time");
                Readiness::Unavailable
            }
        };

        if reading == Readiness::Ready {
            info!(
                %what,
                attempts,
                elapsed_secs = start.elapsed().as_secs(),
                "readiness gate passed"
            );
            return Ok(attempts);
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.deadline {
            return Err(GateError::Timeout {
                what: what.to_string(),
                budget: policy.deadline,
            });
        }

        debug!(%what, attempt = attempts, ?reading, "not ready yet");
        tokio::time::sleep(policy.interval.min(policy.deadline - elapsed)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(10), Duration::from_secs(600))
    }

    #[tokio::test(start_paused = true)]
    async fn ready_on_nth_probe() {
        let calls = Cell::new(0u32);
        let start = Instant::now();

        let attempts = wait_until("test tier", &policy(), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                Ok(if n == 4 {
                    Readiness::Ready
                } else {
                    Readiness::NotReady
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(attempts, 4);
        assert_eq!(calls.get(), 4);
        // Three sleeps between four probes.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(30));
        assert!(elapsed < Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn ready_immediately_does_not_sleep() {
        let start = Instant::now();
        let attempts = wait_until("test tier", &policy(), || async { Ok(Readiness::Ready) })
            .await
            .unwrap();
        assert_eq!(attempts, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn never_ready_times_out_at_deadline() {
        let start = Instant::now();
        let err = wait_until("Zookeeper", &policy(), || async { Ok(Readiness::NotReady) })
            .await
            .unwrap_err();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(600));
        assert!(elapsed < Duration::from_secs(610));
        assert!(matches!(err, GateError::Timeout { .. }));
        assert_eq!(err.to_string(), "Zookeeper failed to stabilize within 10 minutes");
    }

    #[tokio::test(start_paused = true)]
    async fn never_ready_does_not_fail_early() {
        let policy = policy();
        let gate = wait_until("Solr", &policy, || async { Ok(Readiness::NotReady) });
        // Still polling one second before the deadline.
        let outcome = tokio::time::timeout(Duration::from_secs(599), gate).await;
        assert!(outcome.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_at_the_deadline_still_counts() {
        let calls = Cell::new(0u32);
        let start = Instant::now();

        let attempts = wait_until("test tier", &policy(), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                Ok(if n >= 61 {
                    Readiness::Ready
                } else {
                    Readiness::NotReady
                })
            }
        })
        .await
        .unwrap();

        // The 61st probe starts exactly at the deadline.
        assert_eq!(attempts, 61);
        assert!(start.elapsed() >= Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_probe_is_cut_off_after_the_deadline() {
        let start = Instant::now();
        let err = wait_until("test tier", &policy(), || async {
            std::future::pending::<Result<Readiness, ProbeError>>().await
        })
        .await
        .unwrap_err();

        assert!(matches!(err, GateError::Timeout { .. }));
        assert!(start.elapsed() >= Duration::from_secs(600));
        assert!(start.elapsed() <= Duration::from_secs(610));
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_errors_count_as_not_ready() {
        let calls = Cell::new(0u32);
        let attempts = wait_until("test tier", &policy(), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(ProbeError::Coordination("connection loss".to_string()))
                } else {
                    Ok(Readiness::Ready)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_counts_as_not_ready() {
        let calls = Cell::new(0u32);
        let attempts = wait_until("test tier", &policy(), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                Ok(if n == 1 {
                    Readiness::Unavailable
                } else {
                    Readiness::Ready
                })
            }
        })
        .await
        .unwrap();
        assert_eq!(attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_propagates() {
        let policy = policy().with_retryable(|e| !matches!(e, ProbeError::Io(_)));
        let start = Instant::now();
        let err = wait_until("test tier", &policy, || async {
            Err(ProbeError::Io(std::io::Error::other("refused")))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, GateError::Probe { .. }));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn standard_policies() {
        let zk = RetryPolicy::coordination();
        assert_eq!(zk.interval, Duration::from_secs(10));
        assert_eq!(zk.deadline, Duration::from_secs(600));

        let solr = RetryPolicy::search();
        assert_eq!(solr.interval, Duration::from_secs(30));
        assert_eq!(solr.deadline, Duration::from_secs(600));
    }
}
