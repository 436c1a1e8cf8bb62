//! Polling for asynchronous remote operations
//!
//! Mutating cloud API calls usually return before the work is done. The
//! caller then has to watch a status (a task record, or a `sync_status`
//! field on the resource itself) until it settles. [`StateChangeConf`]
//! drives that loop: it invokes a refresh function until the status reaches
//! one of the target states, a failure state, or the deadline.
//!
//! The refresh function is only ever a read. Nothing here re-issues the
//! mutating call.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{self, Instant};

/// Terminal state reported when the refresh function says the object is gone
pub const DELETED: &str = "Deleted";

/// Errors that can tell a missing remote object apart from other failures
pub trait NotFound {
    fn is_not_found(&self) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum WaitError<E>
where
    E: std::error::Error + 'static,
{
    #[error(
        "timeout while waiting for {id} to become {} (last state: {}, timeout: {})",
        StateList(.target),
        .last_state.as_deref().unwrap_or("none"),
        humantime::format_duration(*.timeout)
    )]
    Timeout {
        id: String,
        target: Vec<String>,
        last_state: Option<String>,
        timeout: Duration,
    },

    #[error("{id} entered failure state '{state}', review logs for details")]
    Failed { id: String, state: String },

    #[error("error refreshing status of {id}: {source}")]
    Refresh {
        id: String,
        #[source]
        source: E,
    },
}

impl<E> WaitError<E>
where
    E: std::error::Error + 'static,
{
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }
}

struct StateList<'a>(&'a [String]);

impl fmt::Display for StateList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            [single] => f.write_str(single),
            states => write!(f, "one of [{}]", states.join(", ")),
        }
    }
}

/// Configuration for one wait on a remote state transition
///
/// ```ignore
/// let state = StateChangeConf::new(task_id, || client.tasks().status(task_id))
///     .delay(Duration::from_secs(5))
///     .min_timeout(Duration::from_secs(3))
///     .timeout(timeouts.create)
///     .wait_for_state()
///     .await?;
/// ```
pub struct StateChangeConf<F> {
    id: String,
    target: Vec<String>,
    failed: Vec<String>,
    refresh: F,
    timeout: Duration,
    delay: Duration,
    min_timeout: Duration,
}

impl<F, Fut, E> StateChangeConf<F>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, E>>,
    E: std::error::Error + NotFound + 'static,
{
    pub fn new(id: impl Into<String>, refresh: F) -> Self {
        Self {
            id: id.into(),
            target: vec!["Complete".to_string()],
            failed: vec!["Failed".to_string()],
            refresh,
            timeout: Duration::from_secs(10 * 60),
            delay: Duration::ZERO,
            min_timeout: Duration::from_secs(1),
        }
    }

    pub fn target<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target = states.into_iter().map(Into::into).collect();
        self
    }

    pub fn failed<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failed = states.into_iter().map(Into::into).collect();
        self
    }

    /// Overall budget, measured from the start of [`Self::wait_for_state`]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait before the first refresh
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Interval between refreshes
    pub fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    /// Polls until a target or failure state, a refresh error, or the deadline.
    ///
    /// A refresh error whose [`NotFound::is_not_found`] is true resolves to
    /// [`DELETED`], whatever was observed before it.
    pub async fn wait_for_state(mut self) -> Result<String, WaitError<E>> {
        let deadline = Instant::now() + self.timeout;
        let mut last_state: Option<String> = None;

        if !self.delay.is_zero() {
            time::sleep_until(std::cmp::min(Instant::now() + self.delay, deadline)).await;
        }

        loop {
            if Instant::now() >= deadline {
                return Err(self.timeout_error(last_state));
            }

            tracing::debug!(id = %self.id, target = ?self.target, "waiting for state");

            let refreshed = match time::timeout_at(deadline, (self.refresh)()).await {
                Ok(result) => result,
                Err(_) => return Err(self.timeout_error(last_state)),
            };

            match refreshed {
                Ok(state) => {
                    if self.failed.iter().any(|s| *s == state) {
                        tracing::warn!(id = %self.id, %state, "remote operation failed");
                        return Err(WaitError::Failed {
                            id: self.id,
                            state,
                        });
                    }
                    if self.target.iter().any(|s| *s == state) {
                        tracing::debug!(id = %self.id, %state, "target state reached");
                        return Ok(state);
                    }
                    tracing::trace!(id = %self.id, %state, "intermediate state");
                    last_state = Some(state);
                }
                Err(e) if e.is_not_found() => {
                    tracing::debug!(id = %self.id, "object no longer exists");
                    return Ok(DELETED.to_string());
                }
                Err(e) => {
                    return Err(WaitError::Refresh {
                        id: self.id,
                        source: e,
                    });
                }
            }

            time::sleep_until(std::cmp::min(Instant::now() + self.min_timeout, deadline)).await;
        }
    }

    fn timeout_error(&self, last_state: Option<String>) -> WaitError<E> {
        WaitError::Timeout {
            id: self.id.clone(),
            target: self.target.clone(),
            last_state,
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, thiserror::Error)]
    enum FakeError {
        #[error("not found")]
        Missing,
        #[error("boom")]
        Boom,
    }

    impl NotFound for FakeError {
        fn is_not_found(&self) -> bool {
            matches!(self, FakeError::Missing)
        }
    }

    type Script = Arc<Mutex<VecDeque<Result<String, FakeError>>>>;

    fn script(steps: Vec<Result<&str, FakeError>>) -> Script {
        Arc::new(Mutex::new(
            steps
                .into_iter()
                .map(|s| s.map(str::to_string))
                .collect(),
        ))
    }

    fn scripted(
        steps: Script,
        calls: Arc<AtomicUsize>,
    ) -> impl FnMut() -> futures::future::Ready<Result<String, FakeError>> {
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let next = steps
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("InProgress".to_string()));
            futures::future::ready(next)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reaches_target_after_intermediate_states() {
        let calls = Arc::new(AtomicUsize::new(0));
        let steps = script(vec![Ok("Queued"), Ok("InProgress"), Ok("Complete")]);

        let state = StateChangeConf::new("task-1", scripted(steps, calls.clone()))
            .min_timeout(Duration::from_secs(2))
            .wait_for_state()
            .await
            .unwrap();

        assert_eq!(state, "Complete");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn only_intermediate_states_times_out() {
        let calls = Arc::new(AtomicUsize::new(0));
        let steps = script(vec![]);
        let started = Instant::now();

        let err = StateChangeConf::new("task-2", scripted(steps, calls.clone()))
            .delay(Duration::from_secs(5))
            .min_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(60))
            .wait_for_state()
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_secs(60));
        assert!(calls.load(Ordering::SeqCst) > 1);
        let message = err.to_string();
        assert!(message.contains("task-2"));
        assert!(message.contains("Complete"));
        assert!(message.contains("InProgress"));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_longer_than_timeout_never_succeeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let steps = script(vec![Ok("Complete")]);

        let err = StateChangeConf::new("task-3", scripted(steps, calls.clone()))
            .delay(Duration::from_secs(30))
            .timeout(Duration::from_secs(10))
            .wait_for_state()
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_resolves_to_deleted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let steps = script(vec![
            Ok("Syncing"),
            Ok("Pending"),
            Err(FakeError::Missing),
        ]);

        let state = StateChangeConf::new("router-1", scripted(steps, calls.clone()))
            .target([DELETED])
            .wait_for_state()
            .await
            .unwrap();

        assert_eq!(state, DELETED);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_wins_even_when_waiting_for_complete() {
        let calls = Arc::new(AtomicUsize::new(0));
        let steps = script(vec![Err(FakeError::Missing)]);

        let state = StateChangeConf::new("vpc-1", scripted(steps, calls))
            .wait_for_state()
            .await
            .unwrap();

        assert_eq!(state, DELETED);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_state_stops_polling_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let steps = script(vec![
            Ok("Queued"),
            Ok("Failed"),
            Ok("Complete"),
        ]);

        let err = StateChangeConf::new("task-4", scripted(steps.clone(), calls.clone()))
            .wait_for_state()
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::Failed { ref state, .. } if state == "Failed"));
        assert!(err.to_string().contains("review logs"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(steps.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_errors_are_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let steps = script(vec![Ok("Queued"), Err(FakeError::Boom)]);

        let err = StateChangeConf::new("task-5", scripted(steps, calls.clone()))
            .wait_for_state()
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::Refresh { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_refresh_is_abandoned_at_deadline() {
        let err = StateChangeConf::new("task-6", || async {
            time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, FakeError>("Complete".to_string())
        })
        .timeout(Duration::from_secs(30))
        .wait_for_state()
        .await
        .unwrap_err();

        assert!(err.is_timeout());
    }

    #[test]
    fn timeout_message_lists_multiple_targets() {
        let err: WaitError<FakeError> = WaitError::Timeout {
            id: "lb-1".to_string(),
            target: vec!["Active".to_string(), "Complete".to_string()],
            last_state: None,
            timeout: Duration::from_secs(90),
        };

        assert_eq!(
            err.to_string(),
            "timeout while waiting for lb-1 to become one of [Active, Complete] (last state: none, timeout: 1m 30s)"
        );
    }
}
