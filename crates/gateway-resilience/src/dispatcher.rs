//! Backend dispatcher with failover and retry.
//!
//! Every call walks the replica list in a fresh random order. A node that
//! answers "unavailable" is skipped in favour of the next one; any other
//! failure is returned to the caller as-is. A full walk over all nodes is one
//! attempt, and only attempts where every node was unavailable are retried.

use crate::backoff::{BackoffPolicy, RetryBudget};
use gateway_core::{BackendError, GatewayError, GatewayResult, RequestContext};
use rand::seq::SliceRandom;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a single pass that did not produce a value
enum PassError {
    /// Every node was unavailable; carries the last node's error
    Unavailable(BackendError),
    /// Stop immediately
    Fatal(GatewayError),
}

/// Executes requests against a fixed set of backend replica stubs.
///
/// The stub list is immutable; changing the set of replicas means building a
/// new dispatcher.
pub struct Dispatcher<B> {
    stubs: Vec<Arc<B>>,
    budget: RetryBudget,
    backoff: BackoffPolicy,
}

impl<B> std::fmt::Debug for Dispatcher<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("nodes", &self.stubs.len())
            .field("budget", &self.budget)
            .finish()
    }
}

impl<B> Dispatcher<B>
where
    B: Send + Sync + 'static,
{
    /// Create a dispatcher over owned stubs
    ///
    /// # Errors
    /// Returns a configuration error if `stubs` is empty
    pub fn new(stubs: Vec<B>, budget: RetryBudget) -> GatewayResult<Self> {
        Self::from_shared(stubs.into_iter().map(Arc::new).collect(), budget)
    }

    /// Create a dispatcher over stubs that are shared with other owners
    ///
    /// # Errors
    /// Returns a configuration error if `stubs` is empty
    pub fn from_shared(stubs: Vec<Arc<B>>, budget: RetryBudget) -> GatewayResult<Self> {
        if stubs.is_empty() {
            return Err(GatewayError::configuration(
                "dispatcher requires at least one backend node",
            ));
        }
        debug!(
            nodes = stubs.len(),
            max_retries = budget.max_retries,
            "Dispatcher initialized"
        );
        Ok(Self {
            stubs,
            backoff: budget.backoff(),
            budget,
        })
    }

    /// Number of backend nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.stubs.len()
    }

    /// Always false; a dispatcher cannot be built without nodes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }

    /// The retry budget in effect
    #[must_use]
    pub fn budget(&self) -> &RetryBudget {
        &self.budget
    }

    /// Run `request` against the backend cluster.
    ///
    /// `request` is handed one stub at a time. The first success is returned.
    /// Unavailable nodes are skipped, and when a whole pass comes back
    /// unavailable the pass is repeated after a backoff, up to
    /// `max_retries` more times.
    ///
    /// # Errors
    /// - `Canceled` / `DeadlineExceeded` when `ctx` finishes before a node
    ///   attempt or during a backoff sleep
    /// - the node's own error (as `Backend`) for any non-unavailable failure
    /// - `RetriesExhausted` once every attempt has failed
    pub async fn execute<T, F, Fut>(&self, ctx: &RequestContext, mut request: F) -> GatewayResult<T>
    where
        F: FnMut(Arc<B>) -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let attempts = self.budget.total_attempts();
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.backoff.delay(attempt - 1);
                if !delay.is_zero() {
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "All backend nodes unavailable, backing off"
                    );
                    ctx.sleep(delay).await?;
                }
            }

            match self.run_pass(ctx, &mut request).await {
                Ok(value) => return Ok(value),
                Err(PassError::Fatal(err)) => return Err(err),
                Err(PassError::Unavailable(err)) => last_error = Some(err),
            }
        }

        let cause = last_error
            .unwrap_or_else(|| BackendError::unavailable("no backend node answered"));
        warn!(attempts, error = %cause, "Backend retries exhausted");
        Err(GatewayError::retries_exhausted(attempts, &cause))
    }

    async fn run_pass<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        request: &mut F,
    ) -> Result<T, PassError>
    where
        F: FnMut(Arc<B>) -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut last_error = None;

        for (position, stub) in self.shuffled().into_iter().enumerate() {
            if let Some(err) = ctx.err() {
                return Err(PassError::Fatal(err.into()));
            }

            match request(stub).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_unavailable() => {
                    debug!(position, error = %err, "Backend node unavailable, failing over");
                    last_error = Some(err);
                }
                Err(err) => return Err(PassError::Fatal(err.into())),
            }
        }

        Err(PassError::Unavailable(last_error.unwrap_or_else(|| {
            BackendError::unavailable("no backend node answered")
        })))
    }

    /// Per-call copy of the stub list in uniformly random order
    fn shuffled(&self) -> Vec<Arc<B>> {
        let mut order = self.stubs.clone();
        order.shuffle(&mut rand::thread_rng());
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::BackendCode;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Debug)]
    struct FakeNode {
        id: usize,
    }

    fn nodes(count: usize) -> Vec<FakeNode> {
        (0..count).map(|id| FakeNode { id }).collect()
    }

    fn budget(max_retries: i64, initial_ms: u64) -> RetryBudget {
        RetryBudget::new(
            max_retries,
            Duration::from_millis(initial_ms),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_empty_node_list_rejected() {
        let result = Dispatcher::<FakeNode>::new(Vec::new(), RetryBudget::default());
        assert!(matches!(result, Err(GatewayError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_first_node_success() {
        let dispatcher = Dispatcher::new(nodes(3), budget(2, 10)).expect("dispatcher");
        let ctx = RequestContext::new();

        let result = dispatcher
            .execute(&ctx, |node| async move { Ok::<_, BackendError>(node.id) })
            .await
            .expect("success");

        assert!(result < 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failover_without_consuming_retry() {
        let dispatcher = Dispatcher::new(nodes(4), budget(3, 1_000)).expect("dispatcher");
        let ctx = RequestContext::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let result = dispatcher
            .execute(&ctx, |node| {
                let calls = Arc::clone(&calls);
                async move {
                    // first two nodes in shuffle order are down
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(BackendError::unavailable(format!("node {} down", node.id)))
                    } else {
                        Ok(node.id)
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::ZERO, "no backoff sleep expected");
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_unavailable_exhausts_retries() {
        let dispatcher = Dispatcher::new(nodes(3), budget(2, 10)).expect("dispatcher");
        let ctx = RequestContext::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let result: GatewayResult<()> = dispatcher
            .execute(&ctx, |_node| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(BackendError::unavailable("down"))
                }
            })
            .await;

        // 3 passes over 3 nodes
        assert_eq!(calls.load(Ordering::SeqCst), 9);
        match result {
            Err(GatewayError::RetriesExhausted { attempts, cause }) => {
                assert_eq!(attempts, 3);
                assert!(cause.contains("down"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        // 10ms + 20ms of backoff, nothing after the final attempt
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(30));
        assert!(elapsed < Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_backoff_retries_without_sleeping() {
        let dispatcher = Dispatcher::new(nodes(2), budget(4, 0)).expect("dispatcher");
        let ctx = RequestContext::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let result: GatewayResult<()> = dispatcher
            .execute(&ctx, |_node| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(BackendError::unavailable("down"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_non_unavailable_error_stops_immediately() {
        let dispatcher = Dispatcher::new(nodes(5), budget(3, 10)).expect("dispatcher");
        let ctx = RequestContext::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let result: GatewayResult<()> = dispatcher
            .execute(&ctx, |_node| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(BackendError::new(BackendCode::ResourceExhausted, "throttled"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match result {
            Err(GatewayError::Backend { code, message }) => {
                assert_eq!(code, BackendCode::ResourceExhausted);
                assert_eq!(message, "throttled");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_each_pass_visits_every_node_once() {
        let dispatcher = Dispatcher::new(nodes(5), budget(1, 0)).expect("dispatcher");
        let ctx = RequestContext::new();
        let visited = Arc::new(Mutex::new(Vec::new()));

        let _: GatewayResult<()> = dispatcher
            .execute(&ctx, |node| {
                let visited = Arc::clone(&visited);
                async move {
                    visited.lock().push(node.id);
                    Err(BackendError::unavailable("down"))
                }
            })
            .await;

        let visited = visited.lock();
        assert_eq!(visited.len(), 10);
        for pass in visited.chunks(5) {
            let unique: HashSet<_> = pass.iter().copied().collect();
            assert_eq!(unique.len(), 5);
        }
    }

    #[tokio::test]
    async fn test_cancelled_context_makes_no_attempt() {
        let dispatcher = Dispatcher::new(nodes(3), budget(3, 10)).expect("dispatcher");
        let ctx = RequestContext::new();
        ctx.cancel();
        let calls = Arc::new(AtomicUsize::new(0));

        let result = dispatcher
            .execute(&ctx, |node| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, BackendError>(node.id)
                }
            })
            .await;

        assert!(matches!(result, Err(GatewayError::Canceled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_between_nodes_stops_failover() {
        let dispatcher = Dispatcher::new(nodes(4), budget(3, 10)).expect("dispatcher");
        let ctx = RequestContext::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let result: GatewayResult<()> = dispatcher
            .execute(&ctx, |_node| {
                let calls = Arc::clone(&calls);
                let ctx = ctx.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    ctx.cancel();
                    Err(BackendError::unavailable("down"))
                }
            })
            .await;

        assert!(matches!(result, Err(GatewayError::Canceled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_backoff() {
        let dispatcher = Dispatcher::new(
            nodes(2),
            RetryBudget::new(5, Duration::from_secs(10), Duration::from_secs(60)),
        )
        .expect("dispatcher");
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(100));
        let calls = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let result: GatewayResult<()> = dispatcher
            .execute(&ctx, |_node| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(BackendError::unavailable("down"))
                }
            })
            .await;

        assert!(matches!(result, Err(GatewayError::DeadlineExceeded)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_backend_deadline_maps_to_context_error() {
        let dispatcher = Dispatcher::new(nodes(2), budget(3, 10)).expect("dispatcher");
        let ctx = RequestContext::new();

        let result: GatewayResult<()> = dispatcher
            .execute(&ctx, |_node| async {
                Err(BackendError::new(BackendCode::DeadlineExceeded, "rpc timed out"))
            })
            .await;

        assert!(matches!(result, Err(GatewayError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_independent() {
        let dispatcher = Arc::new(Dispatcher::new(nodes(3), budget(0, 0)).expect("dispatcher"));
        let mut handles = Vec::new();

        for _ in 0..16 {
            let dispatcher = Arc::clone(&dispatcher);
            handles.push(tokio::spawn(async move {
                let ctx = RequestContext::new();
                dispatcher
                    .execute(&ctx, |node| async move { Ok::<_, BackendError>(node.id) })
                    .await
            }));
        }

        for handle in handles {
            let id = handle.await.expect("join").expect("success");
            assert!(id < 3);
        }
    }
}
