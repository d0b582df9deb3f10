use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;

/// Run `operation` up to `max_attempts` times, sleeping `delay` between
/// attempts. The final error is returned once the budget is spent. Shared
/// by every external call site that retries instead of degrading.
pub async fn bounded<A, F, T, E>(
    max_attempts: usize,
    delay: Duration,
    operation: A,
) -> Result<T, E>
where
    A: FnMut() -> F,
    F: Future<Output = Result<T, E>>,
{
    let strategy = FixedInterval::new(delay).take(max_attempts.saturating_sub(1));
    Retry::spawn(strategy, operation).await
}
