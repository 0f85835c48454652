use std::future::Future;
use std::time::Duration;
use futures::stream::{self, Stream};
use tokio::time::Instant;

/// Timing and hardening bounds for a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
    pub timeout: Option<Duration>,
}

impl PollPolicy {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            timeout: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn exhausted(&self, attempts: u32, started: Instant) -> bool {
        let out_of_attempts = self.max_attempts.is_some_and(|max| attempts >= max);
        let out_of_time = self.timeout.is_some_and(|timeout| started.elapsed() >= timeout);
        out_of_attempts || out_of_time
    }
}

struct PollLoop<Req, Map, Term, Exh> {
    request: Req,
    map: Map,
    is_terminal: Term,
    on_exhausted: Exh,
    policy: PollPolicy,
    attempts: u32,
    started: Instant,
    finished: bool,
}

/// Issues `request` immediately and then once per `policy.interval`,
/// yielding `map(response)` each time. The stream ends right after the
/// first item for which `is_terminal` holds, or after yielding
/// `on_exhausted()` when the policy's bounds run out.
///
/// Nothing is requested until the stream is polled, and dropping the
/// stream stops the loop.
pub fn poll_until_terminal<Req, Fut, Raw, Out, Map, Term, Exh>(
    policy: PollPolicy,
    request: Req,
    map: Map,
    is_terminal: Term,
    on_exhausted: Exh,
) -> impl Stream<Item = Out>
where
    Req: FnMut() -> Fut,
    Fut: Future<Output = Raw>,
    Map: FnMut(Raw) -> Out,
    Term: Fn(&Out) -> bool,
    Exh: Fn() -> Out,
{
    let state = PollLoop {
        request,
        map,
        is_terminal,
        on_exhausted,
        policy,
        attempts: 0,
        started: Instant::now(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }

        if state.attempts > 0 {
            tokio::time::sleep(state.policy.interval).await;
        }

        if state.policy.exhausted(state.attempts, state.started) {
            log::warn!("⏱️ [POLL] Giving up after {} attempts", state.attempts);
            state.finished = true;
            let out = (state.on_exhausted)();
            return Some((out, state));
        }

        state.attempts += 1;
        let raw = (state.request)().await;
        let out = (state.map)(raw);
        if (state.is_terminal)(&out) {
            log::debug!("🛑 [POLL] Terminal response after {} attempts", state.attempts);
            state.finished = true;
        }
        Some((out, state))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counting_request(calls: Arc<AtomicU32>) -> impl FnMut() -> std::future::Ready<u32> {
        move || std::future::ready(calls.fetch_add(1, Ordering::SeqCst) + 1)
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_terminal_item() {
        let calls = Arc::new(AtomicU32::new(0));
        let items: Vec<u32> = poll_until_terminal(
            PollPolicy::every(Duration::from_secs(5)),
            counting_request(calls.clone()),
            |n| n,
            |n| *n == 3,
            || 0,
        )
        .collect()
        .await;

        assert_eq!(items, vec![1, 2, 3]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_one_interval_between_requests() {
        let started = Instant::now();
        let items: Vec<u32> = poll_until_terminal(
            PollPolicy::every(Duration::from_secs(5)),
            counting_request(Arc::new(AtomicU32::new(0))),
            |n| n,
            |n| *n == 4,
            || 0,
        )
        .collect()
        .await;

        assert_eq!(items.len(), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn max_attempts_yields_exhausted_item() {
        let calls = Arc::new(AtomicU32::new(0));
        let items: Vec<i64> = poll_until_terminal(
            PollPolicy::every(Duration::from_secs(1)).with_max_attempts(Some(3)),
            counting_request(calls.clone()),
            |n| n as i64,
            |_| false,
            || -1,
        )
        .collect()
        .await;

        assert_eq!(items, vec![1, 2, 3, -1]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_yields_exhausted_item() {
        let calls = Arc::new(AtomicU32::new(0));
        let items: Vec<i64> = poll_until_terminal(
            PollPolicy::every(Duration::from_secs(5)).with_timeout(Some(Duration::from_secs(12))),
            counting_request(calls.clone()),
            |n| n as i64,
            |_| false,
            || -1,
        )
        .collect()
        .await;

        // requests at 0s, 5s, 10s; the check at 15s is past the bound
        assert_eq!(items, vec![1, 2, 3, -1]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_requested_until_polled_and_drop_cancels() {
        let calls = Arc::new(AtomicU32::new(0));
        let stream = poll_until_terminal(
            PollPolicy::every(Duration::from_secs(5)),
            counting_request(calls.clone()),
            |n| n,
            |_| false,
            || 0,
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let mut stream = Box::pin(stream);
        assert_eq!(stream.next().await, Some(1));
        assert_eq!(stream.next().await, Some(2));
        drop(stream);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
