//! Per-session outbox with a single long-poll consumer.
//!
//! Producers (command handlers, plugin tasks) call [`EventQueue::push`] from
//! anywhere. The transport registers as the sole consumer with
//! [`EventQueue::register_poller`] and waits on the returned [`PollGuard`].

use std::borrow::Cow;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Payload sent when a long poll times out with nothing queued.
pub const KEEPALIVE_PAYLOAD: &str = r#"{"janus":"keepalive"}"#;

/// An outgoing event waiting for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// HTTP status to report with this event.
    pub status: u16,
    /// Serialized JSON body.
    pub payload: Cow<'static, str>,
}

impl Event {
    pub fn new(status: u16, payload: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            payload: payload.into(),
        }
    }

    pub fn keepalive() -> Self {
        Self::new(200, KEEPALIVE_PAYLOAD)
    }

    /// Whether the payload is owned by this event and released with it.
    pub fn is_allocated(&self) -> bool {
        matches!(self.payload, Cow::Owned(_))
    }
}

/// Result of waiting on the queue.
#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Event(Event),
    /// The timeout elapsed with nothing to deliver.
    Keepalive,
    /// The session was closed while waiting and the outbox is empty.
    Destroyed,
    /// Process shutdown interrupted the wait.
    ShuttingDown,
}

#[derive(Debug, Default)]
pub struct EventQueue {
    outbox: Mutex<VecDeque<Event>>,
    notify: Notify,
    closed: AtomicBool,
    polling: AtomicBool,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and wake the consumer, if any.
    ///
    /// Events pushed with no consumer waiting accumulate until drained.
    pub fn push(&self, event: Event) {
        {
            let mut outbox = self.outbox.lock().unwrap_or_else(|e| e.into_inner());
            outbox.push_back(event);
        }
        self.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.outbox.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark the queue closed and interrupt a blocked consumer.
    ///
    /// Already queued events are still handed out; once they run out the
    /// consumer gets [`PollOutcome::Destroyed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Whether a consumer is currently registered.
    pub fn is_polled(&self) -> bool {
        self.polling.load(Ordering::Acquire)
    }

    /// Register as the only consumer. Returns `None` if another consumer
    /// holds the registration.
    pub fn register_poller(&self) -> Option<PollGuard<'_>> {
        self.polling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PollGuard { queue: self })
    }

    fn try_pop(&self) -> Option<Event> {
        self.outbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }
}

/// Exclusive consumer registration. Dropping it (including when the waiting
/// future is abandoned) releases the registration.
#[derive(Debug)]
pub struct PollGuard<'a> {
    queue: &'a EventQueue,
}

impl PollGuard<'_> {
    /// Return the oldest event, waiting up to `timeout` for one to arrive.
    pub async fn pop_or_wait(&self, timeout: Duration, shutdown: &CancellationToken) -> PollOutcome {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(event) = self.queue.try_pop() {
                return PollOutcome::Event(event);
            }
            if self.queue.is_closed() {
                return PollOutcome::Destroyed;
            }
            // A push or close between the checks above and this await leaves a
            // stored permit, so the notification cannot be lost.
            tokio::select! {
                _ = self.queue.notify.notified() => {}
                _ = tokio::time::sleep_until(deadline) => return PollOutcome::Keepalive,
                _ = shutdown.cancelled() => return PollOutcome::ShuttingDown,
            }
        }
    }

    /// Take up to `max` already queued events without waiting.
    pub fn drain(&self, max: usize) -> Vec<Event> {
        let mut outbox = self.queue.outbox.lock().unwrap_or_else(|e| e.into_inner());
        let n = max.min(outbox.len());
        outbox.drain(..n).collect()
    }
}

impl Drop for PollGuard<'_> {
    fn drop(&mut self) {
        self.queue.polling.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn event(n: usize) -> Event {
        Event::new(200, format!(r#"{{"n":{n}}}"#))
    }

    #[tokio::test]
    async fn returns_queued_event_immediately() {
        let queue = EventQueue::new();
        queue.push(event(1));
        let guard = queue.register_poller().unwrap();
        let outcome = guard
            .pop_or_wait(Duration::from_secs(30), &CancellationToken::new())
            .await;
        assert_eq!(outcome, PollOutcome::Event(event(1)));
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_with_keepalive() {
        let queue = EventQueue::new();
        let guard = queue.register_poller().unwrap();
        let started = Instant::now();
        let outcome = guard
            .pop_or_wait(Duration::from_millis(200), &CancellationToken::new())
            .await;
        assert_eq!(outcome, PollOutcome::Keepalive);
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn push_wakes_blocked_consumer() {
        let queue = Arc::new(EventQueue::new());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                let guard = queue.register_poller().unwrap();
                guard
                    .pop_or_wait(Duration::from_secs(30), &CancellationToken::new())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(event(7));
        let outcome = tokio::time::timeout(Duration::from_secs(2), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, PollOutcome::Event(event(7)));
    }

    #[tokio::test]
    async fn close_interrupts_blocked_consumer() {
        let queue = Arc::new(EventQueue::new());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                let guard = queue.register_poller().unwrap();
                guard
                    .pop_or_wait(Duration::from_secs(30), &CancellationToken::new())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();
        let outcome = tokio::time::timeout(Duration::from_secs(2), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, PollOutcome::Destroyed);
    }

    #[tokio::test]
    async fn closed_queue_still_drains_pending_events() {
        let queue = EventQueue::new();
        queue.push(event(1));
        queue.close();
        let guard = queue.register_poller().unwrap();
        let token = CancellationToken::new();
        let timeout = Duration::from_secs(30);
        assert_eq!(
            guard.pop_or_wait(timeout, &token).await,
            PollOutcome::Event(event(1))
        );
        assert_eq!(guard.pop_or_wait(timeout, &token).await, PollOutcome::Destroyed);
    }

    #[tokio::test]
    async fn shutdown_interrupts_wait() {
        let queue = EventQueue::new();
        let guard = queue.register_poller().unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let outcome = guard.pop_or_wait(Duration::from_secs(30), &token).await;
        assert_eq!(outcome, PollOutcome::ShuttingDown);
    }

    #[test]
    fn second_poller_is_rejected_until_first_drops() {
        let queue = EventQueue::new();
        let first = queue.register_poller().unwrap();
        assert!(queue.is_polled());
        assert!(queue.register_poller().is_none());
        drop(first);
        assert!(!queue.is_polled());
        assert!(queue.register_poller().is_some());
    }

    #[tokio::test]
    async fn abandoned_wait_releases_registration() {
        let queue = Arc::new(EventQueue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move {
                let guard = queue.register_poller().unwrap();
                guard
                    .pop_or_wait(Duration::from_secs(30), &CancellationToken::new())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(queue.is_polled());
        waiter.abort();
        let _ = waiter.await;
        assert!(!queue.is_polled());
    }

    #[tokio::test]
    async fn fifo_across_producer_threads() {
        let queue = Arc::new(EventQueue::new());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        queue.push(Event::new(200, format!("{p}:{i}")));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let guard = queue.register_poller().unwrap();
        let mut next = [0usize; 4];
        for _ in 0..200 {
            let PollOutcome::Event(event) = guard
                .pop_or_wait(Duration::from_millis(10), &CancellationToken::new())
                .await
            else {
                panic!("expected an event");
            };
            let (p, i) = event.payload.split_once(':').unwrap();
            let p: usize = p.parse().unwrap();
            let i: usize = i.parse().unwrap();
            assert_eq!(i, next[p], "producer {p} out of order");
            next[p] += 1;
        }
        assert_eq!(next, [50; 4]);
    }

    #[test]
    fn drain_respects_limit() {
        let queue = EventQueue::new();
        for n in 0..5 {
            queue.push(event(n));
        }
        let guard = queue.register_poller().unwrap();
        let batch = guard.drain(3);
        assert_eq!(batch, vec![event(0), event(1), event(2)]);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn keepalive_payload_is_static() {
        assert!(!Event::keepalive().is_allocated());
        assert!(event(1).is_allocated());
    }
}
