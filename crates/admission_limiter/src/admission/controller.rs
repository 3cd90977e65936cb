use std::{
    collections::VecDeque,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::{sync::oneshot, time::Instant};

use super::{
    AdmissionSettings,
    internal_event::{AdmissionInFlight, AdmissionQueued, AdmissionWaitTime, InternalEvent},
};

/// Gatekeeper for a fixed pool of concurrent operations.
///
/// Cloning is cheap and every clone shares the same pool. The in-flight counter and
/// the waiting queue are guarded by one mutex, so a released slot is handed to the
/// earliest waiter without ever being observable as free in between.
#[derive(Clone)]
pub struct AdmissionController {
    inner: Arc<Inner>,
}

struct Inner {
    capacity: usize,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    in_flight: usize,
    waiters: VecDeque<oneshot::Sender<AdmissionSlot>>,
}

/// Point-in-time view of the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdmissionStats {
    pub in_flight: usize,
    pub queued: usize,
    pub capacity: usize,
}

/// One unit of admission capacity.
///
/// Released exactly once, when dropped.
#[must_use = "dropping the slot releases it immediately"]
pub struct AdmissionSlot {
    controller: Option<AdmissionController>,
}

impl AdmissionController {
    pub fn new(settings: AdmissionSettings) -> Self {
        let capacity = if settings.capacity() == 0 {
            warn!(message = "Admission capacity of zero would block forever; using 1.");
            1
        } else {
            settings.capacity()
        };

        Self {
            inner: Arc::new(Inner {
                capacity,
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Callers still waiting for a slot.
    pub fn queued(&self) -> usize {
        self.stats().queued
    }

    /// Waits for a free slot.
    ///
    /// Callers that find the pool full are admitted in the order they arrived.
    /// Dropping the returned future gives up the queue position.
    pub async fn acquire(&self) -> AdmissionSlot {
        let started = Instant::now();
        loop {
            let receiver = {
                let mut state = self.lock();
                if state.in_flight < self.inner.capacity {
                    state.in_flight += 1;
                    AdmissionInFlight(state.in_flight).emit();
                    return self.new_slot();
                }

                let (sender, receiver) = oneshot::channel();
                state.waiters.retain(|waiter| !waiter.is_closed());
                state.waiters.push_back(sender);
                debug!(
                    message = "Admission pool full; queuing.",
                    queued = state.waiters.len(),
                    in_flight = state.in_flight,
                );
                AdmissionQueued(state.waiters.len()).emit();
                receiver
            };

            match receiver.await {
                Ok(slot) => {
                    AdmissionWaitTime(started.elapsed()).emit();
                    return slot;
                }
                // Only reachable if the waiter was discarded without a hand-off.
                Err(_) => warn!(message = "Queued admission was dropped; queuing again."),
            }
        }
    }

    /// Takes a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<AdmissionSlot> {
        let mut state = self.lock();
        if state.in_flight < self.inner.capacity {
            state.in_flight += 1;
            AdmissionInFlight(state.in_flight).emit();
            Some(self.new_slot())
        } else {
            None
        }
    }

    pub fn stats(&self) -> AdmissionStats {
        let state = self.lock();
        AdmissionStats {
            in_flight: state.in_flight,
            queued: state.live_waiters(),
            capacity: self.inner.capacity,
        }
    }

    fn release(&self) {
        loop {
            let waiter = {
                let mut state = self.lock();
                match state.waiters.pop_front() {
                    Some(waiter) => {
                        AdmissionQueued(state.live_waiters()).emit();
                        waiter
                    }
                    None => {
                        state.in_flight = state.in_flight.saturating_sub(1);
                        AdmissionInFlight(state.in_flight).emit();
                        return;
                    }
                }
            };

            // The slot stays counted while it moves to the waiter.
            match waiter.send(self.new_slot()) {
                Ok(()) => {
                    trace!(message = "Handed released slot to the earliest waiter.");
                    return;
                }
                Err(mut abandoned) => abandoned.disarm(),
            }
        }
    }

    fn new_slot(&self) -> AdmissionSlot {
        AdmissionSlot {
            controller: Some(self.clone()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    /// Waiters whose caller has not given up yet.
    fn live_waiters(&self) -> usize {
        self.waiters.iter().filter(|w| !w.is_closed()).count()
    }
}

impl fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionController")
            .field("stats", &self.stats())
            .finish()
    }
}

impl AdmissionSlot {
    fn disarm(&mut self) {
        self.controller = None;
    }
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        if let Some(controller) = self.controller.take() {
            controller.release();
        }
    }
}

impl fmt::Debug for AdmissionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionSlot")
            .field("armed", &self.controller.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use tokio::{sync::mpsc, time};
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    fn controller(capacity: usize) -> AdmissionController {
        AdmissionController::new(AdmissionSettings::builder().capacity(capacity).build())
    }

    #[tokio::test]
    async fn admits_immediately_below_capacity() {
        let controller = controller(2);

        let first = controller.try_acquire();
        let second = controller.try_acquire();
        assert!(first.is_some());
        assert!(second.is_some());
        assert!(controller.try_acquire().is_none());

        assert_eq!(
            controller.stats(),
            AdmissionStats {
                in_flight: 2,
                queued: 0,
                capacity: 2
            }
        );

        drop(first);
        assert_eq!(controller.in_flight(), 1);
        drop(second);
        assert_eq!(controller.in_flight(), 0);
    }

    #[tokio::test]
    async fn queued_acquire_waits_for_release() {
        let controller = controller(1);
        let held = controller.acquire().await;

        let mut waiting = task::spawn(controller.acquire());
        assert_pending!(waiting.poll());
        assert_eq!(controller.queued(), 1);

        drop(held);
        assert!(waiting.is_woken());
        let slot = assert_ready!(waiting.poll());

        // Hand-off keeps the slot counted the whole time.
        assert_eq!(controller.stats().in_flight, 1);
        assert_eq!(controller.stats().queued, 0);
        drop(slot);
        assert_eq!(controller.stats().in_flight, 0);
    }

    #[tokio::test]
    async fn waiters_are_admitted_in_arrival_order() {
        let controller = controller(1);
        let held = controller.acquire().await;

        let mut first = task::spawn(controller.acquire());
        let mut second = task::spawn(controller.acquire());
        let mut third = task::spawn(controller.acquire());
        assert_pending!(first.poll());
        assert_pending!(second.poll());
        assert_pending!(third.poll());

        drop(held);
        assert_pending!(third.poll());
        assert_pending!(second.poll());
        let slot = assert_ready!(first.poll());

        drop(slot);
        assert_pending!(third.poll());
        let slot = assert_ready!(second.poll());

        drop(slot);
        let slot = assert_ready!(third.poll());
        drop(slot);
        assert_eq!(controller.stats().in_flight, 0);
    }

    #[tokio::test]
    async fn abandoned_waiter_is_skipped() {
        let controller = controller(1);
        let held = controller.acquire().await;

        let mut gone = task::spawn(controller.acquire());
        let mut stays = task::spawn(controller.acquire());
        assert_pending!(gone.poll());
        assert_pending!(stays.poll());
        drop(gone);
        assert_eq!(controller.stats().queued, 1);

        drop(held);
        let slot = assert_ready!(stays.poll());
        assert_eq!(controller.stats().in_flight, 1);
        drop(slot);
        assert_eq!(controller.stats().in_flight, 0);
    }

    #[tokio::test]
    async fn abandoned_waiters_are_pruned_when_queuing() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let _guard = metrics::set_default_local_recorder(&recorder);

        let controller = controller(1);
        let held = controller.acquire().await;

        let mut gone = task::spawn(controller.acquire());
        assert_pending!(gone.poll());
        drop(gone);

        let mut stays = task::spawn(controller.acquire());
        assert_pending!(stays.poll());
        assert_eq!(controller.lock().waiters.len(), 1);
        assert_eq!(controller.queued(), 1);

        let queued_gauge = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find_map(|(key, _, _, value)| match value {
                DebugValue::Gauge(v) if key.key().name() == "admission_queued" => Some(v.0),
                _ => None,
            });
        assert_eq!(queued_gauge, Some(1.0));

        drop(held);
        drop(assert_ready!(stays.poll()));
    }

    #[tokio::test]
    async fn zero_capacity_is_raised_to_one() {
        let controller = controller(0);
        assert_eq!(controller.capacity(), 1);
        assert!(controller.try_acquire().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_never_exceeds_capacity() {
        const CAPACITY: usize = 3;
        const BURST: usize = 25;

        let controller = controller(CAPACITY);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        for i in 0..BURST {
            let controller = controller.clone();
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            let done_tx = done_tx.clone();
            tokio::spawn(async move {
                let _slot = controller.acquire().await;
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                time::sleep(Duration::from_millis(50)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                let _ = done_tx.send(i);
            });
        }
        drop(done_tx);

        let mut finished = Vec::new();
        while let Some(i) = done_rx.recv().await {
            finished.push(i);
        }

        assert_eq!(finished.len(), BURST);
        assert!(peak.load(Ordering::SeqCst) <= CAPACITY);
        assert_eq!(controller.stats().in_flight, 0);
    }
}
