use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdmissionSnapshot {
    pub max_concurrent: usize,
    pub in_flight: usize,
    pub queued: usize,
}

impl AdmissionSnapshot {
    pub fn available(&self) -> usize {
        self.max_concurrent.saturating_sub(self.in_flight)
    }
}

#[derive(Debug)]
struct State<T> {
    in_flight: usize,
    queue: VecDeque<T>,
    closed: bool,
}

/// One shared in-flight budget across all endpoints, with a FIFO overflow queue.
///
/// The controller only does bookkeeping: items handed back by
/// [`drain_if_capacity`](Self::drain_if_capacity) already own a slot, and the
/// caller is responsible for executing them and calling
/// [`release`](Self::release) afterwards.
pub struct AdmissionController<T> {
    max_concurrent: usize,
    state: Mutex<State<T>>,
}

impl<T> AdmissionController<T> {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            state: Mutex::new(State {
                in_flight: 0,
                queue: VecDeque::new(),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take a slot if one is free.
    pub fn try_acquire(&self) -> bool {
        let mut st = self.lock();
        if st.closed || st.in_flight >= self.max_concurrent {
            return false;
        }
        st.in_flight += 1;
        true
    }

    /// Take a slot regardless of the budget (queue bypass).
    pub fn force_acquire(&self) {
        self.lock().in_flight += 1;
    }

    /// Take a slot if one is free and nobody is waiting, else enqueue `item`.
    ///
    /// Returns the item back when admitted so the caller can run it. Errors
    /// with the item when the controller is closed.
    pub fn acquire_or_enqueue(&self, item: T) -> Result<Option<T>, T> {
        let mut st = self.lock();
        if st.closed {
            return Err(item);
        }
        if st.in_flight < self.max_concurrent && st.queue.is_empty() {
            st.in_flight += 1;
            return Ok(Some(item));
        }
        st.queue.push_back(item);
        Ok(None)
    }

    /// Append to the FIFO queue. Fails with the item once closed.
    pub fn enqueue(&self, item: T) -> Result<(), T> {
        let mut st = self.lock();
        if st.closed {
            return Err(item);
        }
        st.queue.push_back(item);
        Ok(())
    }

    pub fn release(&self) {
        let mut st = self.lock();
        st.in_flight = st.in_flight.saturating_sub(1);
    }

    /// Pop queued items while capacity remains; each returned item holds a slot.
    pub fn drain_if_capacity(&self) -> Vec<T> {
        let mut st = self.lock();
        let mut admitted = Vec::new();
        if st.closed {
            return admitted;
        }
        while st.in_flight < self.max_concurrent {
            match st.queue.pop_front() {
                Some(item) => {
                    st.in_flight += 1;
                    admitted.push(item);
                }
                None => break,
            }
        }
        admitted
    }

    /// Release one slot and admit whatever the freed capacity allows.
    pub fn release_and_drain(&self) -> Vec<T> {
        self.release();
        self.drain_if_capacity()
    }

    /// Refuse further work and hand back every pending item.
    pub fn close(&self) -> Vec<T> {
        let mut st = self.lock();
        st.closed = true;
        st.queue.drain(..).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn snapshot(&self) -> AdmissionSnapshot {
        let st = self.lock();
        AdmissionSnapshot {
            max_concurrent: self.max_concurrent,
            in_flight: st.in_flight,
            queued: st.queue.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_budget_bounds_acquire() {
        let ac: AdmissionController<u32> = AdmissionController::new(2);
        assert!(ac.try_acquire());
        assert!(ac.try_acquire());
        assert!(!ac.try_acquire());
        assert_eq!(ac.in_flight(), 2);

        ac.release();
        assert!(ac.try_acquire());
        assert_eq!(ac.snapshot().available(), 0);
    }

    #[test]
    fn test_zero_budget_is_clamped() {
        let ac: AdmissionController<u32> = AdmissionController::new(0);
        assert_eq!(ac.max_concurrent(), 1);
        assert!(ac.try_acquire());
    }

    #[test]
    fn test_fifo_drain_respects_capacity() {
        let ac = AdmissionController::new(2);
        assert_eq!(ac.acquire_or_enqueue("a"), Ok(Some("a")));
        assert_eq!(ac.acquire_or_enqueue("b"), Ok(Some("b")));
        assert_eq!(ac.acquire_or_enqueue("c"), Ok(None));
        assert_eq!(ac.acquire_or_enqueue("d"), Ok(None));
        assert_eq!(ac.acquire_or_enqueue("e"), Ok(None));
        assert_eq!(ac.queued(), 3);

        assert!(ac.drain_if_capacity().is_empty());
        assert_eq!(ac.release_and_drain(), vec!["c"]);
        assert_eq!(ac.in_flight(), 2);

        ac.release();
        ac.release();
        assert_eq!(ac.drain_if_capacity(), vec!["d", "e"]);
        assert_eq!(ac.queued(), 0);
    }

    #[test]
    fn test_queue_waiters_are_not_overtaken() {
        let ac = AdmissionController::new(1);
        assert_eq!(ac.acquire_or_enqueue(1), Ok(Some(1)));
        assert_eq!(ac.acquire_or_enqueue(2), Ok(None));
        ac.release();
        // A slot is free but 2 is still waiting; 3 must queue behind it.
        assert_eq!(ac.acquire_or_enqueue(3), Ok(None));
        assert_eq!(ac.drain_if_capacity(), vec![2]);
    }

    #[test]
    fn test_force_acquire_exceeds_budget() {
        let ac: AdmissionController<u32> = AdmissionController::new(1);
        assert!(ac.try_acquire());
        ac.force_acquire();
        assert_eq!(ac.in_flight(), 2);
        ac.release();
        assert!(!ac.try_acquire());
        ac.release();
        assert!(ac.try_acquire());
    }

    #[test]
    fn test_release_saturates() {
        let ac: AdmissionController<u32> = AdmissionController::new(1);
        ac.release();
        assert_eq!(ac.in_flight(), 0);
    }

    #[test]
    fn test_close_returns_pending_and_rejects_new() {
        let ac = AdmissionController::new(1);
        assert!(ac.try_acquire());
        ac.enqueue(10).unwrap();
        ac.enqueue(11).unwrap();

        assert_eq!(ac.close(), vec![10, 11]);
        assert!(ac.is_closed());
        assert_eq!(ac.enqueue(12), Err(12));
        assert_eq!(ac.acquire_or_enqueue(13), Err(13));
        assert!(!ac.try_acquire());
        assert!(ac.release_and_drain().is_empty());
    }

    #[test]
    fn test_concurrent_acquire_never_exceeds_budget() {
        let ac: Arc<AdmissionController<u32>> = Arc::new(AdmissionController::new(3));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ac = Arc::clone(&ac);
                std::thread::spawn(move || {
                    let mut granted = 0;
                    for _ in 0..100 {
                        if ac.try_acquire() {
                            assert!(ac.in_flight() <= 3);
                            granted += 1;
                            ac.release();
                        }
                    }
                    granted
                })
            })
            .collect();
        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert!(total > 0);
        assert_eq!(ac.in_flight(), 0);
    }
}
