//! Thread-safe FIFO of inbound events.
//!
//! Many producers (OS callbacks, command API, service responses) enqueue from
//! arbitrary threads; exactly one consumer drains. There is no priority and no
//! reordering, and nothing is ever dropped by the queue itself.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{MonitorError, MonitorResult};
use crate::event::Event;

/// Ordered event queue.
#[derive(Debug, Default)]
pub struct EventQueue {
    items: Mutex<VecDeque<Event>>,
}

impl EventQueue {
    /// Create a new empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Every operation is a single VecDeque call, so a panicking holder cannot
    // leave the deque half-updated.
    fn items(&self) -> MutexGuard<'_, VecDeque<Event>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the tail.
    pub fn enqueue(&self, event: Event) {
        self.items().push_back(event);
    }

    /// Clone of the head without removing it.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::QueueEmpty` if there is nothing queued.
    pub fn peek(&self) -> MonitorResult<Event> {
        self.items().front().cloned().ok_or(MonitorError::QueueEmpty)
    }

    /// Remove and return the head.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::QueueEmpty` if there is nothing queued.
    pub fn poll(&self) -> MonitorResult<Event> {
        self.items().pop_front().ok_or(MonitorError::QueueEmpty)
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        !self.items().is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.has_next()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::policy::MonitorMode;

    #[test]
    fn test_empty_queue_errors() {
        let queue = EventQueue::new();
        assert!(!queue.has_next());
        assert!(matches!(queue.peek(), Err(MonitorError::QueueEmpty)));
        assert!(matches!(queue.poll(), Err(MonitorError::QueueEmpty)));
    }

    #[test]
    fn test_peek_does_not_remove() {
        let queue = EventQueue::new();
        queue.enqueue(Event::Start);
        queue.enqueue(Event::UpdateLocationNow);

        assert_eq!(queue.peek().unwrap(), Event::Start);
        assert_eq!(queue.peek().unwrap(), Event::Start);
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.poll().unwrap(), Event::Start);
        assert_eq!(queue.poll().unwrap(), Event::UpdateLocationNow);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_concurrent_producers_keep_per_producer_order() {
        let queue = Arc::new(EventQueue::new());
        let handles: Vec<_> = (0..4u8)
            .map(|producer| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for _ in 0..50 {
                        queue.enqueue(Event::SetMode(MonitorMode::from_bits(producer)));
                        queue.enqueue(Event::Stop { clear_data: false });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(queue.len(), 400);
        // Each producer pushed SetMode then Stop; after a producer's SetMode the
        // matching Stop must come later, so the running balance never goes negative.
        let mut pending_set_modes = 0i32;
        while let Ok(event) = queue.poll() {
            match event {
                Event::SetMode(_) => pending_set_modes += 1,
                Event::Stop { .. } => pending_set_modes -= 1,
                other => panic!("unexpected event {other:?}"),
            }
            assert!(pending_set_modes >= 0);
        }
        assert_eq!(pending_set_modes, 0);
    }
}
