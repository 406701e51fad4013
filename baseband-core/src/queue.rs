//! Lock-free MPMC queues used as the transport between the master
//! scheduler and the worker pool (spec §4.2).
//!
//! Backed by `crossbeam::queue::ArrayQueue`: bounded, non-blocking
//! `push`/`pop`, safe for any number of concurrent producers and
//! consumers. Correctness here does not depend on global FIFO ordering
//! across producers — only on each queue accepting and returning
//! `Event`s without loss while non-full/non-empty.

use crossbeam::queue::ArrayQueue;

use crate::tag::Event;

/// Scheduler → worker transport: one per worker thread.
pub struct RequestQueue {
    inner: ArrayQueue<Event>,
}

impl RequestQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: ArrayQueue::new(capacity),
        }
    }

    /// Non-blocking enqueue. Returns the event back on failure (queue full).
    pub fn try_enqueue(&self, event: Event) -> Result<(), Event> {
        self.inner.push(event)
    }

    /// Non-blocking dequeue.
    pub fn try_dequeue(&self) -> Option<Event> {
        self.inner.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

/// Worker → scheduler transport: a single shared queue for all workers'
/// completions.
pub struct CompletionQueue {
    inner: ArrayQueue<Event>,
}

impl CompletionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: ArrayQueue::new(capacity),
        }
    }

    pub fn try_enqueue(&self, event: Event) -> Result<(), Event> {
        self.inner.push(event)
    }

    pub fn try_dequeue(&self) -> Option<Event> {
        self.inner.pop()
    }

    /// Drain up to `max` pending completions into `out`, returning how many
    /// were taken. Used by the master's drain loop (spec §4.5 step 2).
    pub fn try_dequeue_bulk(&self, out: &mut Vec<Event>, max: usize) -> usize {
        let mut n = 0;
        while n < max {
            match self.inner.pop() {
                Some(ev) => {
                    out.push(ev);
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::{EventKind, Tag};

    #[test]
    fn request_queue_fifo_single_producer() {
        let q = RequestQueue::new(8);
        for i in 0..4 {
            q.try_enqueue(Event::new(EventKind::Fft, Tag::for_frame_symbol(i, 0)))
                .unwrap();
        }
        for i in 0..4 {
            let ev = q.try_dequeue().unwrap();
            assert_eq!(ev.tag.frame_id(), i);
        }
        assert!(q.try_dequeue().is_none());
    }

    #[test]
    fn enqueue_fails_when_full() {
        let q = RequestQueue::new(2);
        assert!(q
            .try_enqueue(Event::new(EventKind::Fft, Tag::for_frame_symbol(0, 0)))
            .is_ok());
        assert!(q
            .try_enqueue(Event::new(EventKind::Fft, Tag::for_frame_symbol(1, 0)))
            .is_ok());
        assert!(q
            .try_enqueue(Event::new(EventKind::Fft, Tag::for_frame_symbol(2, 0)))
            .is_err());
    }

    #[test]
    fn completion_queue_bulk_drain() {
        let q = CompletionQueue::new(16);
        for i in 0..10 {
            q.try_enqueue(Event::new(EventKind::Decode, Tag::for_frame_symbol(i, 0)))
                .unwrap();
        }
        let mut out = Vec::new();
        let n = q.try_dequeue_bulk(&mut out, 6);
        assert_eq!(n, 6);
        assert_eq!(out.len(), 6);
        let mut rest = Vec::new();
        let n2 = q.try_dequeue_bulk(&mut rest, 100);
        assert_eq!(n2, 4);
    }

    #[test]
    fn mpmc_concurrent_producers_no_loss() {
        use std::sync::Arc;
        use std::thread;

        let q = Arc::new(CompletionQueue::new(1024));
        let producers = 8;
        let per_producer = 64;
        let mut handles = Vec::new();
        for p in 0..producers {
            let q = Arc::clone(&q);
            handles.push(thread::spawn(move || {
                for i in 0..per_producer {
                    let tag = Tag::for_frame_symbol(p as u64, i as u64);
                    while q.try_enqueue(Event::new(EventKind::Decode, tag)).is_err() {
                        std::thread::yield_now();
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(q.len(), producers * per_producer);
    }
}
