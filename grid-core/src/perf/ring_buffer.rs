//! Single-producer/single-consumer lock-free ring buffer.
//!
//! Grounded directly on `original_source/lib/utils/include/Utils/OneToOneQueue.hpp`:
//! `N+1` backing slots to disambiguate empty from full, `head`/`tail` as
//! `AtomicUsize` with `Relaxed` ordering (each index has exactly one
//! writer), and a `Worker` wrapper mirroring the original's `Stop(bool)`
//! graceful-drain-vs-cancel and `PauseDequeue`/`ResumeDequeue` throttle.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// A fixed-capacity SPSC ring buffer. `N` is the usable capacity; the
/// backing array is `N + 1` slots so a full buffer (`tail + 1 == head`,
/// mod capacity) is distinguishable from an empty one (`head == tail`).
pub struct SpscRingBuffer<T> {
    buffer: Box<[UnsafeCell<Option<T>>]>,
    capacity_plus_one: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: enqueue is only ever called by the single producer (owns `tail`),
// dequeue only by the single consumer (owns `head`); each slot is touched
// by exactly one side at a time because of the N+1 disambiguation scheme.
unsafe impl<T: Send> Sync for SpscRingBuffer<T> {}

impl<T> SpscRingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity_plus_one = capacity + 1;
        let buffer = (0..capacity_plus_one)
            .map(|_| UnsafeCell::new(None))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            buffer,
            capacity_plus_one,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    fn advance(&self, idx: usize) -> usize {
        (idx + 1) % self.capacity_plus_one
    }

    /// Producer-only. Returns `false` if the buffer is full.
    pub fn enqueue(&self, value: T) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let next_tail = self.advance(tail);
        let head = self.head.load(Ordering::Acquire);
        if next_tail == head {
            return false; // full
        }
        // SAFETY: only the producer writes to `tail`'s slot.
        unsafe {
            *self.buffer[tail].get() = Some(value);
        }
        self.tail.store(next_tail, Ordering::Release);
        true
    }

    /// Consumer-only. Returns `None` if the buffer is empty.
    pub fn dequeue(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None; // empty
        }
        // SAFETY: only the consumer reads/clears `head`'s slot.
        let value = unsafe { (*self.buffer[head].get()).take() };
        self.head.store(self.advance(head), Ordering::Release);
        value
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if tail >= head {
            tail - head
        } else {
            self.capacity_plus_one - head + tail
        }
    }
}

/// Drains an [`SpscRingBuffer`] on a background thread via a supplied
/// closure, with graceful-drain-vs-cancel stop semantics and a
/// pause/resume throttle that stalls dequeuing without stopping the thread.
pub struct Worker<T> {
    queue: Arc<SpscRingBuffer<T>>,
    paused: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
    cancel_queue: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Worker<T> {
    pub fn spawn<F>(queue: Arc<SpscRingBuffer<T>>, mut on_item: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let paused = Arc::new(AtomicBool::new(false));
        let stopping = Arc::new(AtomicBool::new(false));
        let cancel_queue = Arc::new(AtomicBool::new(false));

        let worker_queue = Arc::clone(&queue);
        let worker_paused = Arc::clone(&paused);
        let worker_stopping = Arc::clone(&stopping);
        let worker_cancel = Arc::clone(&cancel_queue);

        let handle = std::thread::spawn(move || loop {
            if worker_cancel.load(Ordering::Relaxed) {
                return;
            }
            if worker_paused.load(Ordering::Relaxed) {
                std::thread::yield_now();
                continue;
            }
            match worker_queue.dequeue() {
                Some(item) => on_item(item),
                None => {
                    if worker_stopping.load(Ordering::Relaxed) {
                        return; // drained; graceful stop
                    }
                    std::thread::yield_now();
                }
            }
        });

        Self {
            queue,
            paused,
            stopping,
            cancel_queue,
            handle: Some(handle),
        }
    }

    pub fn enqueue(&self, value: T) -> bool {
        self.queue.enqueue(value)
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    /// Stop the worker. `cancel_queue = true` discards anything still
    /// queued; `false` lets the worker drain the remaining items first.
    pub fn stop(mut self, cancel_queue: bool) {
        if cancel_queue {
            self.cancel_queue.store(true, Ordering::Relaxed);
        } else {
            self.stopping.store(true, Ordering::Relaxed);
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn enqueue_dequeue_respects_fifo_order() {
        let q = SpscRingBuffer::new(4);
        assert!(q.enqueue(1));
        assert!(q.enqueue(2));
        assert_eq!(q.dequeue(), Some(1));
        assert_eq!(q.dequeue(), Some(2));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn enqueue_fails_when_full() {
        let q = SpscRingBuffer::new(2);
        assert!(q.enqueue(1));
        assert!(q.enqueue(2));
        assert!(!q.enqueue(3)); // capacity 2 -> N+1=3 slots, one must stay empty
        assert_eq!(q.dequeue(), Some(1));
        assert!(q.enqueue(3));
    }

    #[test]
    fn worker_drains_items_via_closure() {
        let queue = Arc::new(SpscRingBuffer::new(16));
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = Arc::clone(&received);

        let worker = Worker::spawn(Arc::clone(&queue), move |item: i32| {
            received_clone.lock().unwrap().push(item);
        });

        for i in 0..10 {
            while !worker.enqueue(i) {
                std::thread::yield_now();
            }
        }

        // Graceful stop: drains remaining items before returning.
        worker.stop(false);
        let got = received.lock().unwrap();
        assert_eq!(got.len(), 10);
        assert_eq!(*got, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn worker_cancel_does_not_hang() {
        let queue = Arc::new(SpscRingBuffer::new(4));
        let worker = Worker::spawn(Arc::clone(&queue), |_: i32| {});
        worker.pause();
        worker.resume();
        worker.stop(true);
    }
}
