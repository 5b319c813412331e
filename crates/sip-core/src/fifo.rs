//! Thread-safe FIFO used between the stack and TU threads

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Unbounded multi-producer, multi-consumer queue with blocking reads
#[derive(Debug)]
pub struct Fifo<T> {
    queue: Mutex<VecDeque<T>>,
    ready: Condvar,
}

impl<T> Fifo<T> {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        }
    }

    pub fn add(&self, item: T) {
        self.queue.lock().push_back(item);
        self.ready.notify_one();
    }

    pub fn try_get(&self) -> Option<T> {
        self.queue.lock().pop_front()
    }

    /// Blocks until an item is available
    pub fn get_next(&self) -> T {
        let mut queue = self.queue.lock();
        loop {
            if let Some(item) = queue.pop_front() {
                return item;
            }
            self.ready.wait(&mut queue);
        }
    }

    /// Blocks for at most `timeout`; `None` if nothing arrived
    pub fn get_next_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.queue.lock();
        loop {
            if let Some(item) = queue.pop_front() {
                return Some(item);
            }
            if self.ready.wait_until(&mut queue, deadline).timed_out() {
                return queue.pop_front();
            }
        }
    }

    /// Takes everything currently queued
    pub fn drain(&self) -> Vec<T> {
        self.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl<T> Default for Fifo<T> {
    fn default() -> Self {
        Self::new()
    }
}
