// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Single producer, single consumer ring buffer.
//!
//! A [heapless::spsc::Queue] with bulk push/pop on top, and a count of the
//! elements the producer had to drop. One side is typically an interrupt
//! handler and the other the application; [RingBuffer::split] hands each of
//! them its end.
//!
//! A queue of `N` slots holds `N - 1` elements.

use core::sync::atomic::{AtomicUsize, Ordering};

use heapless::spsc;

pub struct RingBuffer<T, const N: usize> {
    queue: spsc::Queue<T, N>,
    overflows: AtomicUsize,
}

impl<T, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> RingBuffer<T, N> {
    pub const fn new() -> Self {
        Self {
            queue: spsc::Queue::new(),
            overflows: AtomicUsize::new(0),
        }
    }

    /// Usable capacity, one less than `N`
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Number of queued elements
    pub fn available(&self) -> usize {
        self.queue.len()
    }

    /// Number of elements that can still be pushed
    pub fn free(&self) -> usize {
        self.capacity() - self.available()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    /// Elements dropped by [Producer::push_lossy] because the buffer was full
    pub fn overflows(&self) -> usize {
        self.overflows.load(Ordering::Relaxed)
    }

    /// Splits the buffer into its two roles.
    pub fn split(&mut self) -> (Producer<'_, T, N>, Consumer<'_, T, N>) {
        let (producer, consumer) = self.queue.split();
        (
            Producer {
                inner: producer,
                overflows: &self.overflows,
            },
            Consumer {
                inner: consumer,
                overflows: &self.overflows,
            },
        )
    }
}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    /// Pushes as many leading `items` as fit, returns how many did.
    pub fn push(&mut self, items: &[T]) -> usize {
        self.split().0.push(items)
    }

    /// Pops up to `out.len()` elements, returns how many were written.
    pub fn pop(&mut self, out: &mut [T]) -> usize {
        self.split().1.pop(out)
    }
}

/// Producing end of a split [RingBuffer]
pub struct Producer<'a, T, const N: usize> {
    inner: spsc::Producer<'a, T, N>,
    overflows: &'a AtomicUsize,
}

impl<T, const N: usize> Producer<'_, T, N> {
    /// Pushes one element, counting it as an overflow if there is no room.
    pub fn push_lossy(&mut self, item: T) -> bool {
        match self.inner.enqueue(item) {
            Ok(()) => true,
            Err(_) => {
                self.overflows.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn free(&self) -> usize {
        self.inner.capacity() - self.inner.len()
    }

    /// Pushes from `items` until the buffer is full, returns how many went in.
    pub fn push_iter(&mut self, items: impl IntoIterator<Item = T>) -> usize {
        let mut pushed = 0;
        for item in items.into_iter().take(self.free()) {
            if self.inner.enqueue(item).is_err() {
                break;
            }
            pushed += 1;
        }
        pushed
    }
}

impl<T: Copy, const N: usize> Producer<'_, T, N> {
    pub fn push(&mut self, items: &[T]) -> usize {
        self.push_iter(items.iter().copied())
    }
}

/// Consuming end of a split [RingBuffer]
pub struct Consumer<'a, T, const N: usize> {
    inner: spsc::Consumer<'a, T, N>,
    overflows: &'a AtomicUsize,
}

impl<T, const N: usize> Consumer<'_, T, N> {
    pub fn pop_one(&mut self) -> Option<T> {
        self.inner.dequeue()
    }

    pub fn available(&self) -> usize {
        self.inner.len()
    }

    /// Elements the producer dropped so far
    pub fn overflows(&self) -> usize {
        self.overflows.load(Ordering::Relaxed)
    }

    /// Discards everything queued and zeroes the overflow count.
    pub fn clear(&mut self) {
        while self.inner.dequeue().is_some() {}
        self.overflows.store(0, Ordering::Relaxed);
    }
}

impl<T: Copy, const N: usize> Consumer<'_, T, N> {
    pub fn pop(&mut self, out: &mut [T]) -> usize {
        let mut popped = 0;
        for slot in out.iter_mut() {
            match self.inner.dequeue() {
                Some(item) => *slot = item,
                None => break,
            }
            popped += 1;
        }
        popped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity() {
        let mut ring = RingBuffer::<u8, 8>::new();
        assert_eq!(ring.capacity(), 7);
        assert_eq!(ring.free(), 7);
        assert_eq!(ring.push(&[0, 1, 2, 3, 4, 5, 6, 7, 8]), 7);
        assert_eq!(ring.available(), 7);
        assert!(ring.is_full());
        assert_eq!(ring.push(&[9]), 0);
        assert_eq!(ring.overflows(), 0);
    }

    #[test]
    fn test_partial_pop() {
        let mut ring = RingBuffer::<u8, 4>::new();
        let mut out = [0u8; 8];
        assert_eq!(ring.pop(&mut out), 0);
        assert_eq!(ring.push(&[10, 20]), 2);
        assert_eq!(ring.pop(&mut out), 2);
        assert_eq!(&out[..2], &[10, 20]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_wraparound() {
        let mut ring = RingBuffer::<u16, 5>::new();
        let mut out = [0u16; 3];
        for round in 0..10u16 {
            let items = [round, round + 100, round + 200];
            assert_eq!(ring.push(&items), 3);
            assert_eq!(ring.pop(&mut out), 3);
            assert_eq!(out, items);
        }
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn test_split_lossy() {
        let mut ring = RingBuffer::<u8, 3>::new();
        let (mut tx, mut rx) = ring.split();
        assert!(tx.push_lossy(1));
        assert!(tx.push_lossy(2));
        assert!(!tx.push_lossy(3));
        assert_eq!(tx.free(), 0);
        assert_eq!(rx.available(), 2);
        assert_eq!(rx.overflows(), 1);
        assert_eq!(rx.pop_one(), Some(1));
        assert_eq!(rx.pop_one(), Some(2));
        assert_eq!(rx.pop_one(), None);
        assert_eq!(ring.overflows(), 1);
    }

    #[test]
    fn test_clear() {
        let mut ring = RingBuffer::<u8, 4>::new();
        let (mut tx, mut rx) = ring.split();
        tx.push(&[1, 2, 3]);
        assert!(!tx.push_lossy(4));
        rx.clear();
        assert_eq!(rx.available(), 0);
        assert_eq!(rx.overflows(), 0);
        assert_eq!(tx.push(&[5]), 1);
        assert_eq!(rx.pop_one(), Some(5));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_threads() {
        use std::vec::Vec;
        const COUNT: u32 = 100_000;
        let mut ring = RingBuffer::<u32, 16>::new();
        let (mut tx, mut rx) = ring.split();
        let received = std::thread::scope(|s| {
            s.spawn(move || {
                let mut next = 0u32;
                while next < COUNT {
                    if tx.push(&[next]) == 1 {
                        next += 1;
                    }
                }
            });
            let consumer = s.spawn(move || {
                let mut received = Vec::with_capacity(COUNT as usize);
                let mut chunk = [0u32; 5];
                while received.len() < COUNT as usize {
                    let n = rx.pop(&mut chunk);
                    received.extend_from_slice(&chunk[..n]);
                }
                received
            });
            consumer.join().unwrap()
        });
        assert!(received.iter().copied().eq(0..COUNT));
    }
}
