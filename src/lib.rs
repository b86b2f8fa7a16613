//! try_mpmc - Bounded Vyukov-style MPMC queue with a strictly non-blocking API
//!
//! Every operation either completes or fails fast; a lost CAS race surfaces as
//! an error instead of an internal retry loop, so spin/backoff policy stays
//! with the caller.
#![warn(missing_docs)]

use core::cell::UnsafeCell;
use core::fmt;
use core::mem::MaybeUninit;

#[cfg(not(loom))]
use core::sync::atomic::{AtomicU64, Ordering};
#[cfg(loom)]
use loom::sync::atomic::{AtomicU64, Ordering};

#[repr(align(64))]
struct CachePadded<T> { value: T }
impl<T> CachePadded<T> { fn new(value: T) -> Self { CachePadded { value } } }

#[repr(C, align(64))]
struct Slot<T> {
    sequence: AtomicU64,
    value: UnsafeCell<MaybeUninit<T>>,
}
impl<T> Slot<T> {
    fn new(seq: u64) -> Self {
        Slot {
            sequence: AtomicU64::new(seq),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}
unsafe impl<T: Send> Send for Slot<T> {}
unsafe impl<T: Send> Sync for Slot<T> {}

/// Error returned by [`Queue::try_enqueue`], handing the rejected value back.
///
/// Deliberately does not distinguish "queue full" from "lost a CAS race with
/// another producer"; callers needing a stronger answer retry externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueError<T>(pub T);
impl<T> fmt::Display for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value not enqueued (queue full or enqueue race lost)")
    }
}
impl<T: fmt::Debug> std::error::Error for EnqueueError<T> {}

/// Error returned by [`Queue::try_dequeue`].
///
/// Same ambiguity as [`EnqueueError`]: "queue empty" and "lost a CAS race
/// with another consumer" are indistinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DequeueError;
impl fmt::Display for DequeueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nothing dequeued (queue empty or dequeue race lost)")
    }
}
impl std::error::Error for DequeueError {}

/// Bounded lock-free MPMC queue.
///
/// A fixed circular array of slots, each carrying an atomic sequence number,
/// plus two cache-line-padded cursors. The sequence number encodes which
/// absolute enqueue/dequeue position may touch the slot next, so producers
/// and consumers hand slots off across wraparound generations without any
/// lock. The only public operations are the non-blocking
/// [`try_enqueue`](Queue::try_enqueue) / [`try_dequeue`](Queue::try_dequeue)
/// pair and the [`capacity`](Queue::capacity) accessor.
pub struct Queue<T> {
    slots: Box<[Slot<T>]>,
    capacity: u64,
    // capacity - 1, meaningful only when pow2 is set
    mask: u64,
    pow2: bool,
    // Sequence units per queue position. 1 for capacity >= 2. For the
    // single-slot queue the freeing store `head + capacity` would equal the
    // ready store `head + 1`, collapsing the release edge that orders the
    // consumer's read before the next producer's write; stride 2 keeps the
    // two markers distinct.
    seq_stride: u64,
    tail: CachePadded<AtomicU64>,
    head: CachePadded<AtomicU64>,
}

impl<T> Queue<T> {
    /// Creates a queue holding at most `capacity` elements.
    ///
    /// Slot `i` starts with sequence `i`, meaning "writable by the enqueue
    /// at absolute position i". Powers of two index by bitmask; any other
    /// positive capacity works through plain modulo.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");

        let seq_stride = if capacity == 1 { 2 } else { 1 };
        let mut slots = Vec::with_capacity(capacity);
        for i in 0..capacity {
            slots.push(Slot::new(i as u64 * seq_stride));
        }

        Queue {
            slots: slots.into_boxed_slice(),
            capacity: capacity as u64,
            mask: capacity as u64 - 1,
            pow2: capacity.is_power_of_two(),
            seq_stride,
            tail: CachePadded::new(AtomicU64::new(0)),
            head: CachePadded::new(AtomicU64::new(0)),
        }
    }

    #[inline]
    fn index(&self, pos: u64) -> usize {
        if self.pow2 {
            (pos & self.mask) as usize
        } else {
            (pos % self.capacity) as usize
        }
    }

    /// Attempts to enqueue `value` without blocking.
    ///
    /// Fails immediately if the target slot is not writable yet (queue full,
    /// or the tail snapshot is stale) or if another producer wins the tail
    /// CAS. The rejected value rides back in the error. A failure never
    /// leaves a partial write behind.
    pub fn try_enqueue(&self, value: T) -> Result<(), EnqueueError<T>> {
        let tail = self.tail.value.load(Ordering::Relaxed);
        let slot = &self.slots[self.index(tail)];

        if slot.sequence.load(Ordering::Acquire) != tail * self.seq_stride {
            return Err(EnqueueError(value));
        }

        if self
            .tail
            .value
            .compare_exchange(tail, tail + 1, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return Err(EnqueueError(value));
        }

        // CAS won: this thread owns the slot until the release store below.
        unsafe { (*slot.value.get()).write(value) };

        // Publishes the payload and tells the consumer at position `tail`
        // that the slot is ready.
        slot.sequence.store(tail * self.seq_stride + 1, Ordering::Release);
        Ok(())
    }

    /// Attempts to dequeue a value without blocking.
    ///
    /// Fails immediately if no published item is waiting at the head slot
    /// (queue empty, or the head snapshot is stale) or if another consumer
    /// wins the head CAS.
    pub fn try_dequeue(&self) -> Result<T, DequeueError> {
        let head = self.head.value.load(Ordering::Relaxed);
        let slot = &self.slots[self.index(head)];

        if slot.sequence.load(Ordering::Acquire) != head * self.seq_stride + 1 {
            return Err(DequeueError);
        }

        if self
            .head
            .value
            .compare_exchange(head, head + 1, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return Err(DequeueError);
        }

        let value = unsafe { (*slot.value.get()).assume_init_read() };

        // Frees the slot for the producer a full generation ahead, which
        // will arrive at absolute position `head + capacity`.
        slot.sequence.store((head + self.capacity) * self.seq_stride, Ordering::Release);
        Ok(value)
    }

    /// Returns the fixed capacity this queue was created with.
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }
}

unsafe impl<T: Send> Send for Queue<T> {}
unsafe impl<T: Send> Sync for Queue<T> {}

impl<T> Drop for Queue<T> {
    fn drop(&mut self) {
        // Exclusive access here means every won CAS has finished its slot
        // write/read, so positions head..tail are exactly the live payloads.
        let head = self.head.value.load(Ordering::Relaxed);
        let tail = self.tail.value.load(Ordering::Relaxed);
        let mut pos = head;
        while pos != tail {
            let slot = &self.slots[self.index(pos)];
            unsafe { (*slot.value.get()).assume_init_drop() };
            pos += 1;
        }
    }
}
