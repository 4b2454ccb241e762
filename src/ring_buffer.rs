//! Generic bounded single-producer/single-consumer ring buffer (spec §4.A).
//!
//! Used for the recording ring (overwrite-oldest, `i16` samples), the
//! playback ring (block/refuse, raw bytes), and the reference manager's
//! internal sample store. Synchronization between the one producer and one
//! consumer is the caller's responsibility (a mutex around each call site);
//! this type only needs to be safe to call from either side without the
//! other corrupting its bookkeeping.

use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// What happens when a write would exceed the buffer's free space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Oldest unread elements are dropped to make room; newest data always wins.
    /// Used by the recording ring.
    Overwrite,
    /// Writes beyond the current free space are short-counted; unread data is
    /// never clobbered. Used by the playback ring.
    Block,
}

struct Inner<T> {
    producer: HeapProd<T>,
    consumer: HeapCons<T>,
    total_written: u64,
    total_read: u64,
    overwritten: u64,
}

/// Fixed-capacity circular store of `T`, bytes for playback and `i16` samples
/// for audio rings.
pub struct RingBuffer<T> {
    inner: Mutex<Inner<T>>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl<T: Copy> RingBuffer<T> {
    /// Allocate a new ring buffer. `capacity` is in elements, not bytes.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let rb = HeapRb::<T>::new(capacity.max(1));
        let (producer, consumer) = rb.split();
        Self {
            inner: Mutex::new(Inner {
                producer,
                consumer,
                total_written: 0,
                total_read: 0,
                overwritten: 0,
            }),
            capacity,
            policy,
        }
    }

    /// Write `data` into the buffer. Returns the number of elements accepted.
    ///
    /// Under `Overwrite`, the return value is always `data.len()` (oldest
    /// elements are dropped as needed to make room, and if `data` itself is
    /// larger than capacity only the trailing `capacity` elements survive).
    /// Under `Block`, the return value is the number of elements that fit
    /// before the buffer filled; the rest are not written.
    pub fn write(&self, data: &[T]) -> usize {
        let mut inner = self.inner.lock();
        match self.policy {
            OverflowPolicy::Block => {
                let n = inner.producer.push_slice(data);
                inner.total_written += n as u64;
                n
            }
            OverflowPolicy::Overwrite => {
                let slice = if data.len() > self.capacity {
                    let dropped = data.len() - self.capacity;
                    inner.overwritten += dropped as u64;
                    &data[dropped..]
                } else {
                    data
                };
                let free = inner.producer.vacant_len();
                if slice.len() > free {
                    let need = slice.len() - free;
                    inner.consumer.skip(need);
                    inner.overwritten += need as u64;
                    inner.total_read += need as u64;
                }
                let n = inner.producer.push_slice(slice);
                inner.total_written += n as u64;
                data.len()
            }
        }
    }

    /// Read up to `buf.len()` elements into `buf`. Returns the number delivered.
    pub fn read(&self, buf: &mut [T]) -> usize {
        let mut inner = self.inner.lock();
        let n = inner.consumer.pop_slice(buf);
        inner.total_read += n as u64;
        n
    }

    /// Current number of unread elements. Exact, O(1).
    pub fn occupancy(&self) -> usize {
        self.inner.lock().producer.occupied_len()
    }

    /// Drop all unread elements, leaving the buffer empty.
    pub fn clear(&self) {
        self.inner.lock().consumer.clear();
    }

    /// Maximum number of elements this buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total elements ever accepted by `write` (including ones later
    /// overwritten before being read).
    pub fn total_written(&self) -> u64 {
        self.inner.lock().total_written
    }

    /// Total elements ever delivered by `read`.
    pub fn total_read(&self) -> u64 {
        self.inner.lock().total_read
    }

    /// Total elements dropped by the overwrite policy before being read.
    pub fn overwritten(&self) -> u64 {
        self.inner.lock().overwritten
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_policy_short_counts_at_capacity() {
        let rb = RingBuffer::<u8>::new(4, OverflowPolicy::Block);
        assert_eq!(rb.write(&[1, 2, 3]), 3);
        assert_eq!(rb.occupancy(), 3);
        // Only one slot left; the rest of this write is refused.
        assert_eq!(rb.write(&[4, 5, 6]), 1);
        assert_eq!(rb.occupancy(), 4);

        let mut out = [0u8; 4];
        assert_eq!(rb.read(&mut out), 4);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn block_policy_never_advances_read_index() {
        let rb = RingBuffer::<u8>::new(4, OverflowPolicy::Block);
        rb.write(&[1, 2, 3, 4]);
        rb.write(&[5, 6]); // refused, buffer full
        assert_eq!(rb.occupancy(), 4);
        let mut out = [0u8; 1];
        rb.read(&mut out);
        assert_eq!(out, [1]);
        assert_eq!(rb.occupancy(), 3);
    }

    #[test]
    fn overwrite_policy_keeps_most_recent_elements() {
        let rb = RingBuffer::<i16>::new(5, OverflowPolicy::Overwrite);
        rb.write(&[1, 2, 3, 4, 5]);
        assert!(rb.occupancy() == 5);
        rb.write(&[6, 7]);
        assert_eq!(rb.occupancy(), 5);

        let mut out = [0i16; 5];
        rb.read(&mut out);
        assert_eq!(out, [3, 4, 5, 6, 7]);
    }

    #[test]
    fn overwrite_policy_survives_a_write_larger_than_capacity() {
        let rb = RingBuffer::<i16>::new(3, OverflowPolicy::Overwrite);
        assert_eq!(rb.write(&[1, 2, 3, 4, 5]), 5);
        assert_eq!(rb.occupancy(), 3);
        let mut out = [0i16; 3];
        rb.read(&mut out);
        assert_eq!(out, [3, 4, 5]);
    }

    #[test]
    fn occupancy_never_exceeds_capacity() {
        let rb = RingBuffer::<u8>::new(8, OverflowPolicy::Overwrite);
        for i in 0..100u8 {
            rb.write(&[i]);
            assert!(rb.occupancy() <= rb.capacity());
        }
    }

    #[test]
    fn clear_empties_the_buffer() {
        let rb = RingBuffer::<u8>::new(4, OverflowPolicy::Block);
        rb.write(&[1, 2, 3]);
        rb.clear();
        assert_eq!(rb.occupancy(), 0);
        assert_eq!(rb.write(&[9, 9, 9, 9]), 4);
    }
}
