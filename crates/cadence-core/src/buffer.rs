//! Fixed-capacity ring buffer.
//!
//! [`RingBuffer`] is the storage behind every sliding window, filter history and
//! event-flag track in this crate. Capacity is fixed at construction and never
//! reallocates; once full, each push evicts and returns the oldest element.
//!
//! ```text
//!         head (oldest)
//!             v
//! data: [ d | a | b | c ]      len = 4, capacity = 4
//!
//! push(e) overwrites data[head] = a and returns it; head moves right.
//! ```
//!
//! Two persistence forms exist:
//!
//! - [`to_linear_sequence`](RingBuffer::to_linear_sequence) /
//!   [`from_linear_sequence`](RingBuffer::from_linear_sequence) - the strict
//!   form: restoring requires exactly `capacity` values and leaves the buffer full.
//! - [`snapshot`](RingBuffer::snapshot) / [`restore`](RingBuffer::restore) -
//!   `capacity` values padded with `T::default()` plus an explicit `filled`
//!   count, so a window that has not yet filled round-trips exactly.

use crate::error::{CoreError, Result};

/// Capacity-length contents of a ring buffer plus its occupancy.
#[derive(Debug, Clone, PartialEq)]
pub struct RingSnapshot<T> {
    /// Oldest to newest; positions `filled..` hold `T::default()`.
    pub data: Vec<T>,
    /// Number of meaningful values at the front of `data`.
    pub filled: usize,
}

/// Fixed-capacity FIFO with O(1) push and eviction.
///
/// Single-owner: no internal locking.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    data: Vec<T>,
    head: usize,
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create an empty buffer.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. Stage constructors reject zero-sized
    /// windows with [`CoreError::InvalidParameter`] before reaching here.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be > 0");
        Self {
            data: vec![T::default(); capacity],
            head: 0,
            len: 0,
        }
    }

    /// Append a value, returning the evicted oldest value once full.
    #[inline]
    pub fn push(&mut self, value: T) -> Option<T> {
        let cap = self.data.len();
        if self.len < cap {
            let idx = (self.head + self.len) % cap;
            self.data[idx] = value;
            self.len += 1;
            None
        } else {
            let evicted = self.data[self.head];
            self.data[self.head] = value;
            self.head = (self.head + 1) % cap;
            Some(evicted)
        }
    }

    /// Remove and return the oldest value.
    pub fn pop_front(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let value = self.data[self.head];
        self.head = (self.head + 1) % self.data.len();
        self.len -= 1;
        Some(value)
    }

    /// Oldest value, if any.
    #[inline]
    pub fn oldest(&self) -> Option<T> {
        self.get(0)
    }

    /// Newest value, if any.
    #[inline]
    pub fn newest(&self) -> Option<T> {
        self.nth_newest(0)
    }

    /// Value at position `index` counting from the oldest.
    #[inline]
    pub fn get(&self, index: usize) -> Option<T> {
        (index < self.len).then(|| self.data[(self.head + index) % self.data.len()])
    }

    /// Value `n` steps back from the newest (`0` is the newest).
    #[inline]
    pub fn nth_newest(&self, n: usize) -> Option<T> {
        (n < self.len).then(|| self.get(self.len - 1 - n)).flatten()
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len).map(move |i| self.data[(self.head + i) % self.data.len()])
    }

    /// Contents oldest to newest (occupancy-length). Does not mutate.
    pub fn to_linear_sequence(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// Replace the whole contents.
    ///
    /// `values` must hold exactly `capacity` elements; the buffer is full
    /// afterwards. Partial restores go through [`restore`](Self::restore).
    pub fn from_linear_sequence(&mut self, values: &[T]) -> Result<()> {
        if values.len() != self.data.len() {
            return Err(CoreError::shape_mismatch(
                "ring buffer restore",
                self.data.len(),
                values.len(),
            ));
        }
        self.data.copy_from_slice(values);
        self.head = 0;
        self.len = values.len();
        Ok(())
    }

    /// Capacity-length snapshot with explicit occupancy.
    pub fn snapshot(&self) -> RingSnapshot<T> {
        let mut data = Vec::with_capacity(self.data.len());
        data.extend(self.iter());
        data.resize(self.data.len(), T::default());
        RingSnapshot {
            data,
            filled: self.len,
        }
    }

    /// Restore from a [`RingSnapshot`].
    ///
    /// Fails with [`CoreError::ShapeMismatch`] (leaving the buffer untouched) if
    /// the snapshot length differs from capacity or `filled` exceeds it.
    pub fn restore(&mut self, snapshot: &RingSnapshot<T>) -> Result<()> {
        Self::check_snapshot(self.data.len(), snapshot)?;
        self.data.copy_from_slice(&snapshot.data);
        self.head = 0;
        self.len = snapshot.filled;
        Ok(())
    }

    /// Validate a snapshot against a capacity without building a buffer.
    pub fn check_snapshot(capacity: usize, snapshot: &RingSnapshot<T>) -> Result<()> {
        if snapshot.data.len() != capacity {
            return Err(CoreError::shape_mismatch(
                "ring buffer restore",
                capacity,
                snapshot.data.len(),
            ));
        }
        if snapshot.filled > capacity {
            return Err(CoreError::shape_mismatch(
                "ring buffer occupancy",
                capacity,
                snapshot.filled,
            ));
        }
        Ok(())
    }

    /// Reset occupancy without reallocating.
    pub fn clear(&mut self) {
        self.data.fill(T::default());
        self.head = 0;
        self.len = 0;
    }

    /// Number of stored values.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Fixed capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// True once `capacity` values are stored.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.data.len()
    }

    /// True when nothing is stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
