//! Bounded Context Queue
//!
//! Fixed-capacity FIFO of conversation entries. Pushing onto a full queue
//! evicts the oldest entry; replacing the contents never truncates silently.
//!
//! Lowering the capacity does not evict anything. A queue holding more items
//! than its new capacity stays oversized until the next `push`, which trims it
//! back down to the capacity. Callers that persist the queue must check
//! [`BoundedQueue::is_oversized`] first.

use crate::error::{Error, Result};
use std::collections::vec_deque::{self, VecDeque};

#[derive(Debug, Clone, PartialEq)]
pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        check_capacity(capacity)?;
        Ok(Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Append `item`, evicting from the head until it fits.
    ///
    /// Returns every evicted item, oldest first. More than one is evicted only
    /// when the queue was oversized.
    pub fn push(&mut self, item: T) -> Vec<T> {
        let excess = (self.items.len() + 1).saturating_sub(self.capacity);
        let evicted: Vec<T> = self.items.drain(..excess).collect();
        self.items.push_back(item);
        evicted
    }

    /// Reverse a `push`: drop the newest item and put back what that push
    /// evicted, in order.
    ///
    /// The queue ends up exactly as it was before the push, oversized or not.
    pub fn undo_push(&mut self, evicted: Vec<T>) -> Option<T> {
        let newest = self.items.pop_back()?;
        for item in evicted.into_iter().rev() {
            self.items.push_front(item);
        }
        Some(newest)
    }

    pub fn pop_oldest(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Undo the last `push`. Older entries are untouched.
    pub fn pop_newest(&mut self) -> Option<T> {
        self.items.pop_back()
    }

    /// Replace the whole contents. Fails without modifying the queue when
    /// `items` is longer than the capacity.
    pub fn set_contents(&mut self, items: Vec<T>) -> Result<()> {
        if items.len() > self.capacity {
            return Err(Error::CapacityExceeded {
                len: items.len(),
                capacity: self.capacity,
            });
        }
        self.items = items.into();
        Ok(())
    }

    /// Change the capacity for subsequent pushes.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        check_capacity(capacity)?;
        self.capacity = capacity;
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// True after the capacity was lowered below the current length
    pub fn is_oversized(&self) -> bool {
        self.items.len() > self.capacity
    }

    pub fn oldest(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn newest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Oldest first
    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items.into()
    }
}

impl<T: Clone> BoundedQueue<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<'a, T> IntoIterator for &'a BoundedQueue<T> {
    type Item = &'a T;
    type IntoIter = vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

fn check_capacity(capacity: usize) -> Result<()> {
    if capacity == 0 {
        return Err(Error::invalid("capacity", "queue capacity must be at least 1"));
    }
    Ok(())
}
