//! # FIFO ring buffer.
//!
//! [`Queue`] stores items in a growable ring; capacity doubles whenever a push
//! would overflow. Removed slots are cleared so the queue never retains
//! references to values it has handed out.

/// FIFO queue backed by a ring buffer.
///
/// ## Example
/// ```
/// use taskscope::Queue;
///
/// let mut q = Queue::new();
/// q.push(1);
/// q.push(2);
/// assert_eq!(q.front(), Some(&1));
/// assert_eq!(q.back(), Some(&2));
/// assert_eq!(q.shift(), Some(1));
/// assert_eq!(q.len(), 1);
/// ```
#[derive(Debug)]
pub struct Queue<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Queue<T> {
    /// Creates an empty queue without allocating.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty queue with room for `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            head: 0,
            len: 0,
        }
    }

    /// Number of queued items.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current ring capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Front item, without removing it.
    pub fn front(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    /// Alias of [`Queue::front`].
    pub fn peek(&self) -> Option<&T> {
        self.front()
    }

    /// Back item, without removing it.
    pub fn back(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        let index = (self.head + self.len - 1) % self.slots.len();
        self.slots[index].as_ref()
    }

    /// Appends an item, growing the ring if it is full.
    pub fn push(&mut self, item: T) {
        if self.len == self.slots.len() {
            self.grow();
        }
        let index = (self.head + self.len) % self.slots.len();
        self.slots[index] = Some(item);
        self.len += 1;
    }

    /// Removes and returns the front item.
    pub fn shift(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        item
    }

    /// Drops every item and releases the ring.
    pub fn clear(&mut self) {
        self.slots = Vec::new();
        self.head = 0;
        self.len = 0;
    }

    /// Doubles capacity (minimum 1), re-packing items at the start of the ring.
    fn grow(&mut self) {
        let capacity = (self.slots.len() * 2).max(1);
        let mut slots: Vec<Option<T>> = Vec::with_capacity(capacity);
        while let Some(item) = self.shift() {
            slots.push(Some(item));
        }
        self.len = slots.len();
        slots.resize_with(capacity, || None);
        self.slots = slots;
        self.head = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let mut q = Queue::new();
        for i in 0..5 {
            q.push(i);
        }
        let drained: Vec<_> = std::iter::from_fn(|| q.shift()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
        assert!(q.is_empty());
        assert_eq!(q.shift(), None);
    }

    #[test]
    fn grows_by_doubling() {
        let mut q = Queue::new();
        assert_eq!(q.capacity(), 0);
        q.push('a');
        assert_eq!(q.capacity(), 1);
        q.push('b');
        assert_eq!(q.capacity(), 2);
        q.push('c');
        assert_eq!(q.capacity(), 4);
    }

    #[test]
    fn wraps_around_before_growing() {
        let mut q = Queue::with_capacity(3);
        q.push(1);
        q.push(2);
        assert_eq!(q.shift(), Some(1));
        q.push(3);
        q.push(4);
        assert_eq!(q.capacity(), 3);
        assert_eq!(q.front(), Some(&2));
        assert_eq!(q.back(), Some(&4));
        q.push(5);
        assert_eq!(q.capacity(), 6);
        let drained: Vec<_> = std::iter::from_fn(|| q.shift()).collect();
        assert_eq!(drained, vec![2, 3, 4, 5]);
    }

    #[test]
    fn removed_slots_release_values() {
        use std::rc::Rc;

        let shared = Rc::new(());
        let mut q = Queue::new();
        q.push(Rc::clone(&shared));
        assert_eq!(Rc::strong_count(&shared), 2);
        drop(q.shift());
        assert_eq!(Rc::strong_count(&shared), 1);
    }

    #[test]
    fn peek_on_empty() {
        let q: Queue<u8> = Queue::new();
        assert_eq!(q.peek(), None);
        assert_eq!(q.back(), None);
    }

    #[test]
    fn clear_resets() {
        let mut q = Queue::new();
        q.push(1);
        q.push(2);
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.capacity(), 0);
        q.push(3);
        assert_eq!(q.shift(), Some(3));
    }
}
