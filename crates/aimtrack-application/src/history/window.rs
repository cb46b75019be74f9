use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// Fixed-capacity, newest-first projection of a longer sequence.
///
/// Pushing past capacity evicts the oldest (tail) entry, so the window keeps
/// sliding for as long as entries arrive.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> RecentWindow<T> {
    /// Creates an empty window holding at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        let capacity = capacity.get();
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Builds a window from a newest-first sequence, keeping its first `capacity` entries.
    pub fn from_newest_first<'a>(
        capacity: NonZeroUsize,
        items: impl IntoIterator<Item = &'a T>,
    ) -> Self
    where
        T: 'a,
    {
        let mut window = Self::new(capacity);
        window
            .items
            .extend(items.into_iter().take(window.capacity).cloned());
        window
    }

    /// Adds `item` as the newest entry and returns the evicted one, if any.
    pub fn push_front(&mut self, item: T) -> Option<T> {
        self.items.push_front(item);
        if self.items.len() > self.capacity {
            self.items.pop_back()
        } else {
            None
        }
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

    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}
