//! Comparator-ordered sequences and the basic queue implementations
//!
//! [`OrderedSequence`] inserts by walking backwards from the tail, so
//! elements that arrive roughly in order cost O(1) and ties keep arrival
//! order. A `max_displacement` bound caps that walk, trading strict ordering
//! for bounded latency: an element can be overtaken by at most that many
//! later arrivals.

use crate::queue::linked::{Cursor, Iter, LinkedSequence};
use crate::queue::traits::{Comparator, Queue};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Linked sequence kept in comparator order
pub struct OrderedSequence<T> {
    items: LinkedSequence<T>,
    comparator: Comparator<T>,
    max_displacement: Option<usize>,
}

impl<T> OrderedSequence<T> {
    pub fn new(comparator: Comparator<T>) -> Self {
        Self {
            items: LinkedSequence::new(),
            comparator,
            max_displacement: None,
        }
    }

    pub fn with_max_displacement(comparator: Comparator<T>, max_displacement: usize) -> Self {
        Self {
            items: LinkedSequence::new(),
            comparator,
            max_displacement: Some(max_displacement),
        }
    }

    pub fn from_fn<F>(comparator: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Self::new(Arc::new(comparator))
    }

    pub fn max_displacement(&self) -> Option<usize> {
        self.max_displacement
    }

    /// Insert after the last element that does not compare greater than
    /// `value`, looking back at most `max_displacement` elements
    pub fn insert(&mut self, value: T) {
        let comparator = Arc::clone(&self.comparator);
        let limit = self.max_displacement;
        let mut cursor = self.items.cursor_back();
        let mut walked = 0usize;

        while !matches!(limit, Some(max) if walked >= max) {
            match cursor.current() {
                Some(existing) if comparator(&value, existing) == Ordering::Less => {
                    cursor.move_prev();
                    walked += 1;
                }
                _ => break,
            }
        }

        cursor.insert_after(value);
    }

    pub fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn peek_front(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, T> {
        self.items.iter()
    }

    /// Editing cursor on the head element
    ///
    /// Edits made through the cursor are not re-sorted.
    pub fn cursor_front(&mut self) -> Cursor<'_, T> {
        self.items.cursor_front()
    }

    pub fn cursor_back(&mut self) -> Cursor<'_, T> {
        self.items.cursor_back()
    }

    /// Position of the first element comparing equal to `value`
    ///
    /// The scan stops as soon as an element sorts after `value`.
    pub fn position_of(&self, value: &T) -> Option<usize> {
        for (index, existing) in self.items.iter().enumerate() {
            match (self.comparator)(value, existing) {
                Ordering::Equal => return Some(index),
                Ordering::Less => return None,
                Ordering::Greater => {}
            }
        }
        None
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: fmt::Debug> fmt::Debug for OrderedSequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedSequence")
            .field("items", &self.items.iter().collect::<Vec<_>>())
            .field("max_displacement", &self.max_displacement)
            .finish()
    }
}

/// Priority queue over an [`OrderedSequence`]
pub struct PriorityQueue<T> {
    sequence: OrderedSequence<T>,
}

impl<T> PriorityQueue<T> {
    pub fn new(comparator: Comparator<T>, max_displacement: Option<usize>) -> Self {
        let sequence = match max_displacement {
            Some(max) => OrderedSequence::with_max_displacement(comparator, max),
            None => OrderedSequence::new(comparator),
        };
        Self { sequence }
    }

    pub(crate) fn sequence_mut(&mut self) -> &mut OrderedSequence<T> {
        &mut self.sequence
    }
}

impl<T: Send> Queue<T> for PriorityQueue<T> {
    fn push(&mut self, value: T) {
        self.sequence.insert(value);
    }

    fn pop(&mut self) -> Option<T> {
        self.sequence.pop_front()
    }

    fn peek(&self) -> Option<&T> {
        self.sequence.peek_front()
    }

    fn len(&self) -> usize {
        self.sequence.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.sequence.iter())
    }
}

/// Plain arrival-order queue
#[derive(Debug)]
pub struct FifoQueue<T> {
    items: LinkedSequence<T>,
}

impl<T> Default for FifoQueue<T> {
    fn default() -> Self {
        Self {
            items: LinkedSequence::new(),
        }
    }
}

impl<T> FifoQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Send> Queue<T> for FifoQueue<T> {
    fn push(&mut self, value: T) {
        self.items.push_back(value);
    }

    fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.items.iter())
    }
}
