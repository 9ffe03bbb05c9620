//! Priority queue that folds duplicates into pending entries

use crate::queue::ordered::PriorityQueue;
use crate::queue::traits::{Comparator, Queue, Reducible};

/// A [`PriorityQueue`] whose `push` first offers the new element to every
/// pending element, head to tail. The first one that absorbs it keeps its
/// position; otherwise the element is inserted by priority.
pub struct ReducingQueue<T> {
    inner: PriorityQueue<T>,
    merged: u64,
}

impl<T: Reducible> ReducingQueue<T> {
    pub fn new(comparator: Comparator<T>, max_displacement: Option<usize>) -> Self {
        Self {
            inner: PriorityQueue::new(comparator, max_displacement),
            merged: 0,
        }
    }

    /// Number of pushes absorbed by a pending element so far
    pub fn merged_count(&self) -> u64 {
        self.merged
    }

    fn try_absorb(&mut self, value: T) -> Option<T> {
        let mut cursor = self.inner.sequence_mut().cursor_front();
        let mut candidate = value;
        while let Some(pending) = cursor.current_mut() {
            match pending.absorb(candidate) {
                Ok(()) => return None,
                Err(rejected) => candidate = rejected,
            }
            cursor.move_next();
        }
        Some(candidate)
    }
}

impl<T: Reducible + Send> Queue<T> for ReducingQueue<T> {
    fn push(&mut self, value: T) {
        match self.try_absorb(value) {
            None => self.merged += 1,
            Some(value) => self.inner.push(value),
        }
    }

    fn pop(&mut self) -> Option<T> {
        self.inner.pop()
    }

    fn peek(&self) -> Option<&T> {
        self.inner.peek()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        self.inner.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    struct Job {
        name: &'static str,
        priority: u8,
        waiters: usize,
    }

    impl Job {
        fn new(name: &'static str, priority: u8) -> Self {
            Self {
                name,
                priority,
                waiters: 1,
            }
        }
    }

    impl Reducible for Job {
        fn absorb(&mut self, other: Self) -> Result<(), Self> {
            if self.name == other.name && self.priority == other.priority {
                self.waiters += other.waiters;
                Ok(())
            } else {
                Err(other)
            }
        }
    }

    fn queue() -> ReducingQueue<Job> {
        ReducingQueue::new(
            Arc::new(|a: &Job, b: &Job| a.priority.cmp(&b.priority)),
            None,
        )
    }

    #[test]
    fn test_equal_jobs_merge_in_place() {
        let mut queue = queue();
        queue.push(Job::new("scan", 10));
        queue.push(Job::new("stats", 15));
        queue.push(Job::new("scan", 10));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.merged_count(), 1);
        let head = queue.pop().unwrap();
        assert_eq!(head.name, "scan");
        assert_eq!(head.waiters, 2);
    }

    #[test]
    fn test_distinct_jobs_are_ordered_by_priority() {
        let mut queue = queue();
        queue.push(Job::new("stats", 15));
        queue.push(Job::new("error", 2));
        queue.push(Job::new("scan", 10));

        let names: Vec<_> = Queue::iter(&queue).map(|job| job.name).collect();
        assert_eq!(names, vec!["error", "scan", "stats"]);
        assert_eq!(queue.merged_count(), 0);
    }
}
