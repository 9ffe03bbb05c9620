//! Array-backed sorted collection
//!
//! Binary-search insertion keeps equal elements in arrival order. Lookup can
//! either accept any comparator-equal element or insist on the exact value,
//! scanning the run of equal keys around the first hit.

use crate::queue::traits::Comparator;
use std::cmp::Ordering;
use std::sync::Arc;

pub struct SortedVec<T> {
    items: Vec<T>,
    comparator: Comparator<T>,
}

impl<T> SortedVec<T> {
    pub fn new(comparator: Comparator<T>) -> Self {
        Self {
            items: Vec::new(),
            comparator,
        }
    }

    pub fn from_fn<F>(comparator: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Self::new(Arc::new(comparator))
    }

    /// Insert after every element that compares less than or equal to
    /// `value`; returns the index it landed on
    pub fn insert(&mut self, value: T) -> usize {
        let index = self
            .items
            .partition_point(|existing| (self.comparator)(existing, &value) != Ordering::Greater);
        self.items.insert(index, value);
        index
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn remove_at(&mut self, index: usize) -> Option<T> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: PartialEq> SortedVec<T> {
    /// Index of `value`
    ///
    /// With `allow_similar` any comparator-equal element matches. Otherwise
    /// the run of comparator-equal elements is searched, left of the first
    /// hit and then right of it, for one that is `==` to `value`.
    pub fn index_of(&self, value: &T, allow_similar: bool) -> Option<usize> {
        let hit = self
            .items
            .binary_search_by(|probe| (self.comparator)(probe, value))
            .ok()?;

        if allow_similar || self.items[hit] == *value {
            return Some(hit);
        }

        let equal_key = |index: usize| (self.comparator)(&self.items[index], value) == Ordering::Equal;

        let left = (0..hit)
            .rev()
            .take_while(|&index| equal_key(index))
            .find(|&index| self.items[index] == *value);
        if left.is_some() {
            return left;
        }

        (hit + 1..self.items.len())
            .take_while(|&index| equal_key(index))
            .find(|&index| self.items[index] == *value)
    }

    pub fn contains(&self, value: &T) -> bool {
        self.index_of(value, false).is_some()
    }

    /// Remove the element exactly equal to `value`
    pub fn remove(&mut self, value: &T) -> Option<T> {
        let index = self.index_of(value, false)?;
        Some(self.items.remove(index))
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SortedVec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // (key, tag): ordered by key only so equal keys can still be told apart
    fn by_key() -> SortedVec<(u32, char)> {
        SortedVec::from_fn(|a: &(u32, char), b: &(u32, char)| a.0.cmp(&b.0))
    }

    #[test]
    fn test_insert_places_after_equal_keys() {
        let mut vec = by_key();
        vec.insert((2, 'a'));
        vec.insert((1, 'b'));
        vec.insert((2, 'c'));
        let index = vec.insert((2, 'd'));

        assert_eq!(index, 3);
        assert_eq!(
            vec.as_slice(),
            &[(1, 'b'), (2, 'a'), (2, 'c'), (2, 'd')]
        );
    }

    #[test]
    fn test_index_of_exact_scans_equal_run() {
        let mut vec = by_key();
        for entry in [(1, 'x'), (5, 'a'), (5, 'b'), (5, 'c'), (5, 'd'), (9, 'z')] {
            vec.insert(entry);
        }

        for (expected, tag) in ['a', 'b', 'c', 'd'].into_iter().enumerate() {
            assert_eq!(vec.index_of(&(5, tag), false), Some(expected + 1));
        }
        assert_eq!(vec.index_of(&(5, 'q'), false), None);
        assert!(vec.index_of(&(5, 'q'), true).is_some());
        assert_eq!(vec.index_of(&(7, 'a'), true), None);
    }

    #[test]
    fn test_remove_takes_exact_element() {
        let mut vec = by_key();
        vec.insert((3, 'a'));
        vec.insert((3, 'b'));

        assert_eq!(vec.remove(&(3, 'b')), Some((3, 'b')));
        assert_eq!(vec.remove(&(3, 'b')), None);
        assert_eq!(vec.first(), Some(&(3, 'a')));
        assert_eq!(vec.len(), 1);
    }
}
