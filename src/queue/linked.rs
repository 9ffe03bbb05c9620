//! Doubly linked sequence stored in an index arena
//!
//! Nodes live in a `Vec` slab and refer to their neighbours by slot index, so
//! there are no mutual references to manage. Freed slots are recycled.
//! A [`Cursor`] walks the sequence in both directions and edits it in O(1)
//! at its position.

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Arena-backed doubly linked list
#[derive(Debug)]
pub struct LinkedSequence<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> Default for LinkedSequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LinkedSequence<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn front(&self) -> Option<&T> {
        self.head.and_then(|idx| self.value(idx))
    }

    pub fn back(&self) -> Option<&T> {
        self.tail.and_then(|idx| self.value(idx))
    }

    pub fn push_back(&mut self, value: T) {
        self.link_after(self.tail, value);
    }

    pub fn push_front(&mut self, value: T) {
        self.link_after(None, value);
    }

    pub fn pop_front(&mut self) -> Option<T> {
        self.head.and_then(|idx| self.unlink(idx))
    }

    pub fn pop_back(&mut self) -> Option<T> {
        self.tail.and_then(|idx| self.unlink(idx))
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            seq: self,
            front: self.head,
            back: self.tail,
            remaining: self.len,
        }
    }

    /// Cursor positioned on the head element
    pub fn cursor_front(&mut self) -> Cursor<'_, T> {
        let position = self.head;
        Cursor {
            seq: self,
            position,
        }
    }

    /// Cursor positioned on the tail element
    pub fn cursor_back(&mut self) -> Cursor<'_, T> {
        let position = self.tail;
        Cursor {
            seq: self,
            position,
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    fn node(&self, idx: usize) -> Option<&Node<T>> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, idx: usize) -> Option<&mut Node<T>> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    fn value(&self, idx: usize) -> Option<&T> {
        self.node(idx).map(|node| &node.value)
    }

    fn allocate(&mut self, node: Node<T>) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    /// Insert after `anchor`; `None` inserts at the front
    fn link_after(&mut self, anchor: Option<usize>, value: T) -> usize {
        let next = match anchor {
            Some(idx) => self.node(idx).and_then(|node| node.next),
            None => self.head,
        };
        let idx = self.allocate(Node {
            value,
            prev: anchor,
            next,
        });

        match anchor.and_then(|a| self.node_mut(a)) {
            Some(prev) => prev.next = Some(idx),
            None => self.head = Some(idx),
        }
        match next.and_then(|n| self.node_mut(n)) {
            Some(following) => following.prev = Some(idx),
            None => self.tail = Some(idx),
        }

        self.len += 1;
        idx
    }

    /// Insert before `anchor`; `None` inserts at the back
    fn link_before(&mut self, anchor: Option<usize>, value: T) -> usize {
        let prev = match anchor {
            Some(idx) => self.node(idx).and_then(|node| node.prev),
            None => self.tail,
        };
        self.link_after(prev, value)
    }

    fn unlink(&mut self, idx: usize) -> Option<T> {
        let node = self.slots.get_mut(idx)?.take()?;

        match node.prev.and_then(|p| self.node_mut(p)) {
            Some(prev) => prev.next = node.next,
            None => self.head = node.next,
        }
        match node.next.and_then(|n| self.node_mut(n)) {
            Some(next) => next.prev = node.prev,
            None => self.tail = node.prev,
        }

        self.free.push(idx);
        self.len -= 1;
        Some(node.value)
    }
}

impl<T> FromIterator<T> for LinkedSequence<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut seq = Self::new();
        for value in iter {
            seq.push_back(value);
        }
        seq
    }
}

/// Head-to-tail iterator, also reversible
pub struct Iter<'a, T> {
    seq: &'a LinkedSequence<T>,
    front: Option<usize>,
    back: Option<usize>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.seq.node(self.front?)?;
        self.front = node.next;
        self.remaining -= 1;
        Some(&node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.seq.node(self.back?)?;
        self.back = node.prev;
        self.remaining -= 1;
        Some(&node.value)
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

/// Editing cursor over a [`LinkedSequence`]
///
/// Besides the elements, the cursor can rest on a "ghost" position that sits
/// past the tail and before the head. Moving off either end lands there, and
/// moving again wraps around.
pub struct Cursor<'a, T> {
    seq: &'a mut LinkedSequence<T>,
    position: Option<usize>,
}

impl<T> Cursor<'_, T> {
    pub fn current(&self) -> Option<&T> {
        self.position.and_then(|idx| self.seq.value(idx))
    }

    pub fn current_mut(&mut self) -> Option<&mut T> {
        let idx = self.position?;
        self.seq.node_mut(idx).map(|node| &mut node.value)
    }

    /// Look at the element before the cursor without moving
    pub fn peek_prev(&self) -> Option<&T> {
        let prev = match self.position {
            Some(idx) => self.seq.node(idx)?.prev,
            None => self.seq.tail,
        };
        prev.and_then(|idx| self.seq.value(idx))
    }

    pub fn is_ghost(&self) -> bool {
        self.position.is_none()
    }

    pub fn move_next(&mut self) {
        self.position = match self.position {
            Some(idx) => self.seq.node(idx).and_then(|node| node.next),
            None => self.seq.head,
        };
    }

    pub fn move_prev(&mut self) {
        self.position = match self.position {
            Some(idx) => self.seq.node(idx).and_then(|node| node.prev),
            None => self.seq.tail,
        };
    }

    /// Insert before the cursor; on the ghost position this appends
    pub fn insert_before(&mut self, value: T) {
        self.seq.link_before(self.position, value);
    }

    /// Insert after the cursor; on the ghost position this prepends
    pub fn insert_after(&mut self, value: T) {
        self.seq.link_after(self.position, value);
    }

    /// Remove the current element and move to the one after it
    pub fn remove_current(&mut self) -> Option<T> {
        let idx = self.position?;
        self.position = self.seq.node(idx).and_then(|node| node.next);
        self.seq.unlink(idx)
    }
}
