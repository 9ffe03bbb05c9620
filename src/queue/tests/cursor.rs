//! Tests for bidirectional cursor editing

#[cfg(test)]
mod tests {
    use crate::queue::api::LinkedSequence;

    fn sequence(values: &[i32]) -> LinkedSequence<i32> {
        values.iter().copied().collect()
    }

    fn collect(seq: &LinkedSequence<i32>) -> Vec<i32> {
        seq.iter().copied().collect()
    }

    #[test]
    fn test_cursor_walks_both_directions() {
        let mut seq = sequence(&[1, 2, 3]);
        let mut cursor = seq.cursor_front();

        assert_eq!(cursor.current(), Some(&1));
        cursor.move_next();
        cursor.move_next();
        assert_eq!(cursor.current(), Some(&3));
        assert_eq!(cursor.peek_prev(), Some(&2));

        cursor.move_next();
        assert!(cursor.is_ghost());
        assert_eq!(cursor.current(), None);

        // Ghost wraps to the head going forward
        cursor.move_next();
        assert_eq!(cursor.current(), Some(&1));

        cursor.move_prev();
        assert!(cursor.is_ghost());
        cursor.move_prev();
        assert_eq!(cursor.current(), Some(&3));
    }

    #[test]
    fn test_insert_around_current() {
        let mut seq = sequence(&[1, 4]);
        {
            let mut cursor = seq.cursor_back();
            cursor.insert_before(3);
            cursor.insert_after(5);
            cursor.move_prev();
            cursor.insert_before(2);
        }

        assert_eq!(collect(&seq), vec![1, 2, 3, 4, 5]);
        assert_eq!(seq.len(), 5);
    }

    #[test]
    fn test_insert_on_ghost_position() {
        let mut seq = sequence(&[2]);
        {
            let mut cursor = seq.cursor_back();
            cursor.move_next();
            assert!(cursor.is_ghost());
            cursor.insert_after(1);
            cursor.insert_before(3);
        }

        assert_eq!(collect(&seq), vec![1, 2, 3]);
    }

    #[test]
    fn test_remove_current_advances() {
        let mut seq = sequence(&[1, 2, 3, 4]);
        {
            let mut cursor = seq.cursor_front();
            cursor.move_next();
            assert_eq!(cursor.remove_current(), Some(2));
            assert_eq!(cursor.current(), Some(&3));
            cursor.move_next();
            assert_eq!(cursor.remove_current(), Some(4));
            assert!(cursor.is_ghost());
            assert_eq!(cursor.remove_current(), None);
        }

        assert_eq!(collect(&seq), vec![1, 3]);
        assert_eq!(seq.back(), Some(&3));
    }

    #[test]
    fn test_current_mut_edits_in_place() {
        let mut seq = sequence(&[1, 2]);
        {
            let mut cursor = seq.cursor_back();
            if let Some(value) = cursor.current_mut() {
                *value = 20;
            }
        }

        assert_eq!(collect(&seq), vec![1, 20]);
    }

    #[test]
    fn test_cursor_on_empty_sequence() {
        let mut seq: LinkedSequence<i32> = LinkedSequence::new();
        {
            let mut cursor = seq.cursor_front();
            assert!(cursor.is_ghost());
            cursor.insert_after(7);
        }

        assert_eq!(collect(&seq), vec![7]);
        assert_eq!(seq.front(), seq.back());
    }
}
