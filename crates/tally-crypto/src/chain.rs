//! Ancestor link-window rule.
//!
//! Every block references a window of its nearest ancestors, direct
//! predecessor first, and carries an explicit edge to genesis whenever genesis
//! falls outside that window. Rewriting any single ancestor therefore cannot
//! silently detach a block from genesis.

use tally_types::ObjectId;

/// Build the ordered parent list for a new block.
///
/// `window` is the current tip followed by its ancestors at increasing
/// distance, as walked along first-parent links (at most `link_level`
/// entries). Genesis is appended unless it is already the last entry.
pub fn expected_parents(window: &[ObjectId], genesis: ObjectId) -> Vec<ObjectId> {
    let mut parents = window.to_vec();
    if parents.last() != Some(&genesis) {
        parents.push(genesis);
    }
    parents
}

/// Check a block's recorded parents against the list the rule demands.
pub fn verify_parents(actual: &[ObjectId], expected: &[ObjectId]) -> Result<(), ChainError> {
    if actual.len() != expected.len() {
        return Err(ChainError::ParentCount {
            expected: expected.len(),
            actual: actual.len(),
        });
    }
    for (index, (a, e)) in actual.iter().zip(expected).enumerate() {
        if a != e {
            return Err(ChainError::ParentMismatch {
                index,
                expected: *e,
                actual: *a,
            });
        }
    }
    Ok(())
}

/// Errors from link-window verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("parent count mismatch: expected {expected}, found {actual}")]
    ParentCount { expected: usize, actual: usize },

    #[error("parent {index} mismatch: expected {expected}, found {actual}")]
    ParentMismatch {
        index: usize,
        expected: ObjectId,
        actual: ObjectId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u8) -> Vec<ObjectId> {
        (0..n).map(|i| ObjectId::from_bytes(&[i])).collect()
    }

    #[test]
    fn genesis_appended_when_outside_window() {
        let genesis = ObjectId::from_bytes(b"genesis");
        let window = ids(3);
        let parents = expected_parents(&window, genesis);
        assert_eq!(parents.len(), 4);
        assert_eq!(&parents[..3], &window[..]);
        assert_eq!(parents[3], genesis);
    }

    #[test]
    fn genesis_not_duplicated_when_last() {
        let genesis = ObjectId::from_bytes(b"genesis");
        let mut window = ids(2);
        window.push(genesis);
        assert_eq!(expected_parents(&window, genesis), window);
    }

    #[test]
    fn first_block_after_genesis_links_only_genesis() {
        let genesis = ObjectId::from_bytes(b"genesis");
        assert_eq!(expected_parents(&[genesis], genesis), vec![genesis]);
    }

    #[test]
    fn verify_reports_count_and_position() {
        let expected = ids(3);
        assert!(verify_parents(&expected, &expected).is_ok());

        let err = verify_parents(&expected[..2], &expected).unwrap_err();
        assert_eq!(err, ChainError::ParentCount { expected: 3, actual: 2 });

        let mut swapped = expected.clone();
        swapped.swap(1, 2);
        let err = verify_parents(&swapped, &expected).unwrap_err();
        assert!(matches!(err, ChainError::ParentMismatch { index: 1, .. }));
    }
}
