//! Move validation for incoming boards.
//!
//! Rules:
//! - Board identical to the stored board: DROP (answered as an invalid move)
//! - Permissive: any other board is accepted as the next move
//! - Strict: exactly one cell may change, and it must go from empty to X

use noughts_sim::{Board, Cell, CellIndex, HUMAN_SYMBOL};

/// How closely an incoming board is checked against the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveStrictness {
    /// Accept any board that differs from the stored one.
    #[default]
    Permissive,
    /// Accept only a single empty → X change.
    Strict,
}

/// Result of move validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Board accepted as the player's move.
    Accepted,
    /// Dropped: board equals the stored board.
    DroppedUnchanged,
    /// Dropped (strict): more than one cell changed.
    DroppedMultipleChanges { changed: usize },
    /// Dropped (strict): the single change was not empty → X.
    DroppedIllegalChange {
        index: CellIndex,
        from: Cell,
        to: Cell,
    },
}

impl ValidationResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Validate a board reported by the client against the stored board.
pub fn validate_move(
    stored: Board,
    incoming: Board,
    strictness: MoveStrictness,
) -> ValidationResult {
    let changed = stored.changed_cells(incoming);

    match (changed.as_slice(), strictness) {
        ([], _) => ValidationResult::DroppedUnchanged,
        (_, MoveStrictness::Permissive) => ValidationResult::Accepted,
        ([index], MoveStrictness::Strict) => {
            let (from, to) = (stored.get(*index), incoming.get(*index));
            if from == Cell::Empty && to == HUMAN_SYMBOL {
                ValidationResult::Accepted
            } else {
                ValidationResult::DroppedIllegalChange {
                    index: *index,
                    from,
                    to,
                }
            }
        }
        (_, MoveStrictness::Strict) => ValidationResult::DroppedMultipleChanges {
            changed: changed.len(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(i: usize) -> CellIndex {
        CellIndex::new(i).unwrap()
    }

    fn stored() -> Board {
        Board::EMPTY.with(idx(0), Cell::X).with(idx(4), Cell::O)
    }

    #[test]
    fn test_unchanged_board_dropped_in_both_modes() {
        for strictness in [MoveStrictness::Permissive, MoveStrictness::Strict] {
            assert_eq!(
                validate_move(stored(), stored(), strictness),
                ValidationResult::DroppedUnchanged
            );
        }
    }

    #[test]
    fn test_single_x_accepted_in_both_modes() {
        let incoming = stored().with(idx(8), Cell::X);
        for strictness in [MoveStrictness::Permissive, MoveStrictness::Strict] {
            assert!(validate_move(stored(), incoming, strictness).is_accepted());
        }
    }

    #[test]
    fn test_permissive_accepts_any_difference() {
        // overwrite O, remove X, add two marks
        let overwrite = stored().with(idx(4), Cell::X);
        let removal = stored().with(idx(0), Cell::Empty);
        let double = stored().with(idx(1), Cell::X).with(idx(2), Cell::X);

        for incoming in [overwrite, removal, double] {
            assert_eq!(
                validate_move(stored(), incoming, MoveStrictness::Permissive),
                ValidationResult::Accepted
            );
        }
    }

    #[test]
    fn test_strict_rejects_overwrite() {
        let incoming = stored().with(idx(4), Cell::X);
        assert_eq!(
            validate_move(stored(), incoming, MoveStrictness::Strict),
            ValidationResult::DroppedIllegalChange {
                index: idx(4),
                from: Cell::O,
                to: Cell::X,
            }
        );
    }

    #[test]
    fn test_strict_rejects_removal_and_o_placement() {
        let removal = stored().with(idx(0), Cell::Empty);
        assert!(matches!(
            validate_move(stored(), removal, MoveStrictness::Strict),
            ValidationResult::DroppedIllegalChange { .. }
        ));

        let o_move = stored().with(idx(8), Cell::O);
        assert!(matches!(
            validate_move(stored(), o_move, MoveStrictness::Strict),
            ValidationResult::DroppedIllegalChange { to: Cell::O, .. }
        ));
    }

    #[test]
    fn test_strict_rejects_multiple_changes() {
        let incoming = stored().with(idx(1), Cell::X).with(idx(2), Cell::X);
        assert_eq!(
            validate_move(stored(), incoming, MoveStrictness::Strict),
            ValidationResult::DroppedMultipleChanges { changed: 2 }
        );
    }
}
