//! ASCII rendering of the board next to the 1-9 key grid.

use noughts_sim::{Board, CellIndex};

const ROW_SEPARATOR: &str = "---+---+---";
const GAP: &str = "           ";

/// Render the key grid on the left and the current board on the right.
///
/// ```text
/// Game Board:           Current Game:
///  1 | 2 | 3             X |   |
/// ---+---+---           ---+---+---
/// ```
pub fn render(board: Board) -> String {
    let cells: Vec<char> = board.cells().map(|(_, cell)| cell.symbol()).collect();
    let keys: Vec<usize> = CellIndex::all().map(CellIndex::key).collect();

    let mut out = String::from("Game Board:           Current Game:\n");
    for row in 0..3 {
        if row > 0 {
            out.push_str(&format!("{ROW_SEPARATOR}{GAP}{ROW_SEPARATOR}\n"));
        }
        let k = &keys[row * 3..row * 3 + 3];
        let c = &cells[row * 3..row * 3 + 3];
        out.push_str(&format!(
            " {} | {} | {} {GAP} {} | {} | {} \n",
            k[0], k[1], k[2], c[0], c[1], c[2]
        ));
    }
    out
}
