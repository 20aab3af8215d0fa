//! Noughts Game Core
//!
//! Pure tic-tac-toe rules shared by the server and the terminal client:
//! the packed board, the win detector and the automated opponent.
//!
//! # Architecture Constraints
//!
//! This crate MUST NOT:
//! - Perform I/O operations (file, network, etc.)
//! - Read wall-clock time
//! - Use ambient/unseeded randomness
//!
//! The opponent draws from an injected [`Rng`], so every game it plays can be
//! reproduced from a seed.

#![deny(unsafe_code)]

use std::fmt;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

// ============================================================================
// Board Layout Constants
// ============================================================================

/// Number of cells on the board.
pub const CELL_COUNT: usize = 9;

/// Significant bits in a packed board (2 bits per cell).
pub const BOARD_BITS: u32 = 18;

/// Mask covering every significant bit of a packed board.
pub const BOARD_MASK: u32 = (1 << BOARD_BITS) - 1;

/// Mask of a single 2-bit cell field.
const CELL_FIELD_MASK: u32 = 0b11;

/// Symbol played by the human seat.
pub const HUMAN_SYMBOL: Cell = Cell::X;

/// Symbol played by the automated opponent.
pub const OPPONENT_SYMBOL: Cell = Cell::O;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by the game core.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    /// The opponent was asked to move on a board with no empty cell.
    #[error("no empty cell left for the opponent")]
    BoardFull,

    /// A packed cell field holds the unused pattern `0b11`.
    #[error("cell {index} holds invalid bit pattern {bits:#04b}")]
    InvalidCell { index: usize, bits: u32 },

    /// A packed board sets bits above the 18-bit board field.
    #[error("packed board {packed:#x} sets bits above bit {}", BOARD_BITS - 1)]
    ExcessBits { packed: u32 },
}

// ============================================================================
// Cells
// ============================================================================

/// Contents of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cell {
    #[default]
    Empty,
    X,
    O,
}

impl Cell {
    /// 2-bit field value: 0 = empty, 1 = X, 2 = O.
    pub const fn bits(self) -> u32 {
        match self {
            Self::Empty => 0,
            Self::X => 1,
            Self::O => 2,
        }
    }

    /// Inverse of [`Cell::bits`]. Returns `None` for `0b11` and wider values.
    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(Self::Empty),
            1 => Some(Self::X),
            2 => Some(Self::O),
            _ => None,
        }
    }

    pub const fn symbol(self) -> char {
        match self {
            Self::Empty => ' ',
            Self::X => 'X',
            Self::O => 'O',
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Validated cell index, row-major 0-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellIndex(u8);

impl CellIndex {
    /// Index from a 0-based position. `None` outside 0-8.
    pub fn new(index: usize) -> Option<Self> {
        (index < CELL_COUNT).then_some(Self(index as u8))
    }

    /// Index from a 1-based key as typed by a player. `None` outside 1-9.
    pub fn from_key(key: usize) -> Option<Self> {
        key.checked_sub(1).and_then(Self::new)
    }

    pub fn get(self) -> usize {
        usize::from(self.0)
    }

    /// 1-based key for this cell.
    pub fn key(self) -> usize {
        self.get() + 1
    }

    /// Low bit of this cell's 2-bit field in the packed board.
    ///
    /// `pos(i) = 16 - 2*i`: cell 0 occupies bits 16-17, cell 8 bits 0-1.
    pub fn bit_position(self) -> u32 {
        16 - 2 * u32::from(self.0)
    }

    /// All nine indices in row-major order.
    pub fn all() -> impl Iterator<Item = CellIndex> {
        (0..CELL_COUNT as u8).map(Self)
    }
}

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Packed Board
// ============================================================================

/// A 3x3 board packed into 18 bits, 2 bits per cell.
///
/// Invariant: every 2-bit field is 0, 1 or 2 and no bit above bit 17 is
/// set. [`Board::from_packed`] is the only way to build a board from a raw
/// integer and enforces both rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board(u32);

impl Board {
    pub const EMPTY: Board = Board(0);

    /// Validate and wrap a packed board.
    pub fn from_packed(packed: u32) -> Result<Self, SimError> {
        if packed & !BOARD_MASK != 0 {
            return Err(SimError::ExcessBits { packed });
        }
        for index in CellIndex::all() {
            let bits = (packed >> index.bit_position()) & CELL_FIELD_MASK;
            if Cell::from_bits(bits).is_none() {
                return Err(SimError::InvalidCell {
                    index: index.get(),
                    bits,
                });
            }
        }
        Ok(Self(packed))
    }

    /// Raw packed value.
    pub fn packed(self) -> u32 {
        self.0
    }

    /// Read one cell.
    pub fn get(self, index: CellIndex) -> Cell {
        match (self.0 >> index.bit_position()) & CELL_FIELD_MASK {
            1 => Cell::X,
            2 => Cell::O,
            // 0b11 cannot be constructed
            _ => Cell::Empty,
        }
    }

    /// Write one cell, leaving the other eight untouched.
    pub fn set(&mut self, index: CellIndex, cell: Cell) {
        let pos = index.bit_position();
        self.0 = (self.0 & !(CELL_FIELD_MASK << pos)) | (cell.bits() << pos);
    }

    /// Copy of this board with one cell replaced.
    #[must_use]
    pub fn with(mut self, index: CellIndex, cell: Cell) -> Self {
        self.set(index, cell);
        self
    }

    /// All cells in row-major order.
    pub fn cells(self) -> impl Iterator<Item = (CellIndex, Cell)> {
        CellIndex::all().map(move |index| (index, self.get(index)))
    }

    pub fn empty_cells(self) -> impl Iterator<Item = CellIndex> {
        self.cells()
            .filter(|(_, cell)| *cell == Cell::Empty)
            .map(|(index, _)| index)
    }

    /// 9-bit mask with bit `i` set when cell `i` holds `cell`.
    pub fn presence_mask(self, cell: Cell) -> u16 {
        self.cells()
            .filter(|(_, c)| *c == cell)
            .fold(0, |mask, (index, _)| mask | (1u16 << index.get()))
    }

    pub fn occupied_count(self) -> u32 {
        CELL_COUNT as u32 - self.presence_mask(Cell::Empty).count_ones()
    }

    pub fn is_full(self) -> bool {
        self.occupied_count() == CELL_COUNT as u32
    }

    /// Indices whose contents differ between `self` and `other`.
    pub fn changed_cells(self, other: Board) -> Vec<CellIndex> {
        CellIndex::all()
            .filter(|&index| self.get(index) != other.get(index))
            .collect()
    }

    /// Run the win detector on this board.
    pub fn outcome(self) -> Outcome {
        evaluate(self)
    }
}

/// Three rows separated by newlines, `.` for empty cells.
impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, cell) in self.cells() {
            let c = match cell {
                Cell::Empty => '.',
                other => other.symbol(),
            };
            write!(f, "{c}")?;
            if index.get() % 3 == 2 && index.get() != CELL_COUNT - 1 {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Win Detector
// ============================================================================

/// The eight winning lines as 9-bit presence masks (bit `i` = cell `i`).
pub const WIN_LINES: [u16; 8] = [
    0b000_000_111, // top row
    0b000_111_000, // middle row
    0b111_000_000, // bottom row
    0b001_001_001, // left column
    0b010_010_010, // middle column
    0b100_100_100, // right column
    0b100_010_001, // diagonal 0-4-8
    0b001_010_100, // diagonal 2-4-6
];

/// Result of evaluating a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    InProgress,
    XWins,
    OWins,
    Tie,
}

impl Outcome {
    pub fn is_finished(self) -> bool {
        !matches!(self, Self::InProgress)
    }

    /// Winning symbol, if any.
    pub fn winner(self) -> Option<Cell> {
        match self {
            Self::XWins => Some(Cell::X),
            Self::OWins => Some(Cell::O),
            Self::InProgress | Self::Tie => None,
        }
    }
}

/// Evaluate a board.
///
/// Rules:
/// - every X line is checked before any O line, so a board where both
///   symbols complete a line reports `XWins`
/// - no complete line and all nine cells occupied → `Tie`
/// - otherwise `InProgress`
pub fn evaluate(board: Board) -> Outcome {
    let x_mask = board.presence_mask(Cell::X);
    let o_mask = board.presence_mask(Cell::O);

    let contains_line = |mask: u16| WIN_LINES.iter().any(|&line| mask & line == line);

    if contains_line(x_mask) {
        Outcome::XWins
    } else if contains_line(o_mask) {
        Outcome::OWins
    } else if (x_mask | o_mask).count_ones() == CELL_COUNT as u32 {
        Outcome::Tie
    } else {
        Outcome::InProgress
    }
}

// ============================================================================
// Automated Opponent
// ============================================================================

/// Picks the automated opponent's cell.
///
/// Implementations assume the game is still in progress; a board with no
/// empty cell is reported as [`SimError::BoardFull`].
pub trait MoveSelector {
    fn choose(&mut self, board: Board) -> Result<CellIndex, SimError>;

    /// Place the opponent's symbol on the chosen cell.
    fn play(&mut self, board: Board) -> Result<Board, SimError> {
        let index = self.choose(board)?;
        Ok(board.with(index, OPPONENT_SYMBOL))
    }
}

/// Opponent that plays O on a uniformly random empty cell.
#[derive(Debug, Clone)]
pub struct RandomOpponent<R> {
    rng: R,
}

impl RandomOpponent<ChaCha8Rng> {
    /// Opponent backed by a `ChaCha8Rng` seeded with `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomOpponent<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> MoveSelector for RandomOpponent<R> {
    fn choose(&mut self, board: Board) -> Result<CellIndex, SimError> {
        let empty: Vec<CellIndex> = board.empty_cells().collect();
        empty
            .choose(&mut self.rng)
            .copied()
            .ok_or(SimError::BoardFull)
    }
}

// ============================================================================
// Tests
// ============================================================================
