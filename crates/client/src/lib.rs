//! Noughts Client
//!
//! Local view of one game as seen from the terminal. The server is
//! authoritative: every reply overwrites the local board, and the local copy
//! is only used to build the next move and reject occupied cells early.

#![deny(unsafe_code)]

pub mod render;

use noughts_sim::{Board, Cell, CellIndex, HUMAN_SYMBOL, Outcome};
use noughts_wire::{Flags, Message, SESSION_ID_MAX, Sequence, SessionId, WireError};
use thiserror::Error;
use tracing::debug;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("that position is already taken")]
    CellOccupied(CellIndex),

    #[error("the game is over")]
    GameOver,

    #[error("waiting for the server")]
    NotYourTurn,

    #[error("please enter a number between 1 and 9")]
    KeyOutOfRange(usize),

    #[error("{0:?} is not a number")]
    NotANumber(String),

    #[error("reply for session {got:#x}, expected {expected:#x}")]
    ForeignSession { expected: SessionId, got: SessionId },

    #[error(transparent)]
    Wire(#[from] WireError),
}

// ============================================================================
// Key Parsing
// ============================================================================

/// Parse a 1-9 key typed by the player.
pub fn parse_key(input: &str) -> Result<CellIndex, ClientError> {
    let trimmed = input.trim();
    let key: usize = trimmed
        .parse()
        .map_err(|_| ClientError::NotANumber(trimmed.to_string()))?;
    CellIndex::from_key(key).ok_or(ClientError::KeyOutOfRange(key))
}

// ============================================================================
// Client Game
// ============================================================================

/// Where the exchange with the server stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exchange {
    /// Nothing sent yet.
    NotJoined,
    /// A datagram is in flight and its reply has not been applied.
    AwaitingReply,
    /// The last reply has been applied.
    Ready,
}

/// One game from the player's side.
#[derive(Debug, Clone)]
pub struct ClientGame {
    session_id: SessionId,
    sequence: Sequence,
    board: Board,
    flags: Flags,
    exchange: Exchange,
}

impl ClientGame {
    /// Game with a caller-chosen id. Ids wider than 24 bits are rejected.
    pub fn new(session_id: SessionId) -> Result<Self, ClientError> {
        if session_id > SESSION_ID_MAX {
            return Err(WireError::SessionIdOutOfRange(session_id).into());
        }
        Ok(Self::with_id(session_id))
    }

    /// Game with a random 24-bit id.
    pub fn random() -> Self {
        Self::with_id(rand::random::<SessionId>() & SESSION_ID_MAX)
    }

    fn with_id(session_id: SessionId) -> Self {
        Self {
            session_id,
            sequence: 0,
            board: Board::EMPTY,
            flags: Flags::NONE,
            exchange: Exchange::NotJoined,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    pub fn board(&self) -> Board {
        self.board
    }

    pub fn symbol(&self) -> Cell {
        HUMAN_SYMBOL
    }

    pub fn is_game_over(&self) -> bool {
        self.flags.is_game_over()
    }

    /// Final result, once the server has announced one.
    pub fn outcome(&self) -> Option<Outcome> {
        self.flags.outcome()
    }

    /// The player may move: a reply has arrived and the game is not over.
    ///
    /// Replies flagged X-to-move, O-has-moved and invalid-move (no flags) all
    /// hand control back to the player.
    pub fn is_my_turn(&self) -> bool {
        self.exchange == Exchange::Ready && !self.is_game_over()
    }

    /// First datagram: sequence 0, empty board, the player's name as text.
    pub fn hello(&mut self, name: &str) -> Result<Message, ClientError> {
        self.sequence = 0;
        self.exchange = Exchange::AwaitingReply;
        Ok(Message::new(self.session_id, self.sequence, Flags::NONE, Board::EMPTY, name)?)
    }

    /// Adopt the server's reply.
    pub fn apply_response(&mut self, reply: &Message) -> Result<(), ClientError> {
        if reply.session_id != self.session_id {
            return Err(ClientError::ForeignSession {
                expected: self.session_id,
                got: reply.session_id,
            });
        }
        if reply.sequence != self.sequence {
            debug!(expected = self.sequence, got = reply.sequence, "reply sequence mismatch");
        }

        self.board = reply.board;
        self.flags = reply.flags;
        self.exchange = Exchange::Ready;
        Ok(())
    }

    /// Place X on `index` and build the move datagram.
    pub fn play(&mut self, index: CellIndex) -> Result<Message, ClientError> {
        if self.is_game_over() {
            return Err(ClientError::GameOver);
        }
        if !self.is_my_turn() {
            return Err(ClientError::NotYourTurn);
        }
        if self.board.get(index) != Cell::Empty {
            return Err(ClientError::CellOccupied(index));
        }

        self.board = self.board.with(index, HUMAN_SYMBOL);
        self.sequence = self.sequence.wrapping_add(1);
        self.exchange = Exchange::AwaitingReply;
        Ok(Message::new(self.session_id, self.sequence, Flags::NONE, self.board, "")?)
    }

    /// Parse a typed key and play it.
    pub fn play_key(&mut self, input: &str) -> Result<Message, ClientError> {
        let index = parse_key(input)?;
        self.play(index)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(i: usize) -> CellIndex {
        CellIndex::new(i).unwrap()
    }

    fn reply(game: &ClientGame, flags: Flags, board: Board) -> Message {
        Message::new(game.session_id(), game.sequence(), flags, board, "").unwrap()
    }

    fn joined() -> ClientGame {
        let mut game = ClientGame::new(0x42).unwrap();
        game.hello("Alice").unwrap();
        let welcome = reply(&game, Flags::X_TO_MOVE, Board::EMPTY);
        game.apply_response(&welcome).unwrap();
        game
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("1"), Ok(idx(0)));
        assert_eq!(parse_key(" 9\n"), Ok(idx(8)));
        assert_eq!(parse_key("0"), Err(ClientError::KeyOutOfRange(0)));
        assert_eq!(parse_key("10"), Err(ClientError::KeyOutOfRange(10)));
        assert_eq!(parse_key("x"), Err(ClientError::NotANumber("x".to_string())));
        assert!(matches!(parse_key("-1"), Err(ClientError::NotANumber(_))));
    }

    #[test]
    fn test_hello_message() {
        let mut game = ClientGame::new(0xABCDEF).unwrap();
        let hello = game.hello("Alice").unwrap();

        assert_eq!(hello.session_id, 0xABCDEF);
        assert_eq!(hello.sequence, 0);
        assert_eq!(hello.flags, Flags::NONE);
        assert_eq!(hello.board, Board::EMPTY);
        assert_eq!(hello.text, "Alice");
        assert!(!game.is_my_turn());
    }

    #[test]
    fn test_session_id_range() {
        assert!(ClientGame::new(SESSION_ID_MAX).is_ok());
        assert_eq!(
            ClientGame::new(SESSION_ID_MAX + 1).unwrap_err(),
            ClientError::Wire(WireError::SessionIdOutOfRange(SESSION_ID_MAX + 1))
        );
        for _ in 0..32 {
            assert!(ClientGame::random().session_id() <= SESSION_ID_MAX);
        }
    }

    #[test]
    fn test_play_places_x_and_bumps_sequence() {
        let mut game = joined();
        let mv = game.play(idx(4)).unwrap();

        assert_eq!(mv.sequence, 1);
        assert_eq!(mv.board.get(idx(4)), Cell::X);
        assert_eq!(mv.text, "");
        assert_eq!(game.board(), mv.board);
    }

    #[test]
    fn test_cannot_play_before_reply() {
        let mut game = ClientGame::new(1).unwrap();
        assert_eq!(game.play(idx(0)), Err(ClientError::NotYourTurn));

        let mut game = joined();
        game.play(idx(0)).unwrap();
        assert_eq!(game.play(idx(1)), Err(ClientError::NotYourTurn));
    }

    #[test]
    fn test_occupied_cell_rejected() {
        let mut game = joined();
        game.play(idx(0)).unwrap();
        let server_board = game.board().with(idx(4), Cell::O);
        game.apply_response(&reply(&game, Flags::O_TO_MOVE, server_board)).unwrap();

        assert_eq!(game.play(idx(4)), Err(ClientError::CellOccupied(idx(4))));
        assert_eq!(game.play(idx(0)), Err(ClientError::CellOccupied(idx(0))));
        // a rejected key does not consume a sequence number
        assert_eq!(game.sequence(), 1);
    }

    #[test]
    fn test_invalid_move_reply_returns_control() {
        let mut game = joined();
        game.play(idx(0)).unwrap();
        game.apply_response(&reply(&game, Flags::NONE, Board::EMPTY)).unwrap();

        assert!(game.is_my_turn());
        assert_eq!(game.board(), Board::EMPTY);
    }

    #[test]
    fn test_sequence_wraps() {
        let mut game = joined();
        for expected in 1..=300u32 {
            let mv = game.play(idx(0)).unwrap();
            assert_eq!(u32::from(mv.sequence), expected % 256);
            // server rejects and hands back the empty board
            game.apply_response(&reply(&game, Flags::NONE, Board::EMPTY)).unwrap();
        }
    }

    #[test]
    fn test_game_over_detection() {
        let mut game = joined();
        game.play(idx(0)).unwrap();
        game.apply_response(&reply(&game, Flags::X_WINS, game.board())).unwrap();

        assert!(game.is_game_over());
        assert_eq!(game.outcome(), Some(Outcome::XWins));
        assert_eq!(game.play(idx(1)), Err(ClientError::GameOver));
    }

    #[test]
    fn test_foreign_session_ignored() {
        let mut game = joined();
        let stray = Message::new(0x43, 0, Flags::X_WINS, Board::EMPTY, "").unwrap();

        assert_eq!(
            game.apply_response(&stray),
            Err(ClientError::ForeignSession { expected: 0x42, got: 0x43 })
        );
        assert!(!game.is_game_over());
    }
}
