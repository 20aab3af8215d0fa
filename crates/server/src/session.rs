//! Per-game session records and the move state machine.
//!
//! A session is created by the first datagram carrying an unseen session id.
//! Its board and state change only through [`Session::welcome`] and
//! [`Session::receive_board`]; [`Session::touch`] records liveness.

use std::net::SocketAddr;
use std::time::Instant;

use noughts_sim::{Board, Cell, HUMAN_SYMBOL, MoveSelector, Outcome};
use noughts_wire::{Flags, Sequence, SessionId};
use tracing::{debug, error};

use crate::validation::{MoveStrictness, validate_move};

/// Reply text for a rejected or unchanged board.
pub const INVALID_MOVE_TEXT: &str = "Invalid move. Try again.";

/// Reply text after the opponent has moved.
pub const SERVER_MOVED_TEXT: &str = "Server's turn.";

// ============================================================================
// End Reason
// ============================================================================

/// Reason a game finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    XWins,
    OWins,
    Tie,
}

impl EndReason {
    /// Finished outcomes map to a reason; `InProgress` does not.
    pub fn from_outcome(outcome: Outcome) -> Option<Self> {
        match outcome {
            Outcome::InProgress => None,
            Outcome::XWins => Some(Self::XWins),
            Outcome::OWins => Some(Self::OWins),
            Outcome::Tie => Some(Self::Tie),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::XWins => "x_wins",
            Self::OWins => "o_wins",
            Self::Tie => "tie",
        }
    }

    /// Result flag carried by every reply once the game has ended.
    pub fn flags(&self) -> Flags {
        match self {
            Self::XWins => Flags::X_WINS,
            Self::OWins => Flags::O_WINS,
            Self::Tie => Flags::TIE,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::XWins => "X wins! Game over.",
            Self::OWins => "O wins! Game over.",
            Self::Tie => "It's a tie! Game over.",
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Just created, welcome not sent yet.
    AwaitingFirstMove,
    /// X to move.
    AwaitingHumanMove,
    /// O has just moved; control is back with X.
    ServerMoveApplied,
    /// Terminal. The board is frozen.
    Finished(EndReason),
}

/// Flags, board and text the server sends back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub flags: Flags,
    pub board: Board,
    pub text: String,
}

/// Server-side record of one game.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    /// Address of the datagram that created the session.
    pub addr: SocketAddr,
    pub player_name: String,
    last_sequence: Option<Sequence>,
    last_seen: Instant,
    board: Board,
    to_move: Cell,
    state: SessionState,
}

impl Session {
    /// Create a session with an empty board and X to move.
    pub fn new(
        id: SessionId,
        addr: SocketAddr,
        player_name: impl Into<String>,
        now: Instant,
    ) -> Self {
        Self {
            id,
            addr,
            player_name: player_name.into(),
            last_sequence: None,
            last_seen: now,
            board: Board::EMPTY,
            to_move: HUMAN_SYMBOL,
            state: SessionState::AwaitingFirstMove,
        }
    }

    /// Authoritative board.
    pub fn board(&self) -> Board {
        self.board
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Symbol expected to move next; `Empty` once finished.
    pub fn to_move(&self) -> Cell {
        self.to_move
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, SessionState::Finished(_))
    }

    /// Last sequence number received from the client (logging only).
    pub fn last_sequence(&self) -> Option<Sequence> {
        self.last_sequence
    }

    /// Last time a datagram for this session arrived.
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Record that a datagram with `sequence` arrived at `now`.
    ///
    /// Gaps and repeats are logged; they never change the outcome.
    pub fn touch(&mut self, sequence: Sequence, now: Instant) {
        if let Some(last) = self.last_sequence
            && sequence != last.wrapping_add(1)
        {
            debug!(session_id = self.id, last, sequence, "sequence out of order");
        }
        self.last_sequence = Some(sequence);
        self.last_seen = now;
    }

    /// Greet the player and hand the first move to X.
    pub fn welcome(&mut self) -> Reply {
        self.state = SessionState::AwaitingHumanMove;
        self.to_move = HUMAN_SYMBOL;
        Reply {
            flags: Flags::X_TO_MOVE,
            board: self.board,
            text: format!("Welcome {}! You are X. Your move!", self.player_name),
        }
    }

    /// Reconcile a board reported by the client with the stored board.
    ///
    /// Finished sessions replay their final reply and never change. An
    /// accepted board is checked for a result before the opponent moves; the
    /// opponent's own move is evaluated when the next board arrives.
    pub fn receive_board<S: MoveSelector>(
        &mut self,
        incoming: Board,
        strictness: MoveStrictness,
        opponent: &mut S,
    ) -> Reply {
        if let SessionState::Finished(reason) = self.state {
            return self.final_reply(reason);
        }

        let validation = validate_move(self.board, incoming, strictness);
        if !validation.is_accepted() {
            debug!(session_id = self.id, ?validation, "move dropped");
            return Reply {
                flags: Flags::NONE,
                board: self.board,
                text: INVALID_MOVE_TEXT.to_string(),
            };
        }

        self.board = incoming;
        if let Some(reason) = EndReason::from_outcome(incoming.outcome()) {
            return self.finish(reason);
        }

        match opponent.play(incoming) {
            Ok(board) => {
                self.board = board;
                self.state = SessionState::ServerMoveApplied;
                self.to_move = HUMAN_SYMBOL;
                Reply {
                    flags: Flags::O_TO_MOVE,
                    board,
                    text: SERVER_MOVED_TEXT.to_string(),
                }
            }
            Err(e) => {
                error!(
                    session_id = self.id,
                    board = incoming.packed(),
                    error = %e,
                    "opponent has no move; ending as a tie"
                );
                self.finish(EndReason::Tie)
            }
        }
    }

    fn finish(&mut self, reason: EndReason) -> Reply {
        debug!(session_id = self.id, reason = reason.as_str(), "session finished");
        self.state = SessionState::Finished(reason);
        self.to_move = Cell::Empty;
        self.final_reply(reason)
    }

    fn final_reply(&self, reason: EndReason) -> Reply {
        Reply {
            flags: reason.flags(),
            board: self.board,
            text: reason.message().to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn session(now: Instant) -> Session {
        Session::new(9, "127.0.0.1:40000".parse().unwrap(), "Carol", now)
    }

    #[test]
    fn test_new_session_is_untouched() {
        let start = Instant::now();
        let session = session(start);

        assert_eq!(session.last_sequence(), None);
        assert_eq!(session.last_seen(), start);
        assert_eq!(session.state(), SessionState::AwaitingFirstMove);
        assert_eq!(session.board(), Board::EMPTY);
    }

    #[test]
    fn test_touch_records_sequence_and_time() {
        let start = Instant::now();
        let mut session = session(start);

        session.touch(0, start);
        assert_eq!(session.last_sequence(), Some(0));

        // out-of-order and wrapped sequences are recorded as given
        let later = start + Duration::from_secs(5);
        session.touch(255, later);
        assert_eq!(session.last_sequence(), Some(255));
        assert_eq!(session.last_seen(), later);

        session.touch(0, later);
        assert_eq!(session.last_sequence(), Some(0));
    }

    #[test]
    fn test_touch_leaves_board_and_state_alone() {
        let start = Instant::now();
        let mut session = session(start);
        session.welcome();

        session.touch(1, start + Duration::from_secs(1));
        assert_eq!(session.state(), SessionState::AwaitingHumanMove);
        assert_eq!(session.board(), Board::EMPTY);
        assert_eq!(session.to_move(), Cell::X);
    }
}
