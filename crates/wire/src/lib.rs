//! Noughts Wire Protocol
//!
//! This crate defines the datagram format exchanged between the terminal
//! client and the server. Both binaries MUST depend on this crate so the two
//! ends never disagree about the layout.
//!
//! # Layout
//!
//! All multi-byte integers are big-endian.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                   Session Id (24)             | Sequence (8)  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           Flags (16)          |    Packed Board (24) ...      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  ... Board    |              UTF-8 text ...                   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The board field is three bytes wide: a packed board needs 18 bits, so a
//! 16-bit field cannot carry a mark in cell 0. The top 6 bits are always zero.
//! The id/sequence word is four bytes wide so a full 24-bit session id fits
//! next to the sequence. This 9-byte header does not interoperate with peers
//! that speak the older 7-byte layout (3-byte id/sequence, 2-byte board).

#![deny(unsafe_code)]

use std::ops::{BitOr, BitOrAssign};

use noughts_sim::{Board, Outcome, SimError};
use thiserror::Error;

// ============================================================================
// Type Aliases
// ============================================================================

/// Client-chosen game identifier. Only the low 24 bits are used.
pub type SessionId = u32;

/// Client move counter, wraps modulo 256.
pub type Sequence = u8;

/// Largest session id the header can carry.
pub const SESSION_ID_MAX: SessionId = 0x00FF_FFFF;

/// Byte length of the fixed header.
/// id/seq(4) + flags(2) + board(3)
pub const HEADER_LEN: usize = 9;

/// Largest UDP payload over IPv4. Receive buffers must be this large, or the
/// socket silently cuts the text short.
pub const MAX_DATAGRAM_LEN: usize = 65_507;

// Byte offsets within the header.
const OFF_ID_SEQ: usize = 0;
const OFF_FLAGS: usize = 4;
const OFF_BOARD: usize = 6;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while decoding a datagram or building a message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Datagram shorter than the fixed header.
    #[error("datagram of {len} bytes is shorter than the {}-byte header", HEADER_LEN)]
    MalformedMessage { len: usize },

    /// Text payload is not valid UTF-8.
    #[error("text payload is not valid UTF-8: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),

    /// Board field does not hold a valid packed board.
    #[error("invalid board field: {0}")]
    InvalidBoard(#[from] SimError),

    /// Session id wider than 24 bits.
    #[error("session id {0:#x} does not fit in 24 bits")]
    SessionIdOutOfRange(SessionId),
}

// ============================================================================
// Flags
// ============================================================================

/// 16-bit flags field.
///
/// Unknown bits are preserved so a decoded message re-encodes unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u16);

impl Flags {
    pub const NONE: Flags = Flags(0);
    /// The human (X) is to move.
    pub const X_TO_MOVE: Flags = Flags(1 << 0);
    /// O is to move, or the server has just moved.
    pub const O_TO_MOVE: Flags = Flags(1 << 1);
    pub const X_WINS: Flags = Flags(1 << 2);
    pub const O_WINS: Flags = Flags(1 << 3);
    pub const TIE: Flags = Flags(1 << 4);
    /// Any of the three result bits.
    pub const GAME_OVER: Flags = Flags(Self::X_WINS.0 | Self::O_WINS.0 | Self::TIE.0);

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    /// True when every bit of `other` is set.
    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_game_over(self) -> bool {
        self.0 & Self::GAME_OVER.0 != 0
    }

    /// Final result signalled by these flags, if any.
    ///
    /// Checked in the same order the server sets them: X, O, tie.
    pub fn outcome(self) -> Option<Outcome> {
        if self.contains(Self::X_WINS) {
            Some(Outcome::XWins)
        } else if self.contains(Self::O_WINS) {
            Some(Outcome::OWins)
        } else if self.contains(Self::TIE) {
            Some(Outcome::Tie)
        } else {
            None
        }
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

// ============================================================================
// Message
// ============================================================================

/// One datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Game identifier (24 bits).
    pub session_id: SessionId,

    /// Move counter; the server echoes it back.
    pub sequence: Sequence,

    pub flags: Flags,

    pub board: Board,

    /// Human-readable status, prompt or player name. May be empty.
    pub text: String,
}

impl Message {
    /// Build a message, rejecting session ids wider than 24 bits.
    pub fn new(
        session_id: SessionId,
        sequence: Sequence,
        flags: Flags,
        board: Board,
        text: impl Into<String>,
    ) -> Result<Self, WireError> {
        if session_id > SESSION_ID_MAX {
            return Err(WireError::SessionIdOutOfRange(session_id));
        }
        Ok(Self {
            session_id,
            sequence,
            flags,
            board,
            text: text.into(),
        })
    }

    /// Serialize into a newly allocated datagram.
    ///
    /// Bits of `session_id` above bit 23 are dropped; [`Message::new`]
    /// rejects such ids up front.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.text.len());

        let id_seq = ((self.session_id & SESSION_ID_MAX) << 8) | u32::from(self.sequence);
        buf.extend_from_slice(&id_seq.to_be_bytes());
        buf.extend_from_slice(&self.flags.bits().to_be_bytes());
        // low three bytes of the big-endian u32
        buf.extend_from_slice(&self.board.packed().to_be_bytes()[1..]);
        buf.extend_from_slice(self.text.as_bytes());

        buf
    }

    /// Parse a datagram. Exact inverse of [`Message::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() < HEADER_LEN {
            return Err(WireError::MalformedMessage { len: bytes.len() });
        }

        let id_seq = u32::from_be_bytes([
            bytes[OFF_ID_SEQ],
            bytes[OFF_ID_SEQ + 1],
            bytes[OFF_ID_SEQ + 2],
            bytes[OFF_ID_SEQ + 3],
        ]);
        let flags = u16::from_be_bytes([bytes[OFF_FLAGS], bytes[OFF_FLAGS + 1]]);
        let packed = u32::from_be_bytes([
            0,
            bytes[OFF_BOARD],
            bytes[OFF_BOARD + 1],
            bytes[OFF_BOARD + 2],
        ]);

        let board = Board::from_packed(packed)?;
        let text = std::str::from_utf8(&bytes[HEADER_LEN..])?;

        Ok(Self {
            session_id: id_seq >> 8,
            sequence: (id_seq & 0xFF) as Sequence,
            flags: Flags::from_bits(flags),
            board,
            text: text.to_owned(),
        })
    }
}

// ============================================================================
// Conversion Traits
// ============================================================================

/// Result flag for a finished outcome; `InProgress` maps to no bits.
impl From<Outcome> for Flags {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::InProgress => Flags::NONE,
            Outcome::XWins => Flags::X_WINS,
            Outcome::OWins => Flags::O_WINS,
            Outcome::Tie => Flags::TIE,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use noughts_sim::{Cell, CellIndex};

    use super::*;

    fn idx(i: usize) -> CellIndex {
        CellIndex::new(i).unwrap()
    }

    fn sample_board() -> Board {
        Board::EMPTY
            .with(idx(0), Cell::X)
            .with(idx(4), Cell::O)
            .with(idx(8), Cell::X)
    }

    #[test]
    fn test_roundtrip_full_header() {
        let msg = Message::new(
            0xABCDEF,
            0x12,
            Flags::O_TO_MOVE,
            sample_board(),
            "Server's turn.",
        )
        .unwrap();
        let decoded = Message::decode(&msg.encode()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_roundtrip_field_extremes() {
        let msg = Message::new(
            SESSION_ID_MAX,
            u8::MAX,
            Flags::from_bits(u16::MAX),
            Board::EMPTY,
            "",
        )
        .unwrap();
        assert_eq!(Message::decode(&msg.encode()).unwrap(), msg);

        let msg = Message::new(0, 0, Flags::NONE, Board::EMPTY, "Zoë ✓").unwrap();
        assert_eq!(Message::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn test_header_layout() {
        let board = Board::EMPTY.with(idx(0), Cell::X).with(idx(8), Cell::O);
        let msg = Message::new(0xABCDEF, 0x12, Flags::X_TO_MOVE, board, "hi").unwrap();
        let bytes = msg.encode();

        assert_eq!(bytes.len(), HEADER_LEN + 2);
        assert_eq!(&bytes[0..4], &[0xAB, 0xCD, 0xEF, 0x12]);
        assert_eq!(&bytes[4..6], &[0x00, 0x01]);
        // X at bits 16-17, O at bits 0-1
        assert_eq!(&bytes[6..9], &[0x01, 0x00, 0x02]);
        assert_eq!(&bytes[9..], b"hi");
    }

    #[test]
    fn test_cell_zero_survives_encoding() {
        let board = Board::EMPTY.with(idx(0), Cell::O);
        let msg = Message::new(1, 1, Flags::NONE, board, "").unwrap();
        let decoded = Message::decode(&msg.encode()).unwrap();
        assert_eq!(decoded.board.get(idx(0)), Cell::O);
    }

    #[test]
    fn test_short_datagram_is_malformed() {
        for len in 0..HEADER_LEN {
            let bytes = vec![0u8; len];
            assert_eq!(
                Message::decode(&bytes),
                Err(WireError::MalformedMessage { len })
            );
        }
    }

    #[test]
    fn test_header_only_has_empty_text() {
        let decoded = Message::decode(&[0u8; HEADER_LEN]).unwrap();
        assert_eq!(decoded.text, "");
        assert_eq!(decoded.board, Board::EMPTY);
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut bytes = Message::new(5, 0, Flags::NONE, Board::EMPTY, "")
            .unwrap()
            .encode();
        bytes.extend_from_slice(&[b'o', b'k', 0xFF, 0xFE]);
        assert!(matches!(
            Message::decode(&bytes),
            Err(WireError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_invalid_board_rejected() {
        let mut bytes = vec![0u8; HEADER_LEN];
        // cell 8 (bits 0-1) set to 0b11
        bytes[8] = 0b11;
        assert_eq!(
            Message::decode(&bytes),
            Err(WireError::InvalidBoard(SimError::InvalidCell {
                index: 8,
                bits: 3
            }))
        );

        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[6] = 0b0000_0100;
        assert!(matches!(
            Message::decode(&bytes),
            Err(WireError::InvalidBoard(SimError::ExcessBits { .. }))
        ));
    }

    #[test]
    fn test_session_id_range() {
        assert_eq!(
            Message::new(SESSION_ID_MAX + 1, 0, Flags::NONE, Board::EMPTY, ""),
            Err(WireError::SessionIdOutOfRange(SESSION_ID_MAX + 1))
        );
    }

    #[test]
    fn test_flags_game_over() {
        assert!(!Flags::X_TO_MOVE.is_game_over());
        assert!(!(Flags::X_TO_MOVE | Flags::O_TO_MOVE).is_game_over());
        assert!(Flags::X_WINS.is_game_over());
        assert!(Flags::O_WINS.is_game_over());
        assert!(Flags::TIE.is_game_over());
        assert_eq!(Flags::GAME_OVER.bits(), 0b11100);
    }

    #[test]
    fn test_flags_outcome_conversion() {
        for outcome in [Outcome::XWins, Outcome::OWins, Outcome::Tie] {
            assert_eq!(Flags::from(outcome).outcome(), Some(outcome));
        }
        assert_eq!(Flags::from(Outcome::InProgress), Flags::NONE);
        assert_eq!(Flags::X_TO_MOVE.outcome(), None);
    }
}
