//! Noughts Server
//!
//! The server owns every game. Clients report the board they see after
//! placing X; the server reconciles it with its stored copy, checks for a
//! result, lets the automated opponent answer as O and replies with the
//! authoritative board.
//!
//! # Architecture
//!
//! [`Server`] is a synchronous state machine over decoded datagrams: it
//! performs no I/O and reads no clock. [`serve`] is the only async piece.
//! It owns the `Server` on a single task, so datagrams for a session are
//! processed strictly one after another.

#![deny(unsafe_code)]

pub mod session;
pub mod validation;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use noughts_sim::{MoveSelector, RandomOpponent};
use noughts_wire::{MAX_DATAGRAM_LEN, Message, SessionId};
use rand_chacha::ChaCha8Rng;
use session::{Session, SessionState};
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};
use validation::MoveStrictness;

// ============================================================================
// Parameters
// ============================================================================

/// Default UDP port.
pub const DEFAULT_PORT: u16 = 12345;

/// Bounds on how often idle sessions are swept.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(100);
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// ============================================================================
// Eviction Policy
// ============================================================================

/// When sessions are dropped from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Sessions live as long as the process.
    #[default]
    Never,
    /// Drop sessions that have not received a datagram for this long.
    IdleFor(Duration),
}

impl EvictionPolicy {
    pub fn is_expired(&self, last_seen: Instant, now: Instant) -> bool {
        match self {
            Self::Never => false,
            Self::IdleFor(limit) => now.saturating_duration_since(last_seen) >= *limit,
        }
    }

    /// How often the serve loop should sweep, if at all.
    pub fn sweep_interval(&self) -> Option<Duration> {
        match self {
            Self::Never => None,
            Self::IdleFor(limit) => {
                Some((*limit / 2).clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL))
            }
        }
    }
}

// ============================================================================
// Server State
// ============================================================================

/// Server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Seed for the default opponent.
    pub seed: u64,
    pub strictness: MoveStrictness,
    pub eviction: EvictionPolicy,
}

/// Session table plus the opponent that answers every game.
pub struct Server<S: MoveSelector = RandomOpponent<ChaCha8Rng>> {
    config: ServerConfig,
    sessions: HashMap<SessionId, Session>,
    opponent: S,
}

impl Server {
    /// Create a server whose opponent is seeded from `config.seed`.
    pub fn new(config: ServerConfig) -> Self {
        let opponent = RandomOpponent::seeded(config.seed);
        Self::with_opponent(config, opponent)
    }
}

impl<S: MoveSelector> Server<S> {
    /// Create a server with a caller-supplied opponent.
    pub fn with_opponent(config: ServerConfig, opponent: S) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
            opponent,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Ids of all live sessions, in no particular order.
    pub fn session_ids(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.sessions.keys().copied()
    }

    /// Decode a datagram and produce the encoded reply.
    ///
    /// Undecodable datagrams are logged and yield `None`; no session is
    /// created or touched.
    pub fn handle_datagram(
        &mut self,
        bytes: &[u8],
        from: SocketAddr,
        now: Instant,
    ) -> Option<Vec<u8>> {
        match Message::decode(bytes) {
            Ok(message) => Some(self.handle_message(message, from, now).encode()),
            Err(e) => {
                warn!(%from, len = bytes.len(), error = %e, "discarding datagram");
                None
            }
        }
    }

    /// Apply one decoded message to its session and build the reply.
    ///
    /// The reply always echoes the request's session id and sequence.
    pub fn handle_message(&mut self, message: Message, from: SocketAddr, now: Instant) -> Message {
        let Message {
            session_id,
            sequence,
            board,
            text,
            ..
        } = message;

        let reply = match self.sessions.entry(session_id) {
            Entry::Vacant(slot) => {
                info!(session_id, %from, player = %text, "session created");
                let session = slot.insert(Session::new(session_id, from, text, now));
                session.touch(sequence, now);
                session.welcome()
            }
            Entry::Occupied(mut slot) => {
                let session = slot.get_mut();
                if session.addr != from {
                    debug!(
                        session_id,
                        expected = %session.addr,
                        %from,
                        "datagram from a different address"
                    );
                }
                session.touch(sequence, now);

                let was_finished = session.is_finished();
                let reply =
                    session.receive_board(board, self.config.strictness, &mut self.opponent);
                if !was_finished && let SessionState::Finished(reason) = session.state() {
                    info!(session_id, reason = reason.as_str(), "game over");
                }
                reply
            }
        };

        debug!(
            session_id,
            sequence,
            flags = reply.flags.bits(),
            board = reply.board.packed(),
            "reply"
        );

        Message {
            session_id,
            sequence,
            flags: reply.flags,
            board: reply.board,
            text: reply.text,
        }
    }

    /// Drop sessions the eviction policy considers idle. Returns how many
    /// were removed.
    pub fn evict_idle(&mut self, now: Instant) -> usize {
        let policy = self.config.eviction;
        let before = self.sessions.len();
        self.sessions.retain(|id, session| {
            let expired = policy.is_expired(session.last_seen(), now);
            if expired {
                debug!(session_id = *id, "evicting idle session");
            }
            !expired
        });
        before - self.sessions.len()
    }
}

// ============================================================================
// Serve Loop
// ============================================================================

/// Receive datagrams on `socket` and answer each one, forever.
///
/// Receive and send failures are logged and the loop keeps going. When the
/// eviction policy is enabled, idle sessions are swept on a timer.
pub async fn serve<S: MoveSelector>(socket: UdpSocket, mut server: Server<S>) {
    let sweep_every = server.config().eviction.sweep_interval();
    let mut sweep = tokio::time::interval(sweep_every.unwrap_or(MAX_SWEEP_INTERVAL));
    let mut buf = vec![0u8; MAX_DATAGRAM_LEN];

    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => {
                let (len, from) = match received {
                    Ok(received) => received,
                    Err(e) => {
                        error!(error = %e, "recv_from failed");
                        continue;
                    }
                };
                debug!(%from, len, "datagram received");

                let Some(reply) = server.handle_datagram(&buf[..len], from, Instant::now()) else {
                    continue;
                };
                if let Err(e) = socket.send_to(&reply, from).await {
                    error!(%from, error = %e, "send_to failed");
                }
            }
            _ = sweep.tick(), if sweep_every.is_some() => {
                let evicted = server.evict_idle(Instant::now());
                if evicted > 0 {
                    info!(evicted, remaining = server.session_count(), "idle sessions evicted");
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
