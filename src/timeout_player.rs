//! Fallible, time-bounded access to players.
//!
//! The referee and the tournament manager only see [`WrappedPlayer`]s. Two implementations
//! exist: [`TimeoutPlayer`] for players living in this process, and
//! [`ProxyPlayer`](crate::remote::ProxyPlayer) for players on the other side of a socket.

use std::sync::{
    mpsc::{self, RecvTimeoutError},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;

use derive_more::{Display, Error};
use tracing::{instrument, trace, warn};

use crate::board::{Board, Pos};
use crate::player_interface::{Player, Turn};
use crate::results::TournamentResult;

/// Why a call to a wrapped player produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum PlayerError {
    /// The call did not return in time.
    #[display("{call} timed out after {millis}ms")]
    Timeout {
        /// name of the call
        call: &'static str,
        /// timeout that elapsed
        millis: u128,
    },
    /// The player panicked, or its task could not be started.
    #[display("player crashed during {call}")]
    Crashed {
        /// name of the call
        call: &'static str,
    },
    /// Transport failure talking to a remote player.
    #[display("connection lost: {reason}")]
    Disconnected {
        /// underlying error
        reason: String,
    },
    /// The remote player answered something that is not a valid reply.
    #[display("protocol violation: {reason}")]
    Protocol {
        /// what was wrong with the reply
        reason: String,
    },
    /// The connection was abandoned after an earlier failure.
    #[display("connection is defunct")]
    Defunct,
}

/// A player whose every operation may fail instead of hanging or panicking.
///
/// Methods take `&self` so a handle can be shared between the tournament manager and the
/// referee of the current series.
pub trait WrappedPlayer: Send + Sync {
    fn name(&self) -> Result<String, PlayerError>;

    fn set_name(&self, name: &str) -> Result<(), PlayerError>;

    fn set_opponent(&self, name: &str) -> Result<(), PlayerError>;

    fn place_worker(&self, board: &Board) -> Result<Pos, PlayerError>;

    fn next_turn(&self, board: &Board) -> Result<Turn, PlayerError>;

    fn receive_tournament_result(&self, result: &TournamentResult) -> Result<(), PlayerError>;
}

/// Runs each call of a local [`Player`] on its own thread and gives up after `timeout`.
///
/// A timed out call is abandoned, not cancelled: its thread keeps the player locked until it
/// returns, so the following calls on a hung player time out too. Every call gets its own
/// channel, so a late answer is dropped instead of being read by a later call.
pub struct TimeoutPlayer {
    player: Arc<Mutex<Box<dyn Player>>>,
    timeout: Duration,
}

impl TimeoutPlayer {
    pub fn new(player: impl Player + 'static, timeout: Duration) -> Self {
        Self {
            player: Arc::new(Mutex::new(Box::new(player))),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn call<T, F>(&self, call: &'static str, f: F) -> Result<T, PlayerError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Player) -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        let player = Arc::clone(&self.player);

        thread::Builder::new()
            .name(format!("player-{call}"))
            .spawn(move || {
                // a poisoned lock drops `tx`, which the caller reads as a crash
                let Ok(mut guard) = player.lock() else {
                    return;
                };
                let _ = tx.send(f(guard.as_mut()));
            })
            .map_err(|e| {
                warn!("could not spawn player thread: {e}");
                PlayerError::Crashed { call }
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(value) => Ok(value),
            Err(RecvTimeoutError::Timeout) => {
                warn!(call, "player timed out");
                Err(PlayerError::Timeout {
                    call,
                    millis: self.timeout.as_millis(),
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!(call, "player crashed");
                Err(PlayerError::Crashed { call })
            }
        }
    }
}

impl WrappedPlayer for TimeoutPlayer {
    fn name(&self) -> Result<String, PlayerError> {
        self.call("name", |p| p.name())
    }

    fn set_name(&self, name: &str) -> Result<(), PlayerError> {
        let name = name.to_string();
        self.call("set_name", move |p| p.set_name(&name))
    }

    fn set_opponent(&self, name: &str) -> Result<(), PlayerError> {
        let name = name.to_string();
        self.call("set_opponent", move |p| p.set_opponent(&name))
    }

    #[instrument(skip_all)]
    fn place_worker(&self, board: &Board) -> Result<Pos, PlayerError> {
        let board = board.clone();
        let pos = self.call("place_worker", move |p| p.place_worker(&board))?;
        trace!(%pos);
        Ok(pos)
    }

    #[instrument(skip_all)]
    fn next_turn(&self, board: &Board) -> Result<Turn, PlayerError> {
        let board = board.clone();
        let turn = self.call("next_turn", move |p| p.next_turn(&board))?;
        trace!(?turn);
        Ok(turn)
    }

    fn receive_tournament_result(&self, result: &TournamentResult) -> Result<(), PlayerError> {
        let result = result.clone();
        self.call("receive_tournament_result", move |p| {
            p.receive_tournament_result(&result)
        })
    }
}
