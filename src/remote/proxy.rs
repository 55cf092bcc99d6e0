use std::io;
use std::net::TcpStream;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Context};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::{is_timeout, wire, JsonStream};
use crate::board::{Board, Pos};
use crate::player_interface::Turn;
use crate::results::TournamentResult;
use crate::timeout_player::{PlayerError, WrappedPlayer};

/// Server-side stand-in for a player connected over TCP.
///
/// Each reply must arrive in full within the timeout. The first failure (timeout, transport
/// error, unreadable reply) drops the connection and every later call fails with
/// [`PlayerError::Defunct`], so a late reply can never answer a later request.
pub struct ProxyPlayer {
    registered: String,
    name: Mutex<String>,
    timeout: Duration,
    connection: Mutex<Option<JsonStream>>,
}

impl ProxyPlayer {
    /// Wait up to `timeout` for the client to register its name.
    ///
    /// # Errors
    /// Fails if the client sends nothing, closes the connection, or sends anything but a
    /// JSON string.
    #[instrument(skip_all, fields(peer = ?stream.peer_addr().ok()))]
    pub fn handshake(stream: TcpStream, timeout: Duration) -> anyhow::Result<Self> {
        let mut connection = JsonStream::new(stream)?;
        let registration = connection
            .receive(Some(timeout))
            .context("no registration received")?;
        let name = match registration {
            Some(Value::String(name)) => name,
            Some(other) => bail!("expected a name, got {other}"),
            None => bail!("connection closed before registration"),
        };
        debug!(%name, "registered");
        Ok(Self {
            registered: name.clone(),
            name: Mutex::new(name),
            timeout,
            connection: Mutex::new(Some(connection)),
        })
    }

    /// Name the client registered with, before any renaming.
    pub fn registered_name(&self) -> &str {
        &self.registered
    }

    fn current_name(&self) -> Result<String, PlayerError> {
        self.name
            .lock()
            .map(|name| name.clone())
            .map_err(|_| PlayerError::Crashed { call: "name" })
    }

    /// Send `message` and, if `reply` is set, wait for the answer.
    fn exchange(
        &self,
        call: &'static str,
        message: &Value,
        reply: bool,
    ) -> Result<Option<Value>, PlayerError> {
        let mut guard = self
            .connection
            .lock()
            .map_err(|_| PlayerError::Crashed { call })?;
        let connection = guard.as_mut().ok_or(PlayerError::Defunct)?;

        let result = connection.send(message).and_then(|()| {
            if reply {
                connection.receive(Some(self.timeout))
            } else {
                Ok(None)
            }
        });

        match result {
            Ok(Some(value)) => Ok(Some(value)),
            Ok(None) if !reply => Ok(None),
            Ok(None) => {
                *guard = None;
                warn!(call, "connection closed by peer");
                Err(PlayerError::Disconnected {
                    reason: "connection closed by peer".into(),
                })
            }
            Err(e) => {
                *guard = None;
                Err(self.classify(call, e))
            }
        }
    }

    fn classify(&self, call: &'static str, error: io::Error) -> PlayerError {
        if is_timeout(&error) {
            warn!(call, "remote player timed out");
            PlayerError::Timeout {
                call,
                millis: self.timeout.as_millis(),
            }
        } else if error.kind() == io::ErrorKind::InvalidData {
            warn!(call, "unreadable reply: {error}");
            PlayerError::Protocol {
                reason: error.to_string(),
            }
        } else {
            warn!(call, "connection failed: {error}");
            PlayerError::Disconnected {
                reason: error.to_string(),
            }
        }
    }

    /// Decoding failures are protocol violations and end the connection.
    fn reject(&self, call: &'static str, error: wire::WireError) -> PlayerError {
        warn!(call, "invalid reply: {error}");
        if let Ok(mut guard) = self.connection.lock() {
            *guard = None;
        }
        PlayerError::Protocol {
            reason: error.to_string(),
        }
    }

    fn request(&self, call: &'static str, message: &Value) -> Result<Value, PlayerError> {
        self.exchange(call, message, true)?
            .ok_or(PlayerError::Defunct)
    }
}

impl WrappedPlayer for ProxyPlayer {
    fn name(&self) -> Result<String, PlayerError> {
        self.current_name()
    }

    fn set_name(&self, name: &str) -> Result<(), PlayerError> {
        self.exchange("set_name", &wire::encode_rename(name), false)?;
        let mut current = self
            .name
            .lock()
            .map_err(|_| PlayerError::Crashed { call: "set_name" })?;
        *current = name.to_string();
        Ok(())
    }

    fn set_opponent(&self, name: &str) -> Result<(), PlayerError> {
        self.exchange("set_opponent", &wire::encode_opponent(name), false)?;
        Ok(())
    }

    #[instrument(skip_all, fields(player = %self.registered))]
    fn place_worker(&self, board: &Board) -> Result<Pos, PlayerError> {
        let reply = self.request("place_worker", &wire::encode_workers(board))?;
        wire::decode_pos(&reply).map_err(|e| self.reject("place_worker", e))
    }

    #[instrument(skip_all, fields(player = %self.registered))]
    fn next_turn(&self, board: &Board) -> Result<Turn, PlayerError> {
        let reply = self.request("next_turn", &wire::encode_board(board))?;
        let owner = self.current_name()?;
        wire::decode_turn(&reply, board, &owner).map_err(|e| self.reject("next_turn", e))
    }

    fn receive_tournament_result(&self, result: &TournamentResult) -> Result<(), PlayerError> {
        self.exchange(
            "receive_tournament_result",
            &wire::encode_results(result),
            false,
        )?;
        if let Ok(mut guard) = self.connection.lock() {
            if let Some(connection) = guard.take() {
                connection.shutdown();
            }
        }
        Ok(())
    }
}
