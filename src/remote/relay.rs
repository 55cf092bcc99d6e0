use std::net::{TcpStream, ToSocketAddrs};

use anyhow::Context;
use tracing::{debug, info, instrument, warn};

use super::{wire, JsonStream};
use crate::player_interface::Player;
use crate::results::TournamentResult;

/// Client-side driver connecting a local [`Player`] to a tournament server.
pub struct PlayerRelay<P: Player> {
    player: P,
    name: String,
    connection: JsonStream,
}

impl<P: Player> PlayerRelay<P> {
    /// Connect to `addr` and register under the player's own name.
    ///
    /// # Errors
    /// Fails if the server cannot be reached.
    pub fn connect(player: P, addr: impl ToSocketAddrs) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).context("could not reach the tournament server")?;
        let mut connection = JsonStream::new(stream)?;
        let name = player.name();
        connection
            .send(&serde_json::Value::String(name.clone()))
            .context("could not register")?;
        Ok(Self {
            player,
            name,
            connection,
        })
    }

    /// Answer the server until it sends the final results or closes the connection.
    ///
    /// Returns the results, or `None` if the server hung up before sending them.
    ///
    /// # Errors
    /// Fails on transport errors and on messages that match no known shape.
    #[instrument(skip_all, fields(player = %self.name))]
    pub fn run(mut self) -> anyhow::Result<Option<TournamentResult>> {
        use wire::ServerMessage::*;

        while let Some(value) = self.connection.receive(None)? {
            let message = wire::decode_server_message(&value)
                .with_context(|| format!("unexpected message from server: {value}"))?;
            match message {
                Opponent(name) => {
                    debug!(opponent = %name);
                    self.player.set_opponent(&name);
                }
                Rename(name) => {
                    info!(%name, "renamed by server");
                    self.player.set_name(&name);
                    self.name = name;
                }
                Placement(board) => {
                    let pos = self.player.place_worker(&board);
                    self.connection.send(&wire::encode_pos(pos))?;
                }
                Turn(board) => {
                    let turn = self.player.next_turn(&board);
                    let reply = wire::encode_turn(&turn, &board, &self.name).unwrap_or_else(|e| {
                        warn!("turn cannot be sent, giving up instead: {e}");
                        wire::give_up()
                    });
                    self.connection.send(&reply)?;
                }
                Results(result) => {
                    self.player.receive_tournament_result(&result);
                    self.connection.shutdown();
                    return Ok(Some(result));
                }
            }
        }
        info!("server closed the connection");
        Ok(None)
    }
}
