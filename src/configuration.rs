//! Tournament settings and setups.
//!
//! [`Configuration`] holds the knobs shared by every tournament. It can be created
//! programmatically using [`Configuration::new()`] or by reading environment variables using
//! [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional. Invalid values fall back to the default.
//!
//! - `SANTORINI_GAMES_PER_ROUND`: games in each best-of series (default: `3`)
//! - `SANTORINI_TIMEOUT_MS`: time a local player has to answer any call (default: `10000`)
//! - `SANTORINI_LOG`: set to `"true"` to log to a file (default: `false`)
//!
//! A [`TournamentConfig`] produces the players and observers of one tournament:
//! [`StaticConfig`] builds a roster of local reference players from JSON, [`RemoteConfig`]
//! waits for players connecting over TCP.

use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::observer::JsonObserver;
use crate::player_interface::{Observer, Player};
use crate::players::{BreakerPlayer, HangingPlayer, ValidPlayer};
use crate::remote::{PlayerRelay, ProxyPlayer};
use crate::timeout_player::{TimeoutPlayer, WrappedPlayer};

const DEFAULT_GAMES_PER_ROUND: usize = 3;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Settings shared by every tournament.
#[derive(Debug, Clone, Copy)]
pub struct Configuration {
    pub(crate) games_per_round: usize,
    pub(crate) timeout: Duration,
    pub(crate) log: bool,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - Each pair of players plays a best of 3.
    /// - Local players get 10 seconds per call.
    /// - Logging to file is disabled.
    pub fn new() -> Self {
        Self {
            games_per_round: DEFAULT_GAMES_PER_ROUND,
            timeout: DEFAULT_TIMEOUT,
            log: false,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// See the [module documentation](self) for the recognized variables.
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        fn get_env_number(var: &str) -> Option<u64> {
            std::env::var(var).ok()?.trim().parse().ok()
        }

        let defaults = Self::new();
        Self {
            games_per_round: get_env_number("SANTORINI_GAMES_PER_ROUND")
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.games_per_round),
            timeout: get_env_number("SANTORINI_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
            log: get_env_flag("SANTORINI_LOG", defaults.log),
        }
    }

    /// Set the number of games of each series. Should be odd.
    pub fn with_games_per_round(mut self, value: usize) -> Self {
        self.games_per_round = value;
        self
    }

    /// Set the time a local player has to answer a call.
    pub fn with_timeout(mut self, value: Duration) -> Self {
        self.timeout = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    pub fn games_per_round(&self) -> usize {
        self.games_per_round
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

/// Players and observers taking part in a tournament.
#[derive(Default)]
pub struct Components {
    pub players: Vec<Arc<dyn WrappedPlayer>>,
    pub observers: Vec<Arc<dyn Observer>>,
}

/// Source of the participants of a tournament.
pub trait TournamentConfig {
    /// Build every player and observer.
    ///
    /// # Errors
    /// Fails if the participants cannot be gathered (e.g. the listening port is taken).
    fn generate_components(&self, config: &Configuration) -> anyhow::Result<Components>;
}

/// Behavior of a reference player in a static roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    /// Plays legal moves.
    Good,
    /// Breaks a rule on its first turn.
    Breaker,
    /// Never answers a placement request.
    Infinite,
}

/// `[kind, name, location]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StaticPlayer(pub PlayerKind, pub String, pub String);

/// `[name, location]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StaticObserver(pub String, pub String);

/// A fixed roster of reference players, read from JSON:
///
/// ```json
/// {
///   "players": [["good", "alice", "local"], ["breaker", "bob", "local"]],
///   "observers": [["watcher", "stdout"]],
///   "ip": "127.0.0.1",
///   "port": 8000
/// }
/// ```
///
/// Observers always print to stdout. `ip` and `port` are only used by
/// [`StaticConfig::client_relays`].
#[derive(Debug, Clone, Deserialize)]
pub struct StaticConfig {
    pub players: Vec<StaticPlayer>,
    #[serde(default)]
    pub observers: Vec<StaticObserver>,
    #[serde(default = "default_ip")]
    pub ip: String,
    #[serde(default)]
    pub port: u16,
}

fn default_ip() -> String {
    Ipv4Addr::LOCALHOST.to_string()
}

impl StaticConfig {
    /// # Errors
    /// Fails on malformed JSON or an unknown player kind.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("invalid static tournament configuration")
    }

    fn build_player(&self, StaticPlayer(kind, name, _): &StaticPlayer) -> Box<dyn Player> {
        match kind {
            PlayerKind::Good => Box::new(ValidPlayer::new(name)),
            PlayerKind::Breaker => Box::new(BreakerPlayer::new(name)),
            PlayerKind::Infinite => Box::new(HangingPlayer::new(name)),
        }
    }

    fn build_observers(&self) -> Vec<Arc<dyn Observer>> {
        self.observers
            .iter()
            .map(|StaticObserver(name, _)| {
                Arc::new(JsonObserver::stdout(name)) as Arc<dyn Observer>
            })
            .collect()
    }

    /// Connect every roster player to the tournament server at `ip:port` instead of running
    /// them locally.
    ///
    /// # Errors
    /// Fails if any connection cannot be made.
    pub fn client_relays(&self) -> anyhow::Result<Vec<PlayerRelay<Box<dyn Player>>>> {
        self.players
            .iter()
            .map(|entry| {
                PlayerRelay::connect(self.build_player(entry), (self.ip.as_str(), self.port))
                    .with_context(|| format!("could not connect player {}", entry.1))
            })
            .collect()
    }
}

impl TournamentConfig for StaticConfig {
    fn generate_components(&self, config: &Configuration) -> anyhow::Result<Components> {
        let players = self
            .players
            .iter()
            .map(|entry| {
                Arc::new(TimeoutPlayer::new(self.build_player(entry), config.timeout))
                    as Arc<dyn WrappedPlayer>
            })
            .collect();
        Ok(Components {
            players,
            observers: self.build_observers(),
        })
    }
}

/// Players connecting over TCP.
///
/// Connections are accepted for `wait`. If fewer than `min_players` completed the
/// registration by then, the window starts over, keeping the players already accepted.
#[derive(Debug, Clone, Copy)]
pub struct RemoteConfig {
    pub min_players: usize,
    pub wait: Duration,
    pub port: u16,
    /// Time a remote player has to answer any request, registration included.
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(min_players: usize, wait: Duration, port: u16, timeout: Duration) -> Self {
        Self {
            min_players,
            wait,
            port,
            timeout,
        }
    }

    /// Accept players on `listener` until the acceptance window closes with enough of them.
    ///
    /// Connections that fail to register are dropped and do not count. Connections accepted
    /// before the window closed still get their full timeout to register.
    ///
    /// # Errors
    /// Fails if the listener cannot be switched to non-blocking mode.
    #[instrument(skip_all, fields(min_players = self.min_players))]
    pub fn accept_players(
        &self,
        listener: &TcpListener,
    ) -> anyhow::Result<Vec<Arc<dyn WrappedPlayer>>> {
        listener
            .set_nonblocking(true)
            .context("server error: setting non-blocking to true")?;

        let (tx, rx) = mpsc::channel();
        let mut players: Vec<Arc<dyn WrappedPlayer>> = vec![];
        let mut deadline = Instant::now() + self.wait;

        loop {
            match listener.accept() {
                Ok((stream, addr)) => {
                    debug!(%addr, "new connection");
                    let tx = tx.clone();
                    let timeout = self.timeout;
                    thread::spawn(move || {
                        let player = stream
                            .set_nonblocking(false)
                            .context("server error: setting blocking for the connection")
                            .and_then(|()| ProxyPlayer::handshake(stream, timeout));
                        let _ = tx.send((addr, player));
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => warn!("accept failed: {e}"),
            }

            while let Ok((addr, player)) = rx.try_recv() {
                register(&mut players, addr, player);
            }

            if Instant::now() >= deadline {
                if players.len() >= self.min_players {
                    break;
                }
                debug!(players = players.len(), "not enough players, waiting longer");
                deadline = Instant::now() + self.wait;
            }
            thread::sleep(POLL_INTERVAL);
        }

        // every handshake still running holds a sender and reports within its timeout
        drop(tx);
        for (addr, player) in rx {
            register(&mut players, addr, player);
        }

        let _ = listener.set_nonblocking(false);
        Ok(players)
    }
}

fn register(
    players: &mut Vec<Arc<dyn WrappedPlayer>>,
    addr: SocketAddr,
    player: anyhow::Result<ProxyPlayer>,
) {
    match player {
        Ok(player) => {
            info!(%addr, name = player.registered_name(), "player joined");
            players.push(Arc::new(player));
        }
        Err(e) => warn!(%addr, "registration failed: {e:#}"),
    }
}

impl TournamentConfig for RemoteConfig {
    fn generate_components(&self, _: &Configuration) -> anyhow::Result<Components> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, self.port))
            .with_context(|| format!("could not listen on port {}", self.port))?;
        info!(port = self.port, "waiting for players");
        Ok(Components {
            players: self.accept_players(&listener)?,
            observers: vec![],
        })
    }
}
