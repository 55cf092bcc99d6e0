//! # Santorini Tournament
//!
//! A referee and a round-robin tournament manager for two-player Santorini, with a line
//! based JSON protocol for players running in other processes.
//!
//! It provides:
//! - The board, its rules and game results (`board`, `rules`, `results`)
//! - A [`Referee`](crate::referee::Referee) playing single games and best-of-N series
//! - A [`TournamentManager`](crate::tournament::TournamentManager) pairing every two players
//!   once and excluding rule breakers
//! - Call timeouts and crash isolation for in-process players
//!   ([`TimeoutPlayer`](crate::timeout_player::TimeoutPlayer))
//! - TCP proxies and relays for remote players (the [`remote`] module)
//!
//! # Documentation Overview
//!
//! - For the rules of a move, a build or a placement, see [`rules`].
//! - For configuring games per series, call timeouts and logging, see
//!   [`Configuration`](crate::configuration::Configuration).
//! - For filling a tournament from a JSON roster or from TCP connections, see
//!   [`StaticConfig`](crate::configuration::StaticConfig) and
//!   [`RemoteConfig`](crate::configuration::RemoteConfig).
//! - For writing a player or an observer, see the [`Player`](crate::player_interface::Player)
//!   and [`Observer`](crate::player_interface::Observer) traits.
//!
//! # Usage Example
//!
//! ```no_run
//! use santorini_tournament::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let roster = StaticConfig::from_json(
//!         r#"{ "players": [["good", "alice", ""], ["breaker", "bob", ""], ["good", "carol", ""]] }"#,
//!     )?;
//!     let config = Configuration::new().with_games_per_round(3);
//!     let mut manager = TournamentManager::new(config)?;
//!     let result = manager.run_with_config(&roster)?;
//!     for m in &result.matches {
//!         println!("{} beat {} (rule broken: {})", m.winner, m.loser, m.rule_broken);
//!     }
//!     println!("kicked: {:?}", result.kicked);
//!     Ok(())
//! }
//! ```
//!
//! # Remote Players
//!
//! A remote player connects over TCP and sends its name as a JSON string. The server then
//! sends one JSON value per request and reads one JSON value back for placement and turn
//! requests. [`PlayerRelay`](crate::remote::PlayerRelay) does all of this for any local
//! [`Player`](crate::player_interface::Player):
//!
//! ```no_run
//! use santorini_tournament::players::ValidPlayer;
//! use santorini_tournament::remote::PlayerRelay;
//!
//! fn main() -> anyhow::Result<()> {
//!     let relay = PlayerRelay::connect(ValidPlayer::new("alice"), "127.0.0.1:8000")?;
//!     let result = relay.run()?;
//!     println!("{result:?}");
//!     Ok(())
//! }
//! ```

pub use anyhow;
pub mod board;
pub mod configuration;
mod logger;
pub mod observer;
pub mod player_interface;
pub mod players;
pub mod referee;
pub mod remote;
pub mod results;
pub mod rules;
pub mod timeout_player;
pub mod tournament;

/// Commonly used types and traits for quick access.
///
/// ```rust
/// use santorini_tournament::prelude::*;
/// ```
pub mod prelude {
    pub use crate::board::{Board, Direction, Pos, Tile, Worker};
    pub use crate::configuration::{
        Configuration, RemoteConfig, StaticConfig, TournamentConfig,
    };
    pub use crate::observer::JsonObserver;
    pub use crate::player_interface::{Observer, Player, Turn};
    pub use crate::referee::Referee;
    pub use crate::results::{MatchResult, TournamentResult};
    pub use crate::rules::{EndReason, GameResult};
    pub use crate::timeout_player::{PlayerError, TimeoutPlayer, WrappedPlayer};
    pub use crate::tournament::TournamentManager;
}
