//! Round-robin tournaments.
//!
//! The [`TournamentManager`] accepts players under unique names, pairs every two of them once
//! in acceptance order, and runs a best-of-N series for each pair with a fresh
//! [`Referee`]. A player losing a series on a broken rule is excluded on the spot: it plays
//! no further series and its earlier results are rewritten as losses. Once all pairs are
//! done, every player, excluded or not, receives the final [`TournamentResult`].

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, instrument, warn};

use crate::configuration::{Configuration, TournamentConfig};
use crate::logger::init_logger;
use crate::player_interface::Observer;
use crate::referee::Referee;
use crate::results::{MatchResult, TournamentResult};
use crate::timeout_player::WrappedPlayer;

/// A player accepted in a tournament, under a name unique in that tournament.
#[derive(Clone)]
pub struct User {
    name: String,
    player: Arc<dyn WrappedPlayer>,
}

impl User {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Runs a round-robin tournament among the players it accepted.
pub struct TournamentManager {
    config: Configuration,
    users: Vec<User>,
    excluded: Vec<User>,
    matches: Vec<MatchResult>,
    observers: Vec<Arc<dyn Observer>>,
}

impl TournamentManager {
    /// Create an empty tournament.
    ///
    /// # Errors
    /// Fails if `config` asks for a log file and the logger cannot be installed.
    #[instrument(skip_all)]
    pub fn new(config: Configuration) -> anyhow::Result<Self> {
        if config.log {
            init_logger().context("could not set up logging")?;
        }
        info!(?config);
        Ok(Self {
            config,
            users: vec![],
            excluded: vec![],
            matches: vec![],
            observers: vec![],
        })
    }

    /// Accept every player and observer produced by `setup`, then run the tournament.
    ///
    /// # Errors
    /// Fails only if `setup` cannot produce its components.
    pub fn run_with_config(
        &mut self,
        setup: &dyn TournamentConfig,
    ) -> anyhow::Result<TournamentResult> {
        let components = setup
            .generate_components(&self.config)
            .context("could not set up the tournament")?;
        for player in components.players {
            self.accept_player(player);
        }
        for observer in components.observers {
            self.attach_observer(observer);
        }
        Ok(self.run())
    }

    /// Accept `player` and return the name it plays under.
    ///
    /// The player keeps its own name if it is made of lowercase ASCII letters only and is not
    /// taken yet. Otherwise it gets the first free name among `a`, `b`, .., `z`, `aa`, `ab`, ..
    /// and is told so.
    pub fn accept_player(&mut self, player: Arc<dyn WrappedPlayer>) -> String {
        let wanted = player.name().unwrap_or_else(|e| {
            warn!("could not get player name: {e}");
            String::new()
        });
        let name = if is_valid_name(&wanted) && !self.is_taken(&wanted) {
            wanted
        } else {
            let fallback = (1..)
                .map(alphabetic_name)
                .find(|candidate| !self.is_taken(candidate))
                .unwrap_or_default();
            info!(%wanted, %fallback, "renaming player");
            if let Err(e) = player.set_name(&fallback) {
                warn!(name = %fallback, "could not rename player: {e}");
            }
            fallback
        };
        self.users.push(User {
            name: name.clone(),
            player,
        });
        name
    }

    fn is_taken(&self, name: &str) -> bool {
        self.users
            .iter()
            .chain(&self.excluded)
            .any(|user| user.name == name)
    }

    pub fn attach_observer(&mut self, observer: Arc<dyn Observer>) {
        self.observers.push(observer);
    }

    /// Remove every observer called `name`.
    pub fn detach_observer(&mut self, name: &str) {
        self.observers.retain(|o| o.name() != name);
    }

    /// Players still in the tournament, in acceptance order.
    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// Play every pairing and send the final results to everyone.
    #[instrument(skip_all, fields(players = self.users.len()))]
    pub fn run(&mut self) -> TournamentResult {
        let entrants = self.users.clone();
        for (first, second) in round_robin(entrants.len()) {
            let (a, b) = (&entrants[first], &entrants[second]);
            if self.is_excluded(&a.name) || self.is_excluded(&b.name) {
                continue;
            }
            self.run_series(a, b);
        }

        let result = TournamentResult {
            matches: self.matches.clone(),
            kicked: self.excluded.iter().map(|u| u.name.clone()).collect(),
        };
        info!(matches = result.matches.len(), kicked = ?result.kicked, "tournament over");

        for user in self.users.iter().chain(&self.excluded) {
            if let Err(e) = user.player.receive_tournament_result(&result) {
                warn!(user = %user.name, "could not deliver results: {e}");
            }
        }
        result
    }

    #[instrument(skip_all, fields(first = %a.name, second = %b.name))]
    fn run_series(&mut self, a: &User, b: &User) {
        let mut referee = match Referee::new(&a.name, a.player.clone(), &b.name, b.player.clone())
        {
            Ok(referee) => referee,
            Err(e) => {
                warn!("skipping series: {e}");
                return;
            }
        };
        for observer in &self.observers {
            referee.attach_observer(observer.clone());
        }
        let games = referee.best_of(self.config.games_per_round);
        for observer in &self.observers {
            referee.detach_observer(observer);
        }

        let Some(result) = MatchResult::from_games(games) else {
            warn!("series produced no game");
            return;
        };
        info!(winner = %result.winner, loser = %result.loser, broken = result.rule_broken);
        let cheater = result.rule_broken.then(|| result.loser.clone());
        self.matches.push(result);
        if let Some(cheater) = cheater {
            self.exclude(&cheater);
        }
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.excluded.iter().any(|u| u.name == name)
    }

    /// Drop `name` from the tournament and rewrite its history as losses.
    fn exclude(&mut self, name: &str) {
        let Some(index) = self.users.iter().position(|u| u.name == name) else {
            return;
        };
        warn!(user = name, "excluded for breaking a rule");
        let user = self.users.remove(index);
        self.excluded.push(user);
        self.matches = std::mem::take(&mut self.matches)
            .into_iter()
            .map(|m| m.penalize(name))
            .collect();
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase())
}

/// `n`-th name of the sequence `a`, .., `z`, `aa`, `ab`, .., starting at 1.
fn alphabetic_name(mut n: usize) -> String {
    let mut name = Vec::new();
    while n > 0 {
        n -= 1;
        name.push(char::from(b'a' + (n % 26) as u8));
        n /= 26;
    }
    name.iter().rev().collect()
}

/// Every unordered pair of `0..n`, each once, in lexicographic order.
fn round_robin(n: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in i + 1..n {
            pairs.push((i, j));
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::board::{Board, Pos};
    use crate::player_interface::Turn;
    use crate::timeout_player::PlayerError;

    struct Named {
        name: Mutex<String>,
        received: Mutex<Option<TournamentResult>>,
    }

    impl Named {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: Mutex::new(name.to_string()),
                received: Mutex::new(None),
            })
        }
    }

    impl WrappedPlayer for Named {
        fn name(&self) -> Result<String, PlayerError> {
            Ok(self.name.lock().unwrap().clone())
        }

        fn set_name(&self, name: &str) -> Result<(), PlayerError> {
            *self.name.lock().unwrap() = name.to_string();
            Ok(())
        }

        fn set_opponent(&self, _: &str) -> Result<(), PlayerError> {
            Ok(())
        }

        fn place_worker(&self, _: &Board) -> Result<Pos, PlayerError> {
            Err(PlayerError::Defunct)
        }

        fn next_turn(&self, _: &Board) -> Result<Turn, PlayerError> {
            Err(PlayerError::Defunct)
        }

        fn receive_tournament_result(&self, result: &TournamentResult) -> Result<(), PlayerError> {
            *self.received.lock().unwrap() = Some(result.clone());
            Ok(())
        }
    }

    fn manager() -> TournamentManager {
        TournamentManager::new(Configuration::new()).unwrap()
    }

    #[test]
    fn fallback_names_count_in_base_26() {
        let names: Vec<_> = [1, 2, 26, 27, 28, 52, 53, 702, 703]
            .into_iter()
            .map(alphabetic_name)
            .collect();
        assert_eq!(
            names,
            ["a", "b", "z", "aa", "ab", "az", "ba", "zz", "aaa"]
        );
    }

    #[test]
    fn round_robin_pairs_each_once() {
        assert_eq!(round_robin(3), vec![(0, 1), (0, 2), (1, 2)]);
        assert_eq!(round_robin(5).len(), 10);
        assert!(round_robin(1).is_empty());
        assert!(round_robin(0).is_empty());
    }

    #[test]
    fn names_are_unique_and_lowercase() {
        let mut manager = manager();
        let players = [
            Named::new("alice"),
            Named::new("alice"),
            Named::new("Bob"),
            Named::new(""),
            Named::new("a"),
            Named::new("x1"),
        ];
        let names: Vec<_> = players
            .iter()
            .map(|p| manager.accept_player(p.clone()))
            .collect();
        assert_eq!(names, ["alice", "a", "b", "c", "d", "e"]);
        // "a" was taken by a fallback before its owner arrived
        assert_eq!(players[2].name().unwrap(), "b");
        assert_eq!(players[0].name().unwrap(), "alice");
    }

    #[test]
    fn everyone_gets_the_results() {
        let mut manager = manager();
        let players = [Named::new("uno"), Named::new("dos"), Named::new("tres")];
        for player in &players {
            manager.accept_player(player.clone());
        }
        // uno fails to place against dos and is excluded; dos then fails against tres
        let result = manager.run();
        assert_eq!(result.kicked, ["uno", "dos"]);
        assert_eq!(result.matches.len(), 2);
        for player in &players {
            assert_eq!(player.received.lock().unwrap().as_ref(), Some(&result));
        }
        assert_eq!(manager.users().len(), 1);
        assert_eq!(manager.users()[0].name(), "tres");
    }

    #[test]
    fn observers_detach_by_name() {
        struct Quiet;
        impl Observer for Quiet {
            fn name(&self) -> String {
                "quiet".into()
            }
            fn receive_board(&self, _: &Board) {}
            fn receive_turn(
                &self,
                _: &str,
                _: crate::board::Direction,
                _: crate::board::Direction,
            ) {
            }
            fn receive_winning_move(&self, _: &str, _: crate::board::Direction) {}
            fn receive_endgame(&self, _: &crate::rules::GameResult) {}
        }
        let mut manager = manager();
        manager.attach_observer(Arc::new(Quiet));
        manager.attach_observer(Arc::new(Quiet));
        manager.detach_observer("quiet");
        assert!(manager.observers.is_empty());
    }
}
