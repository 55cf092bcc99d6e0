//! Drives games between two wrapped players.
//!
//! A game goes through worker placement, where the players alternate until each has placed
//! [`WORKER_COUNT`] workers, then through turns until someone wins, cannot move, or breaks a
//! rule. Every player answer is checked against [`crate::rules`] before the board changes;
//! any error or illegal answer ends the game with that player as a rule-breaking loser.
//! Nothing a player does can make a game fail: every game ends with a [`GameResult`].

use std::sync::Arc;

use anyhow::ensure;
use tracing::{info, instrument, warn};

use crate::board::{Board, Direction, PLAYER_COUNT, WORKER_COUNT};
use crate::player_interface::{Observer, Turn};
use crate::rules::{self, EndReason, GameResult};
use crate::timeout_player::WrappedPlayer;

/// What a single turn led to.
enum TurnOutcome {
    Continue(Board),
    Over(GameResult),
}

/// Referee for a series of games between the same two players.
pub struct Referee {
    names: [String; PLAYER_COUNT],
    players: [Arc<dyn WrappedPlayer>; PLAYER_COUNT],
    observers: Vec<Arc<dyn Observer>>,
}

impl Referee {
    /// The first player always places and moves first.
    ///
    /// # Errors
    /// Fails if both players have the same name, as workers are told apart by owner name.
    pub fn new(
        first_name: impl Into<String>,
        first: Arc<dyn WrappedPlayer>,
        second_name: impl Into<String>,
        second: Arc<dyn WrappedPlayer>,
    ) -> anyhow::Result<Self> {
        let names = [first_name.into(), second_name.into()];
        ensure!(names[0] != names[1], "both players are named {}", names[0]);
        Ok(Self {
            names,
            players: [first, second],
            observers: vec![],
        })
    }

    pub fn attach_observer(&mut self, observer: Arc<dyn Observer>) {
        self.observers.push(observer);
    }

    /// Remove `observer`, compared by identity.
    pub fn detach_observer(&mut self, observer: &Arc<dyn Observer>) {
        self.observers.retain(|o| !Arc::ptr_eq(o, observer));
    }

    /// Play a single game on a fresh board.
    #[instrument(skip_all, fields(first = %self.names[0], second = %self.names[1]))]
    pub fn play(&self) -> GameResult {
        let board = Board::new();
        self.notify(|o| o.receive_board(&board));

        let result = match self.place_workers(board) {
            Ok(board) => self.play_turns(board, 0),
            Err(result) => result,
        };

        info!(
            winner = %result.winner,
            loser = %result.loser,
            reason = %result.reason,
            "game over"
        );
        self.notify(|o| o.receive_endgame(&result));
        result
    }

    /// Play up to `games` games and return every result, in order.
    ///
    /// The series stops as soon as a player has won a strict majority of `games`, or right
    /// after a game ending on a broken rule. A player that cannot be told who its opponent is
    /// loses the series before any game starts.
    #[instrument(
        skip_all,
        fields(first = %self.names[0], second = %self.names[1], games = games)
    )]
    pub fn best_of(&self, games: usize) -> Vec<GameResult> {
        for current in 0..PLAYER_COUNT {
            let other = opponent(current);
            if let Err(e) = self.players[current].set_opponent(&self.names[other]) {
                warn!(player = %self.names[current], "could not set opponent: {e}");
                return vec![self.rule_broken(current)];
            }
        }

        let mut wins = [0; PLAYER_COUNT];
        let mut results = Vec::with_capacity(games);
        for _ in 0..games {
            let result = self.play();
            let winner = usize::from(result.winner == self.names[1]);
            wins[winner] += 1;
            let broken = result.broken_rule;
            results.push(result);
            if broken || wins[winner] * 2 > games {
                break;
            }
        }
        results
    }

    fn place_workers(&self, mut board: Board) -> Result<Board, GameResult> {
        for _ in 0..WORKER_COUNT {
            for current in 0..PLAYER_COUNT {
                let pos = self.players[current].place_worker(&board).map_err(|e| {
                    warn!(player = %self.names[current], "placement failed: {e}");
                    self.rule_broken(current)
                })?;
                if !rules::check_place_worker(&board, pos) {
                    warn!(player = %self.names[current], %pos, "illegal placement");
                    return Err(self.rule_broken(current));
                }
                board = board.place_worker(pos, &self.names[current]).map_err(|e| {
                    warn!(player = %self.names[current], "placement rejected: {e}");
                    self.rule_broken(current)
                })?;
                self.notify(|o| o.receive_board(&board));
            }
        }
        Ok(board)
    }

    fn play_turns(&self, mut board: Board, first: usize) -> GameResult {
        let mut current = first;
        loop {
            if rules::check_loss_pre_move(&board, &self.names[current]) {
                return self.result(opponent(current), current, EndReason::NoLegalMove);
            }
            let turn = match self.players[current].next_turn(&board) {
                Ok(turn) => turn,
                Err(e) => {
                    warn!(player = %self.names[current], "turn failed: {e}");
                    return self.rule_broken(current);
                }
            };
            match self.apply_turn(&board, current, turn) {
                TurnOutcome::Continue(next) => board = next,
                TurnOutcome::Over(result) => return result,
            }
            current = opponent(current);
        }
    }

    fn apply_turn(&self, board: &Board, current: usize, turn: Turn) -> TurnOutcome {
        let name = &self.names[current];
        let broken = |why: &str| {
            warn!(player = %name, ?turn, "{why}");
            TurnOutcome::Over(self.rule_broken(current))
        };

        let (id, to) = match turn {
            Turn::GiveUp => return broken("gave up"),
            Turn::Move { worker, to } | Turn::MoveBuild { worker, to, .. } => (worker, to),
        };
        let Ok(worker) = board.find_worker(name, id) else {
            return broken("unknown worker");
        };
        let worker_name = worker.name();
        let from = worker.pos();
        if !rules::check_move(board, from, to) {
            return broken("illegal move");
        }
        let Some(move_dir) = Direction::between(from, to) else {
            return broken("move is not a single step");
        };
        let Ok(board) = board.move_worker(name, id, to) else {
            return broken("move rejected by the board");
        };
        self.notify(|o| o.receive_board(&board));

        if rules::check_win_post_move(&board, name) {
            self.notify(|o| o.receive_winning_move(&worker_name, move_dir));
            let result = self.result(current, opponent(current), EndReason::WinningMove);
            return TurnOutcome::Over(result);
        }

        let Some(build) = turn.build_at() else {
            return broken("moved without building or winning");
        };
        if !rules::check_build(&board, to, build) {
            return broken("illegal build");
        }
        let Some(build_dir) = Direction::between(to, build) else {
            return broken("build is not a single step");
        };
        let Ok(board) = board.add_floor(build) else {
            return broken("build rejected by the board");
        };
        self.notify(|o| o.receive_board(&board));
        self.notify(|o| o.receive_turn(&worker_name, move_dir, build_dir));
        TurnOutcome::Continue(board)
    }

    fn rule_broken(&self, loser: usize) -> GameResult {
        GameResult::rule_broken(&self.names[opponent(loser)], &self.names[loser])
    }

    fn result(&self, winner: usize, loser: usize, reason: EndReason) -> GameResult {
        GameResult::regular(&self.names[winner], &self.names[loser], reason)
    }

    fn notify(&self, event: impl Fn(&dyn Observer)) {
        for observer in &self.observers {
            event(observer.as_ref());
        }
    }
}

fn opponent(player: usize) -> usize {
    (player + 1) % PLAYER_COUNT
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::board::{Pos, Tile};
    use crate::results::TournamentResult;
    use crate::timeout_player::PlayerError;

    /// Replays a fixed script of placements and turns.
    struct Scripted {
        placements: Mutex<Vec<Pos>>,
        turns: Mutex<Vec<Turn>>,
        fail_opponent: bool,
    }

    impl Scripted {
        fn new(placements: &[(i32, i32)], turns: Vec<Turn>) -> Arc<Self> {
            Arc::new(Self {
                placements: Mutex::new(
                    placements.iter().rev().map(|&(x, y)| Pos::new(x, y)).collect(),
                ),
                turns: Mutex::new(turns.into_iter().rev().collect()),
                fail_opponent: false,
            })
        }
    }

    impl WrappedPlayer for Scripted {
        fn name(&self) -> Result<String, PlayerError> {
            Ok("scripted".into())
        }

        fn set_name(&self, _: &str) -> Result<(), PlayerError> {
            Ok(())
        }

        fn set_opponent(&self, _: &str) -> Result<(), PlayerError> {
            if self.fail_opponent {
                Err(PlayerError::Defunct)
            } else {
                Ok(())
            }
        }

        fn place_worker(&self, _: &Board) -> Result<Pos, PlayerError> {
            self.placements.lock().unwrap().pop().ok_or(PlayerError::Defunct)
        }

        fn next_turn(&self, _: &Board) -> Result<Turn, PlayerError> {
            Ok(self.turns.lock().unwrap().pop().unwrap_or(Turn::GiveUp))
        }

        fn receive_tournament_result(&self, _: &TournamentResult) -> Result<(), PlayerError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Observer for Recorder {
        fn name(&self) -> String {
            "recorder".into()
        }

        fn receive_board(&self, _: &Board) {
            self.0.lock().unwrap().push("board".into());
        }

        fn receive_turn(&self, worker: &str, _: Direction, _: Direction) {
            self.0.lock().unwrap().push(format!("turn {worker}"));
        }

        fn receive_winning_move(&self, worker: &str, _: Direction) {
            self.0.lock().unwrap().push(format!("win {worker}"));
        }

        fn receive_endgame(&self, result: &GameResult) {
            self.0.lock().unwrap().push(format!("end {}", result.winner));
        }
    }

    fn mb(worker: usize, to: (i32, i32), build: (i32, i32)) -> Turn {
        Turn::MoveBuild {
            worker,
            to: to.into(),
            build: build.into(),
        }
    }

    fn referee(a: Arc<Scripted>, b: Arc<Scripted>) -> Referee {
        Referee::new("uno", a, "dos", b).unwrap()
    }

    #[test]
    fn same_names_are_refused() {
        let a = Scripted::new(&[], vec![]);
        assert!(Referee::new("uno", a.clone(), "uno", a).is_err());
    }

    #[test]
    fn double_placement_on_same_tile_is_broken() {
        let a = Scripted::new(&[(0, 0), (0, 0)], vec![]);
        let b = Scripted::new(&[(5, 5), (5, 4)], vec![]);
        let result = referee(a, b).play();
        assert_eq!(result, GameResult::rule_broken("dos", "uno"));
    }

    #[test]
    fn second_player_copying_placement_loses() {
        let a = Scripted::new(&[(0, 0), (1, 0)], vec![]);
        let b = Scripted::new(&[(0, 0)], vec![]);
        let result = referee(a, b).play();
        assert_eq!(result, GameResult::rule_broken("uno", "dos"));
    }

    #[test]
    fn illegal_build_is_broken() {
        let a = Scripted::new(&[(0, 0), (5, 0)], vec![mb(0, (1, 1), (4, 4))]);
        let b = Scripted::new(&[(0, 5), (5, 5)], vec![]);
        let result = referee(a, b).play();
        assert!(result.broken_rule);
        assert_eq!(result.loser, "uno");
    }

    #[test]
    fn move_only_without_win_is_broken() {
        let a = Scripted::new(
            &[(0, 0), (5, 0)],
            vec![Turn::Move {
                worker: 0,
                to: Pos::new(1, 1),
            }],
        );
        let b = Scripted::new(&[(0, 5), (5, 5)], vec![]);
        assert_eq!(referee(a, b).play(), GameResult::rule_broken("dos", "uno"));
    }

    #[test]
    fn climbing_wins_and_notifies_in_order() {
        // uno1 hops between (0,1) and (1,0), raising the tile it just left
        let uno = Scripted::new(
            &[(0, 0), (5, 0)],
            vec![
                mb(0, (0, 1), (1, 0)),
                mb(0, (1, 0), (0, 1)),
                mb(0, (0, 1), (1, 0)),
                mb(0, (1, 0), (0, 1)),
                mb(0, (0, 1), (1, 0)),
                mb(0, (1, 0), (0, 1)),
            ],
        );
        let dos = Scripted::new(
            &[(0, 5), (5, 5)],
            vec![
                mb(1, (5, 4), (5, 5)),
                mb(1, (5, 5), (5, 4)),
                mb(1, (5, 4), (5, 5)),
                mb(1, (5, 5), (5, 4)),
                mb(1, (5, 4), (5, 5)),
            ],
        );
        let mut referee = referee(uno, dos);
        let recorder = Arc::new(Recorder::default());
        referee.attach_observer(recorder.clone());

        let result = referee.play();
        assert_eq!(
            result,
            GameResult::regular("uno", "dos", EndReason::WinningMove)
        );

        let events = recorder.0.lock().unwrap();
        assert_eq!(events.first().map(String::as_str), Some("board"));
        assert_eq!(
            &events[events.len() - 3..],
            ["board".to_string(), "win uno1".into(), "end uno".into()]
        );
        assert!(events.contains(&"turn dos2".to_string()));
    }

    #[test]
    fn detached_observers_hear_nothing() {
        let a = Scripted::new(&[(0, 0), (0, 0)], vec![]);
        let b = Scripted::new(&[(5, 5)], vec![]);
        let mut referee = referee(a, b);
        let recorder = Arc::new(Recorder::default());
        let observer: Arc<dyn Observer> = recorder.clone();
        referee.attach_observer(observer.clone());
        referee.detach_observer(&observer);
        referee.play();
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn boxed_in_player_loses_without_moving() {
        // dos cannot move: both workers are surrounded by domes and uno's workers
        let board = Board::with_tiles(
            [(1, 0), (1, 1), (0, 2), (1, 2), (4, 0), (4, 1), (5, 2), (4, 2)]
                .map(|(x, y)| Tile::with_height(Pos::new(x, y), 4)),
        );
        let board = board
            .place_worker(Pos::new(0, 1), "uno")
            .and_then(|b| b.place_worker(Pos::new(5, 1), "uno"))
            .and_then(|b| b.place_worker(Pos::new(0, 0), "dos"))
            .and_then(|b| b.place_worker(Pos::new(5, 0), "dos"))
            .unwrap();
        let a = Scripted::new(&[], vec![]);
        let b = Scripted::new(&[], vec![]);
        let referee = referee(a, b);
        assert!(rules::check_loss_pre_move(&board, "dos"));
        let result = referee.play_turns(board, 1);
        assert_eq!(
            result,
            GameResult::regular("uno", "dos", EndReason::NoLegalMove)
        );
    }

    #[test]
    fn series_stops_on_broken_rule() {
        let uno = Scripted::new(&[(0, 0), (0, 0)], vec![]);
        let dos = Scripted::new(&[(5, 5), (5, 4), (5, 5), (5, 4)], vec![]);
        let results = referee(uno, dos).best_of(3);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].winner, "dos");
    }

    #[test]
    fn failing_set_opponent_loses_the_series() {
        let uno = Scripted::new(&[], vec![]);
        let dos = Arc::new(Scripted {
            placements: Mutex::new(vec![]),
            turns: Mutex::new(vec![]),
            fail_opponent: true,
        });
        let results = referee(uno, dos).best_of(3);
        assert_eq!(results, vec![GameResult::rule_broken("uno", "dos")]);
    }
}
