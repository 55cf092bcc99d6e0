//! Reference players used by static rosters and tests.
//!
//! None of them plays well. [`ValidPlayer`] only ever plays legal moves, [`BreakerPlayer`]
//! breaks a rule on its first turn, and [`HangingPlayer`] never answers a placement request.

use std::thread;

use tracing::debug;

use crate::board::{Board, Pos, BOARD_SIZE};
use crate::player_interface::{Player, Turn};
use crate::results::TournamentResult;
use crate::rules::{self, WINNING_HEIGHT};

/// Free tile furthest from the opponent's workers (sum of distances), first in column order
/// on ties.
fn far_placement(board: &Board, opponent: &str) -> Pos {
    let enemies = board.workers_for(opponent);
    let mut best: Option<(i32, Pos)> = None;
    for x in 0..BOARD_SIZE {
        for y in 0..BOARD_SIZE {
            let pos = Pos::new(x, y);
            if !rules::check_place_worker(board, pos) {
                continue;
            }
            let distance: i32 = enemies.iter().map(|w| w.pos().distance(&pos)).sum();
            if !matches!(best, Some((d, _)) if d >= distance) {
                best = Some((distance, pos));
            }
        }
    }
    best.map_or(Pos::new(0, 0), |(_, pos)| pos)
}

/// Every legal move + build of `player`, worker by worker.
fn legal_turns(board: &Board, player: &str) -> Vec<Turn> {
    let mut turns = vec![];
    for worker in board.workers_for(player) {
        let from = worker.pos();
        for to in from.neighbors() {
            if !rules::check_move(board, from, to) {
                continue;
            }
            let Ok(moved) = board.move_worker(player, worker.id(), to) else {
                continue;
            };
            for build in to.neighbors() {
                if rules::check_build(&moved, to, build) {
                    turns.push(Turn::MoveBuild {
                        worker: worker.id(),
                        to,
                        build,
                    });
                }
            }
        }
    }
    turns
}

/// A winning move if there is one, otherwise the first legal turn.
fn first_legal_turn(board: &Board, player: &str) -> Turn {
    for worker in board.workers_for(player) {
        let from = worker.pos();
        let winning = from.neighbors().into_iter().find(|&to| {
            rules::check_move(board, from, to)
                && board
                    .tile_at(to)
                    .is_ok_and(|tile| tile.floors() == WINNING_HEIGHT)
        });
        if let Some(to) = winning {
            return Turn::Move {
                worker: worker.id(),
                to,
            };
        }
    }
    legal_turns(board, player)
        .into_iter()
        .next()
        .unwrap_or(Turn::GiveUp)
}

/// Plays legal moves only: places far from the opponent, takes a win when it sees one.
#[derive(Debug, Clone, Default)]
pub struct ValidPlayer {
    name: String,
    opponent: String,
}

impl ValidPlayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            opponent: String::new(),
        }
    }
}

impl Player for ValidPlayer {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn set_opponent(&mut self, name: &str) {
        self.opponent = name.to_string();
    }

    fn place_worker(&mut self, board: &Board) -> Pos {
        far_placement(board, &self.opponent)
    }

    fn next_turn(&mut self, board: &Board) -> Turn {
        first_legal_turn(board, &self.name)
    }

    fn receive_tournament_result(&mut self, result: &TournamentResult) {
        debug!(player = %self.name, matches = result.matches.len(), "got results");
    }
}

/// Places like [`ValidPlayer`], then always moves its first worker to `(0, 0)` and builds
/// there, which no rule allows.
#[derive(Debug, Clone, Default)]
pub struct BreakerPlayer {
    inner: ValidPlayer,
}

impl BreakerPlayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: ValidPlayer::new(name),
        }
    }
}

impl Player for BreakerPlayer {
    fn name(&self) -> String {
        self.inner.name()
    }

    fn set_name(&mut self, name: &str) {
        self.inner.set_name(name);
    }

    fn set_opponent(&mut self, name: &str) {
        self.inner.set_opponent(name);
    }

    fn place_worker(&mut self, board: &Board) -> Pos {
        self.inner.place_worker(board)
    }

    fn next_turn(&mut self, _: &Board) -> Turn {
        Turn::MoveBuild {
            worker: 0,
            to: Pos::new(0, 0),
            build: Pos::new(0, 0),
        }
    }

    fn receive_tournament_result(&mut self, result: &TournamentResult) {
        self.inner.receive_tournament_result(result);
    }
}

/// Never returns from [`Player::place_worker`]. Plays like [`ValidPlayer`] otherwise.
#[derive(Debug, Clone, Default)]
pub struct HangingPlayer {
    inner: ValidPlayer,
}

impl HangingPlayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: ValidPlayer::new(name),
        }
    }
}

impl Player for HangingPlayer {
    fn name(&self) -> String {
        self.inner.name()
    }

    fn set_name(&mut self, name: &str) {
        self.inner.set_name(name);
    }

    fn set_opponent(&mut self, name: &str) {
        self.inner.set_opponent(name);
    }

    fn place_worker(&mut self, _: &Board) -> Pos {
        loop {
            thread::park();
        }
    }

    fn next_turn(&mut self, board: &Board) -> Turn {
        self.inner.next_turn(board)
    }

    fn receive_tournament_result(&mut self, result: &TournamentResult) {
        self.inner.receive_tournament_result(result);
    }
}
