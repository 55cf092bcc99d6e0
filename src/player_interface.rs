//! Traits a player implementation and an observer must satisfy.
//!
//! [`Player`] is the infallible contract implemented by strategies (AI, human driven,
//! adversarial, ...). The referee never talks to a [`Player`] directly: it goes through a
//! [`WrappedPlayer`](crate::timeout_player::WrappedPlayer), which turns hangs, panics and
//! transport failures into errors.

use crate::board::{Board, Direction, Pos};
use crate::results::TournamentResult;
use crate::rules::GameResult;

/// What a player returns for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// The player gives up. The referee treats it as a broken rule.
    GiveUp,
    /// Move only. Legal only if the move wins the game.
    Move {
        /// index of the worker to move
        worker: usize,
        /// target of the move
        to: Pos,
    },
    /// Move, then build next to the moved worker.
    MoveBuild {
        /// index of the worker to move
        worker: usize,
        /// target of the move
        to: Pos,
        /// where to add a floor, after the move
        build: Pos,
    },
}

impl Turn {
    /// Worker index, unless the player gave up.
    pub fn worker(&self) -> Option<usize> {
        match self {
            Turn::GiveUp => None,
            Turn::Move { worker, .. } | Turn::MoveBuild { worker, .. } => Some(*worker),
        }
    }

    /// Move target, unless the player gave up.
    pub fn move_to(&self) -> Option<Pos> {
        match self {
            Turn::GiveUp => None,
            Turn::Move { to, .. } | Turn::MoveBuild { to, .. } => Some(*to),
        }
    }

    /// Build target, if any.
    pub fn build_at(&self) -> Option<Pos> {
        match self {
            Turn::MoveBuild { build, .. } => Some(*build),
            _ => None,
        }
    }
}

/// A Santorini player.
///
/// Implementations may be slow, wrong, or hostile. Every call is bounded by the
/// [`TimeoutPlayer`](crate::timeout_player::TimeoutPlayer) that wraps them.
pub trait Player: Send {
    /// Name the player would like to use.
    fn name(&self) -> String;

    /// Name assigned by the tournament, which may differ from [`Player::name`].
    fn set_name(&mut self, name: &str);

    /// Name of the opponent for the upcoming series.
    fn set_opponent(&mut self, name: &str);

    /// Where to place the next worker.
    fn place_worker(&mut self, board: &Board) -> Pos;

    /// The next full turn.
    fn next_turn(&mut self, board: &Board) -> Turn;

    /// Final results, sent once when the tournament ends.
    fn receive_tournament_result(&mut self, result: &TournamentResult);
}

impl<P: Player + ?Sized> Player for Box<P> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn set_name(&mut self, name: &str) {
        (**self).set_name(name)
    }

    fn set_opponent(&mut self, name: &str) {
        (**self).set_opponent(name)
    }

    fn place_worker(&mut self, board: &Board) -> Pos {
        (**self).place_worker(board)
    }

    fn next_turn(&mut self, board: &Board) -> Turn {
        (**self).next_turn(board)
    }

    fn receive_tournament_result(&mut self, result: &TournamentResult) {
        (**self).receive_tournament_result(result)
    }
}

/// Push-only sink for game events.
///
/// Observers are notified in order: the board after each mutation, each completed turn,
/// a winning move, and each game result.
pub trait Observer: Send + Sync {
    fn name(&self) -> String;

    fn receive_board(&self, board: &Board);

    /// A completed move + build by `worker`.
    fn receive_turn(&self, worker: &str, move_dir: Direction, build_dir: Direction);

    fn receive_winning_move(&self, worker: &str, move_dir: Direction);

    fn receive_endgame(&self, result: &GameResult);
}
