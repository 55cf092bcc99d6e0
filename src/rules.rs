//! Rule predicates for Santorini.
//!
//! Every rule is a pure function of the board and the tiles involved. A move, build or
//! placement is legal iff every rule in the corresponding ordered list holds. The board
//! itself never checks these rules; the referee calls the `check_*` functions before
//! mutating the board.

use std::fmt;

use crate::board::{Board, Pos, Tile, MAX_HEIGHT};

/// Height a worker must stand on, right after moving, to win.
pub const WINNING_HEIGHT: u8 = 3;

type MoveRule = fn(&Board, &Tile, &Tile) -> bool;
type BuildRule = fn(&Board, &Tile, &Tile) -> bool;
type PlaceRule = fn(&Board, &Tile) -> bool;
type GameOverCondition = fn(&Board, &str) -> bool;

const MOVE_RULES: [MoveRule; 4] = [
    move_in_bounds,
    move_adjacent,
    move_at_most_one_floor_up,
    move_to_vacant,
];

const BUILD_RULES: [BuildRule; 4] = [
    build_in_bounds,
    build_adjacent,
    build_below_dome,
    build_on_vacant,
];

const PLACE_RULES: [PlaceRule; 2] = [place_in_bounds, place_on_vacant];

fn move_in_bounds(_: &Board, _: &Tile, to: &Tile) -> bool {
    to.pos().in_bounds()
}

fn move_adjacent(_: &Board, from: &Tile, to: &Tile) -> bool {
    from.is_neighbor(to)
}

fn move_at_most_one_floor_up(_: &Board, from: &Tile, to: &Tile) -> bool {
    from.floors() + 1 >= to.floors()
}

fn move_to_vacant(board: &Board, _: &Tile, to: &Tile) -> bool {
    board.worker_at(to.pos()).is_none()
}

fn build_in_bounds(_: &Board, _: &Tile, at: &Tile) -> bool {
    at.pos().in_bounds()
}

fn build_adjacent(_: &Board, worker: &Tile, at: &Tile) -> bool {
    worker.is_neighbor(at)
}

fn build_below_dome(_: &Board, _: &Tile, at: &Tile) -> bool {
    at.floors() < MAX_HEIGHT
}

fn build_on_vacant(board: &Board, _: &Tile, at: &Tile) -> bool {
    board.worker_at(at.pos()).is_none()
}

fn place_in_bounds(_: &Board, at: &Tile) -> bool {
    at.pos().in_bounds()
}

fn place_on_vacant(board: &Board, at: &Tile) -> bool {
    board.worker_at(at.pos()).is_none()
}

// checked before a player is asked for a turn
const LOSS_CONDITIONS: [GameOverCondition; 1] = [further_move_impossible];

// checked right after a move, before the build
const WIN_CONDITIONS: [GameOverCondition; 1] = [goal_floor_reached];

fn goal_floor_reached(board: &Board, player: &str) -> bool {
    board.workers_for(player).iter().any(|w| {
        board
            .tile_at(w.pos())
            .is_ok_and(|tile| tile.floors() == WINNING_HEIGHT)
    })
}

// Only move availability counts: a worker that can move but not build afterwards still
// counts as able to play.
fn further_move_impossible(board: &Board, player: &str) -> bool {
    !board
        .workers_for(player)
        .iter()
        .any(|w| w.pos().neighbors().into_iter().any(|n| check_move(board, w.pos(), n)))
}

/// True if a worker on `from` may move to `to`.
pub fn check_move(board: &Board, from: Pos, to: Pos) -> bool {
    let (Ok(from), Ok(to)) = (board.tile_at(from), board.tile_at(to)) else {
        return false;
    };
    MOVE_RULES.iter().all(|rule| rule(board, &from, &to))
}

/// True if a worker on `worker` may build on `at`.
pub fn check_build(board: &Board, worker: Pos, at: Pos) -> bool {
    let (Ok(worker), Ok(at)) = (board.tile_at(worker), board.tile_at(at)) else {
        return false;
    };
    BUILD_RULES.iter().all(|rule| rule(board, &worker, &at))
}

/// True if a worker may be placed on `at`.
pub fn check_place_worker(board: &Board, at: Pos) -> bool {
    let Ok(at) = board.tile_at(at) else {
        return false;
    };
    PLACE_RULES.iter().all(|rule| rule(board, &at))
}

/// True if `player` has already lost before acting: none of their workers can move.
///
/// Also true for a player with no worker on the board.
pub fn check_loss_pre_move(board: &Board, player: &str) -> bool {
    LOSS_CONDITIONS.iter().any(|cond| cond(board, player))
}

/// True if one of `player`'s workers stands on a tile of [`WINNING_HEIGHT`].
pub fn check_win_post_move(board: &Board, player: &str) -> bool {
    WIN_CONDITIONS.iter().any(|cond| cond(board, player))
}

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndReason {
    /// The loser broke a rule, timed out, or sent something unreadable.
    RuleBroken,
    /// The loser had no legal move at the start of their turn.
    NoLegalMove,
    /// The winner moved a worker onto the winning height.
    WinningMove,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EndReason::RuleBroken => "rules violation",
            EndReason::NoLegalMove => "player lost the game due to no valid moves possible",
            EndReason::WinningMove => "player won the game via a valid move",
        })
    }
}

/// Outcome of a single game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameResult {
    pub winner: String,
    pub loser: String,
    pub reason: EndReason,
    pub broken_rule: bool,
}

impl GameResult {
    /// A game lost by `loser` for breaking a rule.
    pub fn rule_broken(winner: impl Into<String>, loser: impl Into<String>) -> Self {
        Self {
            winner: winner.into(),
            loser: loser.into(),
            reason: EndReason::RuleBroken,
            broken_rule: true,
        }
    }

    /// A game that ended by the rules of Santorini.
    pub fn regular(winner: impl Into<String>, loser: impl Into<String>, reason: EndReason) -> Self {
        Self {
            winner: winner.into(),
            loser: loser.into(),
            reason,
            broken_rule: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Tile;

    fn board_with(tiles: &[(i32, i32, u8)], workers: &[(i32, i32, &str)]) -> Board {
        let mut board = Board::with_tiles(
            tiles
                .iter()
                .map(|&(x, y, h)| Tile::with_height(Pos::new(x, y), h)),
        );
        for &(x, y, owner) in workers {
            board = board.place_worker(Pos::new(x, y), owner).unwrap();
        }
        board
    }

    #[test]
    fn move_rejections() {
        let board = board_with(&[(2, 3, 2)], &[(2, 2, "uno"), (3, 3, "dos")]);
        let from = Pos::new(2, 2);
        assert!(check_move(&board, from, Pos::new(1, 1)));
        // not adjacent
        assert!(!check_move(&board, from, Pos::new(4, 2)));
        // same tile
        assert!(!check_move(&board, from, from));
        // occupied
        assert!(!check_move(&board, from, Pos::new(3, 3)));
        // two floors up
        assert!(!check_move(&board, from, Pos::new(2, 3)));
        // off the board
        assert!(!check_move(&board, Pos::new(0, 0), Pos::new(-1, 0)));
    }

    #[test]
    fn moving_down_any_height_is_fine() {
        let board = board_with(&[(2, 2, 3)], &[(2, 2, "uno")]);
        assert!(check_move(&board, Pos::new(2, 2), Pos::new(1, 1)));
    }

    #[test]
    fn build_rules() {
        let board = board_with(&[(1, 1, 4)], &[(2, 2, "uno"), (3, 3, "dos")]);
        let worker = Pos::new(2, 2);
        assert!(check_build(&board, worker, Pos::new(2, 1)));
        assert!(!check_build(&board, worker, Pos::new(1, 1)));
        assert!(!check_build(&board, worker, Pos::new(3, 3)));
        assert!(!check_build(&board, worker, Pos::new(4, 4)));
        assert!(!check_build(&board, Pos::new(0, 0), Pos::new(0, -1)));
    }

    #[test]
    fn placement_rules() {
        let board = board_with(&[], &[(0, 0, "uno")]);
        assert!(!check_place_worker(&board, Pos::new(0, 0)));
        assert!(!check_place_worker(&board, Pos::new(0, 6)));
        assert!(check_place_worker(&board, Pos::new(0, 1)));
    }

    #[test]
    fn boxed_in_player_has_lost() {
        // worker in the corner surrounded by domes
        let board = board_with(
            &[(0, 1, 4), (1, 0, 4), (1, 1, 2)],
            &[(0, 0, "uno"), (5, 5, "dos")],
        );
        let board = board.place_worker(Pos::new(5, 0), "uno").unwrap();
        // second worker is free
        assert!(!check_loss_pre_move(&board, "uno"));

        let trapped = board_with(
            &[(0, 1, 4), (1, 0, 4), (1, 1, 2), (5, 1, 4), (4, 0, 4), (4, 1, 4)],
            &[(0, 0, "uno"), (5, 0, "uno"), (3, 3, "dos")],
        );
        assert!(check_loss_pre_move(&trapped, "uno"));
        assert!(!check_loss_pre_move(&trapped, "dos"));
    }

    #[test]
    fn loss_ignores_build_availability() {
        // a single open neighbor is enough, whatever can be built from there
        let board = board_with(
            &[(0, 1, 4), (1, 1, 4), (2, 0, 4), (2, 1, 4)],
            &[(0, 0, "uno"), (3, 5, "dos")],
        );
        assert!(check_move(&board, Pos::new(0, 0), Pos::new(1, 0)));
        assert!(!check_loss_pre_move(&board, "uno"));
    }

    #[test]
    fn win_after_reaching_third_floor() {
        let board = board_with(&[(1, 1, 3), (0, 0, 2)], &[(0, 0, "uno"), (5, 5, "dos")]);
        assert!(!check_win_post_move(&board, "uno"));
        let moved = board.move_worker("uno", 0, Pos::new(1, 1)).unwrap();
        assert!(check_win_post_move(&moved, "uno"));
        assert!(!check_win_post_move(&moved, "dos"));
    }
}
