//! Physical game state: positions, tiles, workers and the board itself.
//!
//! A [`Board`] is a value. Every operation that changes it ([`Board::place_worker`],
//! [`Board::move_worker`], [`Board::add_floor`]) returns a new board and leaves the
//! receiver untouched, so a board can be handed to another thread (a player call running
//! under a timeout, an observer) without any synchronization.
//!
//! The board only enforces its physical invariants (at most one worker per tile, two players,
//! two workers per player, four floors per tile). Whether a move or a build is *legal* is
//! decided by [`crate::rules`] before the board is asked to perform it.

use std::fmt;

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

/// Width and height of the board.
pub const BOARD_SIZE: i32 = 6;
/// Maximum number of floors on a single tile (a dome).
pub const MAX_HEIGHT: u8 = 4;
/// Number of players taking part in a game.
pub const PLAYER_COUNT: usize = 2;
/// Number of workers each player places.
pub const WORKER_COUNT: usize = 2;

/// Errors returned by board mutations.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum BoardError {
    /// Position lies outside the 6x6 grid.
    #[display("no tile at position {pos}")]
    OutOfBounds {
        /// offending position
        pos: Pos,
    },
    /// Another worker already stands on the tile.
    #[display("tile {pos} is already occupied")]
    Occupied {
        /// offending position
        pos: Pos,
    },
    /// The player already placed all of their workers.
    #[display("player {owner} already placed all workers")]
    TooManyWorkers {
        /// player name
        owner: String,
    },
    /// Adding this owner would make a third player.
    #[display("board is full of players, cannot add {owner}")]
    TooManyPlayers {
        /// player name
        owner: String,
    },
    /// Worker index outside `0..WORKER_COUNT`.
    #[display("worker id {id} is not valid")]
    InvalidWorkerId {
        /// offending index
        id: usize,
    },
    /// No such worker on the board.
    #[display("worker {owner}{} not found on the board", id + 1)]
    WorkerNotFound {
        /// player name
        owner: String,
        /// worker index
        id: usize,
    },
    /// Tile already has a dome.
    #[display("tile {pos} already reached the maximum height")]
    MaxHeight {
        /// offending position
        pos: Pos,
    },
}

/// A (column, row) coordinate. May lie outside the board when it comes from an untrusted
/// player; use [`Pos::in_bounds`] before indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Pos {
    /// Column, growing eastward.
    pub x: i32,
    /// Row, growing southward.
    pub y: i32,
}

impl Pos {
    /// Create a position.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// True if both coordinates are in `0..BOARD_SIZE`.
    pub fn in_bounds(&self) -> bool {
        (0..BOARD_SIZE).contains(&self.x) && (0..BOARD_SIZE).contains(&self.y)
    }

    /// Chebyshev (king-move) distance.
    pub fn distance(&self, other: &Pos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// True if `other` is exactly one king-move away.
    pub fn is_adjacent(&self, other: &Pos) -> bool {
        self.distance(other) == 1
    }

    /// In-bounds cells at distance 1, excluding `self`.
    pub fn neighbors(&self) -> Vec<Pos> {
        let mut neighbors = Vec::with_capacity(8);
        for dx in -1..=1 {
            for dy in -1..=1 {
                let candidate = Pos::new(self.x + dx, self.y + dy);
                if candidate != *self && candidate.in_bounds() {
                    neighbors.push(candidate);
                }
            }
        }
        neighbors
    }
}

impl From<(i32, i32)> for Pos {
    fn from((x, y): (i32, i32)) -> Self {
        Pos::new(x, y)
    }
}

impl From<Pos> for (i32, i32) {
    fn from(pos: Pos) -> Self {
        (pos.x, pos.y)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A tile and its building height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pos: Pos,
    floors: u8,
}

impl Tile {
    /// Empty tile at `pos`.
    pub fn new(pos: Pos) -> Self {
        Self { pos, floors: 0 }
    }

    /// Tile at `pos` with `floors` floors, capped at [`MAX_HEIGHT`].
    pub fn with_height(pos: Pos, floors: u8) -> Self {
        Self {
            pos,
            floors: floors.min(MAX_HEIGHT),
        }
    }

    pub fn pos(&self) -> Pos {
        self.pos
    }

    pub fn floors(&self) -> u8 {
        self.floors
    }

    /// Returns the tile with one more floor.
    ///
    /// # Errors
    /// [`BoardError::MaxHeight`] if the tile already has [`MAX_HEIGHT`] floors.
    pub fn add_floor(&self) -> Result<Tile, BoardError> {
        if self.floors >= MAX_HEIGHT {
            return Err(BoardError::MaxHeight { pos: self.pos });
        }
        Ok(Tile {
            pos: self.pos,
            floors: self.floors + 1,
        })
    }

    pub fn is_neighbor(&self, other: &Tile) -> bool {
        self.pos.is_adjacent(&other.pos)
    }
}

/// One of a player's pieces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Worker {
    owner: String,
    id: usize,
    pos: Pos,
}

impl Worker {
    pub fn new(owner: impl Into<String>, id: usize, pos: Pos) -> Self {
        Self {
            owner: owner.into(),
            id,
            pos,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Index of the worker among its owner's workers, in `0..WORKER_COUNT`.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn pos(&self) -> Pos {
        self.pos
    }

    /// Owner name followed by the 1-based worker index, e.g. `"alice2"`.
    pub fn name(&self) -> String {
        format!("{}{}", self.owner, self.id + 1)
    }

    /// The same worker standing on `target`.
    pub fn moved_to(&self, target: Pos) -> Worker {
        Worker {
            pos: target,
            ..self.clone()
        }
    }

    /// Split a display name into owner and 0-based worker index.
    ///
    /// The last character is the 1-based index; everything before it is the owner.
    pub fn parse_name(name: &str) -> Option<(String, usize)> {
        let mut chars = name.chars();
        let index = chars.next_back()?.to_digit(10)? as usize;
        let owner = chars.as_str();
        if owner.is_empty() || index == 0 || index > WORKER_COUNT {
            return None;
        }
        Some((owner.to_string(), index - 1))
    }
}

/// Whether `id` names one of a player's workers.
pub fn valid_worker_id(id: usize) -> bool {
    id < WORKER_COUNT
}

/// The 6x6 grid of building heights plus the workers standing on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    // heights[x][y]
    heights: [[u8; BOARD_SIZE as usize]; BOARD_SIZE as usize],
    workers: Vec<Worker>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Empty board, every tile at height 0.
    pub fn new() -> Self {
        Self {
            heights: [[0; BOARD_SIZE as usize]; BOARD_SIZE as usize],
            workers: Vec::with_capacity(PLAYER_COUNT * WORKER_COUNT),
        }
    }

    /// Board with the given tiles, every other tile at height 0.
    ///
    /// Out-of-bounds tiles are ignored.
    pub fn with_tiles(tiles: impl IntoIterator<Item = Tile>) -> Self {
        let mut board = Self::new();
        for tile in tiles {
            if tile.pos.in_bounds() {
                board.heights[tile.pos.x as usize][tile.pos.y as usize] = tile.floors;
            }
        }
        board
    }

    /// Board at height 0 holding the given workers.
    ///
    /// # Errors
    /// Fails on the same conditions as [`Board::place_worker`], or if a worker id is reused.
    pub fn with_workers(workers: impl IntoIterator<Item = Worker>) -> Result<Self, BoardError> {
        Self::new().with_placed(workers)
    }

    /// Returns this board with `workers` added, keeping their ids.
    ///
    /// # Errors
    /// Fails on the same conditions as [`Board::place_worker`], or if a worker id is reused.
    pub fn with_placed(
        &self,
        workers: impl IntoIterator<Item = Worker>,
    ) -> Result<Self, BoardError> {
        let mut board = self.clone();
        for worker in workers {
            if !valid_worker_id(worker.id) {
                return Err(BoardError::InvalidWorkerId { id: worker.id });
            }
            board.check_placement(worker.pos, &worker.owner)?;
            if board.find_worker(&worker.owner, worker.id).is_ok() {
                return Err(BoardError::TooManyWorkers {
                    owner: worker.owner,
                });
            }
            board.workers.push(worker);
        }
        Ok(board)
    }

    /// The tile at `pos`.
    ///
    /// # Errors
    /// [`BoardError::OutOfBounds`] if `pos` is off the board.
    pub fn tile_at(&self, pos: Pos) -> Result<Tile, BoardError> {
        if !pos.in_bounds() {
            return Err(BoardError::OutOfBounds { pos });
        }
        Ok(Tile {
            pos,
            floors: self.heights[pos.x as usize][pos.y as usize],
        })
    }

    /// The worker standing on `pos`, if any.
    pub fn worker_at(&self, pos: Pos) -> Option<&Worker> {
        self.workers.iter().find(|w| w.pos == pos)
    }

    /// All workers of `owner`, sorted by id.
    pub fn workers_for(&self, owner: &str) -> Vec<&Worker> {
        let mut workers: Vec<_> = self.workers.iter().filter(|w| w.owner == owner).collect();
        workers.sort_by_key(|w| w.id);
        workers
    }

    /// Every worker on the board, in placement order.
    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    /// Names of the players with at least one worker, sorted.
    pub fn players(&self) -> Vec<String> {
        let mut players: Vec<String> = Vec::with_capacity(PLAYER_COUNT);
        for worker in &self.workers {
            if !players.iter().any(|p| p == &worker.owner) {
                players.push(worker.owner.clone());
            }
        }
        players.sort();
        players
    }

    /// Find `owner`'s worker number `id`.
    ///
    /// # Errors
    /// [`BoardError::InvalidWorkerId`] or [`BoardError::WorkerNotFound`].
    pub fn find_worker(&self, owner: &str, id: usize) -> Result<&Worker, BoardError> {
        if !valid_worker_id(id) {
            return Err(BoardError::InvalidWorkerId { id });
        }
        self.workers
            .iter()
            .find(|w| w.owner == owner && w.id == id)
            .ok_or_else(|| BoardError::WorkerNotFound {
                owner: owner.to_string(),
                id,
            })
    }

    /// Returns a board with a new worker for `owner` on `pos`.
    ///
    /// The worker gets the next free index for its owner.
    ///
    /// # Errors
    /// Fails if `pos` is off the board or occupied, if `owner` already has
    /// [`WORKER_COUNT`] workers, or if `owner` would be a third player.
    pub fn place_worker(&self, pos: Pos, owner: &str) -> Result<Board, BoardError> {
        self.check_placement(pos, owner)?;
        let id = self.workers_for(owner).len();
        let mut board = self.clone();
        board.workers.push(Worker::new(owner, id, pos));
        Ok(board)
    }

    fn check_placement(&self, pos: Pos, owner: &str) -> Result<(), BoardError> {
        let players = self.players();
        if players.len() >= PLAYER_COUNT && !players.iter().any(|p| p == owner) {
            return Err(BoardError::TooManyPlayers {
                owner: owner.to_string(),
            });
        }
        if self.workers_for(owner).len() >= WORKER_COUNT {
            return Err(BoardError::TooManyWorkers {
                owner: owner.to_string(),
            });
        }
        self.tile_at(pos)?;
        if self.worker_at(pos).is_some() {
            return Err(BoardError::Occupied { pos });
        }
        Ok(())
    }

    /// Returns a board where `owner`'s worker `id` stands on `target`.
    ///
    /// No legality check: see [`crate::rules::check_move`].
    ///
    /// # Errors
    /// Fails only if the worker does not exist or `target` is off the board.
    pub fn move_worker(&self, owner: &str, id: usize, target: Pos) -> Result<Board, BoardError> {
        self.find_worker(owner, id)?;
        self.tile_at(target)?;
        let mut board = self.clone();
        for worker in board.workers.iter_mut() {
            if worker.owner == owner && worker.id == id {
                *worker = worker.moved_to(target);
            }
        }
        Ok(board)
    }

    /// Returns a board with one more floor on `target`.
    ///
    /// No legality check: see [`crate::rules::check_build`].
    ///
    /// # Errors
    /// Fails if `target` is off the board or already at [`MAX_HEIGHT`].
    pub fn add_floor(&self, target: Pos) -> Result<Board, BoardError> {
        let tile = self.tile_at(target)?.add_floor()?;
        let mut board = self.clone();
        board.heights[target.x as usize][target.y as usize] = tile.floors;
        Ok(board)
    }
}

/// Horizontal component of a [`Direction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EastWest {
    East,
    West,
    Put,
}

/// Vertical component of a [`Direction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NorthSouth {
    North,
    South,
    Put,
}

/// A unit step on the board, serialized as `["EAST", "PUT"]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Direction(pub EastWest, pub NorthSouth);

impl Direction {
    /// The step leading from `from` to `to`.
    ///
    /// Returns `None` if the positions are more than one step apart on either axis.
    pub fn between(from: Pos, to: Pos) -> Option<Direction> {
        let east_west = match to.x - from.x {
            -1 => EastWest::West,
            0 => EastWest::Put,
            1 => EastWest::East,
            _ => return None,
        };
        let north_south = match to.y - from.y {
            -1 => NorthSouth::North,
            0 => NorthSouth::Put,
            1 => NorthSouth::South,
            _ => return None,
        };
        Some(Direction(east_west, north_south))
    }

    /// The position reached by taking this step from `from`.
    pub fn apply(&self, from: Pos) -> Pos {
        let dx = match self.0 {
            EastWest::East => 1,
            EastWest::West => -1,
            EastWest::Put => 0,
        };
        let dy = match self.1 {
            NorthSouth::North => -1,
            NorthSouth::South => 1,
            NorthSouth::Put => 0,
        };
        Pos::new(from.x + dx, from.y + dy)
    }
}
