//! JSON shapes exchanged between a proxy and a relay.
//!
//! Server to client:
//! - `"name"`: the opponent for the next series
//! - `["playing-as", "name"]`: the client was renamed
//! - `[["alice1", x, y], ...]`: place a worker, reply `[x, y]`
//! - a 6x6 array of `"<height><worker>"` cells: play a turn, reply with a turn
//! - `[["winner", "loser"], ["winner", "loser", "irregular"], ...]`: final results
//!
//! Turn replies are `"any string"` (give up), `["alice1", "EAST", "PUT"]` (move only,
//! `["alice1", ["EAST", "PUT"]]` is accepted too) or
//! `["alice1", "EAST", "PUT", "PUT", "NORTH"]` (move then build).
//!
//! Every message is decoded by looking at its shape into one of the tagged unions below,
//! never by trying one interpretation after another.

use derive_more::{Display, Error};
use serde_json::{json, Value};

use crate::board::{
    Board, BoardError, Direction, EastWest, NorthSouth, Pos, Tile, Worker, BOARD_SIZE,
    MAX_HEIGHT,
};
use crate::player_interface::Turn;
use crate::results::{MatchResult, TournamentResult};

const RENAME_TAG: &str = "playing-as";
const IRREGULAR_TAG: &str = "irregular";
const GIVE_UP: &str = "I give up";

/// Wire value that does not decode to what was expected.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum WireError {
    /// The JSON value has the wrong shape.
    #[display("expected {expected}, got {found}")]
    Shape {
        /// what was expected
        expected: &'static str,
        /// the value received
        found: String,
    },
    /// A turn names a worker that does not belong to the replying player.
    #[display("worker {name} does not belong to {owner}")]
    ForeignWorker {
        /// worker name as sent
        name: String,
        /// player who sent it
        owner: String,
    },
    /// Two positions are not a single step apart.
    #[display("{from} and {to} are not one step apart")]
    NotAStep {
        /// start position
        from: Pos,
        /// end position
        to: Pos,
    },
    /// The decoded board breaks a board invariant.
    #[display("inconsistent board: {source}")]
    Board {
        /// underlying board error
        source: BoardError,
    },
}

fn shape(expected: &'static str, found: &Value) -> WireError {
    WireError::Shape {
        expected,
        found: found.to_string(),
    }
}

/// A message the server sends to a client, classified by shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Opponent(String),
    Rename(String),
    /// Workers already on the board, asking for a placement.
    Placement(Board),
    /// Full board, asking for a turn.
    Turn(Board),
    Results(TournamentResult),
}

/// A turn reply, classified by shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnResponse<'a> {
    GiveUp,
    Move {
        worker: &'a str,
        dir: Direction,
    },
    MoveBuild {
        worker: &'a str,
        move_dir: Direction,
        build_dir: Direction,
    },
}

pub fn encode_pos(pos: Pos) -> Value {
    json!([pos.x, pos.y])
}

pub fn decode_pos(value: &Value) -> Result<Pos, WireError> {
    serde_json::from_value(value.clone()).map_err(|_| shape("a [x, y] position", value))
}

pub fn encode_opponent(name: &str) -> Value {
    Value::String(name.to_string())
}

pub fn encode_rename(name: &str) -> Value {
    json!([RENAME_TAG, name])
}

/// Workers on `board` as `[name, x, y]` triples, in placement order.
pub fn encode_workers(board: &Board) -> Value {
    Value::Array(
        board
            .workers()
            .iter()
            .map(|w| json!([w.name(), w.pos().x, w.pos().y]))
            .collect(),
    )
}

pub fn decode_workers(value: &Value) -> Result<Board, WireError> {
    let triples = value
        .as_array()
        .ok_or_else(|| shape("an array of workers", value))?;
    let workers = triples
        .iter()
        .map(decode_worker)
        .collect::<Result<Vec<_>, _>>()?;
    Board::with_workers(workers).map_err(|source| WireError::Board { source })
}

fn decode_worker(value: &Value) -> Result<Worker, WireError> {
    let err = || shape("a [name, x, y] worker", value);
    let [name, x, y] = value.as_array().map(Vec::as_slice).ok_or_else(err)? else {
        return Err(err());
    };
    let (owner, id) = name
        .as_str()
        .and_then(Worker::parse_name)
        .ok_or_else(err)?;
    let coord = |v: &Value| v.as_i64().and_then(|c| i32::try_from(c).ok());
    let (Some(x), Some(y)) = (coord(x), coord(y)) else {
        return Err(err());
    };
    Ok(Worker::new(owner, id, Pos::new(x, y)))
}

/// The board as a 6x6 array indexed `[row][column]`.
pub fn encode_board(board: &Board) -> Value {
    let rows = (0..BOARD_SIZE)
        .map(|y| {
            let cells = (0..BOARD_SIZE)
                .map(|x| {
                    let pos = Pos::new(x, y);
                    let floors = board.tile_at(pos).map(|t| t.floors()).unwrap_or_default();
                    let worker = board.worker_at(pos).map(Worker::name).unwrap_or_default();
                    Value::String(format!("{floors}{worker}"))
                })
                .collect();
            Value::Array(cells)
        })
        .collect();
    Value::Array(rows)
}

pub fn decode_board(value: &Value) -> Result<Board, WireError> {
    let rows = grid_rows(value).ok_or_else(|| shape("a 6x6 board", value))?;
    let mut tiles = Vec::new();
    let mut workers = Vec::new();
    for (y, row) in rows.iter().enumerate() {
        for (x, cell) in row.iter().enumerate() {
            let pos = Pos::new(x as i32, y as i32);
            let (floors, worker) = decode_cell(cell)?;
            tiles.push(Tile::with_height(pos, floors));
            if let Some((owner, id)) = worker {
                workers.push(Worker::new(owner, id, pos));
            }
        }
    }
    Board::with_tiles(tiles)
        .with_placed(workers)
        .map_err(|source| WireError::Board { source })
}

fn grid_rows(value: &Value) -> Option<Vec<&Vec<Value>>> {
    let rows = value.as_array()?;
    if rows.len() != BOARD_SIZE as usize {
        return None;
    }
    rows.iter()
        .map(|row| row.as_array().filter(|r| r.len() == BOARD_SIZE as usize))
        .collect()
}

fn decode_cell(cell: &Value) -> Result<(u8, Option<(String, usize)>), WireError> {
    let err = || shape("a \"<height><worker>\" cell", cell);
    if let Some(floors) = cell.as_u64() {
        let floors = u8::try_from(floors).ok().filter(|f| *f <= MAX_HEIGHT);
        return floors.map(|f| (f, None)).ok_or_else(err);
    }
    let text = cell.as_str().ok_or_else(err)?;
    let mut chars = text.chars();
    let floors = chars
        .next()
        .and_then(|c| c.to_digit(10))
        .and_then(|d| u8::try_from(d).ok())
        .filter(|f| *f <= MAX_HEIGHT)
        .ok_or_else(err)?;
    let rest = chars.as_str();
    if rest.is_empty() {
        return Ok((floors, None));
    }
    let worker = Worker::parse_name(rest).ok_or_else(err)?;
    Ok((floors, Some(worker)))
}

/// Encode `owner`'s `turn` relative to `board`.
///
/// Fails if the turn names a missing worker or does not step to neighboring tiles, since
/// such a turn has no wire form.
pub fn encode_turn(turn: &Turn, board: &Board, owner: &str) -> Result<Value, WireError> {
    let (worker, to, build) = match *turn {
        Turn::GiveUp => return Ok(give_up()),
        Turn::Move { worker, to } => (worker, to, None),
        Turn::MoveBuild { worker, to, build } => (worker, to, Some(build)),
    };
    let worker = board
        .find_worker(owner, worker)
        .map_err(|source| WireError::Board { source })?;
    let from = worker.pos();
    let Direction(move_ew, move_ns) = step(from, to)?;
    match build {
        None => Ok(json!([worker.name(), move_ew, move_ns])),
        Some(build) => {
            let Direction(build_ew, build_ns) = step(to, build)?;
            Ok(json!([worker.name(), move_ew, move_ns, build_ew, build_ns]))
        }
    }
}

/// Reply sent in place of a turn that cannot be expressed on the wire.
pub fn give_up() -> Value {
    Value::String(GIVE_UP.to_string())
}

fn step(from: Pos, to: Pos) -> Result<Direction, WireError> {
    Direction::between(from, to).ok_or(WireError::NotAStep { from, to })
}

/// Classify a turn reply by its shape.
pub fn classify_turn(value: &Value) -> Result<TurnResponse<'_>, WireError> {
    let err = || shape("a turn", value);
    if value.is_string() {
        return Ok(TurnResponse::GiveUp);
    }
    let parts = value.as_array().ok_or_else(err)?;
    let worker = parts.first().and_then(Value::as_str).ok_or_else(err)?;
    let dir = |ew: &Value, ns: &Value| -> Result<Direction, WireError> {
        let ew: EastWest = serde_json::from_value(ew.clone()).map_err(|_| err())?;
        let ns: NorthSouth = serde_json::from_value(ns.clone()).map_err(|_| err())?;
        Ok(Direction(ew, ns))
    };
    match parts.as_slice() {
        [_, pair] => {
            let [ew, ns] = pair.as_array().map(Vec::as_slice).ok_or_else(err)? else {
                return Err(err());
            };
            Ok(TurnResponse::Move {
                worker,
                dir: dir(ew, ns)?,
            })
        }
        [_, ew, ns] => Ok(TurnResponse::Move {
            worker,
            dir: dir(ew, ns)?,
        }),
        [_, move_ew, move_ns, build_ew, build_ns] => Ok(TurnResponse::MoveBuild {
            worker,
            move_dir: dir(move_ew, move_ns)?,
            build_dir: dir(build_ew, build_ns)?,
        }),
        _ => Err(err()),
    }
}

/// Decode `owner`'s turn reply into board positions.
///
/// # Errors
/// Fails if the reply is malformed or names a worker `owner` does not have on `board`.
pub fn decode_turn(value: &Value, board: &Board, owner: &str) -> Result<Turn, WireError> {
    let (worker, move_dir, build_dir) = match classify_turn(value)? {
        TurnResponse::GiveUp => return Ok(Turn::GiveUp),
        TurnResponse::Move { worker, dir } => (worker, dir, None),
        TurnResponse::MoveBuild {
            worker,
            move_dir,
            build_dir,
        } => (worker, move_dir, Some(build_dir)),
    };
    let foreign = || WireError::ForeignWorker {
        name: worker.to_string(),
        owner: owner.to_string(),
    };
    let (worker_owner, id) = Worker::parse_name(worker).ok_or_else(foreign)?;
    if worker_owner != owner {
        return Err(foreign());
    }
    let from = board
        .find_worker(owner, id)
        .map_err(|source| WireError::Board { source })?
        .pos();
    let to = move_dir.apply(from);
    Ok(match build_dir {
        None => Turn::Move { worker: id, to },
        Some(build_dir) => Turn::MoveBuild {
            worker: id,
            to,
            build: build_dir.apply(to),
        },
    })
}

pub fn encode_results(result: &TournamentResult) -> Value {
    Value::Array(
        result
            .matches
            .iter()
            .map(|m| {
                if m.rule_broken {
                    json!([m.winner, m.loser, IRREGULAR_TAG])
                } else {
                    json!([m.winner, m.loser])
                }
            })
            .collect(),
    )
}

/// Decode final results. The kicked list does not travel on the wire and comes back empty.
pub fn decode_results(value: &Value) -> Result<TournamentResult, WireError> {
    let entries = value
        .as_array()
        .ok_or_else(|| shape("an array of results", value))?;
    let matches = entries
        .iter()
        .map(decode_match)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TournamentResult {
        matches,
        kicked: vec![],
    })
}

fn decode_match(value: &Value) -> Result<MatchResult, WireError> {
    let err = || shape("a [winner, loser] result", value);
    let parts = value.as_array().ok_or_else(err)?;
    let strings = parts
        .iter()
        .map(Value::as_str)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(err)?;
    match strings.as_slice() {
        [winner, loser] => Ok(MatchResult::new(*winner, *loser, false, vec![])),
        [winner, loser, IRREGULAR_TAG] => Ok(MatchResult::new(*winner, *loser, true, vec![])),
        _ => Err(err()),
    }
}

/// Classify a message received by a client.
///
/// An empty array is a placement request on an empty board: final results always hold at
/// least one match, as a tournament needs two players.
pub fn decode_server_message(value: &Value) -> Result<ServerMessage, WireError> {
    if let Some(name) = value.as_str() {
        return Ok(ServerMessage::Opponent(name.to_string()));
    }
    let items = value
        .as_array()
        .ok_or_else(|| shape("a server message", value))?;

    if let [tag, name] = items.as_slice() {
        if tag.as_str() == Some(RENAME_TAG) {
            let name = name
                .as_str()
                .ok_or_else(|| shape("a [\"playing-as\", name] rename", value))?;
            return Ok(ServerMessage::Rename(name.to_string()));
        }
    }
    if items.iter().all(is_worker_triple) {
        return decode_workers(value).map(ServerMessage::Placement);
    }
    if grid_rows(value).is_some() {
        return decode_board(value).map(ServerMessage::Turn);
    }
    if items.iter().all(is_result_entry) {
        return decode_results(value).map(ServerMessage::Results);
    }
    Err(shape("a server message", value))
}

fn is_worker_triple(value: &Value) -> bool {
    matches!(
        value.as_array().map(Vec::as_slice),
        Some([name, x, y]) if name.is_string() && x.is_i64() && y.is_i64()
    )
}

fn is_result_entry(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|parts| (2..=3).contains(&parts.len()) && parts.iter().all(Value::is_string))
}
