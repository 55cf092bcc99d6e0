//! Observer writing game events as JSON lines.

use std::io::Write;
use std::sync::Mutex;

use tracing::warn;

use crate::board::{Board, Direction};
use crate::player_interface::Observer;
use crate::remote::wire;
use crate::rules::{EndReason, GameResult};

/// Writes every event it receives to `output`, one JSON value per line.
pub struct JsonObserver {
    name: String,
    output: Mutex<Box<dyn Write + Send>>,
}

impl JsonObserver {
    pub fn new(name: impl Into<String>, output: impl Write + Send + 'static) -> Self {
        Self {
            name: name.into(),
            output: Mutex::new(Box::new(output)),
        }
    }

    /// Observer printing to stdout.
    pub fn stdout(name: impl Into<String>) -> Self {
        Self::new(name, std::io::stdout())
    }

    fn write_line(&self, line: &str) {
        let Ok(mut output) = self.output.lock() else {
            warn!(observer = %self.name, "output lock poisoned, event dropped");
            return;
        };
        if let Err(e) = writeln!(output, "{line}").and_then(|_| output.flush()) {
            warn!(observer = %self.name, "could not write event: {e}");
        }
    }
}

impl Observer for JsonObserver {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn receive_board(&self, board: &Board) {
        let rows = wire::encode_board(board);
        let Some(rows) = rows.as_array() else {
            return;
        };
        let rows = rows.iter().map(|row| row.to_string()).collect::<Vec<_>>();
        self.write_line(&format!("[{}]", rows.join(",\n")));
    }

    fn receive_turn(&self, worker: &str, move_dir: Direction, build_dir: Direction) {
        self.write_line(&serde_json::json!([worker, move_dir, build_dir]).to_string());
    }

    fn receive_winning_move(&self, worker: &str, move_dir: Direction) {
        self.write_line(&serde_json::json!([worker, move_dir]).to_string());
    }

    fn receive_endgame(&self, result: &GameResult) {
        let line = match result.reason {
            EndReason::RuleBroken => format!("{} Lost: {}", result.loser, result.reason),
            _ => format!("{} Won", result.winner),
        };
        self.write_line(&serde_json::Value::String(line).to_string());
    }
}
