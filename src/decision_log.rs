// Decision logging: one JSONL line per tick, recording what was chosen and
// enough of the world to replay the decision later.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::sync::Arc;

use log::error;
use parking_lot::Mutex;
use serde::Serialize;

use crate::oracle::WorldState;
use crate::types::Move;

/// A single decision record.
#[derive(Debug, Serialize)]
struct DecisionEntry {
    tick: i32,
    chosen_move: String,
    tactic: Option<String>,
    score: i32,
    agent_node: usize,
    active_pellets: i32,
    timestamp: String,
}

/// Shared decision logger. Cloning shares the underlying file handle.
#[derive(Clone)]
pub struct DecisionLogger {
    file: Arc<Mutex<Option<BufWriter<File>>>>,
    enabled: bool,
}

impl DecisionLogger {
    /// Opens the log file (truncating any previous run) when enabled.
    /// Falls back to a disabled logger if the file cannot be created.
    pub fn new(enabled: bool, path: &str) -> Self {
        if !enabled {
            return Self::disabled();
        }
        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
        {
            Ok(file) => {
                log::info!("Decision logging enabled: {}", path);
                DecisionLogger {
                    file: Arc::new(Mutex::new(Some(BufWriter::new(file)))),
                    enabled: true,
                }
            }
            Err(e) => {
                error!("Failed to create decision log file '{}': {}", path, e);
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        DecisionLogger {
            file: Arc::new(Mutex::new(None)),
            enabled: false,
        }
    }

    /// Appends one decision line and flushes it so a crash loses nothing.
    pub fn log_move<W: WorldState>(&self, world: &W, chosen: Move, tactic: Option<&str>) {
        if !self.enabled {
            return;
        }
        let entry = DecisionEntry {
            tick: world.total_time(),
            chosen_move: chosen.as_str().to_string(),
            tactic: tactic.map(str::to_string),
            score: world.score(),
            agent_node: world.agent_node(),
            active_pellets: world.active_pellet_count(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let mut guard = self.file.lock();
        if let Some(file) = guard.as_mut() {
            match serde_json::to_string(&entry) {
                Ok(line) => {
                    if let Err(e) = writeln!(file, "{}", line) {
                        error!("Failed to write decision log entry: {}", e);
                    } else if let Err(e) = file.flush() {
                        error!("Failed to flush decision log: {}", e);
                    }
                }
                Err(e) => error!("Failed to serialize decision log entry: {}", e),
            }
        }
    }
}
