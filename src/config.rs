// Configuration module for reading Agent.toml
// All tunables of the planner and the search engine live here so that tactic
// margins and time budgets can be adjusted without recompiling.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::types::{Metric, OpponentId};

/// Main configuration structure containing all tunable parameters
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub timing: TimingConfig,
    pub planner: PlannerConfig,
    pub search: SearchConfig,
    pub opponents: OpponentTable,
    pub decision_log: DecisionLogConfig,
}

/// Per-decision time budget and iterative deepening schedule
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    /// Wall-clock budget for one decision, in milliseconds.
    pub budget_ms: u64,
    /// Nominal depth of the first deepening pass. Deliberately large: in
    /// practice the first pass already runs to quiescence and the budget,
    /// not the depth, is the binding constraint.
    pub initial_depth: u32,
    /// Depth increment between deepening passes.
    pub depth_step: u32,
}

impl TimingConfig {
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }
}

/// Margins used by the safety predicates and the tactic cascade
#[derive(Debug, Deserialize, Clone)]
pub struct PlannerConfig {
    /// Minimum distance advantage over the closest threat for a node to be
    /// considered safe. A capture event fires at distance 2, so 3 keeps one
    /// tick of reaction room.
    pub safe_distance: i32,
    /// Minimum number of junctions that must stay reachable with the safety
    /// margin before a risky path is taken.
    pub escape_junctions: usize,
    /// Minimum distance to keep from the closest threat while herding
    /// opponents into alignment.
    pub align_distance: i32,
}

/// Adversarial search engine selection
#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    pub combinator: Combinator,
}

/// How the opponent ply reduces its joint-move branch set.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    /// Worst case over joint opponent moves.
    Minimax,
    /// Worst case with alpha/beta pruning; same value, fewer nodes.
    AlphaBeta,
    /// Uniform arithmetic mean over joint opponent moves.
    Expectimax,
}

/// Data table mapping opponent identity to its scripted pursuit metric.
/// One opponent is designated "uncertain": its policy is unknown, so the
/// engine branches over its full non-reversing move set instead.
#[derive(Debug, Deserialize, Clone)]
pub struct OpponentTable {
    pub chaser: Metric,
    pub ambusher: Metric,
    pub flanker: Metric,
    pub rover: Metric,
    pub uncertain: OpponentId,
}

impl OpponentTable {
    pub fn metric(&self, id: OpponentId) -> Metric {
        match id {
            OpponentId::Chaser => self.chaser,
            OpponentId::Ambusher => self.ambusher,
            OpponentId::Flanker => self.flanker,
            OpponentId::Rover => self.rover,
        }
    }

    pub fn is_uncertain(&self, id: OpponentId) -> bool {
        id == self.uncertain
    }
}

/// Per-tick JSONL decision logging (diagnostics only, off by default)
#[derive(Debug, Deserialize, Clone)]
pub struct DecisionLogConfig {
    pub enabled: bool,
    pub path: String,
}

impl Config {
    /// Loads configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        toml::from_str(&contents).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Loads default configuration from Agent.toml in the project root
    pub fn load_default() -> Result<Self, String> {
        Self::from_file("Agent.toml")
    }

    /// Creates a configuration with hardcoded default values as fallback.
    /// This should match the constants defined in Agent.toml.
    pub fn default_hardcoded() -> Self {
        Config {
            timing: TimingConfig {
                budget_ms: 5,
                initial_depth: 100,
                depth_step: 20,
            },
            planner: PlannerConfig {
                safe_distance: 3,
                escape_junctions: 2,
                align_distance: 5,
            },
            search: SearchConfig {
                combinator: Combinator::AlphaBeta,
            },
            opponents: OpponentTable {
                chaser: Metric::Path,
                ambusher: Metric::Grid,
                flanker: Metric::Euclid,
                rover: Metric::Path,
                uncertain: OpponentId::Rover,
            },
            decision_log: DecisionLogConfig {
                enabled: false,
                path: "agent_decisions.jsonl".to_string(),
            },
        }
    }

    /// Attempts to load from file, falls back to hardcoded defaults on error
    pub fn load_or_default() -> Self {
        Self::load_default().unwrap_or_else(|e| {
            log::warn!("Could not load Agent.toml ({}), using hardcoded defaults", e);
            Self::default_hardcoded()
        })
    }
}
