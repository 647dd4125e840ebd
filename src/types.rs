// Core value types shared by the planner, the search engine and the oracle
// boundary. Maze topology itself lives behind the WorldState trait.

use serde::{Deserialize, Serialize};

/// Opaque identifier of a maze graph vertex. Stable for the lifetime of a
/// level; produced and interpreted only by the world oracle.
pub type NodeIndex = usize;

/// One discrete movement action, plus the neutral no-op sentinel returned
/// when no tactic produces a target.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
    Neutral,
}

impl Move {
    /// The four real directions, excluding `Neutral`.
    pub fn directions() -> [Move; 4] {
        [Move::Up, Move::Down, Move::Left, Move::Right]
    }

    /// The 180-degree reversal of this move. `Neutral` has no reversal and
    /// maps to itself.
    pub fn opposite(&self) -> Move {
        match self {
            Move::Up => Move::Down,
            Move::Down => Move::Up,
            Move::Left => Move::Right,
            Move::Right => Move::Left,
            Move::Neutral => Move::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
            Move::Neutral => "neutral",
        }
    }
}

/// Fixed set of opponent identities. Which pursuit metric each identity uses
/// is data (see `OpponentTable` in the config), not behavior baked in here.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OpponentId {
    Chaser,
    Ambusher,
    Flanker,
    Rover,
}

pub const NUM_OPPONENTS: usize = 4;

impl OpponentId {
    pub fn all() -> [OpponentId; NUM_OPPONENTS] {
        [
            OpponentId::Chaser,
            OpponentId::Ambusher,
            OpponentId::Flanker,
            OpponentId::Rover,
        ]
    }

    /// Dense index used for per-opponent tables.
    pub fn index(&self) -> usize {
        match self {
            OpponentId::Chaser => 0,
            OpponentId::Ambusher => 1,
            OpponentId::Flanker => 2,
            OpponentId::Rover => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OpponentId::Chaser => "chaser",
            OpponentId::Ambusher => "ambusher",
            OpponentId::Flanker => "flanker",
            OpponentId::Rover => "rover",
        }
    }
}

/// Distance metric used by an opponent's scripted target-approach heuristic.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Exact shortest-path distance through the maze graph.
    Path,
    /// Axis-aligned grid distance, ignoring walls.
    Grid,
    /// Straight-line Euclidean distance.
    Euclid,
}

/// One simultaneous assignment of moves for the opponents that require a
/// decision on a given tick. Opponents without an entry continue straight
/// inside `WorldState::advance`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JointMove {
    moves: [Option<Move>; NUM_OPPONENTS],
}

impl JointMove {
    pub fn new() -> Self {
        JointMove::default()
    }

    pub fn set(&mut self, id: OpponentId, mv: Move) {
        self.moves[id.index()] = Some(mv);
    }

    pub fn get(&self, id: OpponentId) -> Option<Move> {
        self.moves[id.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.moves.iter().all(|m| m.is_none())
    }

    /// Iterates the opponents that have an assigned move.
    pub fn iter(&self) -> impl Iterator<Item = (OpponentId, Move)> + '_ {
        OpponentId::all()
            .into_iter()
            .filter_map(|id| self.moves[id.index()].map(|m| (id, m)))
    }
}
