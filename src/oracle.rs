// World oracle boundary.
//
// The maze simulation (topology, precomputed shortest paths, entity state,
// tick advancement) lives behind this trait. The planner and the search
// engine are generic over it; tests and the simulate binary use the GridWorld
// implementation from `crate::grid`.

use crate::types::{JointMove, Metric, Move, NodeIndex, OpponentId};

/// Distance reported for a disconnected pair of nodes. Large enough that any
/// margin arithmetic classifies the pair as "far", small enough not to
/// overflow when distances are added together.
pub const UNREACHABLE: i32 = i32::MAX / 4;

/// One immutable snapshot of the world, plus the query surface the decision
/// core needs. `advance` is pure: it clones and steps, so sibling branches of
/// a search tree never observe each other's transitions.
pub trait WorldState: Clone {
    // --- agent ---

    fn agent_node(&self) -> NodeIndex;
    fn agent_last_move(&self) -> Move;
    /// True when the agent was captured on the tick that produced this state.
    fn agent_captured(&self) -> bool;

    // --- opponents ---

    /// The opponents present in this world. A level normally fields all four
    /// identities; reduced sets appear in tests.
    fn opponents(&self) -> Vec<OpponentId>;
    fn opponent_node(&self, id: OpponentId) -> NodeIndex;
    fn opponent_last_move(&self, id: OpponentId) -> Move;
    /// Remaining ticks this opponent is vulnerable; 0 when threatening.
    fn opponent_edible_time(&self, id: OpponentId) -> i32;
    /// Remaining ticks this opponent is trapped in the respawn area.
    fn opponent_respawn_time(&self, id: OpponentId) -> i32;
    /// True when the opponent stands on a junction this tick and therefore
    /// needs a move decision; otherwise it continues along its corridor.
    fn opponent_requires_action(&self, id: OpponentId) -> bool;
    /// Node where eaten opponents re-enter the maze.
    fn opponent_spawn_node(&self) -> NodeIndex;
    /// True when any opponent was eaten on the tick that produced this state.
    fn opponent_eaten(&self) -> bool;

    // --- topology ---

    fn neighbors(&self, node: NodeIndex) -> Vec<NodeIndex>;
    /// The adjacent node in the given direction, if an edge exists.
    fn neighbor_towards(&self, node: NodeIndex, mv: Move) -> Option<NodeIndex>;
    /// A junction is a node with more than two neighbors.
    fn is_junction(&self, node: NodeIndex) -> bool;
    fn junctions(&self) -> Vec<NodeIndex>;

    // --- distances and paths ---
    //
    // Exact precomputed shortest-path queries. For disconnected pairs the
    // implementation returns `UNREACHABLE` and an empty path.

    fn path_distance(&self, from: NodeIndex, to: NodeIndex) -> i32;
    /// Shortest-path distance when the first step may not reverse `last_move`.
    fn path_distance_avoiding_reversal(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        last_move: Move,
    ) -> i32;
    /// Ordered node sequence from `from` to `to`, both endpoints included.
    fn shortest_path(&self, from: NodeIndex, to: NodeIndex) -> Vec<NodeIndex>;
    fn shortest_path_avoiding_reversal(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        last_move: Move,
    ) -> Vec<NodeIndex>;

    // --- legal moves ---

    fn legal_moves(&self, node: NodeIndex) -> Vec<Move>;
    fn legal_moves_excluding_reversal(&self, node: NodeIndex, last_move: Move) -> Vec<Move>;

    /// Scripted pursuit step: the non-reversing legal move that minimizes the
    /// given metric's distance to the target. This is how determinate
    /// opponents approach the agent inside the search engine's opponent ply.
    fn approximate_move_towards(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        last_move: Move,
        metric: Metric,
    ) -> Move;

    // --- pellets ---

    /// Every pellet vertex of the level, eaten or not.
    fn pellet_nodes(&self) -> Vec<NodeIndex>;
    fn active_pellets(&self) -> Vec<NodeIndex>;
    fn active_power_pellets(&self) -> Vec<NodeIndex>;
    fn total_pellets(&self) -> i32;
    fn active_pellet_count(&self) -> i32;

    // --- bookkeeping ---

    fn score(&self) -> i32;
    /// Ticks elapsed in the current level.
    fn level_time(&self) -> i32;
    /// Ticks elapsed across the whole run.
    fn total_time(&self) -> i32;
    /// True when a power pellet was eaten on the tick that produced this state.
    fn power_pellet_eaten(&self) -> bool;
    /// Tick index of the last global reversal event, if any occurred.
    fn last_global_reversal(&self) -> Option<i32>;

    // --- transition ---

    /// Advances the world by exactly one synchronized tick. Opponents absent
    /// from `opponent_moves` continue straight. The receiver is not mutated.
    #[must_use]
    fn advance(&self, agent_move: Move, opponent_moves: &JointMove) -> Self;
}
