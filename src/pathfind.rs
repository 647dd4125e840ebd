// Target search: best-first walk from the agent's node to a single goal.
//
// Both the g and h terms come from the oracle's precomputed shortest-path
// distances, so h is exact rather than merely admissible and the first pop of
// the goal node is optimal. Only the first edge of the path is recorded;
// callers just need the next step.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::oracle::WorldState;
use crate::types::{Move, NodeIndex};

/// Returns the first node after `from` on a shortest path to `goal`, or
/// `None` when the goal is unreachable or already reached. Unreachable is a
/// normal negative outcome; callers fall through to their next candidate.
pub fn next_step<W: WorldState>(world: &W, from: NodeIndex, goal: NodeIndex) -> Option<NodeIndex> {
    if from == goal {
        return None;
    }

    // Min-heap ordered by f = g + h, ties broken by node index.
    let mut frontier: BinaryHeap<Reverse<(i32, NodeIndex)>> = BinaryHeap::new();
    let mut discovered: HashSet<NodeIndex> = HashSet::new();
    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut first_step: HashMap<NodeIndex, NodeIndex> = HashMap::new();

    let mut current = from;
    loop {
        visited.insert(current);
        for neighbor in world.neighbors(current) {
            if !visited.contains(&neighbor) && discovered.insert(neighbor) {
                let g = world.path_distance(from, neighbor);
                let h = world.path_distance(neighbor, goal);
                frontier.push(Reverse((g.saturating_add(h), neighbor)));
                let step = if current == from {
                    neighbor
                } else {
                    first_step[&current]
                };
                first_step.insert(neighbor, step);
            }
        }

        loop {
            let Reverse((_, node)) = frontier.pop()?;
            if !visited.contains(&node) {
                current = node;
                break;
            }
        }

        if current == goal {
            return first_step.get(&goal).copied();
        }
    }
}

/// Converts the first step toward `goal` into a movement direction.
pub fn next_move<W: WorldState>(world: &W, from: NodeIndex, goal: NodeIndex) -> Option<Move> {
    let step = next_step(world, from, goal)?;
    Move::directions()
        .into_iter()
        .find(|&mv| world.neighbor_towards(from, mv) == Some(step))
}
