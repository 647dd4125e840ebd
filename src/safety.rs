// Geometric safety predicates shared by the tactic cascade.
//
// Everything here is a pure function of live oracle distances; nothing is
// cached across ticks because opponent positions move every tick.

use std::collections::HashSet;

use crate::oracle::WorldState;
use crate::types::{Move, NodeIndex, OpponentId};

/// Per-decision classification of the opponents, built once at the top of a
/// planning call and threaded through every predicate.
#[derive(Debug, Clone, Default)]
pub struct ThreatSets {
    /// Opponents that can still be reached while their vulnerability timer
    /// holds, with the safety margin to spare.
    pub vulnerable: Vec<NodeIndex>,
    /// Threatening positions: non-vulnerable opponents on the board, plus the
    /// spawn node standing in for each respawn-trapped opponent so its latent
    /// threat still counts.
    pub threats: Vec<NodeIndex>,
    /// Non-vulnerable opponents actually on the board.
    pub true_threats: Vec<NodeIndex>,
}

impl ThreatSets {
    pub fn classify<W: WorldState>(world: &W, safe_distance: i32) -> ThreatSets {
        let agent = world.agent_node();
        let mut sets = ThreatSets::default();
        for id in world.opponents() {
            let node = world.opponent_node(id);
            let dist = world.path_distance(agent, node);
            if world.opponent_edible_time(id) - dist > safe_distance {
                sets.vulnerable.push(node);
            } else if world.opponent_respawn_time(id) == 0 {
                sets.threats.push(node);
                sets.true_threats.push(node);
            } else {
                sets.threats.push(world.opponent_spawn_node());
            }
        }
        sets
    }

    /// True when no opponent is trapped in the respawn area.
    pub fn all_out_of_spawn<W: WorldState>(&self, world: &W) -> bool {
        self.vulnerable.len() + self.true_threats.len() == world.opponents().len()
    }
}

/// Reachable-first safety: every threat's distance to the candidate exceeds
/// the agent's by at least the safety margin.
pub fn is_node_safe<W: WorldState>(
    world: &W,
    threats: &ThreatSets,
    target: NodeIndex,
    safe_distance: i32,
) -> bool {
    if threats.threats.is_empty() {
        return true;
    }
    let target_dist = world.path_distance(world.agent_node(), target);
    threats
        .threats
        .iter()
        .all(|&t| world.path_distance(t, target) - target_dist >= safe_distance)
}

/// Escape-margin safety: on top of reaching the candidate first, at least
/// `escape_junctions` junctions must stay reachable through the candidate
/// with the same margin, guaranteeing an onward route rather than mere
/// survival at the candidate itself.
pub fn is_node_safe_with_escape<W: WorldState>(
    world: &W,
    threats: &ThreatSets,
    target: NodeIndex,
    safe_distance: i32,
    escape_junctions: usize,
) -> bool {
    if threats.threats.is_empty() {
        return true;
    }
    let target_dist = world.path_distance(world.agent_node(), target);
    let mut safe_junctions = 0;
    for junction in world.junctions() {
        let junction_dist = target_dist + world.path_distance(target, junction);
        let safe = threats
            .threats
            .iter()
            .all(|&t| world.path_distance(t, junction) - junction_dist >= safe_distance);
        if safe {
            safe_junctions += 1;
            if safe_junctions >= escape_junctions {
                return true;
            }
        }
    }
    false
}

/// Walks outward from `target`, avoiding the nodes of the incoming path,
/// until a junction is found: the corridor's exit. Falls back to the target
/// itself when the pocket behind it holds no junction.
pub fn exit_junction<W: WorldState>(world: &W, from: NodeIndex, target: NodeIndex) -> NodeIndex {
    let mut discovered: HashSet<NodeIndex> =
        world.shortest_path(from, target).into_iter().collect();
    let mut exit = target;
    walk_to_junction(world, &mut discovered, target, &mut exit);
    exit
}

fn walk_to_junction<W: WorldState>(
    world: &W,
    discovered: &mut HashSet<NodeIndex>,
    node: NodeIndex,
    exit: &mut NodeIndex,
) {
    if world.is_junction(node) {
        *exit = node;
        return;
    }
    for neighbor in world.neighbors(node) {
        if discovered.insert(neighbor) {
            walk_to_junction(world, discovered, neighbor, exit);
        }
    }
}

/// Clear-path safety. When a threat is already closer to the agent than the
/// candidate is, it will follow the agent down the corridor and can cut the
/// path off retroactively; junction safety is then evaluated from the path's
/// exit junction outward for the remaining threats. Otherwise the candidate
/// itself is the reference point.
pub fn is_path_clear<W: WorldState>(
    world: &W,
    threats: &ThreatSets,
    target: NodeIndex,
    safe_distance: i32,
    escape_junctions: usize,
) -> bool {
    if threats.threats.is_empty() {
        return true;
    }
    let agent = world.agent_node();
    let target_dist = world.path_distance(agent, target);
    let following = threats
        .threats
        .iter()
        .any(|&t| target_dist > world.path_distance(t, agent));

    let mut unsafe_junctions: HashSet<NodeIndex> = HashSet::new();
    if following {
        let exit = exit_junction(world, agent, target);
        let exit_dist = target_dist + world.path_distance(target, exit);
        for &t in &threats.threats {
            if target_dist <= world.path_distance(t, agent) {
                for junction in world.junctions() {
                    let junction_dist = exit_dist + world.path_distance(exit, junction);
                    if world.path_distance(t, junction) - junction_dist < safe_distance {
                        unsafe_junctions.insert(junction);
                    }
                }
            }
        }
    } else {
        for &t in &threats.threats {
            for junction in world.junctions() {
                let junction_dist = target_dist + world.path_distance(target, junction);
                if world.path_distance(t, junction) - junction_dist < safe_distance {
                    unsafe_junctions.insert(junction);
                }
            }
        }
    }
    world.junctions().len() - unsafe_junctions.len() >= escape_junctions
}

/// Spawn-approach safety for vulnerable-opponent pursuit: the path may not
/// pass needlessly close to the respawn area while opponents can still pour
/// out of it.
pub fn is_spawn_approach_safe<W: WorldState>(
    world: &W,
    threats: &ThreatSets,
    target: NodeIndex,
    safe_distance: i32,
) -> bool {
    if threats.all_out_of_spawn(world) {
        return true;
    }
    let target_dist = world.path_distance(world.agent_node(), target);
    let spawn_dist = world.path_distance(target, world.opponent_spawn_node());
    target_dist - spawn_dist < safe_distance
}

/// True when reaching `target` would string every true threat out behind the
/// agent: each threat's shortest path to the target passes through the
/// agent's current node.
pub fn aligns_threats<W: WorldState>(world: &W, threats: &ThreatSets, target: NodeIndex) -> bool {
    if threats.true_threats.is_empty() {
        return true;
    }
    let agent = world.agent_node();
    let mut counted = 0;
    for &t in &threats.true_threats {
        for node in world.shortest_path(t, target) {
            if node == agent {
                counted += 1;
                if counted == threats.true_threats.len() {
                    return true;
                }
            }
        }
    }
    false
}

/// True when every true threat lies on the shortest path from the farthest
/// true threat back to the agent, i.e. the threats are already strung out in
/// a line and none can cut a corner.
pub fn threats_aligned<W: WorldState>(world: &W, threats: &ThreatSets) -> bool {
    if threats.true_threats.is_empty() {
        return true;
    }
    let agent = world.agent_node();
    let spawn = world.opponent_spawn_node();
    let mut farthest_dist = i32::MIN;
    let mut farthest = agent;
    for &t in &threats.true_threats {
        if t != spawn {
            let dist = world.path_distance(t, agent);
            if dist > farthest_dist {
                farthest_dist = dist;
                farthest = t;
            }
        }
    }
    let mut counted = threats
        .true_threats
        .iter()
        .filter(|&&t| t == farthest)
        .count();
    // The path includes its start node; the farthest threat is already
    // pre-counted, so the walk starts one node in.
    for node in world.shortest_path(farthest, agent).into_iter().skip(1) {
        for &t in &threats.true_threats {
            if node == t {
                counted += 1;
                if counted == threats.true_threats.len() {
                    return true;
                }
            }
        }
    }
    false
}

/// Interception point for a vulnerable opponent: when its reversal-
/// constrained path back to the agent is shorter than the unconstrained one,
/// it is committed to that route, so target the first junction it will cross
/// instead of its current node.
pub fn interception_node<W: WorldState>(world: &W, id: OpponentId) -> NodeIndex {
    let agent = world.agent_node();
    let node = world.opponent_node(id);
    let last_move = world.opponent_last_move(id);
    if last_move == Move::Neutral {
        return node;
    }
    let current_dist = world.path_distance(node, agent);
    let committed_dist = world.path_distance_avoiding_reversal(node, agent, last_move);
    if committed_dist < current_dist {
        for path_node in world.shortest_path_avoiding_reversal(node, agent, last_move) {
            if world.is_junction(path_node) && path_node != agent {
                return path_node;
            }
        }
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridWorld;
    use crate::oracle::WorldState as _;

    // Agent on the left, one threat on the right, pellet row between them.
    const DUEL: &str = "\
#########
#P.....C#
#.#####.#
#.......#
#########";

    fn classified(world: &GridWorld) -> ThreatSets {
        ThreatSets::classify(world, 3)
    }

    #[test]
    fn test_no_threats_is_always_safe() {
        let world = GridWorld::parse("####\n#P.#\n####").unwrap();
        let threats = classified(&world);
        assert!(threats.threats.is_empty());
        let target = world.node_at(2, 1).unwrap();
        assert!(is_node_safe(&world, &threats, target, 3));
        assert!(is_node_safe_with_escape(&world, &threats, target, 3, 2));
        assert!(is_path_clear(&world, &threats, target, 3, 2));
        assert!(aligns_threats(&world, &threats, target));
        assert!(threats_aligned(&world, &threats));
    }

    #[test]
    fn test_reachable_first_rejects_contested_node() {
        let world = GridWorld::parse(DUEL).unwrap();
        let threats = classified(&world);
        // Node adjacent to the threat: it wins the race.
        let contested = world.node_at(6, 1).unwrap();
        assert!(!is_node_safe(&world, &threats, contested, 3));
        // Node adjacent to the agent: the agent wins with margin to spare.
        let close = world.node_at(1, 2).unwrap();
        assert!(is_node_safe(&world, &threats, close, 3));
    }

    #[test]
    fn test_margin_monotonicity() {
        let world = GridWorld::parse(DUEL).unwrap();
        let threats = classified(&world);
        for x in 1..8 {
            for y in 1..4 {
                let Some(target) = world.node_at(x, y) else { continue };
                for margin in 0..6 {
                    // Widening the margin never turns an unsafe node safe.
                    if !is_node_safe(&world, &threats, target, margin) {
                        assert!(!is_node_safe(&world, &threats, target, margin + 1));
                    }
                }
            }
        }
    }

    #[test]
    fn test_respawn_trapped_opponent_counts_from_spawn() {
        let mut world = GridWorld::parse(DUEL).unwrap();
        world.set_respawn_time(crate::types::OpponentId::Chaser, 10);
        let threats = classified(&world);
        assert_eq!(threats.true_threats.len(), 0);
        assert_eq!(threats.threats, vec![world.opponent_spawn_node()]);
        assert!(!threats.all_out_of_spawn(&world));
    }

    #[test]
    fn test_exit_junction_of_corridor() {
        // Corridor target at (2,1); walking on leads to the junction (5,1).
        let world = GridWorld::parse(
            "\
#########
#P......#
#####.#.#
#.......#
#########",
        )
        .unwrap();
        let agent = world.agent_node();
        let target = world.node_at(2, 1).unwrap();
        let exit = exit_junction(&world, agent, target);
        assert_eq!(exit, world.node_at(5, 1).unwrap());
    }

    #[test]
    fn test_threats_aligned_when_strung_out() {
        // Two threats on one line behind each other relative to the agent.
        let world = GridWorld::parse(
            "\
#########
#P..A..C#
#.#####.#
#.......#
#########",
        )
        .unwrap();
        let threats = classified(&world);
        assert_eq!(threats.true_threats.len(), 2);
        assert!(threats_aligned(&world, &threats));
    }

    #[test]
    fn test_flanking_threats_are_not_aligned() {
        // One threat on each side of the agent: neither lies on the other's
        // path to the agent, so they can pincer around a corner.
        let world = GridWorld::parse(
            "\
##########
#C..P..AS#
##########",
        )
        .unwrap();
        let threats = classified(&world);
        assert_eq!(threats.true_threats.len(), 2);
        assert!(
            !threats_aligned(&world, &threats),
            "threats on opposite sides of the agent reported as aligned"
        );
    }

    #[test]
    fn test_single_threat_off_path_is_not_aligned() {
        // A lone threat never sits on the remainder of its own path, so the
        // predicate stays false rather than trivially true.
        let world = GridWorld::parse(
            "\
##########
#S.C...P.#
##########",
        )
        .unwrap();
        let threats = classified(&world);
        assert_eq!(threats.true_threats.len(), 1);
        assert!(!threats_aligned(&world, &threats));
    }
}
