// Rule-based reactive planner: a strictly ordered cascade of tactics, each a
// single argmin/argmax pass over an index set filtered by the safety
// predicates. The first tactic to produce a target wins the tick and the
// target is converted to a move through the target search.

use std::time::Instant;

use log::{debug, warn};

use crate::config::Config;
use crate::oracle::WorldState;
use crate::pathfind;
use crate::safety::{
    aligns_threats, interception_node, is_node_safe, is_node_safe_with_escape, is_path_clear,
    is_spawn_approach_safe, threats_aligned, ThreatSets,
};
use crate::types::{Move, NodeIndex};

/// Reactive policy. Carries the only cross-tick state the cascade needs: the
/// corridor-sweep latch set by a power-pellet pickup, and the last junction
/// stood upon, which junction-seeking tactics must not re-select (dampens
/// target ping-pong, though a genuinely escape-free world can still cycle;
/// that terminal behavior is deliberate).
pub struct RulePolicy {
    config: Config,
    corridor_sweep: bool,
    forbidden: Option<NodeIndex>,
    last_tactic: Option<&'static str>,
}

impl RulePolicy {
    pub fn new(config: Config) -> Self {
        RulePolicy {
            config,
            corridor_sweep: false,
            forbidden: None,
            last_tactic: None,
        }
    }

    /// Name of the tactic that produced the most recent move, for diagnostics.
    pub fn last_tactic(&self) -> Option<&'static str> {
        self.last_tactic
    }

    /// Picks one move for this tick. The cascade itself is distance-table
    /// lookups and runs well inside the budget; `deadline` is only used to
    /// flag overruns.
    pub fn decide<W: WorldState>(&mut self, world: &W, deadline: Instant) -> Move {
        let started = Instant::now();
        let mv = self.run_cascade(world);
        if Instant::now() > deadline {
            warn!(
                "planner overran its budget ({}ms elapsed)",
                started.elapsed().as_millis()
            );
        }
        mv
    }

    fn run_cascade<W: WorldState>(&mut self, world: &W) -> Move {
        let agent = world.agent_node();
        let margins = self.config.planner.clone();
        let threats = ThreatSets::classify(world, margins.safe_distance);

        let power_available = !world.active_power_pellets().is_empty();
        if power_available && world.power_pellet_eaten() {
            self.corridor_sweep = true;
        } else if world.is_junction(agent) {
            self.corridor_sweep = false;
            self.forbidden = Some(agent);
        }

        // 1. Clear a hard corridor right after a power-pellet pickup, no
        //    safety checks, until the next junction.
        if self.corridor_sweep {
            if let Some(t) = self.nearest_pellet_unchecked(world) {
                return self.commit(world, "corridor_sweep", t);
            }
        }

        // 2. Pursue the nearest vulnerable opponent with a guaranteed escape.
        if !threats.vulnerable.is_empty() {
            if let Some(t) = self.pursue_vulnerable(world, &threats, true) {
                return self.commit(world, "pursue_vulnerable_guarded", t);
            }
        }

        // 3. With the threats strung out in a line none of them can cut a
        //    corner, so pursuit only needs direct reachability.
        if !threats.vulnerable.is_empty() && threats_aligned(world, &threats) {
            if let Some(t) = self.pursue_vulnerable(world, &threats, false) {
                return self.commit(world, "pursue_vulnerable_direct", t);
            }
        }

        // 4. Every remaining pellet is individually winnable: sweep them.
        if self.all_pellets_safe(world, &threats) {
            if let Some(t) = self.nearest_safe_pellet(world, &threats) {
                return self.commit(world, "sweep_last_pellets", t);
            }
        }

        // 5. Aligned threats: collect aggressively regardless of count.
        if threats_aligned(world, &threats) {
            if let Some(t) = self.nearest_safe_pellet(world, &threats) {
                return self.commit(world, "sweep_aligned", t);
            }
        }

        // 6. Standard movement: nearest pellet that is both winnable and on
        //    a path that cannot be cut off.
        if let Some(t) = self.nearest_clear_pellet(world, &threats) {
            return self.commit(world, "pellet_standard", t);
        }

        // 7. Backup: nearest pellet with a full escape guarantee.
        if let Some(t) = self.nearest_escape_pellet(world, &threats) {
            return self.commit(world, "pellet_fallback", t);
        }

        // 8. No opponent can ambush from the respawn area: grab a power
        //    pellet rather than waiting for threats that may never come close.
        if threats.all_out_of_spawn(world) && power_available {
            if let Some(t) = self.nearest_safe_power_pellet(world, &threats) {
                return self.commit(world, "power_pellet", t);
            }
        }

        // 9. Holding pattern near the remaining pellets.
        if let Some(t) = self.holding_junction(world, &threats) {
            return self.commit(world, "holding_junction", t);
        }

        // 10. Actively herd the threats toward alignment.
        if let Some(t) = self.herd_threats(world, &threats) {
            return self.commit(world, "herd_threats", t);
        }

        // 11. Passively align: retreat to a junction the threats must chase
        //     through the agent's own node.
        if let Some(t) = self.passive_align(world, &threats) {
            return self.commit(world, "passive_align", t);
        }

        // 12. Run to the farthest junction still winnable.
        if let Some(t) = self.escape_junction(world, &threats) {
            return self.commit(world, "escape_junction", t);
        }

        // 13. No junction qualifies: the farthest pellet vertex is the last
        //     resort.
        if let Some(t) = self.escape_far_pellet(world, &threats) {
            return self.commit(world, "escape_far_pellet", t);
        }

        // Nothing qualifies. Hold still and wait for an external event (a
        // random opponent move or a global reversal) to break the deadlock.
        self.last_tactic = None;
        debug!("tick {}: no tactic produced a target", world.total_time());
        Move::Neutral
    }

    fn commit<W: WorldState>(&mut self, world: &W, tactic: &'static str, target: NodeIndex) -> Move {
        self.last_tactic = Some(tactic);
        let mv = pathfind::next_move(world, world.agent_node(), target).unwrap_or(Move::Neutral);
        debug!(
            "tick {}: {} -> node {} ({})",
            world.total_time(),
            tactic,
            target,
            mv.as_str()
        );
        mv
    }

    // --- tactic bodies ---

    fn nearest_pellet_unchecked<W: WorldState>(&self, world: &W) -> Option<NodeIndex> {
        let agent = world.agent_node();
        let mut best: Option<(i32, NodeIndex)> = None;
        for pellet in world.active_pellets() {
            let dist = world.path_distance(agent, pellet);
            if best.map_or(true, |(d, _)| dist < d) {
                best = Some((dist, pellet));
            }
        }
        best.map(|(_, node)| node)
    }

    /// Shared body of tactics 2 and 3. Re-derives per-opponent vulnerability
    /// so the interception point is computed against the opponent's identity,
    /// not just its position.
    fn pursue_vulnerable<W: WorldState>(
        &self,
        world: &W,
        threats: &ThreatSets,
        need_escape: bool,
    ) -> Option<NodeIndex> {
        let agent = world.agent_node();
        let margins = &self.config.planner;
        let mut best: Option<(i32, NodeIndex)> = None;
        for id in world.opponents() {
            let node = world.opponent_node(id);
            let dist = world.path_distance(agent, node);
            if world.opponent_edible_time(id) - dist <= margins.safe_distance {
                continue;
            }
            let target = interception_node(world, id);
            let safe = if need_escape {
                is_spawn_approach_safe(world, threats, target, margins.safe_distance)
                    && is_node_safe_with_escape(
                        world,
                        threats,
                        target,
                        margins.safe_distance,
                        margins.escape_junctions,
                    )
            } else {
                is_node_safe(world, threats, target, margins.safe_distance)
                    && is_spawn_approach_safe(world, threats, target, margins.safe_distance)
            };
            if safe {
                let target_dist = world.path_distance(agent, target);
                if best.map_or(true, |(d, _)| target_dist < d) {
                    best = Some((target_dist, target));
                }
            }
        }
        best.map(|(_, node)| node)
    }

    fn all_pellets_safe<W: WorldState>(&self, world: &W, threats: &ThreatSets) -> bool {
        world
            .active_pellets()
            .iter()
            .all(|&p| is_node_safe(world, threats, p, self.config.planner.safe_distance))
    }

    fn nearest_safe_pellet<W: WorldState>(
        &self,
        world: &W,
        threats: &ThreatSets,
    ) -> Option<NodeIndex> {
        let agent = world.agent_node();
        let mut best: Option<(i32, NodeIndex)> = None;
        for pellet in world.active_pellets() {
            if is_node_safe(world, threats, pellet, self.config.planner.safe_distance) {
                let dist = world.path_distance(agent, pellet);
                if best.map_or(true, |(d, _)| dist < d) {
                    best = Some((dist, pellet));
                }
            }
        }
        best.map(|(_, node)| node)
    }

    fn nearest_clear_pellet<W: WorldState>(
        &self,
        world: &W,
        threats: &ThreatSets,
    ) -> Option<NodeIndex> {
        let agent = world.agent_node();
        let margins = &self.config.planner;
        let mut best: Option<(i32, NodeIndex)> = None;
        for pellet in world.active_pellets() {
            if is_node_safe(world, threats, pellet, margins.safe_distance)
                && is_path_clear(
                    world,
                    threats,
                    pellet,
                    margins.safe_distance,
                    margins.escape_junctions,
                )
            {
                let dist = world.path_distance(agent, pellet);
                if best.map_or(true, |(d, _)| dist < d) {
                    best = Some((dist, pellet));
                }
            }
        }
        best.map(|(_, node)| node)
    }

    fn nearest_escape_pellet<W: WorldState>(
        &self,
        world: &W,
        threats: &ThreatSets,
    ) -> Option<NodeIndex> {
        let agent = world.agent_node();
        let margins = &self.config.planner;
        let mut best: Option<(i32, NodeIndex)> = None;
        for pellet in world.active_pellets() {
            if is_node_safe_with_escape(
                world,
                threats,
                pellet,
                margins.safe_distance,
                margins.escape_junctions,
            ) {
                let dist = world.path_distance(agent, pellet);
                if best.map_or(true, |(d, _)| dist < d) {
                    best = Some((dist, pellet));
                }
            }
        }
        best.map(|(_, node)| node)
    }

    fn nearest_safe_power_pellet<W: WorldState>(
        &self,
        world: &W,
        threats: &ThreatSets,
    ) -> Option<NodeIndex> {
        let agent = world.agent_node();
        let mut best: Option<(i32, NodeIndex)> = None;
        for pellet in world.active_power_pellets() {
            if is_node_safe(world, threats, pellet, self.config.planner.safe_distance) {
                let dist = world.path_distance(agent, pellet);
                if best.map_or(true, |(d, _)| dist < d) {
                    best = Some((dist, pellet));
                }
            }
        }
        best.map(|(_, node)| node)
    }

    /// Junction minimizing distance-to-junction plus junction-to-pellet,
    /// over every active pellet. A loitering position, not a destination.
    fn holding_junction<W: WorldState>(
        &self,
        world: &W,
        threats: &ThreatSets,
    ) -> Option<NodeIndex> {
        let agent = world.agent_node();
        let mut best: Option<(i32, NodeIndex)> = None;
        for pellet in world.active_pellets() {
            for junction in world.junctions() {
                if Some(junction) == self.forbidden
                    || !is_node_safe(world, threats, junction, self.config.planner.safe_distance)
                {
                    continue;
                }
                let dist = world.path_distance(agent, junction)
                    + world.path_distance(junction, pellet);
                if best.map_or(true, |(d, _)| dist < d) {
                    best = Some((dist, junction));
                }
            }
        }
        best.map(|(_, node)| node)
    }

    /// Escape-guaranteed junction minimizing the summed threat distance,
    /// while the nearest threat stays beyond the align margin. Sitting in
    /// the middle of the pack draws the threats into a line.
    fn herd_threats<W: WorldState>(&self, world: &W, threats: &ThreatSets) -> Option<NodeIndex> {
        let margins = &self.config.planner;
        let mut best: Option<(i32, NodeIndex)> = None;
        for junction in world.junctions() {
            if Some(junction) == self.forbidden
                || !is_node_safe_with_escape(
                    world,
                    threats,
                    junction,
                    margins.safe_distance,
                    margins.escape_junctions,
                )
            {
                continue;
            }
            let mut total = 0;
            let mut nearest = i32::MAX;
            for &t in &threats.true_threats {
                let dist = world.path_distance(t, junction);
                total += dist;
                nearest = nearest.min(dist);
            }
            if nearest > margins.align_distance && best.map_or(true, |(d, _)| total < d) {
                best = Some((total, junction));
            }
        }
        best.map(|(_, node)| node)
    }

    fn passive_align<W: WorldState>(&self, world: &W, threats: &ThreatSets) -> Option<NodeIndex> {
        let agent = world.agent_node();
        let margins = &self.config.planner;
        let mut best: Option<(i32, NodeIndex)> = None;
        for junction in world.junctions() {
            if Some(junction) == self.forbidden {
                continue;
            }
            if aligns_threats(world, threats, junction)
                && is_node_safe_with_escape(
                    world,
                    threats,
                    junction,
                    margins.safe_distance,
                    margins.escape_junctions,
                )
            {
                let dist = world.path_distance(agent, junction);
                if best.map_or(true, |(d, _)| dist < d) {
                    best = Some((dist, junction));
                }
            }
        }
        best.map(|(_, node)| node)
    }

    fn escape_junction<W: WorldState>(&self, world: &W, threats: &ThreatSets) -> Option<NodeIndex> {
        let agent = world.agent_node();
        let mut best: Option<(i32, NodeIndex)> = None;
        for junction in world.junctions() {
            if Some(junction) == self.forbidden {
                continue;
            }
            if is_node_safe(world, threats, junction, self.config.planner.safe_distance) {
                let dist = world.path_distance(agent, junction);
                if best.map_or(true, |(d, _)| dist > d) {
                    best = Some((dist, junction));
                }
            }
        }
        best.map(|(_, node)| node)
    }

    /// Last resort: farthest pellet vertex (eaten ones included; the point is
    /// distance from the threats, not food).
    fn escape_far_pellet<W: WorldState>(
        &self,
        world: &W,
        threats: &ThreatSets,
    ) -> Option<NodeIndex> {
        let agent = world.agent_node();
        let mut best: Option<(i32, NodeIndex)> = None;
        for pellet in world.pellet_nodes() {
            if is_node_safe(world, threats, pellet, self.config.planner.safe_distance) {
                let dist = world.path_distance(agent, pellet);
                if best.map_or(true, |(d, _)| dist > d) {
                    best = Some((dist, pellet));
                }
            }
        }
        best.map(|(_, node)| node)
    }
}
