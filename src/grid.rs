// Grid-maze implementation of the world oracle, used by the tests and the
// simulate binary. Topology and the all-pairs distance table are immutable
// and shared behind an Arc, so cloning a state for a search branch copies
// only the per-tick entity and pellet data.
//
// Map legend: '#' and ' ' are walls, '.' pellet, 'o' power pellet, '-' bare
// corridor, 'P' agent, 'C'/'A'/'F'/'R' opponents, 'S' respawn door.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::oracle::{WorldState, UNREACHABLE};
use crate::types::{JointMove, Metric, Move, NodeIndex, OpponentId, NUM_OPPONENTS};

/// Ticks an opponent stays vulnerable after a power-pellet pickup.
pub const EDIBLE_TICKS: i32 = 200;
/// Ticks an eaten opponent stays trapped in the respawn area.
pub const RESPAWN_TICKS: i32 = 40;

const PELLET_SCORE: i32 = 10;
const POWER_PELLET_SCORE: i32 = 50;
const OPPONENT_SCORE: i32 = 200;

struct Topology {
    coords: Vec<(i32, i32)>,
    /// Neighbor per direction, indexed by `dir_index`.
    adj: Vec<[Option<NodeIndex>; 4]>,
    junctions: Vec<NodeIndex>,
    /// All-pairs BFS distances; `UNREACHABLE` for disconnected pairs.
    dist: Vec<Vec<i32>>,
    pellet_nodes: Vec<NodeIndex>,
    power_nodes: Vec<NodeIndex>,
    spawn: NodeIndex,
}

fn dir_index(mv: Move) -> Option<usize> {
    match mv {
        Move::Up => Some(0),
        Move::Down => Some(1),
        Move::Left => Some(2),
        Move::Right => Some(3),
        Move::Neutral => None,
    }
}

fn dir_delta(mv: Move) -> (i32, i32) {
    match mv {
        Move::Up => (0, -1),
        Move::Down => (0, 1),
        Move::Left => (-1, 0),
        Move::Right => (1, 0),
        Move::Neutral => (0, 0),
    }
}

#[derive(Debug, Clone, Copy)]
struct OpponentState {
    node: NodeIndex,
    last: Move,
    edible: i32,
    respawn: i32,
}

#[derive(Clone)]
pub struct GridWorld {
    topo: Arc<Topology>,
    agent: NodeIndex,
    agent_last: Move,
    captured: bool,
    present: Vec<OpponentId>,
    opp: [OpponentState; NUM_OPPONENTS],
    pellet_active: Vec<bool>,
    power_active: Vec<bool>,
    score: i32,
    level_time: i32,
    total_time: i32,
    power_eaten: bool,
    opp_eaten: bool,
    last_reversal: Option<i32>,
}

impl GridWorld {
    /// Parses an ASCII maze. Fails when the map has no agent start.
    pub fn parse(map: &str) -> Result<GridWorld, String> {
        let lines: Vec<&str> = map.lines().collect();
        let mut node_of: HashMap<(i32, i32), NodeIndex> = HashMap::new();
        let mut coords = Vec::new();
        let mut cell = Vec::new();
        for (y, line) in lines.iter().enumerate() {
            for (x, ch) in line.chars().enumerate() {
                if ch == '#' || ch == ' ' {
                    continue;
                }
                let xy = (x as i32, y as i32);
                node_of.insert(xy, coords.len());
                coords.push(xy);
                cell.push(ch);
            }
        }

        let mut adj = vec![[None; 4]; coords.len()];
        for (node, &(x, y)) in coords.iter().enumerate() {
            // Slot order matches `Move::directions()`.
            for (slot, mv) in Move::directions().into_iter().enumerate() {
                let (dx, dy) = dir_delta(mv);
                if let Some(&neighbor) = node_of.get(&(x + dx, y + dy)) {
                    adj[node][slot] = Some(neighbor);
                }
            }
        }
        let junctions: Vec<NodeIndex> = (0..coords.len())
            .filter(|&n| adj[n].iter().flatten().count() > 2)
            .collect();

        let dist = all_pairs_distances(&adj);

        let mut agent = None;
        let mut spawn = None;
        let mut present = Vec::new();
        let mut opp = [OpponentState {
            node: 0,
            last: Move::Neutral,
            edible: 0,
            respawn: 0,
        }; NUM_OPPONENTS];
        let mut pellet_nodes = Vec::new();
        let mut power_nodes = Vec::new();
        for (node, &ch) in cell.iter().enumerate() {
            match ch {
                '.' => pellet_nodes.push(node),
                'o' => power_nodes.push(node),
                'P' => agent = Some(node),
                'S' => spawn = Some(node),
                'C' | 'A' | 'F' | 'R' => {
                    let id = match ch {
                        'C' => OpponentId::Chaser,
                        'A' => OpponentId::Ambusher,
                        'F' => OpponentId::Flanker,
                        _ => OpponentId::Rover,
                    };
                    present.push(id);
                    opp[id.index()].node = node;
                }
                '-' => {}
                other => return Err(format!("unknown map cell '{}'", other)),
            }
        }
        let agent = agent.ok_or_else(|| "map has no agent start".to_string())?;
        let spawn = spawn
            .or_else(|| present.first().map(|id| opp[id.index()].node))
            .unwrap_or(agent);

        let pellet_active = vec![true; coords.len()];
        let power_active = vec![true; coords.len()];

        Ok(GridWorld {
            topo: Arc::new(Topology {
                coords,
                adj,
                junctions,
                dist,
                pellet_nodes,
                power_nodes,
                spawn,
            }),
            agent,
            agent_last: Move::Neutral,
            captured: false,
            present,
            opp,
            pellet_active,
            power_active,
            score: 0,
            level_time: 0,
            total_time: 0,
            power_eaten: false,
            opp_eaten: false,
            last_reversal: None,
        })
    }

    /// Node at the given map coordinates, if it is not a wall.
    pub fn node_at(&self, x: i32, y: i32) -> Option<NodeIndex> {
        self.topo
            .coords
            .iter()
            .position(|&c| c == (x, y))
    }

    pub fn coords_of(&self, node: NodeIndex) -> (i32, i32) {
        self.topo.coords[node]
    }

    // --- scenario setup ---

    pub fn set_agent(&mut self, node: NodeIndex, last: Move) {
        self.agent = node;
        self.agent_last = last;
    }

    pub fn set_opponent(&mut self, id: OpponentId, node: NodeIndex, last: Move) {
        if !self.present.contains(&id) {
            self.present.push(id);
        }
        self.opp[id.index()].node = node;
        self.opp[id.index()].last = last;
    }

    pub fn set_edible_time(&mut self, id: OpponentId, ticks: i32) {
        self.opp[id.index()].edible = ticks;
    }

    pub fn set_respawn_time(&mut self, id: OpponentId, ticks: i32) {
        self.opp[id.index()].respawn = ticks;
    }

    pub fn set_global_reversal(&mut self, tick: i32) {
        self.last_reversal = Some(tick);
    }

    pub fn clear_pellet(&mut self, node: NodeIndex) {
        self.pellet_active[node] = false;
    }

    fn metric_distance(&self, metric: Metric, from: NodeIndex, to: NodeIndex) -> i64 {
        match metric {
            Metric::Path => self.topo.dist[from][to] as i64,
            Metric::Grid => {
                let (ax, ay) = self.topo.coords[from];
                let (bx, by) = self.topo.coords[to];
                ((ax - bx).abs() + (ay - by).abs()) as i64
            }
            Metric::Euclid => {
                let (ax, ay) = self.topo.coords[from];
                let (bx, by) = self.topo.coords[to];
                let (dx, dy) = ((ax - bx) as i64, (ay - by) as i64);
                dx * dx + dy * dy
            }
        }
    }

    /// BFS over (node, incoming move) states: no step may reverse the move
    /// that produced it, starting from `last`.
    fn constrained_search(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        last: Move,
    ) -> (i32, Vec<NodeIndex>) {
        if last == Move::Neutral {
            return (self.path_distance(from, to), self.shortest_path(from, to));
        }
        if from == to {
            return (0, vec![from]);
        }
        let start = (from, last);
        let mut parent: HashMap<(NodeIndex, Move), (NodeIndex, Move)> = HashMap::new();
        let mut dist: HashMap<(NodeIndex, Move), i32> = HashMap::new();
        dist.insert(start, 0);
        let mut queue = VecDeque::from([start]);
        while let Some(state) = queue.pop_front() {
            let (node, incoming) = state;
            let d = dist[&state];
            for (slot, mv) in Move::directions().into_iter().enumerate() {
                if mv == incoming.opposite() {
                    continue;
                }
                let Some(next) = self.topo.adj[node][slot] else {
                    continue;
                };
                let next_state = (next, mv);
                if dist.contains_key(&next_state) {
                    continue;
                }
                dist.insert(next_state, d + 1);
                parent.insert(next_state, state);
                if next == to {
                    // First hit is minimal; rebuild the node path.
                    let mut path = vec![next];
                    let mut cursor = next_state;
                    while let Some(&prev) = parent.get(&cursor) {
                        path.push(prev.0);
                        cursor = prev;
                    }
                    path.reverse();
                    return (d + 1, path);
                }
                queue.push_back(next_state);
            }
        }
        (UNREACHABLE, vec![])
    }
}

fn all_pairs_distances(adj: &[[Option<NodeIndex>; 4]]) -> Vec<Vec<i32>> {
    let n = adj.len();
    let mut table = vec![vec![UNREACHABLE; n]; n];
    for start in 0..n {
        let row = &mut table[start];
        row[start] = 0;
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for neighbor in adj[node].iter().flatten() {
                if row[*neighbor] == UNREACHABLE {
                    row[*neighbor] = row[node] + 1;
                    queue.push_back(*neighbor);
                }
            }
        }
    }
    table
}

impl WorldState for GridWorld {
    fn agent_node(&self) -> NodeIndex {
        self.agent
    }

    fn agent_last_move(&self) -> Move {
        self.agent_last
    }

    fn agent_captured(&self) -> bool {
        self.captured
    }

    fn opponents(&self) -> Vec<OpponentId> {
        self.present.clone()
    }

    fn opponent_node(&self, id: OpponentId) -> NodeIndex {
        self.opp[id.index()].node
    }

    fn opponent_last_move(&self, id: OpponentId) -> Move {
        self.opp[id.index()].last
    }

    fn opponent_edible_time(&self, id: OpponentId) -> i32 {
        self.opp[id.index()].edible
    }

    fn opponent_respawn_time(&self, id: OpponentId) -> i32 {
        self.opp[id.index()].respawn
    }

    fn opponent_requires_action(&self, id: OpponentId) -> bool {
        let o = &self.opp[id.index()];
        o.respawn == 0 && self.is_junction(o.node)
    }

    fn opponent_spawn_node(&self) -> NodeIndex {
        self.topo.spawn
    }

    fn opponent_eaten(&self) -> bool {
        self.opp_eaten
    }

    fn neighbors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.topo.adj[node].iter().flatten().copied().collect()
    }

    fn neighbor_towards(&self, node: NodeIndex, mv: Move) -> Option<NodeIndex> {
        dir_index(mv).and_then(|d| self.topo.adj[node][d])
    }

    fn is_junction(&self, node: NodeIndex) -> bool {
        self.topo.adj[node].iter().flatten().count() > 2
    }

    fn junctions(&self) -> Vec<NodeIndex> {
        self.topo.junctions.clone()
    }

    fn path_distance(&self, from: NodeIndex, to: NodeIndex) -> i32 {
        self.topo.dist[from][to]
    }

    fn path_distance_avoiding_reversal(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        last_move: Move,
    ) -> i32 {
        self.constrained_search(from, to, last_move).0
    }

    fn shortest_path(&self, from: NodeIndex, to: NodeIndex) -> Vec<NodeIndex> {
        if self.topo.dist[from][to] >= UNREACHABLE {
            return vec![];
        }
        let mut path = vec![from];
        let mut cursor = from;
        while cursor != to {
            let next = Move::directions()
                .into_iter()
                .filter_map(|mv| self.neighbor_towards(cursor, mv))
                .find(|&n| self.topo.dist[n][to] == self.topo.dist[cursor][to] - 1);
            match next {
                Some(n) => {
                    path.push(n);
                    cursor = n;
                }
                None => return vec![],
            }
        }
        path
    }

    fn shortest_path_avoiding_reversal(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        last_move: Move,
    ) -> Vec<NodeIndex> {
        self.constrained_search(from, to, last_move).1
    }

    fn legal_moves(&self, node: NodeIndex) -> Vec<Move> {
        Move::directions()
            .into_iter()
            .filter(|&mv| self.neighbor_towards(node, mv).is_some())
            .collect()
    }

    fn legal_moves_excluding_reversal(&self, node: NodeIndex, last_move: Move) -> Vec<Move> {
        let banned = last_move.opposite();
        Move::directions()
            .into_iter()
            .filter(|&mv| mv != banned && self.neighbor_towards(node, mv).is_some())
            .collect()
    }

    fn approximate_move_towards(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        last_move: Move,
        metric: Metric,
    ) -> Move {
        let mut best: Option<(i64, Move)> = None;
        for mv in self.legal_moves_excluding_reversal(from, last_move) {
            let node = self
                .neighbor_towards(from, mv)
                .expect("legal move has a neighbor");
            let d = self.metric_distance(metric, node, to);
            if best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, mv));
            }
        }
        best.map_or(Move::Neutral, |(_, mv)| mv)
    }

    fn pellet_nodes(&self) -> Vec<NodeIndex> {
        self.topo.pellet_nodes.clone()
    }

    fn active_pellets(&self) -> Vec<NodeIndex> {
        self.topo
            .pellet_nodes
            .iter()
            .copied()
            .filter(|&n| self.pellet_active[n])
            .collect()
    }

    fn active_power_pellets(&self) -> Vec<NodeIndex> {
        self.topo
            .power_nodes
            .iter()
            .copied()
            .filter(|&n| self.power_active[n])
            .collect()
    }

    fn total_pellets(&self) -> i32 {
        self.topo.pellet_nodes.len() as i32
    }

    fn active_pellet_count(&self) -> i32 {
        self.active_pellets().len() as i32
    }

    fn score(&self) -> i32 {
        self.score
    }

    fn level_time(&self) -> i32 {
        self.level_time
    }

    fn total_time(&self) -> i32 {
        self.total_time
    }

    fn power_pellet_eaten(&self) -> bool {
        self.power_eaten
    }

    fn last_global_reversal(&self) -> Option<i32> {
        self.last_reversal
    }

    fn advance(&self, agent_move: Move, opponent_moves: &JointMove) -> Self {
        let mut next = self.clone();
        if next.captured {
            return next;
        }
        next.power_eaten = false;
        next.opp_eaten = false;

        // Agent step; an impossible move degrades to continuing straight.
        let agent_prev = next.agent;
        if let Some(dest) = self.neighbor_towards(next.agent, agent_move) {
            next.agent = dest;
            next.agent_last = agent_move;
        } else if let Some(dest) = self.neighbor_towards(next.agent, next.agent_last) {
            next.agent = dest;
        }

        // Pellet pickup.
        if next.pellet_active[next.agent] && self.topo.pellet_nodes.contains(&next.agent) {
            next.pellet_active[next.agent] = false;
            next.score += PELLET_SCORE;
        }
        if next.power_active[next.agent] && self.topo.power_nodes.contains(&next.agent) {
            next.power_active[next.agent] = false;
            next.score += POWER_PELLET_SCORE;
            next.power_eaten = true;
            // Power pellets make free opponents vulnerable and reverse them.
            for id in &next.present {
                let o = &mut next.opp[id.index()];
                if o.respawn == 0 {
                    o.edible = EDIBLE_TICKS;
                    o.last = o.last.opposite();
                }
            }
        }

        // Opponent steps.
        let mut prev_nodes = [0usize; NUM_OPPONENTS];
        for id in &self.present {
            let slot = id.index();
            prev_nodes[slot] = next.opp[slot].node;
            let o = &mut next.opp[slot];
            if o.respawn > 0 {
                o.respawn -= 1;
                if o.respawn == 0 {
                    o.node = self.topo.spawn;
                    o.last = Move::Neutral;
                }
                continue;
            }
            let requested = opponent_moves.get(*id).unwrap_or(Move::Neutral);
            let (dest, mv) = if let Some(d) = self.neighbor_towards(o.node, requested) {
                (d, requested)
            } else if let Some(d) = self.neighbor_towards(o.node, o.last) {
                (d, o.last)
            } else if let Some(&first) = self.legal_moves(o.node).first() {
                let dest = self
                    .neighbor_towards(o.node, first)
                    .expect("legal move has a neighbor");
                (dest, first)
            } else {
                continue;
            };
            o.node = dest;
            o.last = mv;
        }

        // Collisions, including a same-edge swap.
        for id in &self.present {
            let slot = id.index();
            let o = &mut next.opp[slot];
            if o.respawn > 0 {
                continue;
            }
            let met = o.node == next.agent;
            let swapped = o.node == agent_prev && next.agent == prev_nodes[slot];
            if met || swapped {
                if o.edible > 0 {
                    next.score += OPPONENT_SCORE;
                    next.opp_eaten = true;
                    o.edible = 0;
                    o.respawn = RESPAWN_TICKS;
                    o.node = self.topo.spawn;
                    o.last = Move::Neutral;
                } else {
                    next.captured = true;
                }
            }
        }

        // Timers.
        for id in &self.present {
            let o = &mut next.opp[id.index()];
            if o.edible > 0 {
                o.edible -= 1;
            }
        }
        next.level_time += 1;
        next.total_time += 1;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARENA: &str = "\
#########
#P..o..C#
#.##-##.#
#...S...#
#########";

    #[test]
    fn test_parse_counts_entities() {
        let world = GridWorld::parse(ARENA).unwrap();
        assert_eq!(world.opponents(), vec![OpponentId::Chaser]);
        assert_eq!(world.active_power_pellets().len(), 1);
        assert_eq!(world.total_pellets(), world.active_pellet_count());
        assert_eq!(
            world.opponent_spawn_node(),
            world.node_at(4, 3).unwrap()
        );
    }

    #[test]
    fn test_unconstrained_distances_are_symmetric() {
        let world = GridWorld::parse(ARENA).unwrap();
        let a = world.node_at(1, 1).unwrap();
        let b = world.node_at(7, 3).unwrap();
        assert_eq!(world.path_distance(a, b), world.path_distance(b, a));
        let path = world.shortest_path(a, b);
        assert_eq!(path.len() as i32, world.path_distance(a, b) + 1);
        assert_eq!(path.first(), Some(&a));
        assert_eq!(path.last(), Some(&b));
    }

    #[test]
    fn test_reversal_constraint_lengthens_path() {
        let world = GridWorld::parse("\
######
#P...#
######")
        .unwrap();
        let from = world.node_at(2, 1).unwrap();
        let to = world.node_at(1, 1).unwrap();
        assert_eq!(world.path_distance(from, to), 1);
        // Having just moved right, turning back is impossible in a dead-end
        // corridor.
        assert_eq!(
            world.path_distance_avoiding_reversal(from, to, Move::Right),
            UNREACHABLE
        );
    }

    #[test]
    fn test_advance_is_pure_and_picks_up_pellets() {
        let world = GridWorld::parse(ARENA).unwrap();
        let before = world.active_pellet_count();
        let next = world.advance(Move::Right, &JointMove::new());
        assert_eq!(world.active_pellet_count(), before, "original untouched");
        assert_eq!(next.active_pellet_count(), before - 1);
        assert_eq!(next.score(), PELLET_SCORE);
        assert_eq!(next.level_time(), 1);
        assert_eq!(next.agent_last_move(), Move::Right);
    }

    #[test]
    fn test_power_pellet_reverses_and_marks_opponents() {
        let mut world = GridWorld::parse(ARENA).unwrap();
        // Stand next to the power pellet, opponent walking left.
        world.set_agent(world.node_at(3, 1).unwrap(), Move::Right);
        world.set_opponent(
            OpponentId::Chaser,
            world.node_at(7, 1).unwrap(),
            Move::Left,
        );
        let next = world.advance(Move::Right, &JointMove::new());
        assert!(next.power_pellet_eaten());
        assert_eq!(
            next.opponent_edible_time(OpponentId::Chaser),
            EDIBLE_TICKS - 1
        );
    }

    #[test]
    fn test_walking_into_a_threat_is_a_capture() {
        let world = GridWorld::parse("\
#####
#PC-#
#####")
        .unwrap();
        let next = world.advance(Move::Right, &JointMove::new());
        assert!(next.agent_captured());
    }

    #[test]
    fn test_swap_through_is_a_capture() {
        let mut world = GridWorld::parse("\
#####
#PC-#
#####")
        .unwrap();
        world.set_opponent(
            OpponentId::Chaser,
            world.node_at(2, 1).unwrap(),
            Move::Left,
        );
        // Agent steps right while the opponent steps left through it.
        let mut joint = JointMove::new();
        joint.set(OpponentId::Chaser, Move::Left);
        let next = world.advance(Move::Right, &joint);
        assert!(next.agent_captured());
    }

    #[test]
    fn test_eating_a_vulnerable_opponent_respawns_it() {
        let mut world = GridWorld::parse("\
#####
#PCS#
#####")
        .unwrap();
        world.set_edible_time(OpponentId::Chaser, 50);
        let next = world.advance(Move::Right, &JointMove::new());
        assert!(!next.agent_captured());
        assert!(next.opponent_eaten());
        assert_eq!(next.score(), OPPONENT_SCORE);
        assert_eq!(
            next.opponent_respawn_time(OpponentId::Chaser),
            RESPAWN_TICKS
        );
        assert_eq!(
            next.opponent_node(OpponentId::Chaser),
            next.opponent_spawn_node()
        );
    }
}
