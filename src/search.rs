// Adversarial search engine: alternating agent / opponents plies over
// WorldState snapshots, parameterized by a combinator (minimax, pruned
// minimax, or expectation over the opponent joint-move distribution),
// wrapped in iterative deepening under a hard wall-clock budget.
//
// The budget is polled at the top of every fan-out; a trip abandons the
// remaining siblings and unwinds with the best value accumulated so far.
// Best-move bookkeeping is therefore incremental: every quiescent leaf that
// improves on the global best immediately records the root move in flight,
// so a mid-search cutoff still yields the best move found so far.

use std::time::Instant;

use log::{debug, info};

use crate::config::{Combinator, Config, OpponentTable};
use crate::oracle::WorldState;
use crate::types::{JointMove, Move};

/// Search-based policy. Stateless across ticks apart from diagnostics.
pub struct SearchPolicy {
    config: Config,
    last_value: i32,
    last_depth: u32,
}

/// Accumulator owned by one top-level `decide` invocation and threaded
/// through the recursion; nothing leaks across calls.
struct SearchContext<'a> {
    config: &'a Config,
    deadline: Instant,
    /// Nominal depth of the current deepening pass; marks the root ply.
    root_depth: u32,
    /// Best quiescent-leaf utility seen so far across passes.
    best_utility: i32,
    /// Root move whose subtree produced `best_utility`.
    chosen: Move,
    /// Root move currently being explored.
    root_move: Move,
}

/// Scalar evaluation of a world state; larger is better. A captured agent
/// overrides every other term.
pub fn state_utility<W: WorldState>(world: &W) -> i32 {
    if world.agent_captured() {
        return 0;
    }
    world.score() + (world.total_pellets() - world.active_pellet_count()) - world.level_time()
}

impl SearchPolicy {
    pub fn new(config: Config) -> Self {
        SearchPolicy {
            config,
            last_value: 0,
            last_depth: 0,
        }
    }

    /// Root value of the last completed deepening pass, for diagnostics.
    pub fn last_value(&self) -> i32 {
        self.last_value
    }

    /// Nominal depth the deepening driver reached before the budget ran out.
    pub fn last_depth(&self) -> u32 {
        self.last_depth
    }

    /// Iterative deepening driver. Runs full bounded passes of increasing
    /// nominal depth until the deadline passes or a pass reports the capture
    /// value. Always returns a legal move when the root has one, even with
    /// the deadline already expired.
    pub fn decide<W: WorldState>(&mut self, world: &W, deadline: Instant) -> Move {
        let started = Instant::now();
        let mut ctx = SearchContext {
            config: &self.config,
            deadline,
            root_depth: 0,
            best_utility: i32::MIN,
            chosen: Move::Neutral,
            root_move: Move::Neutral,
        };

        // Starvation guard: seed the accumulator before any deadline poll so
        // a zero budget still produces a legal move.
        if let Some(&first) = max_moves(world).first() {
            ctx.chosen = first;
            ctx.root_move = first;
        }

        let mut depth = self.config.timing.initial_depth;
        let value;
        loop {
            ctx.root_depth = depth;
            let pass_value = search_max(&mut ctx, world, depth, i32::MIN, i32::MAX);
            ctx.best_utility = pass_value;
            if Instant::now() >= deadline || pass_value == 0 {
                value = pass_value;
                break;
            }
            depth += self.config.timing.depth_step;
        }

        self.last_value = value;
        self.last_depth = depth;
        info!(
            "tick {}: chose {} (value: {}, depth: {}, time: {}ms)",
            world.total_time(),
            ctx.chosen.as_str(),
            value,
            depth,
            started.elapsed().as_millis()
        );
        ctx.chosen
    }
}

/// Legal agent moves at a max ply. Reversal is suppressed except on the tick
/// after a power-pellet pickup, an opponent capture, or a global reversal,
/// all of which invalidate the no-reversal restriction.
fn max_moves<W: WorldState>(world: &W) -> Vec<Move> {
    let node = world.agent_node();
    let reversal_lifted = world.power_pellet_eaten()
        || world.opponent_eaten()
        || world.last_global_reversal() == Some(world.total_time() - 1);
    if reversal_lifted {
        return world.legal_moves(node);
    }
    let moves = world.legal_moves_excluding_reversal(node, world.agent_last_move());
    if moves.is_empty() {
        // Dead end: turning around is the only option left.
        return world.legal_moves(node);
    }
    moves
}

/// Branch set of the opponents ply: the Cartesian product of each deciding
/// opponent's candidate moves. Determinate opponents contribute exactly
/// their scripted approach move; the uncertain one contributes its full
/// non-reversing legal set. Opponents mid-corridor contribute nothing and
/// continue straight inside `advance`.
fn joint_moves<W: WorldState>(world: &W, table: &OpponentTable) -> Vec<JointMove> {
    let agent = world.agent_node();
    let mut branches = vec![JointMove::new()];
    for id in world.opponents() {
        if !world.opponent_requires_action(id) {
            continue;
        }
        let node = world.opponent_node(id);
        let last = world.opponent_last_move(id);
        let candidates: Vec<Move> = if table.is_uncertain(id) {
            world.legal_moves_excluding_reversal(node, last)
        } else {
            vec![world.approximate_move_towards(node, agent, last, table.metric(id))]
        };
        if candidates.is_empty() {
            continue;
        }
        let mut expanded = Vec::with_capacity(branches.len() * candidates.len());
        for branch in &branches {
            for &mv in &candidates {
                let mut joint = branch.clone();
                joint.set(id, mv);
                expanded.push(joint);
            }
        }
        branches = expanded;
    }
    branches
}

fn search_max<W: WorldState>(
    ctx: &mut SearchContext,
    world: &W,
    depth: u32,
    mut alpha: i32,
    beta: i32,
) -> i32 {
    if world.agent_captured() {
        return 0;
    }
    if depth == 0 {
        return quiescence_max(ctx, world, alpha, beta);
    }
    let pruning = ctx.config.search.combinator == Combinator::AlphaBeta;
    let mut best = i32::MIN;
    for mv in max_moves(world) {
        if Instant::now() >= ctx.deadline {
            break;
        }
        if depth == ctx.root_depth {
            ctx.root_move = mv;
        }
        let value = search_opponents(ctx, world, mv, depth - 1, alpha, beta);
        best = best.max(value);
        if pruning {
            alpha = alpha.max(value);
            if beta <= alpha {
                return best;
            }
        }
    }
    best
}

fn search_opponents<W: WorldState>(
    ctx: &mut SearchContext,
    world: &W,
    agent_move: Move,
    depth: u32,
    alpha: i32,
    mut beta: i32,
) -> i32 {
    if world.agent_captured() {
        return 0;
    }
    if depth == 0 {
        return quiescence_opponents(ctx, world, agent_move, alpha, beta);
    }
    let branches = joint_moves(world, &ctx.config.opponents);
    match ctx.config.search.combinator {
        Combinator::Expectimax => {
            let mut sum: i64 = 0;
            for joint in &branches {
                if Instant::now() >= ctx.deadline {
                    break;
                }
                let next = world.advance(agent_move, joint);
                sum += i64::from(search_max(ctx, &next, depth - 1, alpha, beta));
            }
            (sum / branches.len() as i64) as i32
        }
        Combinator::Minimax | Combinator::AlphaBeta => {
            let pruning = ctx.config.search.combinator == Combinator::AlphaBeta;
            let mut worst = i32::MAX;
            for joint in &branches {
                if Instant::now() >= ctx.deadline {
                    break;
                }
                let next = world.advance(agent_move, joint);
                let value = search_max(ctx, &next, depth - 1, alpha, beta);
                worst = worst.min(value);
                if pruning {
                    beta = beta.min(value);
                    if beta <= alpha {
                        return worst;
                    }
                }
            }
            worst
        }
    }
}

/// Past nominal depth the search keeps running with undiminished combinator
/// logic until the agent stands on a junction (a quiet position) or is
/// captured. Cutting off mid-corridor would hide whatever waits at the end
/// of a forced run.
fn quiescence_max<W: WorldState>(
    ctx: &mut SearchContext,
    world: &W,
    mut alpha: i32,
    beta: i32,
) -> i32 {
    if world.agent_captured() {
        return 0;
    }
    if world.is_junction(world.agent_node()) {
        return leaf_utility(ctx, world);
    }
    let pruning = ctx.config.search.combinator == Combinator::AlphaBeta;
    let mut best = i32::MIN;
    for mv in max_moves(world) {
        if Instant::now() >= ctx.deadline {
            break;
        }
        let value = quiescence_opponents(ctx, world, mv, alpha, beta);
        best = best.max(value);
        if pruning {
            alpha = alpha.max(value);
            if beta <= alpha {
                return best;
            }
        }
    }
    best
}

fn quiescence_opponents<W: WorldState>(
    ctx: &mut SearchContext,
    world: &W,
    agent_move: Move,
    alpha: i32,
    mut beta: i32,
) -> i32 {
    if world.agent_captured() {
        return 0;
    }
    if world.is_junction(world.agent_node()) {
        return leaf_utility(ctx, world);
    }
    let branches = joint_moves(world, &ctx.config.opponents);
    match ctx.config.search.combinator {
        Combinator::Expectimax => {
            let mut sum: i64 = 0;
            for joint in &branches {
                if Instant::now() >= ctx.deadline {
                    break;
                }
                let next = world.advance(agent_move, joint);
                sum += i64::from(quiescence_max(ctx, &next, alpha, beta));
            }
            (sum / branches.len() as i64) as i32
        }
        Combinator::Minimax | Combinator::AlphaBeta => {
            let pruning = ctx.config.search.combinator == Combinator::AlphaBeta;
            let mut worst = i32::MAX;
            for joint in &branches {
                if Instant::now() >= ctx.deadline {
                    break;
                }
                let next = world.advance(agent_move, joint);
                let value = quiescence_max(ctx, &next, alpha, beta);
                worst = worst.min(value);
                if pruning {
                    beta = beta.min(value);
                    if beta <= alpha {
                        return worst;
                    }
                }
            }
            worst
        }
    }
}

/// Evaluates a quiescent leaf and feeds the anytime accumulator: a new
/// global best immediately pins the root move currently in flight.
fn leaf_utility<W: WorldState>(ctx: &mut SearchContext, world: &W) -> i32 {
    let utility = state_utility(world);
    if utility > ctx.best_utility {
        ctx.best_utility = utility;
        ctx.chosen = ctx.root_move;
        debug!(
            "new best utility {} via root move {}",
            utility,
            ctx.chosen.as_str()
        );
    }
    utility
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Metric, NodeIndex, OpponentId};
    use std::time::Duration;

    /// Two-ply scripted world: the root offers one agent move and one
    /// deciding opponent with three candidate moves; each joint choice leads
    /// to a quiescent leaf with a prescribed score.
    #[derive(Clone)]
    struct StubWorld {
        leaf_score: Option<i32>,
    }

    impl StubWorld {
        fn root() -> Self {
            StubWorld { leaf_score: None }
        }

        fn score_for(mv: Move) -> i32 {
            match mv {
                Move::Up => 10,
                Move::Left => 20,
                Move::Right => 30,
                _ => 0,
            }
        }
    }

    impl WorldState for StubWorld {
        fn agent_node(&self) -> NodeIndex {
            0
        }
        fn agent_last_move(&self) -> Move {
            Move::Neutral
        }
        fn agent_captured(&self) -> bool {
            false
        }
        fn opponents(&self) -> Vec<OpponentId> {
            vec![OpponentId::Rover]
        }
        fn opponent_node(&self, _id: OpponentId) -> NodeIndex {
            1
        }
        fn opponent_last_move(&self, _id: OpponentId) -> Move {
            Move::Neutral
        }
        fn opponent_edible_time(&self, _id: OpponentId) -> i32 {
            0
        }
        fn opponent_respawn_time(&self, _id: OpponentId) -> i32 {
            0
        }
        fn opponent_requires_action(&self, _id: OpponentId) -> bool {
            self.leaf_score.is_none()
        }
        fn opponent_spawn_node(&self) -> NodeIndex {
            1
        }
        fn opponent_eaten(&self) -> bool {
            false
        }
        fn neighbors(&self, _node: NodeIndex) -> Vec<NodeIndex> {
            vec![]
        }
        fn neighbor_towards(&self, _node: NodeIndex, _mv: Move) -> Option<NodeIndex> {
            None
        }
        fn is_junction(&self, _node: NodeIndex) -> bool {
            // The root is mid-corridor; every advanced state is quiescent.
            self.leaf_score.is_some()
        }
        fn junctions(&self) -> Vec<NodeIndex> {
            vec![]
        }
        fn path_distance(&self, _from: NodeIndex, _to: NodeIndex) -> i32 {
            0
        }
        fn path_distance_avoiding_reversal(
            &self,
            _from: NodeIndex,
            _to: NodeIndex,
            _last: Move,
        ) -> i32 {
            0
        }
        fn shortest_path(&self, _from: NodeIndex, _to: NodeIndex) -> Vec<NodeIndex> {
            vec![]
        }
        fn shortest_path_avoiding_reversal(
            &self,
            _from: NodeIndex,
            _to: NodeIndex,
            _last: Move,
        ) -> Vec<NodeIndex> {
            vec![]
        }
        fn legal_moves(&self, _node: NodeIndex) -> Vec<Move> {
            vec![Move::Down]
        }
        fn legal_moves_excluding_reversal(&self, _node: NodeIndex, _last: Move) -> Vec<Move> {
            if self.leaf_score.is_none() {
                // Agent and the uncertain opponent share this query; the
                // opponent's three candidates drive the branch set.
                vec![Move::Up, Move::Left, Move::Right]
            } else {
                vec![Move::Down]
            }
        }
        fn approximate_move_towards(
            &self,
            _from: NodeIndex,
            _to: NodeIndex,
            _last: Move,
            _metric: Metric,
        ) -> Move {
            Move::Up
        }
        fn pellet_nodes(&self) -> Vec<NodeIndex> {
            vec![]
        }
        fn active_pellets(&self) -> Vec<NodeIndex> {
            vec![]
        }
        fn active_power_pellets(&self) -> Vec<NodeIndex> {
            vec![]
        }
        fn total_pellets(&self) -> i32 {
            0
        }
        fn active_pellet_count(&self) -> i32 {
            0
        }
        fn score(&self) -> i32 {
            self.leaf_score.unwrap_or(0)
        }
        fn level_time(&self) -> i32 {
            0
        }
        fn total_time(&self) -> i32 {
            0
        }
        fn power_pellet_eaten(&self) -> bool {
            false
        }
        fn last_global_reversal(&self) -> Option<i32> {
            None
        }
        fn advance(&self, _agent_move: Move, opponent_moves: &JointMove) -> Self {
            if self.leaf_score.is_some() {
                // Leaves are absorbing so deeper plies keep their value.
                return self.clone();
            }
            let mv = opponent_moves
                .get(OpponentId::Rover)
                .unwrap_or(Move::Neutral);
            StubWorld {
                leaf_score: Some(Self::score_for(mv)),
            }
        }
    }

    fn policy_with(combinator: Combinator) -> SearchPolicy {
        let mut config = Config::default_hardcoded();
        config.search.combinator = combinator;
        SearchPolicy::new(config)
    }

    /// Runs one full search pass with an ample deadline, so the value is the
    /// exact combinator result rather than a budget-truncated one.
    fn pass_value(combinator: Combinator) -> i32 {
        let mut config = Config::default_hardcoded();
        config.search.combinator = combinator;
        let mut ctx = SearchContext {
            config: &config,
            deadline: Instant::now() + Duration::from_secs(1),
            root_depth: 2,
            best_utility: i32::MIN,
            chosen: Move::Neutral,
            root_move: Move::Neutral,
        };
        search_max(&mut ctx, &StubWorld::root(), 2, i32::MIN, i32::MAX)
    }

    #[test]
    fn test_expectimax_value_is_arithmetic_mean() {
        // Three equally weighted opponent branches worth 10, 20 and 30.
        assert_eq!(pass_value(Combinator::Expectimax), 20);
    }

    #[test]
    fn test_minimax_value_is_worst_case() {
        assert_eq!(pass_value(Combinator::Minimax), 10);
    }

    #[test]
    fn test_alpha_beta_matches_minimax_value() {
        assert_eq!(
            pass_value(Combinator::Minimax),
            pass_value(Combinator::AlphaBeta)
        );
    }

    #[test]
    fn test_zero_budget_still_returns_a_legal_root_move() {
        for combinator in [
            Combinator::Minimax,
            Combinator::AlphaBeta,
            Combinator::Expectimax,
        ] {
            let mut policy = policy_with(combinator);
            // Deadline already expired before the search starts.
            let mv = policy.decide(&StubWorld::root(), Instant::now());
            assert!(
                StubWorld::root()
                    .legal_moves_excluding_reversal(0, Move::Neutral)
                    .contains(&mv),
                "expected a legal move, got {:?}",
                mv
            );
        }
    }

    #[test]
    fn test_reported_depth_is_the_final_pass_depth() {
        let mut policy = policy_with(Combinator::AlphaBeta);
        // One pass runs against the expired deadline; the diagnostic must
        // name that pass's depth, not the never-run next one.
        let _ = policy.decide(&StubWorld::root(), Instant::now());
        assert_eq!(policy.last_depth(), policy.config.timing.initial_depth);
    }

    #[test]
    fn test_captured_state_utility_is_zero() {
        let mut leaf = StubWorld::root();
        leaf.leaf_score = Some(9999);
        assert_eq!(state_utility(&leaf), 9999);
        // Capture overrides every score term.
        let captured = CapturedStub(leaf);
        assert_eq!(state_utility(&captured), 0);
    }

    #[test]
    fn test_captured_root_short_circuits_search() {
        for combinator in [
            Combinator::Minimax,
            Combinator::AlphaBeta,
            Combinator::Expectimax,
        ] {
            let mut policy = policy_with(combinator);
            let deadline = Instant::now() + Duration::from_millis(5);
            let _ = policy.decide(&CapturedStub(StubWorld::root()), deadline);
            assert_eq!(policy.last_value(), 0);
        }
    }

    #[derive(Clone)]
    struct CapturedStub(StubWorld);

    impl WorldState for CapturedStub {
        fn agent_node(&self) -> NodeIndex {
            self.0.agent_node()
        }
        fn agent_last_move(&self) -> Move {
            self.0.agent_last_move()
        }
        fn agent_captured(&self) -> bool {
            true
        }
        fn opponents(&self) -> Vec<OpponentId> {
            self.0.opponents()
        }
        fn opponent_node(&self, id: OpponentId) -> NodeIndex {
            self.0.opponent_node(id)
        }
        fn opponent_last_move(&self, id: OpponentId) -> Move {
            self.0.opponent_last_move(id)
        }
        fn opponent_edible_time(&self, id: OpponentId) -> i32 {
            self.0.opponent_edible_time(id)
        }
        fn opponent_respawn_time(&self, id: OpponentId) -> i32 {
            self.0.opponent_respawn_time(id)
        }
        fn opponent_requires_action(&self, id: OpponentId) -> bool {
            self.0.opponent_requires_action(id)
        }
        fn opponent_spawn_node(&self) -> NodeIndex {
            self.0.opponent_spawn_node()
        }
        fn opponent_eaten(&self) -> bool {
            self.0.opponent_eaten()
        }
        fn neighbors(&self, node: NodeIndex) -> Vec<NodeIndex> {
            self.0.neighbors(node)
        }
        fn neighbor_towards(&self, node: NodeIndex, mv: Move) -> Option<NodeIndex> {
            self.0.neighbor_towards(node, mv)
        }
        fn is_junction(&self, node: NodeIndex) -> bool {
            self.0.is_junction(node)
        }
        fn junctions(&self) -> Vec<NodeIndex> {
            self.0.junctions()
        }
        fn path_distance(&self, from: NodeIndex, to: NodeIndex) -> i32 {
            self.0.path_distance(from, to)
        }
        fn path_distance_avoiding_reversal(&self, from: NodeIndex, to: NodeIndex, last: Move) -> i32 {
            self.0.path_distance_avoiding_reversal(from, to, last)
        }
        fn shortest_path(&self, from: NodeIndex, to: NodeIndex) -> Vec<NodeIndex> {
            self.0.shortest_path(from, to)
        }
        fn shortest_path_avoiding_reversal(
            &self,
            from: NodeIndex,
            to: NodeIndex,
            last: Move,
        ) -> Vec<NodeIndex> {
            self.0.shortest_path_avoiding_reversal(from, to, last)
        }
        fn legal_moves(&self, node: NodeIndex) -> Vec<Move> {
            self.0.legal_moves(node)
        }
        fn legal_moves_excluding_reversal(&self, node: NodeIndex, last: Move) -> Vec<Move> {
            self.0.legal_moves_excluding_reversal(node, last)
        }
        fn approximate_move_towards(
            &self,
            from: NodeIndex,
            to: NodeIndex,
            last: Move,
            metric: Metric,
        ) -> Move {
            self.0.approximate_move_towards(from, to, last, metric)
        }
        fn pellet_nodes(&self) -> Vec<NodeIndex> {
            self.0.pellet_nodes()
        }
        fn active_pellets(&self) -> Vec<NodeIndex> {
            self.0.active_pellets()
        }
        fn active_power_pellets(&self) -> Vec<NodeIndex> {
            self.0.active_power_pellets()
        }
        fn total_pellets(&self) -> i32 {
            self.0.total_pellets()
        }
        fn active_pellet_count(&self) -> i32 {
            self.0.active_pellet_count()
        }
        fn score(&self) -> i32 {
            self.0.score()
        }
        fn level_time(&self) -> i32 {
            self.0.level_time()
        }
        fn total_time(&self) -> i32 {
            self.0.total_time()
        }
        fn power_pellet_eaten(&self) -> bool {
            self.0.power_pellet_eaten()
        }
        fn last_global_reversal(&self) -> Option<i32> {
            self.0.last_global_reversal()
        }
        fn advance(&self, agent_move: Move, opponent_moves: &JointMove) -> Self {
            CapturedStub(self.0.advance(agent_move, opponent_moves))
        }
    }
}
