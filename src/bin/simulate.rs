// Runs the decision core against the built-in grid maze and prints a
// summary. Useful for eyeballing behavior and generating decision logs.
//
// Usage: simulate [--policy rules|search] [--ticks N] [--seed N]

use std::env;
use std::process;
use std::time::Instant;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use maze_agent::config::Config;
use maze_agent::decision_log::DecisionLogger;
use maze_agent::grid::GridWorld;
use maze_agent::oracle::WorldState;
use maze_agent::planner::RulePolicy;
use maze_agent::search::SearchPolicy;
use maze_agent::types::JointMove;

const MAZE: &str = "\
###################
#P.......#.......o#
#.###.##.#.##.###.#
#.....#.....#.....#
#.###.#.###.#.###.#
#..........C......#
#.###.#.#A#.#.###.#
#.....#.FSR.#.....#
#.###.##.#.##.###.#
#o................#
###################";

enum Policy {
    Rules(RulePolicy),
    Search(SearchPolicy),
}

struct Args {
    policy: String,
    ticks: u32,
    seed: u64,
}

fn parse_args() -> Args {
    let mut args = Args {
        policy: "rules".to_string(),
        ticks: 500,
        seed: 0,
    };
    let mut iter = env::args().skip(1);
    while let Some(flag) = iter.next() {
        let value = iter.next();
        match (flag.as_str(), value) {
            ("--policy", Some(v)) if v == "rules" || v == "search" => args.policy = v,
            ("--ticks", Some(v)) => match v.parse() {
                Ok(n) => args.ticks = n,
                Err(_) => {
                    eprintln!("invalid tick count '{}'", v);
                    process::exit(1);
                }
            },
            ("--seed", Some(v)) => match v.parse() {
                Ok(n) => args.seed = n,
                Err(_) => {
                    eprintln!("invalid seed '{}'", v);
                    process::exit(1);
                }
            },
            (other, _) => {
                eprintln!("usage: simulate [--policy rules|search] [--ticks N] [--seed N]");
                eprintln!("unknown or incomplete argument '{}'", other);
                process::exit(1);
            }
        }
    }
    args
}

fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args = parse_args();
    let config = Config::load_or_default();
    let logger = DecisionLogger::new(config.decision_log.enabled, &config.decision_log.path);

    let mut world = match GridWorld::parse(MAZE) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("bad built-in maze: {}", e);
            process::exit(1);
        }
    };
    let budget = config.timing.budget();
    let mut policy = match args.policy.as_str() {
        "search" => Policy::Search(SearchPolicy::new(config)),
        _ => Policy::Rules(RulePolicy::new(config)),
    };
    let mut rng = StdRng::seed_from_u64(args.seed);

    info!(
        "Simulating {} ticks with the {} policy (seed {})",
        args.ticks, args.policy, args.seed
    );

    let mut ticks_survived = 0;
    for _ in 0..args.ticks {
        let deadline = Instant::now() + budget;
        let (chosen, tactic) = match &mut policy {
            Policy::Rules(p) => {
                let mv = p.decide(&world, deadline);
                (mv, p.last_tactic())
            }
            Policy::Search(p) => (p.decide(&world, deadline), Some("tree_search")),
        };
        logger.log_move(&world, chosen, tactic);

        // Opponents wander: at each junction they pick a random legal turn,
        // otherwise they keep walking.
        let mut joint = JointMove::new();
        for id in world.opponents() {
            if world.opponent_respawn_time(id) > 0 || !world.opponent_requires_action(id) {
                continue;
            }
            let options = world
                .legal_moves_excluding_reversal(world.opponent_node(id), world.opponent_last_move(id));
            if !options.is_empty() {
                joint.set(id, options[rng.random_range(0..options.len())]);
            }
        }

        world = world.advance(chosen, &joint);
        ticks_survived += 1;
        if world.agent_captured() {
            warn!("Captured at tick {}", world.total_time());
            break;
        }
        if world.active_pellet_count() == 0 {
            info!("Maze cleared at tick {}", world.total_time());
            break;
        }
    }

    info!(
        "Done: {} ticks, score {}, {} of {} pellets remaining",
        ticks_survived,
        world.score(),
        world.active_pellet_count(),
        world.total_pellets()
    );
}
