// Library exports for the maze agent
// This allows the simulate binary and external harnesses to drive the
// decision core against their own world implementations.

pub mod config;
pub mod decision_log;
pub mod grid;
pub mod oracle;
pub mod pathfind;
pub mod planner;
pub mod safety;
pub mod search;
pub mod types;
