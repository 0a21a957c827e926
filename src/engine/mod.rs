//! Terminal front end for the convergence engine
//!
//! 1. Planning - filter the resolved graph by target
//! 2. Diffing - show current vs desired state
//! 3. Executing - confirm, converge, and summarize

pub mod differ;
pub mod executor;
pub mod planner;

pub use executor::{ApplyOptions, execute};
pub use planner::{Target, matches_filter, parse_target};
