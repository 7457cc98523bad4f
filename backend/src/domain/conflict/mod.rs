//! Conflict resolution: the strategy algebra and the same-entity heuristics.

pub mod algebra;
pub mod identity;

pub use self::algebra::Strategy;
pub use self::identity::{HeuristicContext, HeuristicSpec};
