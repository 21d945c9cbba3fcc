//! `when` clause conditions.
//!
//! A condition is a namespace path tested for truthiness, a `.length`
//! comparison, a negation, or one level of `&&` / `||` over those.

mod evaluator;
mod parser;

pub use evaluator::evaluate;
pub use parser::{CompareOp, Condition};
