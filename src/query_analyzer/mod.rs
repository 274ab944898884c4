// Query analyzer module: clause extraction and plan evaluation
pub mod clause_extractor;
pub mod plan_evaluator;
pub mod syntax;

#[cfg(test)]
mod tests;

pub use clause_extractor::*;
pub use plan_evaluator::*;
