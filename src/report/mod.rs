// Suggestion aggregation and report export
pub mod aggregator;
pub mod export;

#[cfg(test)]
mod tests;

pub use aggregator::*;
pub use export::*;
