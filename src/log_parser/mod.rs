// Slow-query log parser module
pub mod parser;
pub mod summary;


pub use parser::{ParseResult, SlowLogParser, RECORD_START_MARKER};
pub use summary::{summarize, SLOWEST_LIMIT};
