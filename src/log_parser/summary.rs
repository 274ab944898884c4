// Whole-log statistics gathered straight from the parsed records
use crate::report::preview;
use crate::types::{LogSummary, QueryRecord, SlowQuery};

/// Records listed in `LogSummary::slowest`
pub const SLOWEST_LIMIT: usize = 5;

/// Averages, totals and the slowest records of a parsed log.
/// Returns `None` when there are no records.
pub fn summarize(records: &[QueryRecord]) -> Option<LogSummary> {
    if records.is_empty() {
        return None;
    }

    let count = records.len() as f64;
    let total_query_time: f64 = records.iter().map(|r| r.query_time.unwrap_or(0.0)).sum();
    let total_lock_time: f64 = records.iter().map(|r| r.lock_time.unwrap_or(0.0)).sum();

    let mut by_time: Vec<&QueryRecord> = records.iter().collect();
    by_time.sort_by(|a, b| {
        b.query_time
            .unwrap_or(0.0)
            .total_cmp(&a.query_time.unwrap_or(0.0))
    });

    Some(LogSummary {
        total_queries: records.len(),
        avg_query_time: total_query_time / count,
        avg_lock_time: total_lock_time / count,
        total_rows_examined: records.iter().map(|r| r.rows_examined.unwrap_or(0)).sum(),
        total_rows_sent: records.iter().map(|r| r.rows_sent.unwrap_or(0)).sum(),
        slowest: by_time.into_iter().take(SLOWEST_LIMIT).map(slow_query).collect(),
    })
}

fn slow_query(record: &QueryRecord) -> SlowQuery {
    SlowQuery {
        query_time: record.query_time,
        rows_examined: record.rows_examined,
        rows_sent: record.rows_sent,
        efficiency: efficiency(record.rows_sent, record.rows_examined),
        query: preview(record.normalized_query()),
    }
}

// A record without a timing header counts as one row examined
fn efficiency(rows_sent: Option<u64>, rows_examined: Option<u64>) -> Option<f64> {
    let examined = rows_examined.unwrap_or(1);
    if examined == 0 {
        return None;
    }
    let ratio = rows_sent.unwrap_or(0) as f64 / examined as f64;
    Some((ratio * 10_000.0).round() / 10_000.0)
}
