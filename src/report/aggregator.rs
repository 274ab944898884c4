use crate::types::{ColumnFrequency, Report, ReportEntry, Suggestion, SuggestionKind};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Number of columns listed in `Report::recommended_indexes`
pub const RECOMMENDED_INDEX_LIMIT: usize = 20;

/// Characters of the query kept in each report entry
pub const QUERY_PREVIEW_LENGTH: usize = 100;

/// Suggestions produced for one analyzed query
#[derive(Debug, Clone)]
pub struct SuggestionBatch {
    pub query: String,
    pub query_time: Option<f64>,
    pub suggestions: Vec<Suggestion>,
}

impl SuggestionBatch {
    pub fn new(query: &str, query_time: Option<f64>, suggestions: Vec<Suggestion>) -> Self {
        Self {
            query: preview(query),
            query_time,
            suggestions,
        }
    }
}

/// First `QUERY_PREVIEW_LENGTH` characters, with `...` when truncated
pub fn preview(query: &str) -> String {
    match query.char_indices().nth(QUERY_PREVIEW_LENGTH) {
        Some((cut, _)) => format!("{}...", &query[..cut]),
        None => query.to_string(),
    }
}

/// Running totals over every analyzed query.
///
/// Mutation goes through `&mut self`; parallel producers either send batches
/// to one owner or build partial aggregators and `merge` them.
#[derive(Debug, Clone, Default)]
pub struct SuggestionAggregator {
    queries_analyzed: usize,
    suggestion_counts: BTreeMap<SuggestionKind, usize>,
    suggestions_by_type: BTreeMap<SuggestionKind, Vec<ReportEntry>>,
    suggestions_by_table: BTreeMap<String, Vec<ReportEntry>>,
    /// Column frequencies in first-seen order
    column_frequency: Vec<ColumnFrequency>,
    column_positions: HashMap<String, usize>,
}

impl SuggestionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queries_analyzed(&self) -> usize {
        self.queries_analyzed
    }

    pub fn total_suggestions(&self) -> usize {
        self.suggestion_counts.values().sum()
    }

    /// Account for one query's suggestions, keeping their order
    pub fn add_batch(&mut self, batch: SuggestionBatch) {
        self.queries_analyzed += 1;
        debug!("Aggregating {} suggestions", batch.suggestions.len());

        for suggestion in batch.suggestions {
            if let Some(columns) = &suggestion.columns {
                let mut counted = HashSet::new();
                for column in columns {
                    if counted.insert(column.as_str()) {
                        self.bump_column(column, 1);
                    }
                }
            }

            *self.suggestion_counts.entry(suggestion.kind).or_insert(0) += 1;

            let entry = ReportEntry {
                suggestion,
                query: batch.query.clone(),
                query_time: batch.query_time,
            };
            if let Some(table) = &entry.suggestion.table {
                self.suggestions_by_table
                    .entry(table.clone())
                    .or_default()
                    .push(entry.clone());
            }
            self.suggestions_by_type
                .entry(entry.suggestion.kind)
                .or_default()
                .push(entry);
        }
    }

    fn bump_column(&mut self, column: &str, by: u64) {
        match self.column_positions.get(column) {
            Some(&position) => self.column_frequency[position].count += by,
            None => {
                self.column_positions.insert(column.to_string(), self.column_frequency.len());
                self.column_frequency.push(ColumnFrequency {
                    column: column.to_string(),
                    count: by,
                });
            }
        }
    }

    /// Fold another partial aggregate into this one. Totals are independent of
    /// merge order; only the cross-query order of list entries may differ.
    pub fn merge(&mut self, other: SuggestionAggregator) {
        self.queries_analyzed += other.queries_analyzed;

        for (kind, count) in other.suggestion_counts {
            *self.suggestion_counts.entry(kind).or_insert(0) += count;
        }
        for (kind, entries) in other.suggestions_by_type {
            self.suggestions_by_type.entry(kind).or_default().extend(entries);
        }
        for (table, entries) in other.suggestions_by_table {
            self.suggestions_by_table.entry(table).or_default().extend(entries);
        }
        for frequency in other.column_frequency {
            self.bump_column(&frequency.column, frequency.count);
        }
    }

    /// Build the report; the aggregator keeps its state
    pub fn finalize(&self) -> Report {
        let mut ranked = self.column_frequency.clone();
        // Stable sort: equal counts keep first-seen order
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked.truncate(RECOMMENDED_INDEX_LIMIT);

        Report {
            timestamp: chrono::Utc::now().to_rfc3339(),
            total_queries_analyzed: self.queries_analyzed,
            total_suggestions: self.total_suggestions(),
            suggestion_counts: self.suggestion_counts.clone(),
            suggestions_by_type: self.suggestions_by_type.clone(),
            suggestions_by_table: self.suggestions_by_table.clone(),
            recommended_indexes: ranked,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
