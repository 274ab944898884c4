use crate::types::{AccessType, ClauseModel, PlanRow, Suggestion, SuggestionKind};

/// Rows above this estimate are reported as a high-rows scan
pub const DEFAULT_HIGH_ROWS_THRESHOLD: u64 = 1000;

/// Upper bound on the number of columns proposed for a covering index
const MAX_COVERING_COLUMNS: usize = 5;

/// Configuration options for plan evaluation
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    pub high_rows_threshold: u64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            high_rows_threshold: DEFAULT_HIGH_ROWS_THRESHOLD,
        }
    }
}

/// Rule engine turning an execution plan and a clause model into suggestions
#[derive(Debug, Clone, Default)]
pub struct PlanEvaluator {
    config: EvaluatorConfig,
}

impl PlanEvaluator {
    /// Create a new evaluator with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new evaluator with custom configuration
    pub fn with_config(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate one query. Row rules fire per plan row in row order, then the
    /// query-level rules fire once in a fixed order.
    pub fn evaluate(&self, clauses: &ClauseModel, plan: &[PlanRow]) -> Vec<Suggestion> {
        let mut suggestions = Vec::new();

        for row in plan {
            self.evaluate_row(row, &mut suggestions);
        }
        self.evaluate_clauses(clauses, &mut suggestions);

        suggestions
    }

    fn evaluate_row(&self, row: &PlanRow, suggestions: &mut Vec<Suggestion>) {
        let table = row.table.as_deref();
        let table_name = table.unwrap_or("<unknown>");

        if row.key.is_none() {
            if let Some(table) = table {
                suggestions.push(Suggestion::for_table(
                    SuggestionKind::MissingIndex,
                    Some(table),
                    format!("Table {} does not use an index; consider adding one", table),
                ));
            }
        }

        // A full index scan is cheaper than a table scan but both land here
        if row.access_type.is_full_scan() {
            let scan = match row.access_type {
                AccessType::All => "full table scan",
                _ => "full index scan",
            };
            suggestions.push(Suggestion::for_table(
                SuggestionKind::FullScan,
                table,
                format!(
                    "Table {} is read with a {}; optimize the query or add a suitable index",
                    table_name, scan
                ),
            ));
        }

        if let Some(rows) = row.rows.filter(|rows| *rows > self.config.high_rows_threshold) {
            let mut suggestion = Suggestion::for_table(
                SuggestionKind::HighRowsScanned,
                table,
                format!(
                    "Query scans a large number of rows ({}); the index or the filter may need tuning",
                    rows
                ),
            );
            suggestion.rows = Some(rows);
            suggestions.push(suggestion);
        }

        let extra = row.extra.as_deref().unwrap_or_default();
        if extra.contains("Using temporary") {
            suggestions.push(Suggestion::for_table(
                SuggestionKind::TempTable,
                table,
                "Query uses a temporary table; an index may avoid it",
            ));
        }
        if extra.contains("Using filesort") {
            suggestions.push(Suggestion::for_table(
                SuggestionKind::FileSort,
                table,
                "Query uses a filesort; an index matching the ORDER BY may avoid it",
            ));
        }
    }

    fn evaluate_clauses(&self, clauses: &ClauseModel, suggestions: &mut Vec<Suggestion>) {
        let where_columns = &clauses.where_columns;

        if !where_columns.is_empty() {
            suggestions.push(Suggestion::for_columns(
                SuggestionKind::WhereColumns,
                where_columns,
                format!("Consider indexing the WHERE columns: {}", join(where_columns)),
            ));
        }

        if where_columns.len() > 1 {
            suggestions.push(Suggestion::for_columns(
                SuggestionKind::CompositeIndex,
                where_columns,
                format!("Several WHERE columns may fit a composite index: {}", join(where_columns)),
            ));
        }

        if !clauses.order_by_columns.is_empty() {
            suggestions.push(Suggestion::for_columns(
                SuggestionKind::OrderBy,
                &clauses.order_by_columns,
                format!("ORDER BY columns may need an index: {}", join(&clauses.order_by_columns)),
            ));
        }

        if !clauses.group_by_columns.is_empty() {
            suggestions.push(Suggestion::for_columns(
                SuggestionKind::GroupBy,
                &clauses.group_by_columns,
                format!("GROUP BY columns may need an index: {}", join(&clauses.group_by_columns)),
            ));
        }

        let all_columns = clauses.all_columns();
        if !where_columns.is_empty() && (2..=MAX_COVERING_COLUMNS).contains(&all_columns.len()) {
            suggestions.push(Suggestion::for_columns(
                SuggestionKind::CoveringIndex,
                &all_columns,
                format!(
                    "A covering index with every referenced column may help: {}",
                    join(&all_columns)
                ),
            ));
        }
    }
}

fn join<'a>(columns: impl IntoIterator<Item = &'a String>) -> String {
    columns.into_iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}
