use super::*;
use crate::types::*;
use serde_json::Value;
use tempfile::TempDir;

/// Helper to build a column suggestion
fn columns_suggestion(kind: SuggestionKind, columns: &[&str]) -> Suggestion {
    Suggestion {
        kind,
        table: None,
        columns: Some(columns.iter().map(|c| c.to_string()).collect()),
        rows: None,
        message: format!("{} suggestion", kind),
    }
}

fn table_suggestion(kind: SuggestionKind, table: &str) -> Suggestion {
    Suggestion::for_table(kind, Some(table), format!("{} on {}", kind, table))
}

fn batch(suggestions: Vec<Suggestion>) -> SuggestionBatch {
    SuggestionBatch::new("SELECT 1", Some(1.5), suggestions)
}

#[test]
fn test_column_frequency_counts_each_mention() {
    let mut aggregator = SuggestionAggregator::new();
    aggregator.add_batch(batch(vec![
        columns_suggestion(SuggestionKind::WhereColumns, &["username"]),
        columns_suggestion(SuggestionKind::CoveringIndex, &["id", "username"]),
    ]));
    aggregator.add_batch(batch(vec![columns_suggestion(SuggestionKind::WhereColumns, &["email"])]));
    aggregator.add_batch(batch(vec![
        columns_suggestion(SuggestionKind::WhereColumns, &["email", "username"]),
        columns_suggestion(SuggestionKind::CompositeIndex, &["email", "username"]),
    ]));

    let report = aggregator.finalize();
    let username = report
        .recommended_indexes
        .iter()
        .find(|f| f.column == "username")
        .unwrap();
    assert_eq!(username.count, 4);
    assert_eq!(report.recommended_indexes[0].column, "username");
    assert_eq!(report.recommended_indexes[1], ColumnFrequency { column: "email".to_string(), count: 3 });
}

#[test]
fn test_repeated_column_in_one_suggestion_counts_once() {
    let mut aggregator = SuggestionAggregator::new();
    aggregator.add_batch(batch(vec![columns_suggestion(SuggestionKind::CoveringIndex, &["a", "a", "b"])]));

    let report = aggregator.finalize();
    assert_eq!(report.recommended_indexes[0], ColumnFrequency { column: "a".to_string(), count: 1 });
}

#[test]
fn test_ties_keep_first_seen_order() {
    let mut aggregator = SuggestionAggregator::new();
    aggregator.add_batch(batch(vec![columns_suggestion(SuggestionKind::WhereColumns, &["zeta", "alpha", "mid"])]));
    aggregator.add_batch(batch(vec![columns_suggestion(SuggestionKind::OrderBy, &["mid"])]));

    let ranked: Vec<String> = aggregator
        .finalize()
        .recommended_indexes
        .into_iter()
        .map(|f| f.column)
        .collect();
    assert_eq!(ranked, vec!["mid", "zeta", "alpha"]);
}

#[test]
fn test_recommended_indexes_limited_to_twenty() {
    let mut aggregator = SuggestionAggregator::new();
    let columns: Vec<String> = (0..30).map(|i| format!("col_{}", i)).collect();
    let refs: Vec<&str> = columns.iter().map(String::as_str).collect();
    aggregator.add_batch(batch(vec![columns_suggestion(SuggestionKind::CoveringIndex, &refs)]));

    let report = aggregator.finalize();
    assert_eq!(report.recommended_indexes.len(), RECOMMENDED_INDEX_LIMIT);
    assert_eq!(report.recommended_indexes[0].column, "col_0");
}

#[test]
fn test_grouping_by_type_and_table() {
    let mut aggregator = SuggestionAggregator::new();
    aggregator.add_batch(batch(vec![
        table_suggestion(SuggestionKind::MissingIndex, "orders"),
        table_suggestion(SuggestionKind::FullScan, "orders"),
        columns_suggestion(SuggestionKind::WhereColumns, &["user_id"]),
    ]));
    aggregator.add_batch(batch(vec![table_suggestion(SuggestionKind::MissingIndex, "users")]));

    let report = aggregator.finalize();
    assert_eq!(report.total_queries_analyzed, 2);
    assert_eq!(report.total_suggestions, 4);
    assert_eq!(report.suggestion_counts[&SuggestionKind::MissingIndex], 2);
    assert_eq!(report.suggestions_by_type[&SuggestionKind::MissingIndex].len(), 2);
    assert_eq!(report.suggestions_by_table["orders"].len(), 2);
    assert_eq!(report.suggestions_by_table["users"].len(), 1);
    assert_eq!(report.suggestions_by_table.len(), 2);
    assert_eq!(
        report.suggestion_counts.values().sum::<usize>(),
        report.total_suggestions
    );
    assert_eq!(report.tables_by_suggestion_count()[0], ("orders", 2));
}

#[test]
fn test_batch_order_is_preserved() {
    let mut aggregator = SuggestionAggregator::new();
    aggregator.add_batch(batch(vec![
        table_suggestion(SuggestionKind::MissingIndex, "t"),
        table_suggestion(SuggestionKind::FullScan, "t"),
        table_suggestion(SuggestionKind::FileSort, "t"),
    ]));

    let report = aggregator.finalize();
    let kinds: Vec<SuggestionKind> = report.suggestions_by_table["t"]
        .iter()
        .map(|entry| entry.suggestion.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![SuggestionKind::MissingIndex, SuggestionKind::FullScan, SuggestionKind::FileSort]
    );
}

#[test]
fn test_empty_aggregator_gives_empty_report() {
    let report = SuggestionAggregator::new().finalize();
    assert!(report.is_empty());
    assert_eq!(report.total_suggestions, 0);
    assert!(report.recommended_indexes.is_empty());
}

#[test]
fn test_finalize_does_not_reset_until_cleared() {
    let mut aggregator = SuggestionAggregator::new();
    aggregator.add_batch(batch(vec![columns_suggestion(SuggestionKind::WhereColumns, &["a"])]));
    let first = aggregator.finalize();

    aggregator.add_batch(batch(vec![columns_suggestion(SuggestionKind::WhereColumns, &["a"])]));
    let second = aggregator.finalize();
    assert_eq!(first.recommended_indexes[0].count, 1);
    assert_eq!(second.recommended_indexes[0].count, 2);
    assert_eq!(second.total_queries_analyzed, 2);

    aggregator.clear();
    assert!(aggregator.finalize().is_empty());
}

#[test]
fn test_merge_matches_sequential_totals() {
    let batches = vec![
        vec![columns_suggestion(SuggestionKind::WhereColumns, &["a", "b"]), table_suggestion(SuggestionKind::FullScan, "t")],
        vec![columns_suggestion(SuggestionKind::OrderBy, &["b"])],
        vec![table_suggestion(SuggestionKind::MissingIndex, "u"), columns_suggestion(SuggestionKind::GroupBy, &["c"])],
    ];

    let mut sequential = SuggestionAggregator::new();
    for suggestions in &batches {
        sequential.add_batch(batch(suggestions.clone()));
    }

    let mut left = SuggestionAggregator::new();
    left.add_batch(batch(batches[2].clone()));
    let mut right = SuggestionAggregator::new();
    right.add_batch(batch(batches[0].clone()));
    right.add_batch(batch(batches[1].clone()));
    left.merge(right);

    let expected = sequential.finalize();
    let merged = left.finalize();
    assert_eq!(merged.total_queries_analyzed, expected.total_queries_analyzed);
    assert_eq!(merged.suggestion_counts, expected.suggestion_counts);

    let mut expected_columns = expected.recommended_indexes.clone();
    let mut merged_columns = merged.recommended_indexes.clone();
    expected_columns.sort_by(|a, b| a.column.cmp(&b.column));
    merged_columns.sort_by(|a, b| a.column.cmp(&b.column));
    assert_eq!(merged_columns, expected_columns);
}

#[test]
fn test_query_preview_is_truncated() {
    let long_query = format!("SELECT {} FROM t", "x, ".repeat(60));
    let entry = SuggestionBatch::new(&long_query, None, vec![]);
    assert_eq!(entry.query.chars().count(), QUERY_PREVIEW_LENGTH + 3);
    assert!(entry.query.ends_with("..."));

    assert_eq!(preview("SELECT 1"), "SELECT 1");
}

#[test]
fn test_report_json_shape() {
    let mut aggregator = SuggestionAggregator::new();
    aggregator.add_batch(batch(vec![
        table_suggestion(SuggestionKind::HighRowsScanned, "orders"),
        columns_suggestion(SuggestionKind::WhereColumns, &["user_id"]),
    ]));

    let json: Value = serde_json::to_value(aggregator.finalize()).unwrap();
    assert_eq!(json["total_suggestions"], 2);
    assert_eq!(json["suggestion_counts"]["high_rows"], 1);
    assert_eq!(json["suggestions_by_type"]["where_columns"][0]["type"], "where_columns");
    assert_eq!(json["suggestions_by_type"]["where_columns"][0]["query"], "SELECT 1");
    assert!(json["suggestions_by_type"]["where_columns"][0].get("table").is_none());
    assert_eq!(json["recommended_indexes"][0]["column"], "user_id");
    assert_eq!(json["recommended_indexes"][0]["count"], 1);
}

#[test]
fn test_save_report_and_queries() {
    let temp_dir = TempDir::new().unwrap();
    let paths = ExportPaths::in_dir(&temp_dir.path().join("out"), "20240101_000000");
    let record = QueryRecord {
        timestamp: Some("2024-01-01T00:00:00Z".to_string()),
        user: Some("root".to_string()),
        host: None,
        query_time: Some(1.0),
        lock_time: Some(0.0),
        rows_sent: Some(1),
        rows_examined: Some(1),
        schema: None,
        query_text: "SELECT 1".to_string(),
    };

    save_queries(&paths.queries, &[record]).unwrap();
    save_report(&paths.report, &SuggestionAggregator::new().finalize()).unwrap();

    let queries: Value = serde_json::from_str(&std::fs::read_to_string(&paths.queries).unwrap()).unwrap();
    assert_eq!(queries[0]["query"], "SELECT 1");
    assert!(queries[0]["host"].is_null());

    let report: Report = serde_json::from_str(&std::fs::read_to_string(&paths.report).unwrap()).unwrap();
    assert!(report.is_empty());
}
