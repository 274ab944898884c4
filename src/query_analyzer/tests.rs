use super::*;
use crate::types::*;
use std::collections::BTreeSet;

/// Helper to build a column set
fn set(columns: &[&str]) -> BTreeSet<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

/// Helper to build a plan row
fn plan_row(table: Option<&str>, key: Option<&str>, access_type: &str, rows: Option<u64>, extra: Option<&str>) -> PlanRow {
    PlanRow {
        table: table.map(str::to_string),
        key: key.map(str::to_string),
        access_type: AccessType::parse(access_type),
        rows,
        extra: extra.map(str::to_string),
    }
}

fn kinds(suggestions: &[Suggestion]) -> Vec<SuggestionKind> {
    suggestions.iter().map(|s| s.kind).collect()
}

mod clause_extraction {
    use super::*;

    #[test]
    fn test_where_and_order_by_with_wildcard_select() {
        let model = ClauseExtractor::new().extract("SELECT * FROM t WHERE a = 1 AND b = 2 ORDER BY c");
        assert_eq!(model.where_columns, set(&["a", "b"]));
        assert_eq!(model.order_by_columns, set(&["c"]));
        assert!(model.select_columns.is_empty());
        assert!(model.group_by_columns.is_empty());
    }

    #[test]
    fn test_plain_select_list() {
        let model = ClauseExtractor::new().extract("SELECT x, y FROM t");
        assert_eq!(model.select_columns, set(&["x", "y"]));
        assert!(model.where_columns.is_empty());
    }

    #[test]
    fn test_trailing_semicolon_and_case() {
        let model = ClauseExtractor::new().extract("  select name from users where id = 5;");
        assert_eq!(model.select_columns, set(&["name"]));
        assert_eq!(model.where_columns, set(&["id"]));
    }

    #[test]
    fn test_qualified_names_and_aliases() {
        let model = ClauseExtractor::new().extract(
            "SELECT DISTINCT u.name AS user_name, o.total amount, COUNT(*) FROM users u JOIN orders o ON o.user_id = u.id WHERE u.active = 1",
        );
        assert_eq!(model.select_columns, set(&["u.name", "o.total"]));
        assert_eq!(model.where_columns, set(&["u.active"]));
    }

    #[test]
    fn test_nested_boolean_groups_are_visited() {
        let model = ClauseExtractor::new().extract(
            "SELECT id FROM t WHERE (a = 1 OR (b > 2 AND c IN (1, 2, 3))) AND NOT (d LIKE 'x%') AND e IS NULL",
        );
        assert_eq!(model.where_columns, set(&["a", "b", "c", "d", "e"]));
    }

    #[test]
    fn test_identifier_comparisons_and_between() {
        let model = ClauseExtractor::new().extract(
            "SELECT id FROM t WHERE t.created_at BETWEEN '2024-01-01' AND '2024-02-01' AND t.owner_id = t.creator_id",
        );
        assert_eq!(model.where_columns, set(&["t.created_at", "t.owner_id"]));
    }

    #[test]
    fn test_function_left_side_is_skipped() {
        let model = ClauseExtractor::new().extract(
            "SELECT id FROM t WHERE DATE(created_at) = '2024-01-01' AND status = 'open'",
        );
        assert_eq!(model.where_columns, set(&["status"]));
    }

    #[test]
    fn test_order_by_directions_and_group_by() {
        let model = ClauseExtractor::new().extract(
            "SELECT category, COUNT(*) FROM products GROUP BY category, brand HAVING COUNT(*) > 2 ORDER BY category DESC, brand ASC LIMIT 10",
        );
        assert_eq!(model.group_by_columns, set(&["category", "brand"]));
        assert_eq!(model.order_by_columns, set(&["category", "brand"]));
        assert_eq!(model.select_columns, set(&["category"]));
        assert!(model.where_columns.is_empty());
    }

    #[test]
    fn test_keywords_in_literals_do_not_split() {
        let model = ClauseExtractor::new().extract("SELECT id FROM notes WHERE body = 'ORDER BY x' AND author = 'me'");
        assert_eq!(model.where_columns, set(&["body", "author"]));
        assert!(model.order_by_columns.is_empty());
    }

    #[test]
    fn test_subquery_columns_stay_out_of_outer_clauses() {
        let model = ClauseExtractor::new().extract(
            "SELECT id FROM users WHERE id IN (SELECT user_id FROM orders WHERE total > 100)",
        );
        assert_eq!(model.where_columns, set(&["id"]));
    }

    #[test]
    fn test_malformed_input_never_fails() {
        let extractor = ClauseExtractor::new();
        let garbage = extractor.extract("SELECT , , FROM WHERE AND OR = ) (");
        assert!(garbage.select_columns.is_empty());
        assert!(garbage.where_columns.is_empty());
        assert_eq!(extractor.extract("'"), ClauseModel::default());
    }

    #[test]
    fn test_malformed_tail_keeps_earlier_columns() {
        let extractor = ClauseExtractor::new();
        let model = extractor.extract("SELECT a FROM t WHERE b = 1 AND c = 'oops");
        assert_eq!(model.select_columns, set(&["a"]));
        assert!(model.where_columns.contains("b"));

        let model = extractor.extract("SELECT id, name FROM users WHERE id = 3 ORDER BY name, `created");
        assert_eq!(model.select_columns, set(&["id", "name"]));
        assert_eq!(model.where_columns, set(&["id"]));
        assert!(model.order_by_columns.contains("name"));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let sql = "SELECT b, a FROM t WHERE z = 1 AND y = 2 ORDER BY x";
        let extractor = ClauseExtractor::new();
        assert_eq!(extractor.extract(sql), extractor.extract(sql));
    }
}

mod plan_evaluation {
    use super::*;

    #[test]
    fn test_full_scan_row_with_single_where_column() {
        let clauses = ClauseModel {
            where_columns: set(&["user_id"]),
            ..ClauseModel::default()
        };
        let plan = vec![plan_row(Some("orders"), None, "ALL", Some(50000), Some("Using filesort"))];

        let suggestions = PlanEvaluator::new().evaluate(&clauses, &plan);

        assert_eq!(
            kinds(&suggestions),
            vec![
                SuggestionKind::MissingIndex,
                SuggestionKind::FullScan,
                SuggestionKind::HighRowsScanned,
                SuggestionKind::FileSort,
                SuggestionKind::WhereColumns,
            ]
        );
        assert_eq!(suggestions[0].table.as_deref(), Some("orders"));
        assert_eq!(suggestions[2].rows, Some(50000));
        assert_eq!(suggestions[4].columns, Some(vec!["user_id".to_string()]));
        assert!(suggestions[1].message.contains("full table scan"));
    }

    #[test]
    fn test_no_where_columns_means_no_where_suggestions() {
        let clauses = ClauseExtractor::new().extract("SELECT x, y FROM t");
        let plan = vec![
            plan_row(Some("t"), None, "ALL", Some(10), None),
            plan_row(Some("t"), Some("PRIMARY"), "index", Some(5000), Some("Using temporary")),
        ];

        let suggestions = PlanEvaluator::new().evaluate(&clauses, &plan);
        assert!(suggestions.iter().all(|s| !matches!(
            s.kind,
            SuggestionKind::WhereColumns | SuggestionKind::CompositeIndex | SuggestionKind::CoveringIndex
        )));
    }

    #[test]
    fn test_rules_fire_per_row_in_row_order() {
        let plan = vec![
            plan_row(Some("a"), None, "ref", None, Some("Using temporary; Using filesort")),
            plan_row(Some("b"), Some("idx_b"), "index", Some(2000), None),
        ];

        let suggestions = PlanEvaluator::new().evaluate(&ClauseModel::default(), &plan);
        assert_eq!(
            kinds(&suggestions),
            vec![
                SuggestionKind::MissingIndex,
                SuggestionKind::TempTable,
                SuggestionKind::FileSort,
                SuggestionKind::FullScan,
                SuggestionKind::HighRowsScanned,
            ]
        );
        assert!(suggestions[3].message.contains("full index scan"));
        assert_eq!(suggestions[3].table.as_deref(), Some("b"));
    }

    #[test]
    fn test_missing_key_without_table_is_not_reported() {
        let plan = vec![plan_row(None, None, "const", Some(1), Some("No tables used"))];
        let suggestions = PlanEvaluator::new().evaluate(&ClauseModel::default(), &plan);
        assert!(suggestions.is_empty());
    }

    #[test]
    fn test_query_level_rules_in_fixed_order() {
        let clauses = ClauseModel {
            select_columns: set(&["name"]),
            where_columns: set(&["status", "region"]),
            order_by_columns: set(&["created_at"]),
            group_by_columns: BTreeSet::new(),
        };

        let suggestions = PlanEvaluator::new().evaluate(&clauses, &[]);
        assert_eq!(
            kinds(&suggestions),
            vec![
                SuggestionKind::WhereColumns,
                SuggestionKind::CompositeIndex,
                SuggestionKind::OrderBy,
                SuggestionKind::CoveringIndex,
            ]
        );
        let covering = suggestions[3].columns.clone().unwrap();
        assert_eq!(covering.len(), 4);
        assert!(covering.contains(&"name".to_string()));
    }

    #[test]
    fn test_covering_index_bounds() {
        let evaluator = PlanEvaluator::new();

        let single = ClauseModel {
            where_columns: set(&["id"]),
            select_columns: set(&["id"]),
            ..ClauseModel::default()
        };
        assert!(!kinds(&evaluator.evaluate(&single, &[])).contains(&SuggestionKind::CoveringIndex));

        let wide = ClauseModel {
            select_columns: set(&["a", "b", "c", "d"]),
            where_columns: set(&["e", "f"]),
            ..ClauseModel::default()
        };
        assert!(!kinds(&evaluator.evaluate(&wide, &[])).contains(&SuggestionKind::CoveringIndex));

        let group_only = ClauseModel {
            where_columns: set(&["a"]),
            group_by_columns: set(&["b"]),
            ..ClauseModel::default()
        };
        assert_eq!(
            kinds(&evaluator.evaluate(&group_only, &[])),
            vec![SuggestionKind::WhereColumns, SuggestionKind::GroupBy, SuggestionKind::CoveringIndex]
        );
    }

    #[test]
    fn test_custom_threshold() {
        let evaluator = PlanEvaluator::with_config(EvaluatorConfig { high_rows_threshold: 10 });
        let plan = vec![plan_row(Some("t"), Some("k"), "ref", Some(11), None)];
        assert_eq!(kinds(&evaluator.evaluate(&ClauseModel::default(), &plan)), vec![SuggestionKind::HighRowsScanned]);

        let at_threshold = vec![plan_row(Some("t"), Some("k"), "ref", Some(10), None)];
        assert!(evaluator.evaluate(&ClauseModel::default(), &at_threshold).is_empty());
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let clauses = ClauseExtractor::new().extract("SELECT a, b FROM t WHERE c = 1 AND d = 2 GROUP BY a ORDER BY b");
        let plan = vec![plan_row(Some("t"), None, "ALL", Some(99999), Some("Using temporary; Using filesort"))];
        let evaluator = PlanEvaluator::new();
        assert_eq!(evaluator.evaluate(&clauses, &plan), evaluator.evaluate(&clauses, &plan));
    }
}
