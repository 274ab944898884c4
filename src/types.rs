use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// Session timestamp the server writes ahead of each logged statement
static SERVER_TIMESTAMP_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:SET\s+timestamp\s*=\s*\d+\s*;\s*)+").expect("valid timestamp prefix pattern")
});

/// One reassembled entry of the slow-query log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    /// Raw value of the `# Time:` header, not normalized
    pub timestamp: Option<String>,
    pub user: Option<String>,
    pub host: Option<String>,
    /// Seconds
    pub query_time: Option<f64>,
    /// Seconds
    pub lock_time: Option<f64>,
    pub rows_sent: Option<u64>,
    pub rows_examined: Option<u64>,
    /// Database selected with a `use <schema>;` line
    pub schema: Option<String>,
    /// Body lines joined with single spaces
    #[serde(rename = "query")]
    pub query_text: String,
}

impl QueryRecord {
    /// Statement text without the server's `SET timestamp=N;` prefix, surrounding
    /// whitespace or a trailing `;`
    pub fn normalized_query(&self) -> &str {
        normalize_statement(&self.query_text)
    }

    /// Whether the statement is a SELECT, the only kind that gets a plan
    pub fn is_select(&self) -> bool {
        is_select_statement(&self.query_text)
    }
}

pub fn normalize_statement(sql: &str) -> &str {
    let trimmed = sql.trim();
    let statement = match SERVER_TIMESTAMP_PREFIX.find(trimmed) {
        Some(prefix) => &trimmed[prefix.end()..],
        None => trimmed,
    };
    statement.strip_suffix(';').map(str::trim_end).unwrap_or(statement)
}

pub fn is_select_statement(sql: &str) -> bool {
    normalize_statement(sql)
        .get(..6)
        .map(|head| head.eq_ignore_ascii_case("select"))
        .unwrap_or(false)
}

/// Column references found in a SELECT statement, grouped by clause
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseModel {
    pub select_columns: BTreeSet<String>,
    pub where_columns: BTreeSet<String>,
    pub order_by_columns: BTreeSet<String>,
    pub group_by_columns: BTreeSet<String>,
}

impl ClauseModel {
    /// Deduplicated union of every clause
    pub fn all_columns(&self) -> BTreeSet<String> {
        self.select_columns
            .iter()
            .chain(&self.where_columns)
            .chain(&self.order_by_columns)
            .chain(&self.group_by_columns)
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.select_columns.is_empty()
            && self.where_columns.is_empty()
            && self.order_by_columns.is_empty()
            && self.group_by_columns.is_empty()
    }
}

/// Join type reported in the `type` column of MySQL's EXPLAIN
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccessType {
    System,
    Const,
    EqRef,
    Ref,
    FullText,
    RefOrNull,
    IndexMerge,
    UniqueSubquery,
    IndexSubquery,
    Range,
    /// Full index scan
    Index,
    /// Full table scan
    All,
    Other(String),
}

impl AccessType {
    pub fn parse(value: &str) -> Self {
        match value {
            "system" => Self::System,
            "const" => Self::Const,
            "eq_ref" => Self::EqRef,
            "ref" => Self::Ref,
            "fulltext" => Self::FullText,
            "ref_or_null" => Self::RefOrNull,
            "index_merge" => Self::IndexMerge,
            "unique_subquery" => Self::UniqueSubquery,
            "index_subquery" => Self::IndexSubquery,
            "range" => Self::Range,
            "index" => Self::Index,
            "ALL" => Self::All,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::System => "system",
            Self::Const => "const",
            Self::EqRef => "eq_ref",
            Self::Ref => "ref",
            Self::FullText => "fulltext",
            Self::RefOrNull => "ref_or_null",
            Self::IndexMerge => "index_merge",
            Self::UniqueSubquery => "unique_subquery",
            Self::IndexSubquery => "index_subquery",
            Self::Range => "range",
            Self::Index => "index",
            Self::All => "ALL",
            Self::Other(other) => other,
        }
    }

    /// `ALL` and `index` both read every row of the table or index
    pub fn is_full_scan(&self) -> bool {
        matches!(self, Self::All | Self::Index)
    }
}

impl From<String> for AccessType {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<AccessType> for String {
    fn from(value: AccessType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of an execution plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRow {
    #[serde(default)]
    pub table: Option<String>,
    /// Index chosen by the optimizer, `None` when no index is used
    #[serde(default)]
    pub key: Option<String>,
    #[serde(alias = "type")]
    pub access_type: AccessType,
    /// Estimated number of rows examined
    #[serde(default)]
    pub rows: Option<u64>,
    #[serde(default, alias = "Extra")]
    pub extra: Option<String>,
}

/// Category of an index-optimization suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SuggestionKind {
    #[serde(rename = "missing_index")]
    MissingIndex,
    #[serde(rename = "full_scan")]
    FullScan,
    #[serde(rename = "high_rows")]
    HighRowsScanned,
    #[serde(rename = "temp_table")]
    TempTable,
    #[serde(rename = "filesort")]
    FileSort,
    #[serde(rename = "where_columns")]
    WhereColumns,
    #[serde(rename = "composite_index")]
    CompositeIndex,
    #[serde(rename = "order_by")]
    OrderBy,
    #[serde(rename = "group_by")]
    GroupBy,
    #[serde(rename = "covering_index")]
    CoveringIndex,
}

impl SuggestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingIndex => "missing_index",
            Self::FullScan => "full_scan",
            Self::HighRowsScanned => "high_rows",
            Self::TempTable => "temp_table",
            Self::FileSort => "filesort",
            Self::WhereColumns => "where_columns",
            Self::CompositeIndex => "composite_index",
            Self::OrderBy => "order_by",
            Self::GroupBy => "group_by",
            Self::CoveringIndex => "covering_index",
        }
    }
}

impl fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index-optimization suggestion produced for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
    pub message: String,
}

impl Suggestion {
    pub fn for_table(kind: SuggestionKind, table: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.map(str::to_string),
            columns: None,
            rows: None,
            message: message.into(),
        }
    }

    pub fn for_columns<'a>(
        kind: SuggestionKind,
        columns: impl IntoIterator<Item = &'a String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            table: None,
            columns: Some(columns.into_iter().cloned().collect()),
            rows: None,
            message: message.into(),
        }
    }
}

/// A suggestion annotated with the query it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    #[serde(flatten)]
    pub suggestion: Suggestion,
    /// Query preview
    pub query: String,
    pub query_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFrequency {
    pub column: String,
    pub count: u64,
}

/// Aggregated suggestions of an analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub timestamp: String,
    pub total_queries_analyzed: usize,
    pub total_suggestions: usize,
    pub suggestion_counts: BTreeMap<SuggestionKind, usize>,
    pub suggestions_by_type: BTreeMap<SuggestionKind, Vec<ReportEntry>>,
    pub suggestions_by_table: BTreeMap<String, Vec<ReportEntry>>,
    pub recommended_indexes: Vec<ColumnFrequency>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.total_queries_analyzed == 0
    }

    /// Tables ordered by number of suggestions, most first; ties by name
    pub fn tables_by_suggestion_count(&self) -> Vec<(&str, usize)> {
        let mut tables: Vec<(&str, usize)> = self
            .suggestions_by_table
            .iter()
            .map(|(table, entries)| (table.as_str(), entries.len()))
            .collect();
        tables.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        tables
    }
}

/// Totals over every parsed record, computed before any plan is fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSummary {
    pub total_queries: usize,
    /// Seconds; missing values count as zero
    pub avg_query_time: f64,
    /// Seconds; missing values count as zero
    pub avg_lock_time: f64,
    pub total_rows_examined: u64,
    pub total_rows_sent: u64,
    /// Slowest records first
    pub slowest: Vec<SlowQuery>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowQuery {
    pub query_time: Option<f64>,
    pub rows_examined: Option<u64>,
    pub rows_sent: Option<u64>,
    /// `rows_sent / rows_examined` to four places; absent when nothing was examined
    pub efficiency: Option<f64>,
    /// Query preview
    pub query: String,
}

/// Outcome of analyzing one SELECT record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnalysis {
    #[serde(flatten)]
    pub record: QueryRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<PlanRow>>,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    /// Driver error text when the plan could not be fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Time spent fetching the plan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain_duration_ms: Option<f64>,
}

impl QueryAnalysis {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
