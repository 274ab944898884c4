use crate::query_analyzer::syntax::{fold_conditions, parse_nodes_lossy, split_commas, Node};
use crate::types::{normalize_statement, ClauseModel};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Clause a top-level region of the statement belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Clause {
    Select,
    From,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    /// `UNION`, `INTO`, `FOR UPDATE`, ...
    Other,
}

/// SELECT list modifiers that precede the first column
const SELECT_MODIFIERS: &[&str] = &[
    "DISTINCT", "DISTINCTROW", "ALL", "HIGH_PRIORITY", "STRAIGHT_JOIN", "SQL_SMALL_RESULT",
    "SQL_BIG_RESULT", "SQL_BUFFER_RESULT", "SQL_NO_CACHE", "SQL_CACHE", "SQL_CALC_FOUND_ROWS",
];

/// Trailing keywords removed from ORDER BY / GROUP BY entries
const TRAILING_MODIFIERS: &[&str] = &["ASC", "DESC", "WITH", "ROLLUP"];

/// Heuristic extractor of the columns a SELECT statement refers to.
///
/// Not a parser: regions are found at the first top-level occurrence of each
/// clause keyword and anything unrecognized is skipped. It never fails.
#[derive(Debug, Clone, Default)]
pub struct ClauseExtractor;

impl ClauseExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, sql: &str) -> ClauseModel {
        let statement = normalize_statement(sql);
        let nodes = parse_nodes_lossy(statement);

        let regions = segment(&nodes);
        let region = |clause: Clause| regions.get(&clause).map(Vec::as_slice).unwrap_or(&[]);

        ClauseModel {
            select_columns: select_columns(region(Clause::Select)),
            where_columns: where_columns(region(Clause::Where)),
            order_by_columns: list_columns(region(Clause::OrderBy)),
            group_by_columns: list_columns(region(Clause::GroupBy)),
        }
    }
}

/// Split the top level into clause regions; a repeated clause keyword ends the
/// current region without opening a new one
fn segment(nodes: &[Node]) -> HashMap<Clause, Vec<Node>> {
    let mut regions: HashMap<Clause, Vec<Node>> = HashMap::new();
    let mut seen: HashSet<Clause> = HashSet::new();
    let mut current: Option<Clause> = None;
    let mut index = 0;

    while index < nodes.len() {
        let node = &nodes[index];
        let followed_by_by = nodes.get(index + 1).map(|n| n.is_keyword("BY")).unwrap_or(false);

        let boundary = match node {
            Node::Keyword(k) => match k.as_str() {
                "SELECT" => Some((Clause::Select, 1)),
                "FROM" => Some((Clause::From, 1)),
                "WHERE" => Some((Clause::Where, 1)),
                "HAVING" => Some((Clause::Having, 1)),
                "LIMIT" => Some((Clause::Limit, 1)),
                "GROUP" if followed_by_by => Some((Clause::GroupBy, 2)),
                "ORDER" if followed_by_by => Some((Clause::OrderBy, 2)),
                "UNION" | "INTO" | "FOR" | "WINDOW" => Some((Clause::Other, 1)),
                _ => None,
            },
            _ => None,
        };

        match boundary {
            Some((clause, width)) => {
                current = if clause != Clause::Other && seen.insert(clause) {
                    Some(clause)
                } else {
                    None
                };
                index += width;
            }
            None => {
                if let Some(clause) = current {
                    regions.entry(clause).or_default().push(node.clone());
                }
                index += 1;
            }
        }
    }

    regions
}

fn select_columns(region: &[Node]) -> BTreeSet<String> {
    let mut columns = BTreeSet::new();

    for (position, entry) in split_commas(region).into_iter().enumerate() {
        let mut entry = entry;
        if position == 0 {
            while let [Node::Keyword(k), rest @ ..] = entry {
                if !SELECT_MODIFIERS.contains(&k.as_str()) {
                    break;
                }
                entry = rest;
            }
        }

        if entry.iter().any(Node::contains_wildcard) {
            continue;
        }

        let expression = match entry.iter().position(|n| n.is_keyword("AS")) {
            Some(alias_at) => &entry[..alias_at],
            None => match entry {
                [column @ Node::Identifier(_), Node::Identifier(_)] => std::slice::from_ref(column),
                _ => entry,
            },
        };

        if let [Node::Identifier(name)] = expression {
            columns.insert(name.clone());
        }
    }

    columns
}

fn where_columns(region: &[Node]) -> BTreeSet<String> {
    let mut columns = BTreeSet::new();
    collect_compared_columns(&fold_conditions(region), &mut columns);
    columns
}

/// Record the left-hand column of every comparison, descending into groups
fn collect_compared_columns(nodes: &[Node], columns: &mut BTreeSet<String>) {
    for node in nodes {
        match node {
            Node::Comparison { .. } => {
                if let Some(column) = node.compared_column() {
                    columns.insert(column.to_string());
                }
            }
            Node::Group(children) => collect_compared_columns(children, columns),
            _ => {}
        }
    }
}

/// Columns of an ORDER BY or GROUP BY list
fn list_columns(region: &[Node]) -> BTreeSet<String> {
    let mut columns = BTreeSet::new();

    for entry in split_commas(region) {
        let mut entry = entry;
        while let [rest @ .., Node::Keyword(k)] = entry {
            if !TRAILING_MODIFIERS.contains(&k.as_str()) {
                break;
            }
            entry = rest;
        }

        if let [Node::Identifier(name)] = entry {
            columns.insert(name.clone());
        }
    }

    columns
}
