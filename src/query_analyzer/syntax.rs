//! Typed token tree used by the clause extractor.
//!
//! `sqlparser` turns the statement into a flat token stream; this module folds it
//! into nested [`Node`]s (parenthesized groups, qualified identifiers, structural
//! keywords) and then into [`Comparison`](Node::Comparison) nodes for boolean
//! conditions. It is deliberately shallow: anything it cannot classify is kept as
//! an opaque operator or value and ignored by the extractor.
use sqlparser::dialect::MySqlDialect;
use sqlparser::tokenizer::{Location, Token, Tokenizer, TokenizerError, Word};
use tracing::debug;

/// Words that shape a statement instead of naming a column
const STRUCTURAL_KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "GROUP", "ORDER", "BY", "HAVING", "LIMIT", "OFFSET", "AND", "OR",
    "XOR", "NOT", "IN", "IS", "LIKE", "BETWEEN", "REGEXP", "RLIKE", "NULL", "ASC", "DESC", "AS",
    "DISTINCT", "DISTINCTROW", "ALL", "EXISTS", "UNION", "JOIN", "INNER", "LEFT", "RIGHT", "OUTER",
    "CROSS", "NATURAL", "STRAIGHT_JOIN", "ON", "USING", "CASE", "WHEN", "THEN", "ELSE", "END",
    "TRUE", "FALSE", "INTERVAL", "WITH", "ROLLUP", "FOR", "INTO", "WINDOW", "HIGH_PRIORITY",
    "SQL_SMALL_RESULT", "SQL_BIG_RESULT", "SQL_BUFFER_RESULT", "SQL_NO_CACHE", "SQL_CACHE",
    "SQL_CALC_FOUND_ROWS",
];

const COMPARISON_OPERATORS: &[&str] = &["=", "==", "!=", "<>", "<", ">", "<=", ">=", "<=>"];

const COMPARISON_KEYWORDS: &[&str] = &["IN", "LIKE", "IS", "BETWEEN", "REGEXP", "RLIKE"];

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Column or table reference, qualified names kept whole (`t.col`)
    Identifier(String),
    /// Structural keyword, upper-cased
    Keyword(String),
    /// `*` or `t.*`
    Wildcard,
    Comma,
    /// Any non-comparison operator or comparison operator before folding
    Operator(String),
    /// Literal or placeholder
    Value(String),
    /// Parenthesized nodes
    Group(Vec<Node>),
    /// `left OP right`, produced by [`fold_conditions`]
    Comparison {
        left: Vec<Node>,
        operator: String,
        right: Vec<Node>,
    },
}

impl Node {
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Node::Keyword(k) if k == keyword)
    }

    /// Left-hand column of a comparison, when it is a bare identifier
    pub fn compared_column(&self) -> Option<&str> {
        match self {
            Node::Comparison { left, .. } => match left.as_slice() {
                [Node::Identifier(name)] => Some(name),
                _ => None,
            },
            _ => None,
        }
    }

    /// Whether this node or anything nested in it is a wildcard
    pub fn contains_wildcard(&self) -> bool {
        match self {
            Node::Wildcard => true,
            Node::Group(children) => children.iter().any(Node::contains_wildcard),
            Node::Comparison { left, right, .. } => {
                left.iter().chain(right).any(Node::contains_wildcard)
            }
            _ => false,
        }
    }
}

/// Tokenize a statement into a node tree
pub fn parse_nodes(sql: &str) -> Result<Vec<Node>, TokenizerError> {
    let tokens = Tokenizer::new(&MySqlDialect {}, sql).tokenize()?;
    Ok(into_nodes(tokens))
}

/// Like [`parse_nodes`], but text from the first token the tokenizer rejects
/// onwards is dropped instead of failing the whole statement
pub fn parse_nodes_lossy(sql: &str) -> Vec<Node> {
    let dialect = MySqlDialect {};
    let mut end = sql.len();

    loop {
        let text = &sql[..end];
        match Tokenizer::new(&dialect, text).tokenize() {
            Ok(tokens) => return into_nodes(tokens),
            Err(e) => {
                // Always make progress, even when the error points past the text
                let cut = byte_offset(text, &e.location)
                    .filter(|&cut| cut < end)
                    .or_else(|| text.char_indices().last().map(|(index, _)| index))
                    .unwrap_or(0);
                debug!("Dropping statement text from byte {} ({})", cut, e);
                if cut == 0 {
                    return Vec::new();
                }
                end = cut;
            }
        }
    }
}

fn into_nodes(tokens: Vec<Token>) -> Vec<Node> {
    let tokens: Vec<Token> = tokens
        .into_iter()
        .filter(|token| !matches!(token, Token::Whitespace(_) | Token::EOF))
        .collect();

    let mut position = 0;
    build_nodes(&tokens, &mut position, false)
}

/// Byte index of a 1-based line/column (in characters) position
fn byte_offset(text: &str, location: &Location) -> Option<usize> {
    let line_start = match location.line {
        0 | 1 => 0,
        line => text.match_indices('\n').nth((line - 2) as usize)?.0 + 1,
    };
    let column = location.column.saturating_sub(1) as usize;
    Some(
        text[line_start..]
            .char_indices()
            .nth(column)
            .map(|(index, _)| line_start + index)
            .unwrap_or(text.len()),
    )
}

fn build_nodes(tokens: &[Token], position: &mut usize, nested: bool) -> Vec<Node> {
    let mut nodes = Vec::new();

    while *position < tokens.len() {
        let token = &tokens[*position];
        *position += 1;

        match token {
            Token::LParen => nodes.push(Node::Group(build_nodes(tokens, position, true))),
            Token::RParen if nested => return nodes,
            // Stray closing parenthesis
            Token::RParen => {}
            Token::SemiColon => {}
            Token::Comma => nodes.push(Node::Comma),
            Token::Mul => nodes.push(Node::Wildcard),
            Token::Word(word) => nodes.push(word_node(word, tokens, position)),
            Token::Eq
            | Token::DoubleEq
            | Token::Neq
            | Token::Lt
            | Token::Gt
            | Token::LtEq
            | Token::GtEq
            | Token::Spaceship => nodes.push(Node::Operator(token.to_string())),
            Token::Number(..)
            | Token::SingleQuotedString(_)
            | Token::DoubleQuotedString(_)
            | Token::NationalStringLiteral(_)
            | Token::HexStringLiteral(_)
            | Token::Placeholder(_) => nodes.push(Node::Value(token.to_string())),
            other => nodes.push(Node::Operator(other.to_string())),
        }
    }

    nodes
}

/// Identifier (joining `a.b.c` chains), wildcard (`t.*`) or structural keyword
fn word_node(word: &Word, tokens: &[Token], position: &mut usize) -> Node {
    let upper = word.value.to_ascii_uppercase();
    if word.quote_style.is_none() && STRUCTURAL_KEYWORDS.contains(&upper.as_str()) {
        return Node::Keyword(upper);
    }

    let mut name = word.value.clone();
    while matches!(tokens.get(*position), Some(Token::Period)) {
        match tokens.get(*position + 1) {
            Some(Token::Word(part)) => {
                name.push('.');
                name.push_str(&part.value);
                *position += 2;
            }
            Some(Token::Mul) => {
                *position += 2;
                return Node::Wildcard;
            }
            _ => break,
        }
    }
    Node::Identifier(name)
}

/// Split on top-level commas, dropping empty entries
pub fn split_commas(nodes: &[Node]) -> Vec<&[Node]> {
    nodes
        .split(|node| matches!(node, Node::Comma))
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Split a boolean expression on its top-level `AND`/`OR`/`XOR` connectives.
///
/// The `AND` that closes a `BETWEEN x AND y` stays inside its condition.
pub fn split_conditions(nodes: &[Node]) -> Vec<&[Node]> {
    let mut conditions = Vec::new();
    let mut start = 0;
    let mut between_pending = false;

    for (index, node) in nodes.iter().enumerate() {
        match node {
            Node::Keyword(k) if k == "BETWEEN" => between_pending = true,
            Node::Keyword(k) if k == "AND" && between_pending => between_pending = false,
            Node::Keyword(k) if k == "AND" || k == "OR" || k == "XOR" => {
                conditions.push(&nodes[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    conditions.push(&nodes[start..]);

    conditions.into_iter().filter(|c| !c.is_empty()).collect()
}

/// Fold a boolean expression into comparisons and nested groups.
///
/// Conditions that are neither (function calls on the left, `EXISTS`, bare
/// values) are dropped.
pub fn fold_conditions(nodes: &[Node]) -> Vec<Node> {
    split_conditions(nodes)
        .into_iter()
        .filter_map(fold_condition)
        .collect()
}

fn fold_condition(condition: &[Node]) -> Option<Node> {
    let condition = match condition {
        [first, rest @ ..] if first.is_keyword("NOT") => rest,
        _ => condition,
    };

    if let [Node::Group(children)] = condition {
        return Some(Node::Group(fold_conditions(children)));
    }

    let operator_at = condition.iter().enumerate().skip(1).find_map(|(index, node)| match node {
        Node::Operator(op) if COMPARISON_OPERATORS.contains(&op.as_str()) => Some(index),
        Node::Keyword(k) if COMPARISON_KEYWORDS.contains(&k.as_str()) => Some(index),
        _ => None,
    })?;

    let (left_end, negated) = if condition[operator_at - 1].is_keyword("NOT") {
        (operator_at - 1, true)
    } else {
        (operator_at, false)
    };
    if left_end == 0 {
        return None;
    }

    let operator = match &condition[operator_at] {
        Node::Operator(op) | Node::Keyword(op) if negated => format!("NOT {}", op),
        Node::Operator(op) | Node::Keyword(op) => op.clone(),
        _ => return None,
    };

    Some(Node::Comparison {
        left: condition[..left_end].to_vec(),
        operator,
        right: condition[operator_at + 1..].to_vec(),
    })
}
