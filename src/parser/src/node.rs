use crate::operator::{OperatorSyntax, SqlKind, SqlOperator};
use crate::pos::ParserPos;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use common::{decimal_to_string, DATE_FORMAT, TIMESTAMP_FORMAT};
use std::fmt;

/// Literal values of the expression grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SqlLiteral {
    Null,
    Boolean(bool),
    /// Exact numeric, e.g. `42` or `2.50`.
    Numeric(BigDecimal),
    String(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl fmt::Display for SqlLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlLiteral::Null => write!(f, "NULL"),
            SqlLiteral::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            SqlLiteral::Numeric(d) => write!(f, "{}", decimal_to_string(d)),
            SqlLiteral::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            SqlLiteral::Date(d) => write!(f, "DATE '{}'", d.format(DATE_FORMAT)),
            SqlLiteral::Timestamp(t) => write!(f, "TIMESTAMP '{}'", t.format(TIMESTAMP_FORMAT)),
        }
    }
}

/// Parse tree node. Nodes are built bottom-up and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SqlNode {
    Literal {
        value: SqlLiteral,
        pos: ParserPos,
    },
    /// Possibly compound identifier, e.g. `a.Name`.
    Identifier {
        names: Vec<String>,
        pos: ParserPos,
    },
    /// Operator call.
    Call {
        op: SqlOperator,
        operands: Vec<SqlNode>,
        pos: ParserPos,
    },
    /// Function call by name, e.g. `UPPER(Name)`.
    Function {
        name: String,
        args: Vec<SqlNode>,
        pos: ParserPos,
    },
    /// Parenthesised list, e.g. the right side of `IN`.
    Row {
        items: Vec<SqlNode>,
        pos: ParserPos,
    },
}

impl SqlNode {
    pub fn literal(value: SqlLiteral, pos: ParserPos) -> Self {
        SqlNode::Literal { value, pos }
    }

    pub fn identifier(name: &str, pos: ParserPos) -> Self {
        SqlNode::Identifier {
            names: vec![name.to_string()],
            pos,
        }
    }

    /// Position of the node in the SQL text.
    pub fn pos(&self) -> ParserPos {
        match self {
            SqlNode::Literal { pos, .. }
            | SqlNode::Identifier { pos, .. }
            | SqlNode::Call { pos, .. }
            | SqlNode::Function { pos, .. }
            | SqlNode::Row { pos, .. } => *pos,
        }
    }

    /// Kind of the operator if the node is an operator call.
    pub fn kind(&self) -> Option<SqlKind> {
        match self {
            SqlNode::Call { op, .. } => Some(op.kind),
            _ => None,
        }
    }

    /// Returns the node with its position replaced.
    pub fn with_pos(self, new_pos: ParserPos) -> SqlNode {
        match self {
            SqlNode::Literal { value, .. } => SqlNode::Literal {
                value,
                pos: new_pos,
            },
            SqlNode::Identifier { names, .. } => SqlNode::Identifier {
                names,
                pos: new_pos,
            },
            SqlNode::Call { op, operands, .. } => SqlNode::Call {
                op,
                operands,
                pos: new_pos,
            },
            SqlNode::Function { name, args, .. } => SqlNode::Function {
                name,
                args,
                pos: new_pos,
            },
            SqlNode::Row { items, .. } => SqlNode::Row {
                items,
                pos: new_pos,
            },
        }
    }
}

fn join(nodes: &[SqlNode]) -> String {
    nodes
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<String>>()
        .join(", ")
}

/// Fully parenthesised SQL text, so that the tree shape is visible.
impl fmt::Display for SqlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlNode::Literal { value, .. } => write!(f, "{}", value),
            SqlNode::Identifier { names, .. } => write!(f, "{}", names.join(".")),
            SqlNode::Function { name, args, .. } => write!(f, "{}({})", name, join(args)),
            SqlNode::Row { items, .. } => write!(f, "({})", join(items)),
            SqlNode::Call { op, operands, .. } => match (op.syntax, op.kind, operands.as_slice()) {
                (OperatorSyntax::Prefix, _, [a]) => write!(f, "({} {})", op.name, a),
                (OperatorSyntax::Postfix, _, [a]) => write!(f, "({} {})", a, op.name),
                (_, SqlKind::Between, [a, b, c]) | (_, SqlKind::NotBetween, [a, b, c]) => {
                    write!(f, "({} {} {} AND {})", a, op.name, b, c)
                }
                (_, SqlKind::Like, [a, b, c]) | (_, SqlKind::NotLike, [a, b, c]) => {
                    write!(f, "({} {} {} ESCAPE {})", a, op.name, b, c)
                }
                (_, _, [a, b]) => write!(f, "({} {} {})", a, op.name, b),
                (_, _, args) => write!(f, "{}({})", op.name, join(args)),
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::operator::OperatorTable;
    use std::str::FromStr;

    fn id(name: &str) -> SqlNode {
        SqlNode::identifier(name, ParserPos::ZERO)
    }

    #[test]
    fn test_unparse() {
        let table = OperatorTable::standard();
        let between = table.special("NOT BETWEEN").unwrap().create_call(
            vec![id("a"), id("b"), id("c")],
            ParserPos::ZERO,
        );
        let or = table
            .binary("OR")
            .unwrap()
            .create_call(vec![between, id("d")], ParserPos::ZERO);
        assert_eq!("((a NOT BETWEEN b AND c) OR d)", or.to_string());

        let is_null = table
            .postfix("IS NULL")
            .unwrap()
            .create_call(vec![id("x")], ParserPos::ZERO);
        assert_eq!("(x IS NULL)", is_null.to_string());

        let not = table
            .prefix("NOT")
            .unwrap()
            .create_call(vec![is_null], ParserPos::ZERO);
        assert_eq!("(NOT (x IS NULL))", not.to_string());
    }

    #[test]
    fn test_literals() {
        let lit = |v| SqlNode::literal(v, ParserPos::ZERO).to_string();
        assert_eq!("'it''s'", lit(SqlLiteral::String(String::from("it's"))));
        assert_eq!(
            "2.5",
            lit(SqlLiteral::Numeric(BigDecimal::from_str("2.50").unwrap()))
        );
        assert_eq!(
            "DATE '2020-01-31'",
            lit(SqlLiteral::Date(NaiveDate::from_ymd_opt(2020, 1, 31).unwrap()))
        );
        assert_eq!("NULL", lit(SqlLiteral::Null));
    }
}
