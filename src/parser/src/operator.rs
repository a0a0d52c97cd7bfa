use crate::node::SqlNode;
use crate::pos::ParserPos;
use std::collections::HashMap;
use std::fmt;

/// Kind of an operator, used to recognise stopper tokens and to translate calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlKind {
    Or,
    And,
    Not,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    In,
    NotIn,
    Plus,
    Minus,
    Times,
    Divide,
    Concat,
    MinusPrefix,
    PlusPrefix,
    IsNull,
    IsNotNull,
    IsTrue,
    IsFalse,
    Between,
    NotBetween,
    Like,
    NotLike,
    Escape,
}

/// How an operator takes its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorSyntax {
    /// `a op b`.
    Binary,
    /// `op a`. Handled by the grammar, never seen by the reducer.
    Prefix,
    /// `a op`.
    Postfix,
    /// Decides itself how many list items it consumes.
    Special,
}

/// An operator with its precedence pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SqlOperator {
    pub name: &'static str,
    pub kind: SqlKind,
    pub syntax: OperatorSyntax,
    pub left_prec: u32,
    pub right_prec: u32,
}

impl SqlOperator {
    /// Binary operator of precedence `prec`.
    ///
    /// # Arguments
    ///
    /// * `name` - SQL spelling.
    /// * `kind` - Operator kind.
    /// * `prec` - Precedence; both sides are derived from it.
    /// * `left_assoc` - Whether ties reduce to the left.
    pub fn binary(name: &'static str, kind: SqlKind, prec: u32, left_assoc: bool) -> Self {
        Self {
            name,
            kind,
            syntax: OperatorSyntax::Binary,
            left_prec: left_prec(prec, left_assoc),
            right_prec: right_prec(prec, left_assoc),
        }
    }

    pub fn postfix(name: &'static str, kind: SqlKind, prec: u32) -> Self {
        Self {
            name,
            kind,
            syntax: OperatorSyntax::Postfix,
            left_prec: prec * 2,
            right_prec: prec * 2 + 1,
        }
    }

    pub fn prefix(name: &'static str, kind: SqlKind, prec: u32) -> Self {
        Self {
            name,
            kind,
            syntax: OperatorSyntax::Prefix,
            left_prec: 0,
            right_prec: prec * 2,
        }
    }

    pub fn special(name: &'static str, kind: SqlKind, left_prec: u32, right_prec: u32) -> Self {
        Self {
            name,
            kind,
            syntax: OperatorSyntax::Special,
            left_prec,
            right_prec,
        }
    }

    /// Whether a BETWEEN operator compares against both bound orders.
    pub fn is_symmetric(&self) -> bool {
        self.name.ends_with(" SYMMETRIC")
    }

    /// Builds a call of this operator.
    ///
    /// # Arguments
    ///
    /// * `operands` - Operands in order.
    /// * `pos` - Position of the call.
    pub fn create_call(&self, operands: Vec<SqlNode>, pos: ParserPos) -> SqlNode {
        SqlNode::Call {
            op: self.clone(),
            operands,
            pos,
        }
    }
}

impl fmt::Display for SqlOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

fn left_prec(prec: u32, left_assoc: bool) -> u32 {
    let mut p = prec * 2;
    if !left_assoc {
        p += 1;
    }
    p
}

fn right_prec(prec: u32, left_assoc: bool) -> u32 {
    let mut p = prec * 2;
    if left_assoc {
        p += 1;
    }
    p
}

/// Immutable set of operators the grammar recognises, looked up by syntax and name.
#[derive(Debug, Clone)]
pub struct OperatorTable {
    operators: HashMap<(OperatorSyntax, String), SqlOperator>,
}

impl OperatorTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            operators: HashMap::new(),
        }
    }

    /// Adds an operator, replacing any with the same syntax and name.
    pub fn register(&mut self, op: SqlOperator) {
        self.operators.insert((op.syntax, op.name.to_string()), op);
    }

    /// The standard SQL operators.
    pub fn standard() -> Self {
        let mut table = OperatorTable::new();
        table.register(SqlOperator::binary("OR", SqlKind::Or, 13, true));
        table.register(SqlOperator::binary("AND", SqlKind::And, 14, true));

        let comparisons = [
            ("=", SqlKind::Equals),
            ("<>", SqlKind::NotEquals),
            ("<", SqlKind::LessThan),
            ("<=", SqlKind::LessThanOrEqual),
            (">", SqlKind::GreaterThan),
            (">=", SqlKind::GreaterThanOrEqual),
            ("IN", SqlKind::In),
            ("NOT IN", SqlKind::NotIn),
        ];
        for (name, kind) in comparisons.iter() {
            table.register(SqlOperator::binary(*name, *kind, 15, true));
        }

        table.register(SqlOperator::binary("+", SqlKind::Plus, 20, true));
        table.register(SqlOperator::binary("-", SqlKind::Minus, 20, true));
        table.register(SqlOperator::binary("*", SqlKind::Times, 30, true));
        table.register(SqlOperator::binary("/", SqlKind::Divide, 30, true));
        table.register(SqlOperator::binary("||", SqlKind::Concat, 30, true));

        table.register(SqlOperator::postfix("IS NULL", SqlKind::IsNull, 15));
        table.register(SqlOperator::postfix("IS NOT NULL", SqlKind::IsNotNull, 15));
        table.register(SqlOperator::postfix("IS TRUE", SqlKind::IsTrue, 15));
        table.register(SqlOperator::postfix("IS FALSE", SqlKind::IsFalse, 15));

        table.register(SqlOperator::prefix("NOT", SqlKind::Not, 15));
        table.register(SqlOperator::prefix("-", SqlKind::MinusPrefix, 20));
        table.register(SqlOperator::prefix("+", SqlKind::PlusPrefix, 20));

        let betweens = [
            ("BETWEEN", SqlKind::Between),
            ("BETWEEN ASYMMETRIC", SqlKind::Between),
            ("BETWEEN SYMMETRIC", SqlKind::Between),
            ("NOT BETWEEN", SqlKind::NotBetween),
            ("NOT BETWEEN ASYMMETRIC", SqlKind::NotBetween),
            ("NOT BETWEEN SYMMETRIC", SqlKind::NotBetween),
            ("LIKE", SqlKind::Like),
            ("NOT LIKE", SqlKind::NotLike),
        ];
        for (name, kind) in betweens.iter() {
            table.register(SqlOperator::special(
                *name,
                *kind,
                left_prec(15, true),
                right_prec(15, true),
            ));
        }
        table.register(SqlOperator::special("ESCAPE", SqlKind::Escape, 0, 0));
        table
    }

    /// Looks up an operator by syntax and upper-case name.
    pub fn lookup(&self, syntax: OperatorSyntax, name: &str) -> Option<&SqlOperator> {
        self.operators.get(&(syntax, name.to_string()))
    }

    pub fn binary(&self, name: &str) -> Option<&SqlOperator> {
        self.lookup(OperatorSyntax::Binary, name)
    }

    pub fn postfix(&self, name: &str) -> Option<&SqlOperator> {
        self.lookup(OperatorSyntax::Postfix, name)
    }

    pub fn prefix(&self, name: &str) -> Option<&SqlOperator> {
        self.lookup(OperatorSyntax::Prefix, name)
    }

    pub fn special(&self, name: &str) -> Option<&SqlOperator> {
        self.lookup(OperatorSyntax::Special, name)
    }

    /// Number of registered operators.
    pub fn size(&self) -> usize {
        self.operators.len()
    }
}

impl Default for OperatorTable {
    fn default() -> Self {
        OperatorTable::standard()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_precedence_pairs() {
        let table = OperatorTable::standard();
        let and = table.binary("AND").unwrap();
        assert_eq!((28, 29), (and.left_prec, and.right_prec));
        let times = table.binary("*").unwrap();
        assert_eq!((60, 61), (times.left_prec, times.right_prec));
        let right = SqlOperator::binary("^", SqlKind::Times, 30, false);
        assert_eq!((61, 60), (right.left_prec, right.right_prec));
        let is_null = table.postfix("IS NULL").unwrap();
        assert_eq!((30, 31), (is_null.left_prec, is_null.right_prec));
        let not = table.prefix("NOT").unwrap();
        assert_eq!((0, 30), (not.left_prec, not.right_prec));
        let escape = table.special("ESCAPE").unwrap();
        assert_eq!((0, 0), (escape.left_prec, escape.right_prec));
    }

    #[test]
    fn test_lookup_by_syntax() {
        let table = OperatorTable::standard();
        assert_eq!(SqlKind::Minus, table.binary("-").unwrap().kind);
        assert_eq!(SqlKind::MinusPrefix, table.prefix("-").unwrap().kind);
        assert!(table.binary("BETWEEN").is_none());
        assert!(table.special("BETWEEN SYMMETRIC").unwrap().is_symmetric());
        assert!(!table.special("BETWEEN ASYMMETRIC").unwrap().is_symmetric());
    }
}
