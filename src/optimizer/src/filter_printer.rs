//! Prints filter conditions in the remote query dialect.
//!
//! The dialect knows comparisons, `LIKE`, the boolean connectives and null
//! tests. Operands are field names or literals; nested calls are wrapped in
//! parentheses. A condition containing anything else is not printable.

use common::logical_plan::{RexLiteral, RexNode, RexOp};
use common::{decimal_to_string, Field, DATE_FORMAT};

/// Format of timestamp literals, always in GMT.
pub const REMOTE_LITERAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Prints conditions over a row whose fields have the given remote names.
pub struct FilterPrinter<'a> {
    field_names: &'a [String],
}

impl<'a> FilterPrinter<'a> {
    /// Creates a printer.
    ///
    /// # Arguments
    ///
    /// * `field_names` - Remote name of each input field, by index.
    pub fn new(field_names: &'a [String]) -> Self {
        Self { field_names }
    }

    /// Prints the condition, or returns None if any part of it is not
    /// expressible remotely.
    pub fn print(&self, condition: &RexNode) -> Option<String> {
        match condition {
            RexNode::Call { op, operands } => self.print_call(*op, operands),
            _ => None,
        }
    }

    fn print_call(&self, op: RexOp, operands: &[RexNode]) -> Option<String> {
        match op {
            RexOp::And | RexOp::Or => {
                if operands.len() < 2 {
                    return None;
                }
                let parts = operands
                    .iter()
                    .map(|o| self.print(o).map(|s| format!("({})", s)))
                    .collect::<Option<Vec<String>>>()?;
                Some(parts.join(&format!(" {} ", op.symbol())))
            }
            RexOp::Not => match operands {
                [inner] => Some(format!("NOT ({})", self.print(inner)?)),
                _ => None,
            },
            RexOp::IsNull => match operands {
                [operand] => Some(format!("{} = null", self.leaf(operand)?)),
                _ => None,
            },
            RexOp::IsNotNull => match operands {
                [operand] => Some(format!("{} != null", self.leaf(operand)?)),
                _ => None,
            },
            op if op.is_comparison() || op == RexOp::Like => match operands {
                [left, right] => Some(format!(
                    "{} {} {}",
                    self.leaf(left)?,
                    op.symbol(),
                    self.leaf(right)?
                )),
                _ => None,
            },
            _ => None,
        }
    }

    fn leaf(&self, node: &RexNode) -> Option<String> {
        match node {
            RexNode::InputRef(i) => self.field_names.get(*i).cloned(),
            RexNode::Literal(lit) => print_literal(lit),
            RexNode::Call { .. } => None,
        }
    }
}

/// Prints a literal. Embedded quotes of strings are doubled.
pub fn print_literal(lit: &RexLiteral) -> Option<String> {
    match &lit.value {
        Field::StringField(s) => Some(format!("'{}'", s.replace('\'', "''"))),
        Field::TimestampField(t) => Some(t.format(REMOTE_LITERAL_TIMESTAMP_FORMAT).to_string()),
        Field::DateField(d) => Some(d.format(DATE_FORMAT).to_string()),
        Field::DecimalField(d) => Some(decimal_to_string(d)),
        Field::IntField(i) => Some(i.to_string()),
        Field::BoolField(b) => Some(b.to_string()),
        Field::Null => None,
    }
}

/// Shorthand for `FilterPrinter::new(field_names).print(condition)`.
pub fn print_filter(condition: &RexNode, field_names: &[String]) -> Option<String> {
    FilterPrinter::new(field_names).print(condition)
}
