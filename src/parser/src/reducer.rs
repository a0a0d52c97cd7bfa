//! Operator-precedence reduction of a flat operand/operator list into a tree.
//!
//! The grammar collects a maximal run such as `a + b * c IS NULL OR d` into a
//! list of [`TreeListItem`]s and calls [`to_tree`]. Each pass scans the list
//! from the left and reduces the first operator whose precedence is not
//! dominated by its neighbours; passes repeat until one operand is left.

use crate::node::SqlNode;
use crate::operator::{OperatorSyntax, SqlKind, SqlOperator};
use crate::pos::ParserPos;
use common::MedError;
use std::fmt;

/// Item of the operand/operator list handed to the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeListItem {
    Operand(SqlNode),
    /// Operator occurrence with the position of its token(s).
    Operator(SqlOperator, ParserPos),
}

impl TreeListItem {
    pub fn operator(op: &SqlOperator, pos: ParserPos) -> Self {
        TreeListItem::Operator(op.clone(), pos)
    }

    /// Position of the item in the SQL text.
    pub fn pos(&self) -> ParserPos {
        match self {
            TreeListItem::Operand(node) => node.pos(),
            TreeListItem::Operator(_, pos) => *pos,
        }
    }
}

impl fmt::Display for TreeListItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeListItem::Operand(node) => write!(f, "{}", node),
            TreeListItem::Operator(op, _) => write!(f, "{}", op),
        }
    }
}

fn operator_at(list: &[TreeListItem], i: usize) -> Result<(&SqlOperator, ParserPos), MedError> {
    match list.get(i) {
        Some(TreeListItem::Operator(op, pos)) => Ok((op, *pos)),
        Some(item) => Err(MedError::InternalError(format!(
            "Expected an operator at {} but found {}",
            i, item
        ))),
        None => Err(MedError::InternalError(format!(
            "Expected an operator at {} past the end of the list",
            i
        ))),
    }
}

fn operand_at(list: &[TreeListItem], i: usize) -> Result<SqlNode, MedError> {
    match list.get(i) {
        Some(TreeListItem::Operand(node)) => Ok(node.clone()),
        Some(item) => Err(MedError::InternalError(format!(
            "Expected an operand at {} but found operator {}",
            i, item
        ))),
        None => Err(MedError::InternalError(format!(
            "Expected an operand at {} past the end of the list",
            i
        ))),
    }
}

/// Replaces the items in `[start, end)` with a single operand.
fn replace_sublist(list: &mut Vec<TreeListItem>, start: usize, end: usize, node: SqlNode) {
    list.splice(start..end, std::iter::once(TreeListItem::Operand(node)));
}

/// Converts a whole list into a tree.
///
/// # Arguments
///
/// * `list` - Operands and operators, starting and ending with an operand.
pub fn to_tree(mut list: Vec<TreeListItem>) -> Result<SqlNode, MedError> {
    let node = to_tree_ex(&mut list, 0, 0, None)?;
    debug!("Reduced {}", node);
    Ok(node)
}

/// Reduces the list from `start` until a single operand remains there, an
/// operator below `min_prec` is reached, or the `stopper` kind is reached.
///
/// The list is modified in place; everything left of `start` is ignored.
/// Returns the operand at `start`.
///
/// # Arguments
///
/// * `list` - Operands and operators.
/// * `start` - Index of the first operand.
/// * `min_prec` - Operators with a lower left precedence end the reduction.
/// * `stopper` - Operator kind that ends the reduction, e.g. the AND of a BETWEEN.
pub fn to_tree_ex(
    list: &mut Vec<TreeListItem>,
    start: usize,
    min_prec: u32,
    stopper: Option<SqlKind>,
) -> Result<SqlNode, MedError> {
    'outer: loop {
        let count = list.len();
        if count <= start + 1 {
            break;
        }
        let mut i = start + 1;
        while i < count {
            let (current, current_pos) = operator_at(list, i)?;
            let current = current.clone();
            if Some(current.kind) == stopper {
                break 'outer;
            }
            let left = current.left_prec;
            let right = current.right_prec;
            if left < min_prec {
                break 'outer;
            }
            let previous_right = if i == start + 1 {
                0
            } else {
                operator_at(list, i - 2)?.0.right_prec
            };
            match current.syntax {
                OperatorSyntax::Binary => {
                    let next_left = if i + 2 >= count {
                        0
                    } else {
                        let (next, _) = operator_at(list, i + 2)?;
                        if Some(next.kind) == stopper {
                            // The stopper never blocks a reduction to its left.
                            0
                        } else {
                            next.left_prec
                        }
                    };
                    if previous_right < left && right >= next_left {
                        let left_exp = operand_at(list, i - 1)?;
                        let right_exp = operand_at(list, i + 1)?;
                        let pos = current_pos.plus_all(vec![left_exp.pos(), right_exp.pos()]);
                        let call = current.create_call(vec![left_exp, right_exp], pos);
                        trace!("Reduced infix: {}", call);
                        replace_sublist(list, i - 1, i + 2, call);
                        break;
                    }
                    i += 2;
                }
                OperatorSyntax::Postfix => {
                    if previous_right < left {
                        let left_exp = operand_at(list, i - 1)?;
                        let pos = current_pos.plus(left_exp.pos());
                        let call = current.create_call(vec![left_exp], pos);
                        trace!("Reduced postfix: {}", call);
                        replace_sublist(list, i - 1, i + 1, call);
                        break;
                    }
                    i += 1;
                }
                OperatorSyntax::Special => {
                    let mut next_ordinal = i + 2;
                    let mut next_left = 0;
                    if i + 2 < count {
                        while next_ordinal < count {
                            if let TreeListItem::Operator(next, _) = &list[next_ordinal] {
                                if Some(next.kind) == stopper {
                                    break 'outer;
                                }
                                next_left = next.left_prec;
                                break;
                            }
                            next_ordinal += 1;
                        }
                    }
                    if next_left < min_prec {
                        break 'outer;
                    }
                    if previous_right < left && right >= next_left {
                        let at = reduce_special(&current, i, list)?;
                        trace!("Reduced special op: {}", list[at]);
                        break;
                    }
                    i = next_ordinal;
                }
                OperatorSyntax::Prefix => {
                    return Err(MedError::InternalError(format!(
                        "Unexpected operator type: prefix {}",
                        current
                    )))
                }
            }
        }

        // Every pass must reduce something, otherwise the loop never ends.
        if list.len() >= count {
            return Err(MedError::InternalError(format!(
                "Reduction made no progress on list of {} items",
                count
            )));
        }
    }
    operand_at(list, start)
}

/// Reduces a special operator at `op_ordinal`, consuming as many items as it
/// needs. Returns the index of the resulting operand.
fn reduce_special(
    op: &SqlOperator,
    op_ordinal: usize,
    list: &mut Vec<TreeListItem>,
) -> Result<usize, MedError> {
    match op.kind {
        SqlKind::Between | SqlKind::NotBetween => reduce_between(op, op_ordinal, list),
        SqlKind::Like | SqlKind::NotLike => reduce_like(op, op_ordinal, list),
        SqlKind::Escape => Err(MedError::ParseError(format!(
            "ESCAPE without LIKE at {}",
            operator_at(list, op_ordinal)?.1
        ))),
        _ => Err(MedError::InternalError(format!(
            "No special reduction for {}",
            op
        ))),
    }
}

fn is_operator(list: &[TreeListItem], i: usize, kind: SqlKind) -> bool {
    match list.get(i) {
        Some(TreeListItem::Operator(op, _)) => op.kind == kind,
        _ => false,
    }
}

/// `a BETWEEN b AND c`: the operand up to the AND, then the operand after it.
fn reduce_between(
    op: &SqlOperator,
    op_ordinal: usize,
    list: &mut Vec<TreeListItem>,
) -> Result<usize, MedError> {
    if op_ordinal == 0 {
        return Err(MedError::InternalError(format!("{} without left operand", op)));
    }
    let op_pos = operator_at(list, op_ordinal)?.1;
    let exp1 = to_tree_ex(list, op_ordinal + 1, 0, Some(SqlKind::And))?;
    if !is_operator(list, op_ordinal + 2, SqlKind::And) {
        return Err(MedError::ParseError(format!(
            "{} requires AND at {}",
            op, op_pos
        )));
    }
    let exp2 = to_tree_ex(list, op_ordinal + 3, op.right_prec, None)?;
    let exp0 = operand_at(list, op_ordinal - 1)?;
    let pos = op_pos.plus_all(vec![exp0.pos(), exp1.pos(), exp2.pos()]);
    let call = op.create_call(vec![exp0, exp1, exp2], pos);
    replace_sublist(list, op_ordinal - 1, op_ordinal + 4, call);
    Ok(op_ordinal - 1)
}

/// `a LIKE b [ESCAPE c]`.
fn reduce_like(
    op: &SqlOperator,
    op_ordinal: usize,
    list: &mut Vec<TreeListItem>,
) -> Result<usize, MedError> {
    if op_ordinal == 0 {
        return Err(MedError::InternalError(format!("{} without left operand", op)));
    }
    let op_pos = operator_at(list, op_ordinal)?.1;
    let exp1 = to_tree_ex(list, op_ordinal + 1, op.right_prec, Some(SqlKind::Escape))?;
    let exp0 = operand_at(list, op_ordinal - 1)?;
    let (operands, end) = if is_operator(list, op_ordinal + 2, SqlKind::Escape) {
        let exp2 = to_tree_ex(list, op_ordinal + 3, op.right_prec, None)?;
        (vec![exp0, exp1, exp2], op_ordinal + 4)
    } else {
        (vec![exp0, exp1], op_ordinal + 2)
    };
    let pos = op_pos.plus_all(operands.iter().map(|o| o.pos()).collect::<Vec<ParserPos>>());
    let call = op.create_call(operands, pos);
    replace_sublist(list, op_ordinal - 1, end, call);
    Ok(op_ordinal - 1)
}
