//! Workloads shared by the benchmarks.

use common::testutil::*;
use common::{MedError, RelNode, RexNode, RexOp};
use parser::{OperatorTable, ParserPos, SqlNode, TreeListItem};

/// `c0 + c1 * c2 - c3 * c4 ...` as a flat list of `n` operands.
pub fn arithmetic_list(table: &OperatorTable, n: usize) -> Result<Vec<TreeListItem>, MedError> {
    let ops = ["+", "*", "-", "*"];
    let mut list = Vec::with_capacity(2 * n);
    for i in 0..n {
        if i > 0 {
            let name = ops[i % ops.len()];
            let op = table
                .binary(name)
                .ok_or_else(|| MedError::InternalError(format!("No operator {}", name)))?;
            list.push(TreeListItem::operator(op, ParserPos::default()));
        }
        list.push(TreeListItem::Operand(SqlNode::identifier(
            &format!("c{}", i),
            ParserPos::default(),
        )));
    }
    Ok(list)
}

/// `c0 = 0 AND c1 = 1 OR c2 = 2 ...` with `n` comparisons.
pub fn predicate_text(n: usize) -> String {
    (0..n)
        .map(|i| format!("c{} = {}", i, i))
        .enumerate()
        .fold(String::new(), |mut acc, (i, term)| {
            if i > 0 {
                acc += if i % 3 == 0 { " OR " } else { " AND " };
            }
            acc += &term;
            acc
        })
}

/// `Project(Filter(scan))` over Opportunity with `terms` conjuncts.
pub fn opportunity_tree(terms: usize) -> Result<RelNode, MedError> {
    let scan = object_scan(&opportunity_object());
    let conjuncts: Vec<RexNode> = (0..terms)
        .map(|i| match i % 3 {
            0 => cmp(2, RexOp::Gt, decimal_lit(&format!("{}.50", i))),
            1 => cmp(7, RexOp::Le, int_lit(i as i64)),
            _ => cmp(1, RexOp::NotEq, string_lit(&format!("deal {}", i))),
        })
        .collect();
    let condition = RexNode::and(conjuncts)
        .ok_or_else(|| MedError::InternalError(String::from("Empty conjunction")))?;
    RelNode::project(
        RelNode::filter(scan, condition),
        vec![RexNode::input_ref(0), RexNode::input_ref(1), RexNode::input_ref(2)],
        vec![
            String::from("Id"),
            String::from("Name"),
            String::from("Amount"),
        ],
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_workloads() {
        let table = OperatorTable::standard();
        assert_eq!(7, arithmetic_list(&table, 4).unwrap().len());
        assert_eq!("c0 = 0 AND c1 = 1 AND c2 = 2 OR c3 = 3", predicate_text(4));
        assert_eq!(3, opportunity_tree(4).unwrap().schema().size());
    }
}
