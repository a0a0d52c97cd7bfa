//! Search-argument analysis of filter conditions.
//!
//! A condition is split into its top-level conjuncts. Conjuncts that compare
//! one column against literals become per-column bindings: either a union of
//! intervals, or a marker that the column is constrained in a way intervals
//! cannot express (`<>`, `LIKE`, `IS NULL`, ...). Everything else, such as
//! column-to-column comparisons, forms the post-filter.

use common::logical_plan::{RexLiteral, RexNode, RexOp};
use common::{DataType, TableSchema};
use std::cmp::Ordering;
use std::fmt;

/// Two literals of incomparable types were combined.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Incomparable;

fn cmp_lit(a: &RexLiteral, b: &RexLiteral) -> Result<Ordering, Incomparable> {
    a.value.compare_sql(&b.value).ok_or(Incomparable)
}

/// One end of an interval.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Unbounded,
    Inclusive(RexLiteral),
    Exclusive(RexLiteral),
}

impl Bound {
    /// Literal of a bounded end.
    pub fn literal(&self) -> Option<&RexLiteral> {
        match self {
            Bound::Unbounded => None,
            Bound::Inclusive(l) | Bound::Exclusive(l) => Some(l),
        }
    }

    pub fn is_bounded(&self) -> bool {
        !matches!(self, Bound::Unbounded)
    }

    /// Returns true for an exclusive end.
    pub fn is_strict(&self) -> bool {
        matches!(self, Bound::Exclusive(_))
    }
}

/// Picks the more restrictive of two lower bounds.
fn max_lower(a: &Bound, b: &Bound) -> Result<Bound, Incomparable> {
    let (la, lb) = match (a.literal(), b.literal()) {
        (None, _) => return Ok(b.clone()),
        (_, None) => return Ok(a.clone()),
        (Some(la), Some(lb)) => (la, lb),
    };
    Ok(match cmp_lit(la, lb)? {
        Ordering::Greater => a.clone(),
        Ordering::Less => b.clone(),
        Ordering::Equal if a.is_strict() => a.clone(),
        Ordering::Equal => b.clone(),
    })
}

/// Picks the more restrictive of two upper bounds.
fn min_upper(a: &Bound, b: &Bound) -> Result<Bound, Incomparable> {
    let (la, lb) = match (a.literal(), b.literal()) {
        (None, _) => return Ok(b.clone()),
        (_, None) => return Ok(a.clone()),
        (Some(la), Some(lb)) => (la, lb),
    };
    Ok(match cmp_lit(la, lb)? {
        Ordering::Less => a.clone(),
        Ordering::Greater => b.clone(),
        Ordering::Equal if a.is_strict() => a.clone(),
        Ordering::Equal => b.clone(),
    })
}

/// Picks the less restrictive of two upper bounds.
fn max_upper(a: &Bound, b: &Bound) -> Result<Bound, Incomparable> {
    let (la, lb) = match (a.literal(), b.literal()) {
        (None, _) | (_, None) => return Ok(Bound::Unbounded),
        (Some(la), Some(lb)) => (la, lb),
    };
    Ok(match cmp_lit(la, lb)? {
        Ordering::Greater => a.clone(),
        Ordering::Less => b.clone(),
        Ordering::Equal if a.is_strict() => b.clone(),
        Ordering::Equal => a.clone(),
    })
}

/// Orders lower bounds from least to most restrictive.
fn cmp_lower(a: &Bound, b: &Bound) -> Result<Ordering, Incomparable> {
    match (a.literal(), b.literal()) {
        (None, None) => Ok(Ordering::Equal),
        (None, _) => Ok(Ordering::Less),
        (_, None) => Ok(Ordering::Greater),
        (Some(la), Some(lb)) => Ok(cmp_lit(la, lb)?.then(a.is_strict().cmp(&b.is_strict()))),
    }
}

/// A range of values. A point is an interval with two equal inclusive ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub lower: Bound,
    pub upper: Bound,
}

impl Interval {
    pub fn new(lower: Bound, upper: Bound) -> Self {
        Self { lower, upper }
    }

    pub fn point(value: RexLiteral) -> Self {
        Self::new(Bound::Inclusive(value.clone()), Bound::Inclusive(value))
    }

    /// Returns true when both ends are bounded.
    pub fn is_bounded(&self) -> bool {
        self.lower.is_bounded() && self.upper.is_bounded()
    }

    pub fn is_point(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Bound::Inclusive(l), Bound::Inclusive(u)) => cmp_lit(l, u) == Ok(Ordering::Equal),
            _ => false,
        }
    }

    fn is_empty(&self) -> Result<bool, Incomparable> {
        let (l, u) = match (self.lower.literal(), self.upper.literal()) {
            (Some(l), Some(u)) => (l, u),
            _ => return Ok(false),
        };
        Ok(match cmp_lit(l, u)? {
            Ordering::Greater => true,
            Ordering::Equal => self.lower.is_strict() || self.upper.is_strict(),
            Ordering::Less => false,
        })
    }

    /// Whether `next`, which starts no earlier than this interval, overlaps or
    /// adjoins it.
    fn touches(&self, next: &Interval) -> Result<bool, Incomparable> {
        let (u, l) = match (self.upper.literal(), next.lower.literal()) {
            (Some(u), Some(l)) => (u, l),
            _ => return Ok(true),
        };
        Ok(match cmp_lit(u, l)? {
            Ordering::Greater => true,
            Ordering::Equal => !self.upper.is_strict() || !next.lower.is_strict(),
            Ordering::Less => false,
        })
    }
}

/// Sorts, drops empty intervals, and merges overlapping ones.
fn normalize(mut ranges: Vec<Interval>) -> Result<Vec<Interval>, Incomparable> {
    let mut kept = Vec::new();
    for iv in ranges.drain(..) {
        if !iv.is_empty()? {
            kept.push(iv);
        }
    }
    // Insertion sort; the comparison can fail.
    for i in 1..kept.len() {
        let mut j = i;
        while j > 0 && cmp_lower(&kept[j - 1].lower, &kept[j].lower)? == Ordering::Greater {
            kept.swap(j - 1, j);
            j -= 1;
        }
    }
    let mut merged: Vec<Interval> = Vec::new();
    for iv in kept {
        if let Some(last) = merged.last_mut() {
            if last.touches(&iv)? {
                last.upper = max_upper(&last.upper, &iv.upper)?;
                continue;
            }
        }
        merged.push(iv);
    }
    Ok(merged)
}

fn union(a: Vec<Interval>, b: Vec<Interval>) -> Result<Vec<Interval>, Incomparable> {
    let mut all = a;
    all.extend(b);
    normalize(all)
}

fn intersect(a: &[Interval], b: &[Interval]) -> Result<Vec<Interval>, Incomparable> {
    let mut out = Vec::new();
    for x in a {
        for y in b {
            out.push(Interval::new(
                max_lower(&x.lower, &y.lower)?,
                min_upper(&x.upper, &y.upper)?,
            ));
        }
    }
    normalize(out)
}

/// Constraint on one column.
#[derive(Debug, Clone, PartialEq)]
pub enum SargExpr {
    /// Union of disjoint intervals, sorted. Empty means no value qualifies.
    Ranges(Vec<Interval>),
    /// Constrained in a way intervals cannot express.
    Unanalyzable,
}

/// A column with the constraint the filter places on it.
#[derive(Debug, Clone, PartialEq)]
pub struct SargBinding {
    /// Input field index.
    pub column: usize,
    pub dtype: DataType,
    pub expr: SargExpr,
    /// Conjuncts of the original condition the binding was built from.
    pub terms: Vec<RexNode>,
}

impl SargBinding {
    /// The only interval, if the binding is exactly one interval.
    pub fn single_range(&self) -> Option<&Interval> {
        match &self.expr {
            SargExpr::Ranges(ranges) if ranges.len() == 1 => ranges.first(),
            _ => None,
        }
    }

    pub fn is_analyzable(&self) -> bool {
        matches!(self.expr, SargExpr::Ranges(_))
    }

    /// Rebuilds a condition equivalent to the binding.
    pub fn to_rex(&self) -> RexNode {
        match &self.expr {
            SargExpr::Unanalyzable => {
                RexNode::and(self.terms.clone()).unwrap_or_else(|| RexNode::bool_literal(true))
            }
            SargExpr::Ranges(ranges) => RexNode::or(
                ranges
                    .iter()
                    .map(|iv| interval_to_rex(self.column, iv))
                    .collect(),
            )
            .unwrap_or_else(|| RexNode::bool_literal(false)),
        }
    }
}

impl fmt::Display for SargBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}: {}", self.column, self.to_rex())
    }
}

fn interval_to_rex(column: usize, iv: &Interval) -> RexNode {
    let col = RexNode::input_ref(column);
    if iv.is_point() {
        if let Bound::Inclusive(lit) = &iv.lower {
            return RexNode::call(RexOp::Eq, vec![col, RexNode::Literal(lit.clone())]);
        }
    }
    let mut parts = Vec::new();
    match &iv.lower {
        Bound::Inclusive(l) => parts.push((RexOp::Ge, l)),
        Bound::Exclusive(l) => parts.push((RexOp::Gt, l)),
        Bound::Unbounded => (),
    }
    match &iv.upper {
        Bound::Inclusive(u) => parts.push((RexOp::Le, u)),
        Bound::Exclusive(u) => parts.push((RexOp::Lt, u)),
        Bound::Unbounded => (),
    }
    let terms: Vec<RexNode> = parts
        .into_iter()
        .map(|(op, lit)| RexNode::call(op, vec![col.clone(), RexNode::Literal(lit.clone())]))
        .collect();
    RexNode::and(terms).unwrap_or_else(|| RexNode::call(RexOp::IsNotNull, vec![col]))
}

/// What a single term says about the columns.
enum TermSarg {
    Ranges(usize, Vec<Interval>),
    Unanalyzable(usize),
    Other,
}

fn comparison(op: RexOp, operands: &[RexNode], input: &TableSchema) -> TermSarg {
    let (column, lit, op) = match operands {
        [RexNode::InputRef(c), RexNode::Literal(l)] => (*c, l, op),
        [RexNode::Literal(l), RexNode::InputRef(c)] => (*c, l, op.flip()),
        _ => return TermSarg::Other,
    };
    let dtype = match input.get_attribute(column) {
        Some(attr) => attr.dtype(),
        None => return TermSarg::Other,
    };
    if lit.value.is_null() || !dtype.is_comparable_with(&lit.dtype) {
        return TermSarg::Unanalyzable(column);
    }
    let bound = || lit.clone();
    let interval = match op {
        RexOp::Eq => Interval::point(bound()),
        RexOp::Lt => Interval::new(Bound::Unbounded, Bound::Exclusive(bound())),
        RexOp::Le => Interval::new(Bound::Unbounded, Bound::Inclusive(bound())),
        RexOp::Gt => Interval::new(Bound::Exclusive(bound()), Bound::Unbounded),
        RexOp::Ge => Interval::new(Bound::Inclusive(bound()), Bound::Unbounded),
        _ => return TermSarg::Unanalyzable(column),
    };
    TermSarg::Ranges(column, vec![interval])
}

/// Combines the operands of an OR (`union`) or a nested AND over one column.
fn combine(operands: &[RexNode], input: &TableSchema, is_union: bool) -> TermSarg {
    let mut column = None;
    let mut acc: Option<Vec<Interval>> = None;
    let mut analyzable = true;
    for operand in operands {
        let (c, ranges) = match analyze_term(operand, input) {
            TermSarg::Ranges(c, r) => (c, Some(r)),
            TermSarg::Unanalyzable(c) => (c, None),
            TermSarg::Other => return TermSarg::Other,
        };
        if column.is_some() && column != Some(c) {
            return TermSarg::Other;
        }
        column = Some(c);
        match ranges {
            Some(r) if analyzable => {
                let merged = match acc.take() {
                    None => Ok(r),
                    Some(prev) if is_union => union(prev, r),
                    Some(prev) => intersect(&prev, &r),
                };
                match merged {
                    Ok(m) => acc = Some(m),
                    Err(Incomparable) => analyzable = false,
                }
            }
            _ => analyzable = false,
        }
    }
    match column {
        Some(c) if analyzable => TermSarg::Ranges(c, acc.unwrap_or_default()),
        Some(c) => TermSarg::Unanalyzable(c),
        None => TermSarg::Other,
    }
}

fn analyze_term(term: &RexNode, input: &TableSchema) -> TermSarg {
    let (op, operands) = match term {
        RexNode::Call { op, operands } => (*op, operands.as_slice()),
        _ => return TermSarg::Other,
    };
    match op {
        RexOp::Like => match comparison(op, operands, input) {
            TermSarg::Ranges(c, _) | TermSarg::Unanalyzable(c) => TermSarg::Unanalyzable(c),
            TermSarg::Other => TermSarg::Other,
        },
        op if op.is_comparison() => comparison(op, operands, input),
        RexOp::IsNull | RexOp::IsNotNull => match operands {
            [RexNode::InputRef(c)] if *c < input.size() => TermSarg::Unanalyzable(*c),
            _ => TermSarg::Other,
        },
        RexOp::Not => match operands {
            [inner] => match analyze_term(inner, input) {
                TermSarg::Ranges(c, _) | TermSarg::Unanalyzable(c) => TermSarg::Unanalyzable(c),
                TermSarg::Other => TermSarg::Other,
            },
            _ => TermSarg::Other,
        },
        RexOp::Or => combine(operands, input, true),
        RexOp::And => combine(operands, input, false),
        _ => TermSarg::Other,
    }
}

/// Result of analyzing one filter condition.
#[derive(Debug, Clone, PartialEq)]
pub struct SargAnalysis {
    /// Per-column bindings, in order of first appearance.
    pub bindings: Vec<SargBinding>,
    /// Conjuncts that constrain no single column against literals.
    post_filter_terms: Vec<RexNode>,
}

impl SargAnalysis {
    /// Analyzes a condition over rows of the given type.
    ///
    /// # Arguments
    ///
    /// * `condition` - Boolean condition.
    /// * `input` - Row type the condition's input references point into.
    pub fn analyze(condition: &RexNode, input: &TableSchema) -> Self {
        let mut bindings: Vec<SargBinding> = Vec::new();
        let mut post_filter_terms = Vec::new();
        for term in condition.conjunctions() {
            let (column, ranges) = match analyze_term(&term, input) {
                TermSarg::Ranges(c, r) => (c, Some(r)),
                TermSarg::Unanalyzable(c) => (c, None),
                TermSarg::Other => {
                    post_filter_terms.push(term);
                    continue;
                }
            };
            let dtype = match input.get_attribute(column) {
                Some(attr) => attr.dtype().clone(),
                None => {
                    post_filter_terms.push(term);
                    continue;
                }
            };
            let expr = match ranges {
                Some(r) => SargExpr::Ranges(r),
                None => SargExpr::Unanalyzable,
            };
            match bindings.iter_mut().find(|b| b.column == column) {
                Some(binding) => {
                    binding.expr = match (&binding.expr, expr) {
                        (SargExpr::Ranges(a), SargExpr::Ranges(b)) => match intersect(a, &b) {
                            Ok(r) => SargExpr::Ranges(r),
                            Err(Incomparable) => SargExpr::Unanalyzable,
                        },
                        _ => SargExpr::Unanalyzable,
                    };
                    binding.terms.push(term);
                }
                None => bindings.push(SargBinding {
                    column,
                    dtype,
                    expr,
                    terms: vec![term],
                }),
            }
        }
        Self {
            bindings,
            post_filter_terms,
        }
    }

    /// Conjunction of the terms that are not column-versus-literal constraints.
    pub fn post_filter(&self) -> Option<RexNode> {
        RexNode::and(self.post_filter_terms.clone())
    }

    /// Conjunction of the bindings not in `consumed`, rebuilt from the bindings.
    ///
    /// # Arguments
    ///
    /// * `consumed` - Indices into `bindings` the caller has handled.
    pub fn residual(&self, consumed: &[usize]) -> Option<RexNode> {
        RexNode::and(self.residual_terms(consumed))
    }

    /// Everything a caller that handled `consumed` still has to apply: the
    /// residual and the post-filter.
    pub fn remaining(&self, consumed: &[usize]) -> Option<RexNode> {
        let mut terms = self.residual_terms(consumed);
        terms.extend(self.post_filter_terms.iter().cloned());
        RexNode::and(terms)
    }

    fn residual_terms(&self, consumed: &[usize]) -> Vec<RexNode> {
        self.bindings
            .iter()
            .enumerate()
            .filter(|(i, _)| !consumed.contains(i))
            .flat_map(|(_, b)| b.to_rex().conjunctions())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testutil::*;
    use common::{DataType, Field};

    fn schema() -> TableSchema {
        TableSchema::from_vecs(
            vec!["Id", "Name", "Amount", "CreatedDate"],
            vec![
                DataType::Varchar(18),
                DataType::Varchar(80),
                DataType::Decimal(18, 2),
                DataType::Timestamp,
            ],
        )
    }

    fn and(terms: Vec<RexNode>) -> RexNode {
        RexNode::call(RexOp::And, terms)
    }

    fn or(terms: Vec<RexNode>) -> RexNode {
        RexNode::call(RexOp::Or, terms)
    }

    #[test]
    fn test_point_and_range() {
        let cond = and(vec![
            cmp(1, RexOp::Eq, string_lit("Acme")),
            cmp(2, RexOp::Ge, int_lit(10)),
            cmp(2, RexOp::Lt, int_lit(20)),
        ]);
        let a = SargAnalysis::analyze(&cond, &schema());
        assert_eq!(2, a.bindings.len());
        assert!(a.bindings[0].single_range().unwrap().is_point());
        let range = a.bindings[1].single_range().unwrap();
        assert_eq!(Bound::Inclusive(int_lit(10).as_literal().unwrap().clone()), range.lower);
        assert!(range.upper.is_strict());
        assert_eq!(2, a.bindings[1].terms.len());
        assert_eq!(None, a.post_filter());
        assert_eq!(
            "AND(>=($2, 10), <($2, 20))",
            a.bindings[1].to_rex().to_string()
        );
    }

    #[test]
    fn test_literal_on_left_flips() {
        let cond = call2(RexOp::Lt, int_lit(5), RexNode::input_ref(2));
        let a = SargAnalysis::analyze(&cond, &schema());
        assert_eq!(">($2, 5)", a.bindings[0].to_rex().to_string());
    }

    #[test]
    fn test_or_same_column_unions() {
        let cond = or(vec![
            cmp(2, RexOp::Lt, int_lit(5)),
            cmp(2, RexOp::Gt, int_lit(10)),
            cmp(2, RexOp::Le, int_lit(3)),
        ]);
        let a = SargAnalysis::analyze(&cond, &schema());
        match &a.bindings[0].expr {
            SargExpr::Ranges(r) => assert_eq!(2, r.len()),
            other => panic!("Expected ranges, got {:?}", other),
        }
        assert_eq!(
            "OR(<($2, 5), >($2, 10))",
            a.bindings[0].to_rex().to_string()
        );
    }

    #[test]
    fn test_adjacent_ranges_merge() {
        let cond = or(vec![
            cmp(2, RexOp::Lt, int_lit(5)),
            cmp(2, RexOp::Ge, int_lit(5)),
        ]);
        let a = SargAnalysis::analyze(&cond, &schema());
        assert_eq!("IS NOT NULL($2)", a.bindings[0].to_rex().to_string());
    }

    #[test]
    fn test_contradiction_is_empty() {
        let cond = and(vec![
            cmp(2, RexOp::Gt, int_lit(10)),
            cmp(2, RexOp::Lt, int_lit(5)),
        ]);
        let a = SargAnalysis::analyze(&cond, &schema());
        assert_eq!(SargExpr::Ranges(Vec::new()), a.bindings[0].expr);
        assert_eq!(RexNode::bool_literal(false), a.bindings[0].to_rex());
    }

    #[test]
    fn test_unanalyzable_terms() {
        let cond = and(vec![
            cmp(1, RexOp::NotEq, string_lit("x")),
            cmp(0, RexOp::Like, string_lit("001%")),
            RexNode::call(RexOp::IsNull, vec![RexNode::input_ref(3)]),
            cmp(2, RexOp::Eq, RexNode::literal(Field::Null, DataType::Integer)),
        ]);
        let a = SargAnalysis::analyze(&cond, &schema());
        assert_eq!(4, a.bindings.len());
        assert!(a.bindings.iter().all(|b| !b.is_analyzable()));
        assert_eq!(cmp(1, RexOp::NotEq, string_lit("x")), a.bindings[0].to_rex());
    }

    #[test]
    fn test_unanalyzable_absorbs_ranges() {
        let cond = and(vec![
            cmp(2, RexOp::Gt, int_lit(1)),
            cmp(2, RexOp::NotEq, int_lit(3)),
        ]);
        let a = SargAnalysis::analyze(&cond, &schema());
        assert_eq!(1, a.bindings.len());
        assert_eq!(SargExpr::Unanalyzable, a.bindings[0].expr);
        assert_eq!(cond, a.bindings[0].to_rex());
    }

    #[test]
    fn test_post_filter() {
        let col_vs_col = call2(RexOp::Eq, RexNode::input_ref(0), RexNode::input_ref(1));
        let mixed_or = or(vec![
            cmp(0, RexOp::Eq, string_lit("a")),
            cmp(1, RexOp::Eq, string_lit("b")),
        ]);
        let name = cmp(1, RexOp::Eq, string_lit("Acme"));
        let cond = and(vec![col_vs_col.clone(), name.clone(), mixed_or.clone()]);
        let a = SargAnalysis::analyze(&cond, &schema());
        assert_eq!(1, a.bindings.len());
        assert_eq!(Some(and(vec![col_vs_col.clone(), mixed_or.clone()])), a.post_filter());
        assert_eq!(None, a.residual(&[0]));
        assert_eq!(Some(name.clone()), a.residual(&[]));
        assert_eq!(
            Some(and(vec![name, col_vs_col, mixed_or])),
            a.remaining(&[])
        );
    }

    #[test]
    fn test_incomparable_literal() {
        let cond = cmp(2, RexOp::Eq, string_lit("ten"));
        let a = SargAnalysis::analyze(&cond, &schema());
        assert_eq!(SargExpr::Unanalyzable, a.bindings[0].expr);
    }

    #[test]
    fn test_timestamp_range_with_date_bound() {
        let cond = and(vec![
            cmp(3, RexOp::Ge, date_lit("2020-01-01")),
            cmp(3, RexOp::Le, ts_lit("2020-02-01 00:00:00")),
            cmp(3, RexOp::Ge, ts_lit("2019-12-01 00:00:00")),
        ]);
        let a = SargAnalysis::analyze(&cond, &schema());
        let range = a.bindings[0].single_range().unwrap();
        assert!(range.is_bounded());
        assert_eq!(Some(date_lit("2020-01-01").as_literal().unwrap()), range.lower.literal());
    }
}
