use crate::{DataType, Field, MedError, TableSchema, DATE_FORMAT, TIMESTAMP_FORMAT};
use std::collections::BTreeSet;
use std::fmt;

/// Row-expression operators.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RexOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    And,
    Or,
    Not,
    IsNull,
    IsNotNull,
    IsTrue,
    IsFalse,
    Plus,
    Minus,
    Times,
    Divide,
    Neg,
    Concat,
    Upper,
    Lower,
}

impl RexOp {
    /// SQL spelling of the operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            RexOp::Eq => "=",
            RexOp::NotEq => "<>",
            RexOp::Lt => "<",
            RexOp::Le => "<=",
            RexOp::Gt => ">",
            RexOp::Ge => ">=",
            RexOp::Like => "LIKE",
            RexOp::And => "AND",
            RexOp::Or => "OR",
            RexOp::Not => "NOT",
            RexOp::IsNull => "IS NULL",
            RexOp::IsNotNull => "IS NOT NULL",
            RexOp::IsTrue => "IS TRUE",
            RexOp::IsFalse => "IS FALSE",
            RexOp::Plus => "+",
            RexOp::Minus => "-",
            RexOp::Times => "*",
            RexOp::Divide => "/",
            RexOp::Neg => "-",
            RexOp::Concat => "||",
            RexOp::Upper => "UPPER",
            RexOp::Lower => "LOWER",
        }
    }

    /// Returns true for =, <>, <, <=, > and >=.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            RexOp::Eq | RexOp::NotEq | RexOp::Lt | RexOp::Le | RexOp::Gt | RexOp::Ge
        )
    }

    /// The comparison obtained by swapping the operands, e.g. `5 < x` is `x > 5`.
    pub fn flip(&self) -> Self {
        match self {
            RexOp::Lt => RexOp::Gt,
            RexOp::Gt => RexOp::Lt,
            RexOp::Le => RexOp::Ge,
            RexOp::Ge => RexOp::Le,
            op => *op,
        }
    }
}

/// A literal with its dtype.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct RexLiteral {
    pub value: Field,
    pub dtype: DataType,
}

impl RexLiteral {
    pub fn new(value: Field, dtype: DataType) -> Self {
        Self { value, dtype }
    }
}

impl fmt::Display for RexLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Field::Null => write!(f, "null"),
            Field::StringField(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Field::BoolField(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Field::DateField(d) => write!(f, "DATE '{}'", d.format(DATE_FORMAT)),
            Field::TimestampField(t) => write!(f, "TIMESTAMP '{}'", t.format(TIMESTAMP_FORMAT)),
            other => write!(f, "{}", other),
        }
    }
}

/// Row expression evaluated against the fields of an input row.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub enum RexNode {
    /// Reference to the input field at an index.
    InputRef(usize),
    Literal(RexLiteral),
    Call { op: RexOp, operands: Vec<RexNode> },
}

impl RexNode {
    pub fn input_ref(index: usize) -> Self {
        RexNode::InputRef(index)
    }

    pub fn literal(value: Field, dtype: DataType) -> Self {
        RexNode::Literal(RexLiteral::new(value, dtype))
    }

    pub fn bool_literal(value: bool) -> Self {
        RexNode::literal(Field::BoolField(value), DataType::Boolean)
    }

    pub fn call(op: RexOp, operands: Vec<RexNode>) -> Self {
        RexNode::Call { op, operands }
    }

    /// Conjunction of the terms, or None if there are none.
    ///
    /// # Arguments
    ///
    /// * `terms` - Terms to combine. A single term is returned unchanged.
    pub fn and(mut terms: Vec<RexNode>) -> Option<RexNode> {
        match terms.len() {
            0 => None,
            1 => terms.pop(),
            _ => Some(RexNode::call(RexOp::And, terms)),
        }
    }

    /// Disjunction of the terms, or None if there are none.
    pub fn or(mut terms: Vec<RexNode>) -> Option<RexNode> {
        match terms.len() {
            0 => None,
            1 => terms.pop(),
            _ => Some(RexNode::call(RexOp::Or, terms)),
        }
    }

    /// Returns the index if this is an input reference.
    pub fn as_input_ref(&self) -> Option<usize> {
        match self {
            RexNode::InputRef(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the literal if this is one.
    pub fn as_literal(&self) -> Option<&RexLiteral> {
        match self {
            RexNode::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// Splits nested ANDs into their terms.
    pub fn conjunctions(&self) -> Vec<RexNode> {
        let mut terms = Vec::new();
        self.flatten(RexOp::And, &mut terms);
        terms
    }

    /// Splits nested ORs into their terms.
    pub fn disjunctions(&self) -> Vec<RexNode> {
        let mut terms = Vec::new();
        self.flatten(RexOp::Or, &mut terms);
        terms
    }

    fn flatten(&self, kind: RexOp, terms: &mut Vec<RexNode>) {
        match self {
            RexNode::Call { op, operands } if *op == kind => {
                for operand in operands {
                    operand.flatten(kind, terms);
                }
            }
            other => terms.push(other.clone()),
        }
    }

    /// Indices of all input fields referenced by the expression.
    pub fn input_refs(&self) -> BTreeSet<usize> {
        let mut refs = BTreeSet::new();
        self.collect_refs(&mut refs);
        refs
    }

    fn collect_refs(&self, refs: &mut BTreeSet<usize>) {
        match self {
            RexNode::InputRef(i) => {
                refs.insert(*i);
            }
            RexNode::Literal(_) => (),
            RexNode::Call { operands, .. } => {
                for operand in operands {
                    operand.collect_refs(refs);
                }
            }
        }
    }

    /// Rewrites every input reference through `f`.
    ///
    /// # Arguments
    ///
    /// * `f` - Maps an old input index to the new one.
    pub fn remap_inputs<F: Fn(usize) -> usize>(&self, f: &F) -> RexNode {
        match self {
            RexNode::InputRef(i) => RexNode::InputRef(f(*i)),
            RexNode::Literal(_) => self.clone(),
            RexNode::Call { op, operands } => RexNode::Call {
                op: *op,
                operands: operands.iter().map(|o| o.remap_inputs(f)).collect(),
            },
        }
    }

    /// Derives the dtype of the expression over the given input row type.
    ///
    /// # Arguments
    ///
    /// * `input` - Row type the input references point into.
    pub fn derive_type(&self, input: &TableSchema) -> Result<DataType, MedError> {
        match self {
            RexNode::InputRef(i) => input
                .get_attribute(*i)
                .map(|a| a.dtype().clone())
                .ok_or_else(|| {
                    MedError::ValidationError(format!("Input reference ${} out of range", i))
                }),
            RexNode::Literal(lit) => Ok(lit.dtype.clone()),
            RexNode::Call { op, operands } => {
                let types = operands
                    .iter()
                    .map(|o| o.derive_type(input))
                    .collect::<Result<Vec<DataType>, MedError>>()?;
                match op {
                    RexOp::Plus | RexOp::Minus | RexOp::Times | RexOp::Divide => {
                        numeric_result(&types)
                    }
                    RexOp::Neg | RexOp::Upper | RexOp::Lower => {
                        types.into_iter().next().ok_or_else(|| {
                            MedError::ValidationError(format!("{} needs an operand", op.symbol()))
                        })
                    }
                    RexOp::Concat => {
                        let mut len = 0;
                        for t in types.iter() {
                            match t {
                                DataType::Varchar(n) => len += n,
                                other => {
                                    return Err(MedError::ValidationError(format!(
                                        "Cannot concatenate {}",
                                        other
                                    )))
                                }
                            }
                        }
                        Ok(DataType::Varchar(len))
                    }
                    _ => Ok(DataType::Boolean),
                }
            }
        }
    }
}

fn numeric_result(types: &[DataType]) -> Result<DataType, MedError> {
    let mut result = DataType::Integer;
    for t in types {
        result = match (&result, t) {
            (_, t) if !t.is_numeric() => {
                return Err(MedError::ValidationError(format!(
                    "Arithmetic on non-numeric type {}",
                    t
                )))
            }
            (DataType::Double, _) | (_, DataType::Double) => DataType::Double,
            (DataType::Decimal(_, s1), DataType::Decimal(_, s2)) => {
                DataType::Decimal(19, (*s1).max(*s2))
            }
            (DataType::Decimal(_, s), _) | (_, DataType::Decimal(_, s)) => {
                DataType::Decimal(19, *s)
            }
            _ => DataType::Integer,
        };
    }
    Ok(result)
}

impl fmt::Display for RexNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RexNode::InputRef(i) => write!(f, "${}", i),
            RexNode::Literal(lit) => write!(f, "{}", lit),
            RexNode::Call { op, operands } => {
                let args: Vec<String> = operands.iter().map(|o| o.to_string()).collect();
                write!(f, "{}({})", op.symbol(), args.join(", "))
            }
        }
    }
}
