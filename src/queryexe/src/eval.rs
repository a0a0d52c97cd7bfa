//! Row expression evaluation with SQL null semantics.

use bigdecimal::{BigDecimal, Zero};
use common::{Field, MedError, RexNode, RexOp, Tuple};
use std::cmp::Ordering;

/// Evaluates an expression over a tuple.
///
/// # Arguments
///
/// * `expr` - Expression whose input references index into `tuple`.
/// * `tuple` - Input row.
pub fn eval(expr: &RexNode, tuple: &Tuple) -> Result<Field, MedError> {
    match expr {
        RexNode::InputRef(i) => tuple.get_field(*i).cloned().ok_or_else(|| {
            MedError::ExecutionError(format!("Field ${} out of range", i))
        }),
        RexNode::Literal(lit) => Ok(lit.value.clone()),
        RexNode::Call { op, operands } => {
            let args = operands
                .iter()
                .map(|o| eval(o, tuple))
                .collect::<Result<Vec<Field>, MedError>>()?;
            apply(*op, args)
        }
    }
}

/// Evaluates a condition; only TRUE passes, null and FALSE do not.
pub fn eval_predicate(expr: &RexNode, tuple: &Tuple) -> Result<bool, MedError> {
    match eval(expr, tuple)? {
        Field::BoolField(b) => Ok(b),
        Field::Null => Ok(false),
        other => Err(MedError::ExecutionError(format!(
            "Condition {} evaluated to non-boolean {}",
            expr, other
        ))),
    }
}

fn as_bool(f: &Field) -> Result<Option<bool>, MedError> {
    match f {
        Field::BoolField(b) => Ok(Some(*b)),
        Field::Null => Ok(None),
        other => Err(MedError::ExecutionError(format!(
            "Expected a boolean, got {}",
            other
        ))),
    }
}

fn unary(op: RexOp, mut args: Vec<Field>) -> Result<Field, MedError> {
    if args.len() != 1 {
        return Err(MedError::ExecutionError(format!(
            "{} takes one operand, got {}",
            op.symbol(),
            args.len()
        )));
    }
    Ok(args.remove(0))
}

fn binary(op: RexOp, args: Vec<Field>) -> Result<(Field, Field), MedError> {
    let mut it = args.into_iter();
    match (it.next(), it.next(), it.next()) {
        (Some(a), Some(b), None) => Ok((a, b)),
        _ => Err(MedError::ExecutionError(format!(
            "{} takes two operands",
            op.symbol()
        ))),
    }
}

fn apply(op: RexOp, args: Vec<Field>) -> Result<Field, MedError> {
    match op {
        RexOp::And => {
            let mut result = Some(true);
            for a in args.iter() {
                match as_bool(a)? {
                    Some(false) => return Ok(Field::BoolField(false)),
                    None => result = None,
                    Some(true) => (),
                }
            }
            Ok(result.map(Field::BoolField).unwrap_or(Field::Null))
        }
        RexOp::Or => {
            let mut result = Some(false);
            for a in args.iter() {
                match as_bool(a)? {
                    Some(true) => return Ok(Field::BoolField(true)),
                    None => result = None,
                    Some(false) => (),
                }
            }
            Ok(result.map(Field::BoolField).unwrap_or(Field::Null))
        }
        RexOp::Not => Ok(match as_bool(&unary(op, args)?)? {
            Some(b) => Field::BoolField(!b),
            None => Field::Null,
        }),
        RexOp::IsNull => Ok(Field::BoolField(unary(op, args)?.is_null())),
        RexOp::IsNotNull => Ok(Field::BoolField(!unary(op, args)?.is_null())),
        RexOp::IsTrue => Ok(Field::BoolField(as_bool(&unary(op, args)?)? == Some(true))),
        RexOp::IsFalse => Ok(Field::BoolField(as_bool(&unary(op, args)?)? == Some(false))),
        RexOp::Eq | RexOp::NotEq | RexOp::Lt | RexOp::Le | RexOp::Gt | RexOp::Ge => {
            let (a, b) = binary(op, args)?;
            if a.is_null() || b.is_null() {
                return Ok(Field::Null);
            }
            let ord = a.compare_sql(&b).ok_or_else(|| {
                MedError::ExecutionError(format!("Cannot compare {} with {}", a, b))
            })?;
            let result = match op {
                RexOp::Eq => ord == Ordering::Equal,
                RexOp::NotEq => ord != Ordering::Equal,
                RexOp::Lt => ord == Ordering::Less,
                RexOp::Le => ord != Ordering::Greater,
                RexOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            };
            Ok(Field::BoolField(result))
        }
        RexOp::Like => {
            let mut it = args.into_iter();
            let value = it.next();
            let pattern = it.next();
            let escape = it.next();
            match (value, pattern, escape) {
                (Some(Field::Null), _, _) | (_, Some(Field::Null), _) => Ok(Field::Null),
                (Some(Field::StringField(v)), Some(Field::StringField(p)), None) => {
                    Ok(Field::BoolField(like(&v, &p, None)?))
                }
                (Some(Field::StringField(v)), Some(Field::StringField(p)), Some(e)) => {
                    match e {
                        Field::Null => Ok(Field::Null),
                        Field::StringField(e) => {
                            let mut chars = e.chars();
                            match (chars.next(), chars.next()) {
                                (Some(c), None) => Ok(Field::BoolField(like(&v, &p, Some(c))?)),
                                _ => Err(MedError::ExecutionError(format!(
                                    "Invalid escape '{}'",
                                    e
                                ))),
                            }
                        }
                        other => Err(MedError::ExecutionError(format!(
                            "Invalid escape {}",
                            other
                        ))),
                    }
                }
                _ => Err(MedError::ExecutionError(String::from(
                    "LIKE needs string operands",
                ))),
            }
        }
        RexOp::Plus | RexOp::Minus | RexOp::Times | RexOp::Divide => {
            let (a, b) = binary(op, args)?;
            arithmetic(op, &a, &b)
        }
        RexOp::Neg => match unary(op, args)? {
            Field::Null => Ok(Field::Null),
            Field::IntField(i) => Ok(Field::IntField(-i)),
            Field::DecimalField(d) => Ok(Field::DecimalField(-d)),
            other => Err(MedError::ExecutionError(format!("Cannot negate {}", other))),
        },
        RexOp::Concat => {
            let (a, b) = binary(op, args)?;
            if a.is_null() || b.is_null() {
                return Ok(Field::Null);
            }
            Ok(Field::StringField(format!("{}{}", a, b)))
        }
        RexOp::Upper | RexOp::Lower => match unary(op, args)? {
            Field::Null => Ok(Field::Null),
            Field::StringField(s) if op == RexOp::Upper => Ok(Field::StringField(s.to_uppercase())),
            Field::StringField(s) => Ok(Field::StringField(s.to_lowercase())),
            other => Err(MedError::ExecutionError(format!(
                "{} needs a string, got {}",
                op.symbol(),
                other
            ))),
        },
    }
}

fn arithmetic(op: RexOp, a: &Field, b: &Field) -> Result<Field, MedError> {
    if a.is_null() || b.is_null() {
        return Ok(Field::Null);
    }
    let overflow = || MedError::ExecutionError(format!("Overflow in {} {} {}", a, op.symbol(), b));
    if let (Field::IntField(x), Field::IntField(y)) = (a, b) {
        let result = match op {
            RexOp::Plus => x.checked_add(*y),
            RexOp::Minus => x.checked_sub(*y),
            RexOp::Times => x.checked_mul(*y),
            _ => {
                if *y == 0 {
                    return Err(MedError::ExecutionError(String::from("Division by zero")));
                }
                x.checked_div(*y)
            }
        };
        return result.map(Field::IntField).ok_or_else(overflow);
    }
    let (x, y): (BigDecimal, BigDecimal) = match (a.to_decimal(), b.to_decimal()) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            return Err(MedError::ExecutionError(format!(
                "Arithmetic on {} and {}",
                a, b
            )))
        }
    };
    let result = match op {
        RexOp::Plus => x + y,
        RexOp::Minus => x - y,
        RexOp::Times => x * y,
        _ => {
            if y.is_zero() {
                return Err(MedError::ExecutionError(String::from("Division by zero")));
            }
            x / y
        }
    };
    Ok(Field::DecimalField(result))
}

/// Piece of a LIKE pattern.
#[derive(Debug, PartialEq)]
enum LikeToken {
    /// `%`
    Any,
    /// `_`
    One,
    Char(char),
}

fn like_tokens(pattern: &str, escape: Option<char>) -> Result<Vec<LikeToken>, MedError> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if Some(c) == escape {
            match chars.next() {
                Some(next) => tokens.push(LikeToken::Char(next)),
                None => {
                    return Err(MedError::ExecutionError(format!(
                        "Pattern '{}' ends with the escape character",
                        pattern
                    )))
                }
            }
        } else if c == '%' {
            tokens.push(LikeToken::Any);
        } else if c == '_' {
            tokens.push(LikeToken::One);
        } else {
            tokens.push(LikeToken::Char(c));
        }
    }
    Ok(tokens)
}

/// SQL LIKE matching.
///
/// # Arguments
///
/// * `value` - String to match.
/// * `pattern` - Pattern with `%` and `_` wildcards.
/// * `escape` - Character that makes the next pattern character literal.
pub fn like(value: &str, pattern: &str, escape: Option<char>) -> Result<bool, MedError> {
    let tokens = like_tokens(pattern, escape)?;
    let chars: Vec<char> = value.chars().collect();
    // matched[j]: the first i chars of the value match the first j tokens.
    let mut matched = vec![false; tokens.len() + 1];
    matched[0] = true;
    for (j, t) in tokens.iter().enumerate() {
        if *t == LikeToken::Any {
            matched[j + 1] = matched[j];
        }
    }
    for c in chars.iter() {
        let mut next = vec![false; tokens.len() + 1];
        for (j, t) in tokens.iter().enumerate() {
            next[j + 1] = match t {
                LikeToken::Any => next[j] || matched[j + 1],
                LikeToken::One => matched[j],
                LikeToken::Char(p) => matched[j] && p == c,
            };
        }
        matched = next;
    }
    Ok(matched[tokens.len()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testutil::*;
    use common::DataType;

    fn null() -> RexNode {
        RexNode::literal(Field::Null, DataType::Integer)
    }

    fn row() -> Tuple {
        Tuple::new(vec![
            Field::StringField(String::from("Acme")),
            Field::IntField(7),
            Field::Null,
        ])
    }

    #[test]
    fn test_like() {
        assert!(like("Acme", "Ac%", None).unwrap());
        assert!(like("Acme", "%me", None).unwrap());
        assert!(like("Acme", "A_m_", None).unwrap());
        assert!(!like("Acme", "A_m", None).unwrap());
        assert!(like("", "%", None).unwrap());
        assert!(!like("", "_", None).unwrap());
        assert!(like("50%", "50!%", Some('!')).unwrap());
        assert!(!like("500", "50!%", Some('!')).unwrap());
        assert!(like("a%b%c", "a%c", None).unwrap());
        assert!(like("x", "x!", Some('!')).is_err());
    }

    #[test]
    fn test_three_valued_logic() {
        let t = RexNode::bool_literal(true);
        let f = RexNode::bool_literal(false);
        let n = cmp(2, RexOp::Eq, int_lit(1));
        let tuple = row();
        let and = |a: &RexNode, b: &RexNode| {
            eval(&RexNode::call(RexOp::And, vec![a.clone(), b.clone()]), &tuple).unwrap()
        };
        let or = |a: &RexNode, b: &RexNode| {
            eval(&RexNode::call(RexOp::Or, vec![a.clone(), b.clone()]), &tuple).unwrap()
        };
        assert_eq!(Field::Null, and(&t, &n));
        assert_eq!(Field::BoolField(false), and(&f, &n));
        assert_eq!(Field::BoolField(true), or(&t, &n));
        assert_eq!(Field::Null, or(&f, &n));
        let not_n = RexNode::call(RexOp::Not, vec![n.clone()]);
        assert_eq!(Field::Null, eval(&not_n, &tuple).unwrap());
        assert!(!eval_predicate(&n, &tuple).unwrap());
        assert!(!eval_predicate(&not_n, &tuple).unwrap());
    }

    #[test]
    fn test_comparisons_and_nulls() {
        let tuple = row();
        assert!(eval_predicate(&cmp(0, RexOp::Eq, string_lit("Acme")), &tuple).unwrap());
        assert!(eval_predicate(&cmp(1, RexOp::Gt, decimal_lit("6.5")), &tuple).unwrap());
        assert!(eval_predicate(&cmp(1, RexOp::Le, int_lit(7)), &tuple).unwrap());
        assert!(eval_predicate(
            &RexNode::call(RexOp::IsNull, vec![RexNode::input_ref(2)]),
            &tuple
        )
        .unwrap());
        assert_eq!(
            Field::Null,
            eval(&call2(RexOp::Eq, RexNode::input_ref(1), null()), &tuple).unwrap()
        );
        assert!(eval(&cmp(0, RexOp::Eq, int_lit(1)), &tuple).is_err());
    }

    #[test]
    fn test_arithmetic() {
        let tuple = row();
        let plus = call2(RexOp::Plus, RexNode::input_ref(1), int_lit(3));
        assert_eq!(Field::IntField(10), eval(&plus, &tuple).unwrap());
        let times = call2(RexOp::Times, RexNode::input_ref(1), decimal_lit("0.5"));
        let half = Field::parse("3.5", &DataType::Decimal(18, 2)).unwrap();
        assert_eq!(
            Some(Ordering::Equal),
            eval(&times, &tuple).unwrap().compare_sql(&half)
        );
        let div0 = call2(RexOp::Divide, RexNode::input_ref(1), int_lit(0));
        assert!(eval(&div0, &tuple).is_err());
        let with_null = call2(RexOp::Minus, RexNode::input_ref(2), int_lit(1));
        assert_eq!(Field::Null, eval(&with_null, &tuple).unwrap());
        let upper = RexNode::call(RexOp::Upper, vec![RexNode::input_ref(0)]);
        assert_eq!(
            Field::StringField(String::from("ACME")),
            eval(&upper, &tuple).unwrap()
        );
        let concat = call2(RexOp::Concat, RexNode::input_ref(0), string_lit("!"));
        assert_eq!(
            Field::StringField(String::from("Acme!")),
            eval(&concat, &tuple).unwrap()
        );
    }
}
