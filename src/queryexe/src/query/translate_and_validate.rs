use bigdecimal::ToPrimitive;
use common::catalog::RemoteCatalog;
use common::{DataType, Field, MedError, RelNode, RexNode, RexOp, TableSchema};
use optimizer::MedDataServer;
use parser::{SelectItem, SqlKind, SqlLiteral, SqlNode, SqlSelect};

/// Translates parsed expressions into row expressions over one object's
/// row type, validating column names and operand types.
pub struct ExprTranslator<'a> {
    /// Row type the identifiers resolve against.
    schema: &'a TableSchema,
    /// Object name accepted as a column qualifier.
    object: &'a str,
    /// Read `x = NULL` as `x IS NULL`, the way the remote query language does.
    null_equality: bool,
}

impl<'a> ExprTranslator<'a> {
    /// Creates a translator with SQL null semantics.
    ///
    /// # Arguments
    ///
    /// * `schema` - Row type the identifiers resolve against.
    /// * `object` - Object name accepted as a column qualifier.
    pub fn new(schema: &'a TableSchema, object: &'a str) -> Self {
        Self {
            schema,
            object,
            null_equality: false,
        }
    }

    /// Creates a translator that reads comparisons with NULL as null tests.
    pub fn with_null_equality(schema: &'a TableSchema, object: &'a str) -> Self {
        Self {
            schema,
            object,
            null_equality: true,
        }
    }

    /// Index of a column, matched case-insensitively.
    ///
    /// # Arguments
    ///
    /// * `names` - Parts of a possibly qualified identifier.
    pub fn resolve(&self, names: &[String]) -> Result<usize, MedError> {
        let full = names.join(".");
        let column = match names {
            [column] => column,
            [qualifier, column] if qualifier.eq_ignore_ascii_case(self.object) => column,
            _ => {
                return Err(MedError::ValidationError(format!(
                    "The field {} is not present in {}",
                    full, self.object
                )))
            }
        };
        self.schema
            .attributes()
            .position(|a| a.name().eq_ignore_ascii_case(column))
            .ok_or_else(|| {
                MedError::ValidationError(format!(
                    "The field {} is not present in {}",
                    full, self.object
                ))
            })
    }

    /// Translates an expression.
    ///
    /// # Arguments
    ///
    /// * `node` - Parsed expression.
    pub fn translate(&self, node: &SqlNode) -> Result<RexNode, MedError> {
        match node {
            SqlNode::Literal { value, .. } => Ok(literal(value)),
            SqlNode::Identifier { names, .. } => Ok(RexNode::input_ref(self.resolve(names)?)),
            SqlNode::Function { name, args, .. } => self.function(name, args),
            SqlNode::Row { .. } => Err(MedError::ValidationError(format!(
                "Row {} is only allowed on the right of IN",
                node
            ))),
            SqlNode::Call { op, operands, .. } => match op.kind {
                SqlKind::And | SqlKind::Or => {
                    let rex_op = if op.kind == SqlKind::And {
                        RexOp::And
                    } else {
                        RexOp::Or
                    };
                    let args = self.operands(operands, 2)?;
                    for arg in args.iter() {
                        self.expect_type(arg, &DataType::Boolean)?;
                    }
                    Ok(RexNode::call(rex_op, args))
                }
                SqlKind::Not => {
                    let args = self.operands(operands, 1)?;
                    self.expect_type(&args[0], &DataType::Boolean)?;
                    Ok(RexNode::call(RexOp::Not, args))
                }
                SqlKind::Equals => self.comparison(RexOp::Eq, operands),
                SqlKind::NotEquals => self.comparison(RexOp::NotEq, operands),
                SqlKind::LessThan => self.comparison(RexOp::Lt, operands),
                SqlKind::LessThanOrEqual => self.comparison(RexOp::Le, operands),
                SqlKind::GreaterThan => self.comparison(RexOp::Gt, operands),
                SqlKind::GreaterThanOrEqual => self.comparison(RexOp::Ge, operands),
                SqlKind::In | SqlKind::NotIn => self.in_list(op.kind == SqlKind::NotIn, operands),
                SqlKind::Plus => self.arithmetic(RexOp::Plus, operands),
                SqlKind::Minus => self.arithmetic(RexOp::Minus, operands),
                SqlKind::Times => self.arithmetic(RexOp::Times, operands),
                SqlKind::Divide => self.arithmetic(RexOp::Divide, operands),
                SqlKind::Concat => self.arithmetic(RexOp::Concat, operands),
                SqlKind::MinusPrefix => self.arithmetic(RexOp::Neg, operands),
                SqlKind::PlusPrefix => {
                    let mut args = self.operands(operands, 1)?;
                    let arg = args.remove(0);
                    if !self.type_of(&arg)?.is_numeric() {
                        return Err(MedError::ValidationError(format!(
                            "Unary plus on non-numeric {}",
                            node
                        )));
                    }
                    Ok(arg)
                }
                SqlKind::IsNull => Ok(RexNode::call(RexOp::IsNull, self.operands(operands, 1)?)),
                SqlKind::IsNotNull => Ok(RexNode::call(
                    RexOp::IsNotNull,
                    self.operands(operands, 1)?,
                )),
                SqlKind::IsTrue | SqlKind::IsFalse => {
                    let args = self.operands(operands, 1)?;
                    self.expect_type(&args[0], &DataType::Boolean)?;
                    let rex_op = if op.kind == SqlKind::IsTrue {
                        RexOp::IsTrue
                    } else {
                        RexOp::IsFalse
                    };
                    Ok(RexNode::call(rex_op, args))
                }
                SqlKind::Between | SqlKind::NotBetween => {
                    let between = self.between(op.is_symmetric(), operands)?;
                    if op.kind == SqlKind::NotBetween {
                        Ok(RexNode::call(RexOp::Not, vec![between]))
                    } else {
                        Ok(between)
                    }
                }
                SqlKind::Like | SqlKind::NotLike => {
                    if operands.len() != 2 && operands.len() != 3 {
                        return Err(MedError::ValidationError(format!(
                            "Malformed {}",
                            node
                        )));
                    }
                    let args = operands
                        .iter()
                        .map(|o| self.translate(o))
                        .collect::<Result<Vec<RexNode>, MedError>>()?;
                    for arg in args.iter() {
                        self.expect_string(arg)?;
                    }
                    let like = RexNode::call(RexOp::Like, args);
                    if op.kind == SqlKind::NotLike {
                        Ok(RexNode::call(RexOp::Not, vec![like]))
                    } else {
                        Ok(like)
                    }
                }
                SqlKind::Escape => Err(MedError::ValidationError(String::from(
                    "ESCAPE without LIKE",
                ))),
            },
        }
    }

    fn operands(&self, operands: &[SqlNode], n: usize) -> Result<Vec<RexNode>, MedError> {
        if operands.len() != n {
            return Err(MedError::InternalError(format!(
                "Expected {} operands, got {}",
                n,
                operands.len()
            )));
        }
        operands.iter().map(|o| self.translate(o)).collect()
    }

    fn type_of(&self, rex: &RexNode) -> Result<DataType, MedError> {
        rex.derive_type(self.schema)
    }

    fn expect_type(&self, rex: &RexNode, dtype: &DataType) -> Result<(), MedError> {
        let actual = self.type_of(rex)?;
        if &actual == dtype || is_null_literal(rex) {
            Ok(())
        } else {
            Err(MedError::ValidationError(format!(
                "Expected {} but {} is {}",
                dtype, rex, actual
            )))
        }
    }

    fn expect_string(&self, rex: &RexNode) -> Result<(), MedError> {
        match self.type_of(rex)? {
            DataType::Varchar(_) => Ok(()),
            _ if is_null_literal(rex) => Ok(()),
            other => Err(MedError::ValidationError(format!(
                "Expected a string but {} is {}",
                rex, other
            ))),
        }
    }

    fn function(&self, name: &str, args: &[SqlNode]) -> Result<RexNode, MedError> {
        let op = match name {
            "UPPER" => RexOp::Upper,
            "LOWER" => RexOp::Lower,
            _ => {
                return Err(MedError::ValidationError(format!(
                    "Unsupported function {}",
                    name
                )))
            }
        };
        if args.len() != 1 {
            return Err(MedError::ValidationError(format!(
                "{} takes one argument",
                name
            )));
        }
        let arg = self.translate(&args[0])?;
        self.expect_string(&arg)?;
        Ok(RexNode::call(op, vec![arg]))
    }

    /// Builds a comparison, coercing a literal side to the other side's type.
    fn compare(&self, op: RexOp, left: RexNode, right: RexNode) -> Result<RexNode, MedError> {
        let left_type = self.type_of(&left)?;
        let right_type = self.type_of(&right)?;
        let right = coerce(right, &left_type)?;
        let left = coerce(left, &right_type)?;
        if self.null_equality && (op == RexOp::Eq || op == RexOp::NotEq) {
            let null_test = if op == RexOp::Eq {
                RexOp::IsNull
            } else {
                RexOp::IsNotNull
            };
            if is_null_literal(&right) {
                return Ok(RexNode::call(null_test, vec![left]));
            }
            if is_null_literal(&left) {
                return Ok(RexNode::call(null_test, vec![right]));
            }
        }
        let left_type = self.type_of(&left)?;
        let right_type = self.type_of(&right)?;
        if !left_type.is_comparable_with(&right_type) {
            return Err(MedError::ValidationError(format!(
                "Cannot compare {} ({}) with {} ({})",
                left, left_type, right, right_type
            )));
        }
        Ok(RexNode::call(op, vec![left, right]))
    }

    fn comparison(&self, op: RexOp, operands: &[SqlNode]) -> Result<RexNode, MedError> {
        let mut args = self.operands(operands, 2)?;
        let right = args.remove(1);
        let left = args.remove(0);
        self.compare(op, left, right)
    }

    fn in_list(&self, negated: bool, operands: &[SqlNode]) -> Result<RexNode, MedError> {
        let (value, list) = match operands {
            [value, list] => (self.translate(value)?, list),
            _ => return Err(MedError::InternalError(String::from("Malformed IN"))),
        };
        let items: Vec<&SqlNode> = match list {
            SqlNode::Row { items, .. } => items.iter().collect(),
            other => vec![other],
        };
        let mut terms = Vec::new();
        for item in items {
            terms.push(self.compare(RexOp::Eq, value.clone(), self.translate(item)?)?);
        }
        let any = RexNode::or(terms)
            .ok_or_else(|| MedError::ValidationError(String::from("Empty IN list")))?;
        if negated {
            Ok(RexNode::call(RexOp::Not, vec![any]))
        } else {
            Ok(any)
        }
    }

    fn between(&self, symmetric: bool, operands: &[SqlNode]) -> Result<RexNode, MedError> {
        let args = self.operands(operands, 3)?;
        let range = |lo: &RexNode, hi: &RexNode| -> Result<RexNode, MedError> {
            Ok(RexNode::call(
                RexOp::And,
                vec![
                    self.compare(RexOp::Ge, args[0].clone(), lo.clone())?,
                    self.compare(RexOp::Le, args[0].clone(), hi.clone())?,
                ],
            ))
        };
        let forward = range(&args[1], &args[2])?;
        if symmetric {
            let backward = range(&args[2], &args[1])?;
            Ok(RexNode::call(RexOp::Or, vec![forward, backward]))
        } else {
            Ok(forward)
        }
    }

    fn arithmetic(&self, op: RexOp, operands: &[SqlNode]) -> Result<RexNode, MedError> {
        let n = if op == RexOp::Neg { 1 } else { 2 };
        let rex = RexNode::call(op, self.operands(operands, n)?);
        self.type_of(&rex)?;
        Ok(rex)
    }
}

fn is_null_literal(rex: &RexNode) -> bool {
    matches!(rex.as_literal(), Some(lit) if lit.value.is_null())
}

/// Row expression of a parsed literal.
pub fn literal(value: &SqlLiteral) -> RexNode {
    match value {
        SqlLiteral::Null => RexNode::literal(Field::Null, DataType::Varchar(0)),
        SqlLiteral::Boolean(b) => RexNode::bool_literal(*b),
        SqlLiteral::Numeric(d) => {
            let (_, scale) = d.as_bigint_and_exponent();
            match d.to_i64() {
                Some(i) if scale <= 0 => RexNode::literal(Field::IntField(i), DataType::Integer),
                _ => {
                    let scale = scale.max(0) as u32;
                    let precision = (d.digits() as u32).max(scale);
                    RexNode::literal(
                        Field::DecimalField(d.clone()),
                        DataType::Decimal(precision, scale),
                    )
                }
            }
        }
        SqlLiteral::String(s) => RexNode::literal(
            Field::StringField(s.clone()),
            DataType::Varchar(s.chars().count() as u32),
        ),
        SqlLiteral::Date(d) => RexNode::literal(Field::DateField(*d), DataType::Date),
        SqlLiteral::Timestamp(t) => RexNode::literal(Field::TimestampField(*t), DataType::Timestamp),
    }
}

/// Retypes a null literal, or a string literal compared with a non-string,
/// to `target`. Other expressions are returned unchanged.
fn coerce(rex: RexNode, target: &DataType) -> Result<RexNode, MedError> {
    let lit = match rex.as_literal() {
        Some(lit) => lit,
        None => return Ok(rex),
    };
    match (&lit.value, target) {
        (Field::Null, _) => Ok(RexNode::literal(Field::Null, target.clone())),
        (Field::StringField(_), DataType::Varchar(_)) => Ok(rex),
        (Field::StringField(s), _) => {
            let value = Field::parse(s, target)?;
            Ok(RexNode::literal(value, target.clone()))
        }
        _ => Ok(rex),
    }
}

/// Translates a parsed query to an unplanned tree over one remote object.
pub struct TranslateAndValidate<'a, C: RemoteCatalog> {
    /// Data server that creates the scans.
    server: &'a MedDataServer<C>,
}

impl<'a, C: 'a + RemoteCatalog> TranslateAndValidate<'a, C> {
    fn new(server: &'a MedDataServer<C>) -> Self {
        Self { server }
    }

    /// Translates a query into a scan, an optional filter and a projection.
    ///
    /// # Arguments
    ///
    /// * `sql` - Parsed query.
    /// * `server` - Data server that creates the scans.
    pub fn from_sql(sql: &SqlSelect, server: &'a MedDataServer<C>) -> Result<RelNode, MedError> {
        let translator = TranslateAndValidate::new(server);
        translator.process_select(sql)
    }

    fn process_select(&self, select: &SqlSelect) -> Result<RelNode, MedError> {
        let scan = self.server.new_column_set(&select.from, None)?;
        let schema = scan.schema().clone();
        let exprs = ExprTranslator::new(&schema, &select.from);

        let mut rel = scan;
        if let Some(selection) = &select.selection {
            let condition = exprs.translate(selection)?;
            let dtype = condition.derive_type(&schema)?;
            if dtype != DataType::Boolean {
                return Err(MedError::ValidationError(format!(
                    "WHERE clause {} is {}, not BOOLEAN",
                    selection, dtype
                )));
            }
            rel = RelNode::filter(rel, condition);
        }

        if let [SelectItem::Wildcard] = select.items.as_slice() {
            return Ok(rel);
        }
        let mut items = Vec::new();
        let mut names = Vec::new();
        for item in select.items.iter() {
            match item {
                SelectItem::Wildcard => {
                    for (i, attr) in schema.attributes().enumerate() {
                        items.push(RexNode::input_ref(i));
                        names.push(attr.name().to_string());
                    }
                }
                SelectItem::Expr { expr, alias } => {
                    let rex = exprs.translate(expr)?;
                    let name = match (alias, &rex) {
                        (Some(alias), _) => alias.clone(),
                        (None, RexNode::InputRef(i)) => schema
                            .get_attribute(*i)
                            .map(|a| a.name().to_string())
                            .ok_or_else(|| {
                                MedError::InternalError(format!("Missing field ${}", i))
                            })?,
                        (None, _) => format!("EXPR${}", items.len()),
                    };
                    items.push(rex);
                    names.push(name);
                }
            }
        }
        RelNode::project(rel, items, names)
    }
}
