use common::{Attribute, RexNode, TableSchema};
use std::collections::BTreeSet;
use std::fmt;

/// Why a field list cannot be sent as a remote projection.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionViolation {
    Duplicate(String),
    /// `Id` requested at a position other than the first.
    IdNotFirst(usize),
    Empty,
}

impl fmt::Display for ProjectionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionViolation::Duplicate(name) => write!(f, "field {} requested twice", name),
            ProjectionViolation::IdNotFirst(i) => {
                write!(f, "Id requested at position {} instead of first", i)
            }
            ProjectionViolation::Empty => write!(f, "no fields requested"),
        }
    }
}

/// Checks a remote field list. The remote side rejects repeated fields, and
/// always returns `Id` first, so `Id` may only be requested first.
///
/// # Arguments
///
/// * `field_names` - Remote field names in request order.
pub fn validate_projection(field_names: &[String]) -> Result<(), ProjectionViolation> {
    if field_names.is_empty() {
        return Err(ProjectionViolation::Empty);
    }
    for (i, name) in field_names.iter().enumerate() {
        if field_names[i + 1..].contains(name) {
            return Err(ProjectionViolation::Duplicate(name.clone()));
        }
        if i > 0 && name.eq_ignore_ascii_case("Id") {
            return Err(ProjectionViolation::IdNotFirst(i));
        }
    }
    Ok(())
}

pub fn valid_projection(field_names: &[String]) -> bool {
    validate_projection(field_names).is_ok()
}

/// Splits expressions over a wide input into a narrow column projection and
/// the same expressions rewritten over that projection.
#[derive(Debug, Clone, PartialEq)]
pub struct PushProjector {
    /// Referenced input columns, ascending.
    columns: Vec<usize>,
}

impl PushProjector {
    /// Collects the columns referenced by `exprs`.
    pub fn new<'a, I: IntoIterator<Item = &'a RexNode>>(exprs: I) -> Self {
        let mut refs = BTreeSet::new();
        for expr in exprs {
            refs.extend(expr.input_refs());
        }
        Self {
            columns: refs.into_iter().collect(),
        }
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    /// Returns true when every input column is referenced, so nothing narrows.
    pub fn is_identity(&self, input_size: usize) -> bool {
        self.columns.len() == input_size && self.columns.iter().enumerate().all(|(i, c)| i == *c)
    }

    /// Rewrites an expression over the input into one over the narrow projection.
    pub fn remap(&self, expr: &RexNode) -> RexNode {
        expr.remap_inputs(&|i| self.columns.binary_search(&i).unwrap_or(i))
    }

    /// Row type of the narrow projection.
    pub fn schema(&self, input: &TableSchema) -> TableSchema {
        TableSchema::new(
            self.columns
                .iter()
                .filter_map(|c| input.get_attribute(*c).cloned())
                .collect::<Vec<Attribute>>(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testutil::*;
    use common::{DataType, RexOp};

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_valid_projection() {
        assert!(valid_projection(&names(&["Id", "Name", "Email"])));
        assert!(valid_projection(&names(&["Name", "Email"])));
        assert!(valid_projection(&names(&["Name", "name"])));
        assert_eq!(
            Err(ProjectionViolation::Duplicate(String::from("Name"))),
            validate_projection(&names(&["Name", "Email", "Name"]))
        );
        assert_eq!(
            Err(ProjectionViolation::IdNotFirst(1)),
            validate_projection(&names(&["Name", "id"]))
        );
        assert_eq!(Err(ProjectionViolation::Empty), validate_projection(&[]));
    }

    #[test]
    fn test_push_projector() {
        let upper = RexNode::call(RexOp::Upper, vec![RexNode::input_ref(2)]);
        let cond = cmp(4, RexOp::Gt, int_lit(3));
        let pp = PushProjector::new(vec![&upper, &cond]);
        assert_eq!(vec![2, 4], pp.columns().to_vec());
        assert!(!pp.is_identity(5));
        assert_eq!("UPPER($0)", pp.remap(&upper).to_string());
        assert_eq!(">($1, 3)", pp.remap(&cond).to_string());

        let schema = TableSchema::from_vecs(
            vec!["a", "b", "c", "d", "e"],
            vec![DataType::Integer; 5],
        );
        assert_eq!(vec!["c", "e"], pp.schema(&schema).names());
    }

    #[test]
    fn test_identity() {
        let exprs: Vec<RexNode> = (0..3).rev().map(RexNode::input_ref).collect();
        assert!(PushProjector::new(&exprs).is_identity(3));
        assert!(!PushProjector::new(&exprs).is_identity(4));
    }
}
