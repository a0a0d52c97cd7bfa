use super::OpIterator;
use crate::eval::eval_predicate;
use common::{MedError, RexNode, TableSchema, Tuple};

/// Filter operator.
pub struct Filter {
    /// Condition over the child's fields; only rows where it is TRUE pass.
    condition: RexNode,
    /// Schema of the child.
    schema: TableSchema,
    /// Boolean determining if iterator is open.
    open: bool,
    /// Child operator passing data into the operator.
    child: Box<dyn OpIterator>,
}

impl Filter {
    /// Filter constructor.
    ///
    /// # Arguments
    ///
    /// * `condition` - Boolean expression over the child's fields.
    /// * `child` - Child OpIterator passing data into the operator.
    pub fn new(condition: RexNode, child: Box<dyn OpIterator>) -> Self {
        Self {
            condition,
            schema: child.get_schema().clone(),
            open: false,
            child,
        }
    }
}

impl OpIterator for Filter {
    fn open(&mut self) -> Result<(), MedError> {
        self.open = true;
        self.child.open()
    }

    fn next(&mut self) -> Result<Option<Tuple>, MedError> {
        if !self.open {
            panic!("Operator has not been opened")
        }
        while let Some(t) = self.child.next()? {
            if eval_predicate(&self.condition, &t)? {
                return Ok(Some(t));
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<(), MedError> {
        self.open = false;
        self.child.close()
    }

    fn rewind(&mut self) -> Result<(), MedError> {
        if !self.open {
            panic!("Operator has not been opened")
        }
        self.child.rewind()
    }

    fn get_schema(&self) -> &TableSchema {
        &self.schema
    }
}

#[cfg(test)]
mod test {
    use super::super::testutil::*;
    use super::*;
    use common::testutil::*;
    use common::{RexNode, RexOp};

    fn names(tuples: &[Tuple]) -> Vec<String> {
        tuples
            .iter()
            .map(|t| t.get_field(1).unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_filter_nulls_drop_out() -> Result<(), MedError> {
        let mut filter = Filter::new(cmp(2, RexOp::Gt, int_lit(10)), Box::new(account_iterator()));
        filter.open()?;
        assert_eq!(vec!["Acme"], names(&drain(&mut filter)));
        filter.close()
    }

    #[test]
    fn test_filter_rewind() -> Result<(), MedError> {
        let cond = RexNode::call(RexOp::IsNull, vec![RexNode::input_ref(2)]);
        let mut filter = Filter::new(cond, Box::new(account_iterator()));
        filter.open()?;
        assert_eq!(vec!["Globex"], names(&drain(&mut filter)));
        filter.rewind()?;
        assert_eq!(vec!["Globex"], names(&drain(&mut filter)));
        filter.close()
    }

    #[test]
    #[should_panic]
    fn test_next_not_open() {
        let mut filter = Filter::new(RexNode::bool_literal(true), Box::new(account_iterator()));
        filter.next().unwrap();
    }
}
