use super::OpIterator;
use crate::eval::eval;
use common::{MedError, RexNode, TableSchema, Tuple};

/// Projection operator computing one expression per output field.
pub struct ProjectIterator {
    exprs: Vec<RexNode>,
    schema: TableSchema,
    open: bool,
    child: Box<dyn OpIterator>,
}

impl ProjectIterator {
    /// Constructor for the projection operator.
    ///
    /// # Arguments
    ///
    /// * `exprs` - Expressions over the child's fields, one per output field.
    /// * `schema` - Output schema.
    /// * `child` - Child OpIterator passing data into the operator.
    pub fn new(exprs: Vec<RexNode>, schema: TableSchema, child: Box<dyn OpIterator>) -> Self {
        Self {
            exprs,
            schema,
            open: false,
            child,
        }
    }
}

impl OpIterator for ProjectIterator {
    fn open(&mut self) -> Result<(), MedError> {
        self.open = true;
        self.child.open()
    }

    fn next(&mut self) -> Result<Option<Tuple>, MedError> {
        if !self.open {
            panic!("Operator has not been opened")
        }
        match self.child.next()? {
            Some(t) => {
                let fields = self
                    .exprs
                    .iter()
                    .map(|e| eval(e, &t))
                    .collect::<Result<Vec<_>, MedError>>()?;
                Ok(Some(Tuple::new(fields)))
            }
            None => Ok(None),
        }
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
    use common::{DataType, Field, RexOp};

    #[test]
    fn test_project_exprs() -> Result<(), MedError> {
        let schema = TableSchema::from_vecs(
            vec!["Name", "Doubled"],
            vec![DataType::Varchar(80), DataType::Integer],
        );
        let exprs = vec![
            RexNode::input_ref(1),
            call2(RexOp::Times, RexNode::input_ref(2), int_lit(2)),
        ];
        let mut project = ProjectIterator::new(exprs, schema, Box::new(account_iterator()));
        project.open()?;
        let rows = drain(&mut project);
        assert_eq!(3, rows.len());
        assert_eq!(
            Tuple::new(vec![
                Field::StringField(String::from("Acme")),
                Field::IntField(200)
            ]),
            rows[0]
        );
        assert_eq!(&Field::Null, rows[1].get_field(1).unwrap());
        assert_eq!("Doubled", project.get_schema().get_attribute(1).unwrap().name());
        project.close()
    }
}
