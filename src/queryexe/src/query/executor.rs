use crate::opiterator::*;
use crate::remote::RemoteService;
use common::{MedError, QueryResult, RelNode, Tuple};
use serde_json::{json, Value};
use std::sync::Arc;

/// Converts a planned tree to a tree of OpIterators and runs it.
pub struct Executor {
    /// Executor state
    pub plan: Option<Box<dyn OpIterator>>,
    pub service: Option<Arc<dyn RemoteService>>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new_ref()
    }
}

impl Executor {
    /// Initializes an executor without a plan or a remote service.
    pub fn new_ref() -> Self {
        Self {
            plan: None,
            service: None,
        }
    }

    pub fn configure_service(&mut self, service: &Arc<dyn RemoteService>) {
        self.service = Some(service.clone());
    }

    pub fn configure_query(&mut self, physical_plan: Box<dyn OpIterator>) {
        self.plan = Some(physical_plan);
    }

    fn plan_mut(&mut self) -> Result<&mut Box<dyn OpIterator>, MedError> {
        self.plan
            .as_mut()
            .ok_or_else(|| MedError::ExecutionError(String::from("No query configured")))
    }

    /// Opens the physical plan iterator to begin execution.
    pub fn start(&mut self) -> Result<(), MedError> {
        self.plan_mut()?.open()
    }

    /// Returns the next tuple or None if there is no such tuple.
    ///
    /// # Panics
    ///
    /// Panics if physical plan iterator is closed
    pub fn next(&mut self) -> Result<Option<Tuple>, MedError> {
        self.plan_mut()?.next()
    }

    /// Closes the physical plan iterator.
    pub fn close(&mut self) -> Result<(), MedError> {
        self.plan_mut()?.close()
    }

    /// Runs the plan to completion and collects its rows.
    pub fn collect(&mut self) -> Result<Vec<Tuple>, MedError> {
        self.start()?;
        let mut rows = Vec::new();
        while let Some(t) = self.next()? {
            rows.push(t);
        }
        self.close()?;
        Ok(rows)
    }

    /// Consumes the physical plan iterator and stores the result in a QueryResult.
    pub fn execute(&mut self) -> Result<QueryResult, MedError> {
        let schema = self.plan_mut()?.get_schema().clone();
        let width = schema
            .attributes()
            .map(|a| a.name().len())
            .max()
            .unwrap_or(10)
            + 2;
        let mut res = String::new();
        for attr in schema.attributes() {
            let s = format!("{:width$}", attr.name(), width = width);
            res += &s;
        }
        res += "\n";

        for t in self.collect()? {
            for f in t.field_vals() {
                let s = format!("{:width$}", f.to_string(), width = width);
                res += &s;
            }
            res += "\n";
        }
        Ok(QueryResult::new(&res))
    }

    /// Runs the plan and renders its rows as a json array of objects keyed by
    /// field name. Nulls are json nulls; other values are their display text.
    pub fn execute_json(&mut self) -> Result<Value, MedError> {
        let schema = self.plan_mut()?.get_schema().clone();
        let rows: Vec<Value> = self
            .collect()?
            .iter()
            .map(|t| {
                let mut obj = serde_json::Map::new();
                for (attr, f) in schema.attributes().zip(t.field_vals()) {
                    let v = if f.is_null() {
                        Value::Null
                    } else {
                        json!(f.to_string())
                    };
                    obj.insert(attr.name().to_string(), v);
                }
                Value::Object(obj)
            })
            .collect();
        Ok(Value::Array(rows))
    }

    /// Converts a planned tree to a physical plan of op_iterators.
    ///
    /// The tree must be fully planned: every remote leaf a delegated scan.
    ///
    /// # Arguments
    ///
    /// * `service` - Remote system the scans call.
    /// * `rel` - Planned tree.
    pub fn rel_to_op_iterator(
        service: &Arc<dyn RemoteService>,
        rel: &RelNode,
    ) -> Result<Box<dyn OpIterator>, MedError> {
        match rel {
            RelNode::DelegatedScan(node) => Ok(Box::new(RemoteScan::new(service.clone(), node))),
            RelNode::Filter(node) => {
                let child = Executor::rel_to_op_iterator(service, &node.child)?;
                Ok(Box::new(Filter::new(node.condition.clone(), child)))
            }
            RelNode::Project(node) => {
                let child = Executor::rel_to_op_iterator(service, &node.child)?;
                Ok(Box::new(ProjectIterator::new(
                    node.exprs.clone(),
                    node.schema.clone(),
                    child,
                )))
            }
            RelNode::RemoteScan(node) => Err(MedError::InternalError(format!(
                "Scan of {} was not planned",
                node.source.object
            ))),
        }
    }

    /// Builds the physical plan of `rel` against the configured service.
    pub fn configure_rel(&mut self, rel: &RelNode) -> Result<(), MedError> {
        let service = self.service.clone().ok_or_else(|| {
            MedError::ExecutionError(String::from("No remote service configured"))
        })?;
        let plan = Executor::rel_to_op_iterator(&service, rel)?;
        self.configure_query(plan);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dataset::Dataset;
    use crate::remote::RemoteEndpoint;
    use common::catalog::MemCatalog;
    use common::logical_plan::DelegatedScanNode;
    use common::testutil::*;
    use common::{Field, RexNode, RexOp};

    fn service() -> Arc<dyn RemoteService> {
        let mut dataset = Dataset::new();
        dataset.add_rows(
            "Account",
            vec![
                string_tuple(&["001", "Acme", "info@acme.com"]),
                string_tuple(&["002", "Globex", "hi@globex.com"]),
            ],
        );
        Arc::new(RemoteEndpoint::new(
            MemCatalog::new(vec![account_object()]),
            dataset,
        ))
    }

    fn delegated() -> RelNode {
        match account_scan() {
            RelNode::RemoteScan(scan) => RelNode::DelegatedScan(DelegatedScanNode {
                requested_fields: scan.source.fields.clone(),
                requested_types: scan.source.types.clone(),
                source: scan.source,
                call: scan.call,
                schema: scan.schema,
            }),
            other => panic!("Expected a scan, got {:?}", other),
        }
    }

    fn executor(rel: &RelNode) -> Executor {
        let mut executor = Executor::new_ref();
        executor.configure_service(&service());
        executor.configure_rel(rel).unwrap();
        executor
    }

    #[test]
    fn test_execute_table() {
        let rel = RelNode::project(
            RelNode::filter(delegated(), cmp(1, RexOp::Eq, string_lit("Acme"))),
            vec![RexNode::input_ref(1)],
            vec![String::from("Name")],
        )
        .unwrap();
        let result = executor(&rel).execute().unwrap();
        assert_eq!("Name  \nAcme  \n", result.result());
    }

    #[test]
    fn test_execute_json() {
        let mut ex = executor(&delegated());
        let rows = ex.execute_json().unwrap();
        assert_eq!(2, rows.as_array().unwrap().len());
        assert_eq!(json!("Globex"), rows[1]["Name"]);
    }

    #[test]
    fn test_unplanned_scan() {
        let mut executor = Executor::new_ref();
        executor.configure_service(&service());
        assert!(matches!(
            executor.configure_rel(&account_scan()),
            Err(MedError::InternalError(_))
        ));
        assert!(Executor::new_ref().start().is_err());
    }

    #[test]
    fn test_collect_twice() {
        let mut ex = executor(&delegated());
        assert_eq!(2, ex.collect().unwrap().len());
        let rows = ex.collect().unwrap();
        assert_eq!(
            &Field::StringField(String::from("001")),
            rows[0].get_field(0).unwrap()
        );
    }
}
