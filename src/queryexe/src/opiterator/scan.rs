use super::OpIterator;
use crate::remote::RemoteService;
use common::logical_plan::{DelegatedScanNode, RemoteCall};
use common::{DataType, MedError, TableSchema, Tuple};
use std::sync::Arc;

/// Issues one remote call and iterates over the rows it returns.
pub struct RemoteScan {
    service: Arc<dyn RemoteService>,
    call: RemoteCall,
    requested_fields: Vec<String>,
    requested_types: Vec<DataType>,
    schema: TableSchema,
    /// Rows of the call, fetched on the first open.
    rows: Option<Vec<Tuple>>,
    /// Position of the next row; None while closed.
    index: Option<usize>,
}

impl RemoteScan {
    /// Creates a scan over a planned remote call.
    ///
    /// # Arguments
    ///
    /// * `service` - Remote system answering the call.
    /// * `node` - Planned leaf with the call and the fields it requests.
    pub fn new(service: Arc<dyn RemoteService>, node: &DelegatedScanNode) -> Self {
        Self {
            service,
            call: node.call.clone(),
            requested_fields: node.requested_fields.clone(),
            requested_types: node.requested_types.clone(),
            schema: node.schema.clone(),
            rows: None,
            index: None,
        }
    }
}

impl OpIterator for RemoteScan {
    fn open(&mut self) -> Result<(), MedError> {
        if self.rows.is_none() {
            debug!("Remote call {}", self.call);
            let rows =
                self.service
                    .call(&self.call, &self.requested_fields, &self.requested_types)?;
            if let Some(t) = rows.iter().find(|t| t.size() != self.schema.size()) {
                return Err(MedError::ExecutionError(format!(
                    "Remote call {} returned {} fields, expected {}",
                    self.call,
                    t.size(),
                    self.schema.size()
                )));
            }
            self.rows = Some(rows);
        }
        self.index = Some(0);
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, MedError> {
        let i = self.index.expect("Operator has not been opened");
        let next = self.rows.as_ref().and_then(|rows| rows.get(i)).cloned();
        if next.is_some() {
            self.index = Some(i + 1);
        }
        Ok(next)
    }

    fn close(&mut self) -> Result<(), MedError> {
        self.index = None;
        Ok(())
    }

    fn rewind(&mut self) -> Result<(), MedError> {
        if self.index.is_none() {
            panic!("Operator has not been opened")
        }
        self.index = Some(0);
        Ok(())
    }

    fn get_schema(&self) -> &TableSchema {
        &self.schema
    }
}

#[cfg(test)]
mod test {
    use super::super::testutil::drain;
    use super::*;
    use common::logical_plan::{SourceDescriptor, SourceKind};
    use common::testutil::string_tuple;
    use std::cell::Cell;

    /// Answers every call with the same rows and counts the calls.
    struct Canned {
        rows: Vec<Tuple>,
        calls: Cell<usize>,
    }

    impl RemoteService for Canned {
        fn call(
            &self,
            _call: &RemoteCall,
            _fields: &[String],
            _types: &[DataType],
        ) -> Result<Vec<Tuple>, MedError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.rows.clone())
        }
    }

    fn node(width: usize) -> DelegatedScanNode {
        let names: Vec<&str> = vec!["Id", "Name"].into_iter().take(width).collect();
        let types = vec![DataType::Varchar(18); width];
        let schema = TableSchema::from_vecs(names.clone(), types.clone());
        DelegatedScanNode {
            source: SourceDescriptor {
                object: String::from("Account"),
                kind: SourceKind::Query,
                fields: schema.names(),
                types: types.clone(),
            },
            call: RemoteCall::Query {
                query: String::from("SELECT Id, Name FROM Account"),
                types: String::from("VARCHAR(18),VARCHAR(18)"),
            },
            requested_fields: schema.names(),
            requested_types: types,
            schema,
        }
    }

    #[test]
    fn test_scan_fetches_once() -> Result<(), MedError> {
        let service = Arc::new(Canned {
            rows: vec![string_tuple(&["001", "Acme"]), string_tuple(&["002", "Globex"])],
            calls: Cell::new(0),
        });
        let mut scan = RemoteScan::new(service.clone(), &node(2));
        scan.open()?;
        assert_eq!(2, drain(&mut scan).len());
        scan.rewind()?;
        assert_eq!(2, drain(&mut scan).len());
        scan.close()?;
        scan.open()?;
        assert_eq!(2, drain(&mut scan).len());
        assert_eq!(1, service.calls.get());
        Ok(())
    }

    #[test]
    fn test_scan_width_mismatch() {
        let service = Arc::new(Canned {
            rows: vec![string_tuple(&["001", "Acme"])],
            calls: Cell::new(0),
        });
        let mut scan = RemoteScan::new(service, &node(1));
        assert!(scan.open().is_err());
    }
}
