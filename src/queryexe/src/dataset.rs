use crate::csv_utils::read_tuples_from_file;
use common::catalog::RemoteCatalog;
use common::config::MedConfig;
use common::{DataType, MedError, TableSchema, Tuple};
use std::collections::HashMap;

/// Schema of the rows of a deleted-records file.
pub fn deleted_schema() -> TableSchema {
    TableSchema::from_vecs(
        vec!["Id", "DeleteStamp"],
        vec![DataType::Varchar(18), DataType::Timestamp],
    )
}

/// Schema of the rows of a picklist-values file.
pub fn lov_schema() -> TableSchema {
    TableSchema::from_vecs(
        vec!["Field", "Value"],
        vec![DataType::Varchar(255), DataType::Varchar(255)],
    )
}

/// Rows the remote system holds, keyed by object name.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    objects: HashMap<String, Vec<Tuple>>,
    deleted: HashMap<String, Vec<Tuple>>,
    lov: HashMap<String, Vec<Tuple>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every csv file named by the configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Names the files of each object.
    /// * `catalog` - Describes the objects whose rows are loaded.
    pub fn from_config<C: RemoteCatalog>(config: &MedConfig, catalog: &C) -> Result<Self, MedError> {
        let mut dataset = Dataset::new();
        for (object, path) in config.data.iter() {
            let schema = TableSchema::new(
                catalog
                    .describe(object)?
                    .into_iter()
                    .map(|f| common::Attribute::new(f.name, f.dtype))
                    .collect(),
            );
            dataset.add_rows(object, read_tuples_from_file(path, &schema)?);
        }
        for (object, path) in config.deleted.iter() {
            dataset.add_deleted(object, read_tuples_from_file(path, &deleted_schema())?);
        }
        for (object, path) in config.lov.iter() {
            dataset.add_lov(object, read_tuples_from_file(path, &lov_schema())?);
        }
        Ok(dataset)
    }

    /// Appends rows of an object, in the object's field order.
    pub fn add_rows(&mut self, object: &str, rows: Vec<Tuple>) {
        self.objects
            .entry(object.to_string())
            .or_insert_with(Vec::new)
            .extend(rows);
    }

    /// Appends deleted records (Id, DeleteStamp) of an object.
    pub fn add_deleted(&mut self, object: &str, rows: Vec<Tuple>) {
        self.deleted
            .entry(object.to_string())
            .or_insert_with(Vec::new)
            .extend(rows);
    }

    /// Appends picklist values (Field, Value) of an object.
    pub fn add_lov(&mut self, object: &str, rows: Vec<Tuple>) {
        self.lov
            .entry(object.to_string())
            .or_insert_with(Vec::new)
            .extend(rows);
    }

    /// Rows of an object; an object without rows is empty.
    pub fn rows(&self, object: &str) -> &[Tuple] {
        self.objects.get(object).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn deleted(&self, object: &str) -> &[Tuple] {
        self.deleted.get(object).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn lov(&self, object: &str) -> &[Tuple] {
        self.lov.get(object).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::catalog::MemCatalog;
    use common::testutil::*;
    use std::fs;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("medsql-{}-{}", gen_rand_string(8), name));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_from_config() {
        let rows = temp_file("account.csv", "001,Acme,a@acme.com\n002,Globex,\n");
        let deleted = temp_file("deleted.csv", "003,2020-01-02T03:04:05Z\n");
        let json = format!(
            r#"{{"data": {{"Account": "{}"}}, "deleted": {{"Account": "{}"}}}}"#,
            rows.display(),
            deleted.display()
        );
        let config = MedConfig::from_json(&json).unwrap();
        let catalog = MemCatalog::new(vec![account_object()]);
        let dataset = Dataset::from_config(&config, &catalog).unwrap();
        assert_eq!(2, dataset.rows("Account").len());
        assert_eq!(1, dataset.deleted("Account").len());
        assert_eq!(
            "2020-01-02 03:04:05",
            dataset.deleted("Account")[0].get_field(1).unwrap().to_string()
        );
        assert!(dataset.lov("Account").is_empty());
        assert!(dataset.rows("Contact").is_empty());
        fs::remove_file(rows).unwrap();
        fs::remove_file(deleted).unwrap();
    }

    #[test]
    fn test_unknown_object() {
        let json = r#"{"data": {"Contact": "contact.csv"}}"#;
        let config = MedConfig::from_json(json).unwrap();
        let catalog = MemCatalog::new(vec![account_object()]);
        assert!(Dataset::from_config(&config, &catalog).is_err());
    }
}
