use crate::table::{RemoteField, RemoteObject};
use crate::MedError;
use std::collections::HashMap;

/// Suffix naming the deleted-records pseudo-table of an object.
pub const DELETED_SUFFIX: &str = "_deleted";
/// Suffix naming the picklist-values pseudo-table of an object.
pub const LOV_SUFFIX: &str = "_LOV";

/// Functions needed to implement a remote catalog. It answers describe calls for remote objects.
pub trait RemoteCatalog {
    /// Describe the fields of an object, in remote order.
    ///
    /// # Arguments
    ///
    /// * `object` - Name of the object to describe.
    fn describe(&self, object: &str) -> Result<Vec<RemoteField>, MedError>;

    /// Whether deleted records of the object can be replicated.
    ///
    /// # Arguments
    ///
    /// * `object` - Name of the object.
    fn is_replicable(&self, object: &str) -> Result<bool, MedError>;

    /// Names of all known objects.
    fn object_names(&self) -> Vec<String>;

    /// Checks if the object is known to the remote system.
    ///
    /// # Arguments
    ///
    /// * `object` - Name of the object.
    fn is_valid_object(&self, object: &str) -> bool {
        self.describe(object).is_ok()
    }

    /// Remote field names of the object, in order.
    ///
    /// # Arguments
    ///
    /// * `object` - Name of the object.
    fn field_names(&self, object: &str) -> Result<Vec<String>, MedError> {
        Ok(self.describe(object)?.into_iter().map(|f| f.name).collect())
    }
}

/// Catalog backed by object descriptions held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemCatalog {
    objects: HashMap<String, RemoteObject>,
}

impl MemCatalog {
    /// Creates a catalog over the given objects.
    pub fn new(objects: Vec<RemoteObject>) -> Self {
        let mut map = HashMap::new();
        for obj in objects {
            map.insert(obj.name.clone(), obj);
        }
        Self { objects: map }
    }

    /// Adds or replaces an object description.
    pub fn add_object(&mut self, object: RemoteObject) {
        self.objects.insert(object.name.clone(), object);
    }

    fn get(&self, object: &str) -> Result<&RemoteObject, MedError> {
        self.objects
            .get(object)
            .ok_or_else(|| MedError::ValidationError(format!("Invalid object {}", object)))
    }
}

impl RemoteCatalog for MemCatalog {
    fn describe(&self, object: &str) -> Result<Vec<RemoteField>, MedError> {
        Ok(self.get(object)?.fields.clone())
    }

    fn is_replicable(&self, object: &str) -> Result<bool, MedError> {
        Ok(self.get(object)?.replicable)
    }

    fn object_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::account_object;

    #[test]
    fn test_describe() {
        let catalog = MemCatalog::new(vec![account_object()]);
        assert_eq!(
            vec!["Id", "Name", "Email"],
            catalog.field_names("Account").unwrap()
        );
        assert!(catalog.is_valid_object("Account"));
        assert!(!catalog.is_valid_object("Contact"));
        match catalog.describe("Contact") {
            Err(MedError::ValidationError(_)) => (),
            other => panic!("Expected a validation error, got {:?}", other),
        }
    }
}
