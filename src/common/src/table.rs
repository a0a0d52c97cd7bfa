use crate::{Attribute, DataType, TableSchema};

/// A field of a remote object as described by the remote system.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RemoteField {
    /// Field name.
    pub name: String,
    /// Field dtype.
    #[serde(rename = "type")]
    pub dtype: DataType,
}

impl RemoteField {
    pub fn new(name: &str, dtype: DataType) -> Self {
        Self {
            name: name.to_string(),
            dtype,
        }
    }
}

/// Remote object implementation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RemoteObject {
    /// Object name.
    pub name: String,
    /// Whether deleted records of the object can be replicated.
    #[serde(default = "default_replicable")]
    pub replicable: bool,
    /// Fields in remote order.
    pub fields: Vec<RemoteField>,
}

fn default_replicable() -> bool {
    true
}

impl RemoteObject {
    /// Creates a new remote object.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the object.
    /// * `replicable` - Whether deleted records may be queried.
    /// * `fields` - Fields of the object.
    pub fn new(name: &str, replicable: bool, fields: Vec<RemoteField>) -> Self {
        RemoteObject {
            name: name.to_string(),
            replicable,
            fields,
        }
    }

    /// Row type of the object.
    pub fn schema(&self) -> TableSchema {
        TableSchema::new(
            self.fields
                .iter()
                .map(|f| Attribute::new(f.name.clone(), f.dtype.clone()))
                .collect(),
        )
    }
}
