use crate::table::RemoteObject;
use crate::MedError;
use std::collections::HashMap;
use std::fs;

/// Extra precision added to synthesized VARCHAR columns when none is configured.
pub const DEFAULT_EXTRA_VARCHAR_PRECISION: u32 = 128;

/// Pushdown switches.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PushdownConfig {
    /// Register the pushdown rules at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Push the printable conjuncts of a filter that cannot be printed whole.
    #[serde(default)]
    pub partial_filter_pushdown: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_varchar_precision() -> u32 {
    DEFAULT_EXTRA_VARCHAR_PRECISION
}

impl Default for PushdownConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            partial_filter_pushdown: false,
        }
    }
}

/// Data server configuration, read from a json file.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct MedConfig {
    /// Extra precision for the VARCHAR columns of the pseudo-tables.
    #[serde(default = "default_varchar_precision")]
    pub varchar_precision: u32,
    /// Remote objects the server can describe.
    #[serde(default)]
    pub objects: Vec<RemoteObject>,
    /// Object name to csv file with its rows.
    #[serde(default)]
    pub data: HashMap<String, String>,
    /// Object name to csv file with its deleted records (Id, DeleteStamp).
    #[serde(default)]
    pub deleted: HashMap<String, String>,
    /// Object name to csv file with its picklist values (Field, Value).
    #[serde(default)]
    pub lov: HashMap<String, String>,
    #[serde(default)]
    pub pushdown: PushdownConfig,
}

impl MedConfig {
    /// Parses a configuration from json text.
    ///
    /// # Arguments
    ///
    /// * `json` - Configuration text.
    pub fn from_json(json: &str) -> Result<Self, MedError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a configuration file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path of the json file.
    pub fn from_file(path: &str) -> Result<Self, MedError> {
        let contents = fs::read_to_string(path)?;
        MedConfig::from_json(&contents)
    }
}
