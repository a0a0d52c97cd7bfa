#[macro_use]
extern crate serde;
extern crate log;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::io;
use std::str::FromStr;

pub mod catalog;
pub mod config;
pub mod logical_plan;
pub mod table;
pub mod testutil;

pub use logical_plan::rex::{RexLiteral, RexNode, RexOp};
pub use logical_plan::RelNode;

/// Format used for timestamps handed to and received from the remote system.
pub const REMOTE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
/// Format used when displaying timestamps locally.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Format used for dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Custom error type.
#[derive(Debug, Clone, PartialEq)]
pub enum MedError {
    /// IO Errors.
    IOError(String),
    /// Custom errors.
    MedError(String),
    /// Malformed SQL text. The message carries the position.
    ParseError(String),
    /// Validation errors.
    ValidationError(String),
    /// A deleted-records query without exactly one bounded time range.
    InvalidRange(String),
    /// Execution errors.
    ExecutionError(String),
    /// Broken internal invariant.
    InternalError(String),
}

impl fmt::Display for MedError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                MedError::ValidationError(s) => format!("Validation Error: {}", s),
                MedError::ExecutionError(s) => format!("Execution Error: {}", s),
                MedError::ParseError(s) => format!("Parse Error: {}", s),
                MedError::InvalidRange(s) => format!("Invalid Range: {}", s),
                MedError::InternalError(s) => format!("Internal Error: {}", s),
                MedError::MedError(s) => format!("Med Error: {}", s),
                MedError::IOError(s) => s.to_string(),
            }
        )
    }
}

// Implement std::convert::From for AppError; from io::Error
impl From<io::Error> for MedError {
    fn from(error: io::Error) -> Self {
        MedError::IOError(error.to_string())
    }
}

impl From<serde_json::Error> for MedError {
    fn from(error: serde_json::Error) -> Self {
        MedError::MedError(format!("Malformed json: {}", error))
    }
}

impl Error for MedError {}

/// Return type for a query result.
pub struct QueryResult {
    result: String,
}

impl QueryResult {
    /// Return an empty result.
    pub fn empty() -> Self {
        Self {
            result: String::from(""),
        }
    }

    /// Return a result with string.
    ///
    /// # Arguments
    ///
    /// * `result` - Result to return.
    pub fn new(result: &str) -> Self {
        Self {
            result: result.to_string(),
        }
    }

    /// Get the result.
    pub fn result(&self) -> &str {
        &self.result
    }
}

/// Row type of a relational expression.
#[derive(PartialEq, Clone, Debug)]
pub struct TableSchema {
    /// Attributes of the schema.
    attributes: Vec<Attribute>,
    /// Mapping from upper-cased attribute name to its first position in the schema.
    name_map: HashMap<String, usize>,
}

impl Serialize for TableSchema {
    /// Custom serialize to avoid serializing name_map.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.attributes.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TableSchema {
    /// Custom deserialize to avoid serializing name_map.
    fn deserialize<D>(deserializer: D) -> Result<TableSchema, D::Error>
    where
        D: Deserializer<'de>,
    {
        let attrs = Vec::deserialize(deserializer)?;
        Ok(TableSchema::new(attrs))
    }
}

impl TableSchema {
    /// Create a new schema.
    ///
    /// # Arguments
    ///
    /// * `attributes` - Attributes of the schema in the order that they are in the schema.
    pub fn new(attributes: Vec<Attribute>) -> Self {
        let mut name_map = HashMap::new();
        for (i, attr) in attributes.iter().enumerate() {
            name_map.entry(attr.name().to_uppercase()).or_insert(i);
        }
        Self {
            attributes,
            name_map,
        }
    }

    /// Create a new schema with the given names and dtypes.
    ///
    /// # Arguments
    ///
    /// * `names` - Names of the new schema.
    /// * `dtypes` - Dypes of the new schema.
    pub fn from_vecs(names: Vec<&str>, dtypes: Vec<DataType>) -> Self {
        let mut attrs = Vec::new();
        for (name, dtype) in names.iter().zip(dtypes.iter()) {
            attrs.push(Attribute::new(name.to_string(), dtype.clone()));
        }
        TableSchema::new(attrs)
    }

    /// Get the attribute from the given index.
    ///
    /// # Arguments
    ///
    /// * `i` - Index of the attribute to look for.
    pub fn get_attribute(&self, i: usize) -> Option<&Attribute> {
        self.attributes.get(i)
    }

    /// Get the index of the attribute. Names are matched case-insensitively.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the attribute to get the index for.
    pub fn get_field_index(&self, name: &str) -> Option<&usize> {
        self.name_map.get(&name.to_uppercase())
    }

    /// Check if the attribute name is in the schema.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the attribute to look for.
    pub fn contains(&self, name: &str) -> bool {
        self.name_map.contains_key(&name.to_uppercase())
    }

    /// Get an iterator of the attributes.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    /// Names of the attributes, in order.
    pub fn names(&self) -> Vec<String> {
        self.attributes.iter().map(|a| a.name.clone()).collect()
    }

    /// Dtypes of the attributes, in order.
    pub fn dtypes(&self) -> Vec<DataType> {
        self.attributes.iter().map(|a| a.dtype.clone()).collect()
    }

    /// Returns the length of the schema.
    pub fn size(&self) -> usize {
        self.attributes.len()
    }
}

/// Handle attributes. Pairs the name with the dtype.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Attribute dtype.
    pub dtype: DataType,
}

impl Attribute {
    /// Create a new attribute with the given name and dtype.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the attribute.
    /// * `dtype` - Dtype of the attribute.
    pub fn new(name: String, dtype: DataType) -> Self {
        Self { name, dtype }
    }

    /// Returns the name of the attribute.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the dtype of the attribute.
    pub fn dtype(&self) -> &DataType {
        &self.dtype
    }
}

/// Enumerate the supported dtypes.
#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub enum DataType {
    Boolean,
    Integer,
    Double,
    /// Precision and scale.
    Decimal(u32, u32),
    /// Maximum length in characters.
    Varchar(u32),
    Date,
    Timestamp,
}

impl DataType {
    /// Returns true for the numeric dtypes.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Integer | DataType::Double | DataType::Decimal(_, _)
        )
    }

    /// Returns true for DATE and TIMESTAMP.
    pub fn is_datetime(&self) -> bool {
        matches!(self, DataType::Date | DataType::Timestamp)
    }

    /// Whether a value of type `from` can be cast to this type.
    ///
    /// # Arguments
    ///
    /// * `from` - Source dtype of the cast.
    pub fn can_cast_from(&self, from: &DataType) -> bool {
        match (self, from) {
            (DataType::Varchar(_), _) => true,
            (_, DataType::Varchar(_)) => true,
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            (a, b) if a.is_datetime() && b.is_datetime() => true,
            (DataType::Boolean, DataType::Boolean) => true,
            _ => false,
        }
    }

    /// Whether values of the two types can be compared with each other.
    pub fn is_comparable_with(&self, other: &DataType) -> bool {
        match (self, other) {
            (DataType::Varchar(_), DataType::Varchar(_)) => true,
            (DataType::Boolean, DataType::Boolean) => true,
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            (a, b) if a.is_datetime() && b.is_datetime() => true,
            _ => false,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Integer => write!(f, "INTEGER"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Decimal(p, s) => write!(f, "DECIMAL({}, {})", p, s),
            DataType::Varchar(n) => write!(f, "VARCHAR({})", n),
            DataType::Date => write!(f, "DATE"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
        }
    }
}

impl FromStr for DataType {
    type Err = MedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MedError::ValidationError(format!("Unsupported data type {}", s));
        let upper = s.trim().to_uppercase();
        let (name, args) = match upper.find('(') {
            Some(open) => {
                if !upper.ends_with(')') {
                    return Err(err());
                }
                let args = upper[open + 1..upper.len() - 1]
                    .split(',')
                    .map(|a| a.trim().parse::<u32>().map_err(|_| err()))
                    .collect::<Result<Vec<u32>, MedError>>()?;
                (upper[..open].trim().to_string(), args)
            }
            None => (upper.clone(), Vec::new()),
        };
        match (name.as_str(), args.as_slice()) {
            ("BOOLEAN", []) => Ok(DataType::Boolean),
            ("INTEGER", []) | ("INT", []) => Ok(DataType::Integer),
            ("DOUBLE", []) => Ok(DataType::Double),
            ("DECIMAL", [p]) => Ok(DataType::Decimal(*p, 0)),
            ("DECIMAL", [p, s]) => Ok(DataType::Decimal(*p, *s)),
            ("VARCHAR", [n]) => Ok(DataType::Varchar(*n)),
            ("DATE", []) => Ok(DataType::Date),
            ("TIMESTAMP", []) => Ok(DataType::Timestamp),
            _ => Err(err()),
        }
    }
}

impl Serialize for DataType {
    /// Dtypes are written as their SQL type names.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D>(deserializer: D) -> Result<DataType, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<DataType>().map_err(de::Error::custom)
    }
}

/// For each of the dtypes, make sure that there is a corresponding field type.
///
/// DOUBLE values are carried as decimals so that fields stay totally ordered.
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, PartialOrd, Ord, Clone, Hash)]
pub enum Field {
    Null,
    BoolField(bool),
    IntField(i64),
    DecimalField(BigDecimal),
    StringField(String),
    DateField(NaiveDate),
    TimestampField(NaiveDateTime),
}

impl Field {
    /// Returns true for the SQL null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    /// Numeric value of the field as a decimal, if it is numeric.
    pub fn to_decimal(&self) -> Option<BigDecimal> {
        match self {
            Field::IntField(i) => Some(BigDecimal::from(*i)),
            Field::DecimalField(d) => Some(d.clone()),
            _ => None,
        }
    }

    /// Compare two fields with SQL semantics.
    ///
    /// Returns None when either side is null or the values are of incomparable types.
    /// Integers compare with decimals, and dates with timestamps (a date is midnight).
    ///
    /// # Arguments
    ///
    /// * `other` - Field to compare against.
    pub fn compare_sql(&self, other: &Field) -> Option<Ordering> {
        match (self, other) {
            (Field::Null, _) | (_, Field::Null) => None,
            (Field::BoolField(a), Field::BoolField(b)) => Some(a.cmp(b)),
            (Field::IntField(a), Field::IntField(b)) => Some(a.cmp(b)),
            (Field::StringField(a), Field::StringField(b)) => Some(a.cmp(b)),
            (Field::DateField(a), Field::DateField(b)) => Some(a.cmp(b)),
            (Field::TimestampField(a), Field::TimestampField(b)) => Some(a.cmp(b)),
            (Field::DateField(a), Field::TimestampField(b)) => {
                Some(a.and_hms_opt(0, 0, 0)?.cmp(b))
            }
            (Field::TimestampField(a), Field::DateField(b)) => {
                Some(a.cmp(&b.and_hms_opt(0, 0, 0)?))
            }
            (a, b) => Some(a.to_decimal()?.cmp(&b.to_decimal()?)),
        }
    }

    /// Parse a textual value into a field of the given dtype. Empty text is null.
    ///
    /// # Arguments
    ///
    /// * `text` - Value to parse.
    /// * `dtype` - Dtype of the value.
    pub fn parse(text: &str, dtype: &DataType) -> Result<Field, MedError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Field::Null);
        }
        let err = || MedError::ValidationError(format!("Cannot read '{}' as {}", text, dtype));
        match dtype {
            DataType::Boolean => match text.to_lowercase().as_str() {
                "true" => Ok(Field::BoolField(true)),
                "false" => Ok(Field::BoolField(false)),
                _ => Err(err()),
            },
            DataType::Integer => text.parse::<i64>().map(Field::IntField).map_err(|_| err()),
            DataType::Double | DataType::Decimal(_, _) => BigDecimal::from_str(text)
                .map(Field::DecimalField)
                .map_err(|_| err()),
            DataType::Varchar(_) => Ok(Field::StringField(text.to_string())),
            DataType::Date => NaiveDate::parse_from_str(text, DATE_FORMAT)
                .map(Field::DateField)
                .map_err(|_| err()),
            DataType::Timestamp => parse_timestamp(text)
                .map(Field::TimestampField)
                .ok_or_else(err),
        }
    }
}

/// Parses a timestamp written either with a space or with the remote `T` separator.
/// A trailing `Z` is accepted; all timestamps are taken as GMT.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, REMOTE_TIMESTAMP_FORMAT))
        .ok()
}

/// Renders a decimal in plain positional notation, without trailing zeros
/// and without an exponent.
pub fn decimal_to_string(d: &BigDecimal) -> String {
    let (digits, scale) = d.normalized().as_bigint_and_exponent();
    let text = digits.to_string();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest.to_string()),
        None => ("", text),
    };
    if scale <= 0 {
        let zeros = if digits == "0" { 0 } else { (-scale) as usize };
        return format!("{}{}{}", sign, digits, "0".repeat(zeros));
    }
    let scale = scale as usize;
    let padded = if digits.len() <= scale {
        format!("{}{}", "0".repeat(scale - digits.len() + 1), digits)
    } else {
        digits
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - scale);
    format!("{}{}.{}", sign, int_part, frac_part)
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Null => write!(f, "NULL"),
            Field::BoolField(b) => write!(f, "{}", b),
            Field::IntField(x) => write!(f, "{}", x),
            Field::DecimalField(d) => write!(f, "{}", decimal_to_string(d)),
            Field::StringField(x) => write!(f, "{}", x),
            Field::DateField(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Field::TimestampField(t) => write!(f, "{}", t.format(TIMESTAMP_FORMAT)),
        }
    }
}

/// Tuple type.
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone, Hash)]
pub struct Tuple {
    /// Tuple data.
    pub field_vals: Vec<Field>,
}

impl Tuple {
    /// Create a new tuple with the given data.
    ///
    /// # Arguments
    ///
    /// * `field_vals` - Field values of the tuple.
    pub fn new(field_vals: Vec<Field>) -> Self {
        Self { field_vals }
    }

    /// Get the field at index.
    ///
    /// # Arguments
    ///
    /// * `i` - Index of the field.
    pub fn get_field(&self, i: usize) -> Option<&Field> {
        self.field_vals.get(i)
    }

    /// Returns an iterator over the field values.
    pub fn field_vals(&self) -> impl Iterator<Item = &Field> {
        self.field_vals.iter()
    }

    /// Return the length of the tuple.
    pub fn size(&self) -> usize {
        self.field_vals.len()
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut res = String::new();
        for field in &self.field_vals {
            res.push_str(&field.to_string());
            res.push('\t');
        }
        write!(f, "{}", res)
    }
}
