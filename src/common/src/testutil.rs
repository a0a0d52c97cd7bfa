use crate::logical_plan::{RemoteCall, RemoteScanNode, SourceDescriptor, SourceKind};
use crate::table::{RemoteField, RemoteObject};
use crate::{DataType, Field, RelNode, RexNode, RexOp, Tuple};
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::str::FromStr;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The Account object: Id, Name, Email.
pub fn account_object() -> RemoteObject {
    RemoteObject::new(
        "Account",
        true,
        vec![
            RemoteField::new("Id", DataType::Varchar(18)),
            RemoteField::new("Name", DataType::Varchar(255)),
            RemoteField::new("Email", DataType::Varchar(80)),
        ],
    )
}

/// The Opportunity object, with a column of every dtype.
pub fn opportunity_object() -> RemoteObject {
    RemoteObject::new(
        "Opportunity",
        false,
        vec![
            RemoteField::new("Id", DataType::Varchar(18)),
            RemoteField::new("Name", DataType::Varchar(120)),
            RemoteField::new("Amount", DataType::Decimal(18, 2)),
            RemoteField::new("Probability", DataType::Double),
            RemoteField::new("CloseDate", DataType::Date),
            RemoteField::new("CreatedDate", DataType::Timestamp),
            RemoteField::new("IsWon", DataType::Boolean),
            RemoteField::new("Quantity", DataType::Integer),
        ],
    )
}

/// Unplanned scan over every field of an object.
pub fn object_scan(object: &RemoteObject) -> RelNode {
    let fields: Vec<String> = object.fields.iter().map(|f| f.name.clone()).collect();
    let types: Vec<DataType> = object.fields.iter().map(|f| f.dtype.clone()).collect();
    let type_names: Vec<String> = types.iter().map(|t| t.to_string()).collect();
    RelNode::RemoteScan(RemoteScanNode {
        call: RemoteCall::Query {
            query: format!("SELECT {} FROM {}", fields.join(", "), object.name),
            types: type_names.join(","),
        },
        source: SourceDescriptor {
            object: object.name.clone(),
            kind: SourceKind::Query,
            fields,
            types,
        },
        schema: object.schema(),
    })
}

/// Unplanned scan of `SELECT Id, Name, Email FROM Account`.
pub fn account_scan() -> RelNode {
    object_scan(&account_object())
}

pub fn string_lit(s: &str) -> RexNode {
    RexNode::literal(
        Field::StringField(s.to_string()),
        DataType::Varchar(s.chars().count() as u32),
    )
}

pub fn int_lit(i: i64) -> RexNode {
    RexNode::literal(Field::IntField(i), DataType::Integer)
}

pub fn decimal_lit(s: &str) -> RexNode {
    let d = BigDecimal::from_str(s).unwrap();
    let scale = s.split('.').nth(1).map(|f| f.len() as u32).unwrap_or(0);
    RexNode::literal(Field::DecimalField(d), DataType::Decimal(19, scale))
}

pub fn date_lit(s: &str) -> RexNode {
    let d = NaiveDate::parse_from_str(s, crate::DATE_FORMAT).unwrap();
    RexNode::literal(Field::DateField(d), DataType::Date)
}

pub fn ts(s: &str) -> NaiveDateTime {
    crate::parse_timestamp(s).unwrap()
}

pub fn ts_lit(s: &str) -> RexNode {
    RexNode::literal(Field::TimestampField(ts(s)), DataType::Timestamp)
}

/// Binary call shorthand.
pub fn call2(op: RexOp, left: RexNode, right: RexNode) -> RexNode {
    RexNode::call(op, vec![left, right])
}

/// `$index op literal`.
pub fn cmp(index: usize, op: RexOp, lit: RexNode) -> RexNode {
    call2(op, RexNode::input_ref(index), lit)
}

/// Tuple of string fields.
pub fn string_tuple(vals: &[&str]) -> Tuple {
    Tuple::new(
        vals.iter()
            .map(|s| Field::StringField(s.to_string()))
            .collect(),
    )
}

pub fn gen_rand_string(n: usize) -> String {
    thread_rng().sample_iter(Alphanumeric).take(n).map(char::from).collect()
}
