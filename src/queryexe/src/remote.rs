//! In-process stand-in for the remote system: answers query, getDeleted and
//! getLov calls from a [`Dataset`].

use crate::dataset::Dataset;
use crate::eval::eval_predicate;
use crate::query::ExprTranslator;
use chrono::{Duration, NaiveDateTime, Utc};
use common::catalog::RemoteCatalog;
use common::logical_plan::RemoteCall;
use common::{parse_timestamp, Attribute, DataType, Field, MedError, TableSchema, Tuple};
use parser::{parse_query, SelectItem, SqlNode};

/// Oldest start of a deleted-records range, in days before now.
pub const MAX_DELETED_AGE_DAYS: i64 = 30;

/// Source of the current time.
pub trait Clock {
    /// Current GMT time.
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}

/// Clock stopped at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Answers the calls of planned remote scans.
pub trait RemoteService {
    /// Issues a call and returns its rows, one field per requested field.
    ///
    /// # Arguments
    ///
    /// * `call` - The call to issue.
    /// * `fields` - Remote fields the call requests.
    /// * `types` - Types of `fields`.
    fn call(
        &self,
        call: &RemoteCall,
        fields: &[String],
        types: &[DataType],
    ) -> Result<Vec<Tuple>, MedError>;
}

fn is_digits(chars: &[char], from: usize, n: usize) -> bool {
    from + n <= chars.len() && chars[from..from + n].iter().all(|c| c.is_ascii_digit())
}

/// Length of a bare `yyyy-MM-dd` date at `i`, or 0.
fn date_len(chars: &[char], i: usize) -> usize {
    let shape = is_digits(chars, i, 4)
        && chars.get(i + 4) == Some(&'-')
        && is_digits(chars, i + 5, 2)
        && chars.get(i + 7) == Some(&'-')
        && is_digits(chars, i + 8, 2);
    if shape {
        10
    } else {
        0
    }
}

/// Length of a `THH:mm:ss[.fff][Z]` time at `i`, or 0.
fn time_len(chars: &[char], i: usize) -> usize {
    let shape = chars.get(i) == Some(&'T')
        && is_digits(chars, i + 1, 2)
        && chars.get(i + 3) == Some(&':')
        && is_digits(chars, i + 4, 2)
        && chars.get(i + 6) == Some(&':')
        && is_digits(chars, i + 7, 2);
    if !shape {
        return 0;
    }
    let mut len = 9;
    if chars.get(i + len) == Some(&'.') {
        len += 1;
        while chars.get(i + len).map_or(false, |c| c.is_ascii_digit()) {
            len += 1;
        }
    }
    if chars.get(i + len) == Some(&'Z') {
        len += 1;
    }
    len
}

/// Rewrites the bare date and datetime literals of remote query text into
/// typed SQL literals, e.g. `2020-01-01T00:00:00Z` becomes
/// `TIMESTAMP '2020-01-01 00:00:00'`. Quoted text is left alone.
pub fn normalize_query_text(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_quote = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            in_quote = !in_quote;
        }
        let starts_word = i == 0 || !(chars[i - 1].is_alphanumeric() || chars[i - 1] == '_');
        let date = if in_quote || !starts_word {
            0
        } else {
            date_len(&chars, i)
        };
        if date == 0 {
            out.push(c);
            i += 1;
            continue;
        }
        let day: String = chars[i..i + date].iter().collect();
        let time = time_len(&chars, i + date);
        if time == 0 {
            out.push_str(&format!("DATE '{}'", day));
        } else {
            let clock: String = chars[i + date + 1..i + date + 9].iter().collect();
            out.push_str(&format!("TIMESTAMP '{} {}'", day, clock));
        }
        i += date + time;
    }
    out
}

/// Remote system serving rows of a [`Dataset`].
pub struct RemoteEndpoint<C: RemoteCatalog> {
    catalog: C,
    dataset: Dataset,
    clock: Box<dyn Clock>,
}

impl<C: RemoteCatalog> RemoteEndpoint<C> {
    /// Creates an endpoint on the wall clock.
    ///
    /// # Arguments
    ///
    /// * `catalog` - Describes the remote objects.
    /// * `dataset` - Rows of the remote objects.
    pub fn new(catalog: C, dataset: Dataset) -> Self {
        Self::with_clock(catalog, dataset, Box::new(SystemClock))
    }

    pub fn with_clock(catalog: C, dataset: Dataset, clock: Box<dyn Clock>) -> Self {
        Self {
            catalog,
            dataset,
            clock,
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    fn object_schema(&self, object: &str) -> Result<TableSchema, MedError> {
        Ok(TableSchema::new(
            self.catalog
                .describe(object)?
                .into_iter()
                .map(|f| Attribute::new(f.name, f.dtype))
                .collect(),
        ))
    }

    /// Runs query text of the form `SELECT f1, f2 FROM Object [WHERE pred]`.
    ///
    /// # Arguments
    ///
    /// * `text` - Query in the remote query language.
    pub fn query(&self, text: &str) -> Result<Vec<Tuple>, MedError> {
        let select = parse_query(&normalize_query_text(text))?;
        let schema = self.object_schema(&select.from)?;
        let exprs = ExprTranslator::with_null_equality(&schema, &select.from);
        let mut columns = Vec::new();
        for item in select.items.iter() {
            match item {
                SelectItem::Expr {
                    expr: SqlNode::Identifier { names, .. },
                    alias: None,
                } => columns.push(exprs.resolve(names)?),
                _ => {
                    return Err(MedError::ExecutionError(format!(
                        "Remote queries select plain fields only: {}",
                        text
                    )))
                }
            }
        }
        let condition = match &select.selection {
            Some(selection) => Some(exprs.translate(selection)?),
            None => None,
        };
        let mut out = Vec::new();
        for row in self.dataset.rows(&select.from) {
            if let Some(cond) = &condition {
                if !eval_predicate(cond, row)? {
                    continue;
                }
            }
            let fields = columns
                .iter()
                .map(|i| row.get_field(*i).cloned().unwrap_or(Field::Null))
                .collect();
            out.push(Tuple::new(fields));
        }
        debug!("Remote query {} returned {} rows", text, out.len());
        Ok(out)
    }

    fn validate_object(&self, object: &str) -> Result<(), MedError> {
        if self.catalog.is_valid_object(object) {
            Ok(())
        } else {
            Err(MedError::ValidationError(format!("Invalid object {}", object)))
        }
    }

    /// Deleted records of an object with a delete stamp in `[start, end]`.
    ///
    /// # Arguments
    ///
    /// * `object` - Replicable object.
    /// * `start` - Inclusive lower bound, `yyyy-MM-ddTHH:mm:ss`.
    /// * `end` - Inclusive upper bound, `yyyy-MM-ddTHH:mm:ss`.
    pub fn get_deleted(
        &self,
        object: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Vec<Tuple>, MedError> {
        self.validate_object(object)?;
        if !self.catalog.is_replicable(object)? {
            return Err(MedError::ExecutionError(format!(
                "Deleted records of {} cannot be replicated",
                object
            )));
        }
        let bound = |text: Option<&str>, which: &str| -> Result<NaiveDateTime, MedError> {
            let text = text.ok_or_else(|| {
                MedError::InvalidRange(format!("Missing {} time for {}", which, object))
            })?;
            parse_timestamp(text).ok_or_else(|| {
                MedError::InvalidRange(format!("Invalid {} time '{}' for {}", which, text, object))
            })
        };
        let start = bound(start, "start")?;
        let end = bound(end, "end")?;
        if start > end {
            return Err(MedError::InvalidRange(format!(
                "Start {} is after end {} for {}",
                start, end, object
            )));
        }
        let oldest = self.clock.now() - Duration::days(MAX_DELETED_AGE_DAYS);
        if start < oldest {
            return Err(MedError::InvalidRange(format!(
                "Start {} is more than {} days ago for {}",
                start, MAX_DELETED_AGE_DAYS, object
            )));
        }
        let rows: Vec<Tuple> = self
            .dataset
            .deleted(object)
            .iter()
            .filter(|t| match t.get_field(1) {
                Some(Field::TimestampField(stamp)) => *stamp >= start && *stamp <= end,
                _ => false,
            })
            .cloned()
            .collect();
        debug!("{} deleted records of {}", rows.len(), object);
        Ok(rows)
    }

    /// Picklist values of an object.
    pub fn lov(&self, object: &str) -> Result<Vec<Tuple>, MedError> {
        self.validate_object(object)?;
        Ok(self.dataset.lov(object).to_vec())
    }
}

impl<C: RemoteCatalog> RemoteService for RemoteEndpoint<C> {
    fn call(
        &self,
        call: &RemoteCall,
        fields: &[String],
        _types: &[DataType],
    ) -> Result<Vec<Tuple>, MedError> {
        let rows = match call {
            RemoteCall::Query { query, .. } => self.query(query)?,
            RemoteCall::GetDeleted { object, start, end } => {
                self.get_deleted(object, start.as_deref(), end.as_deref())?
            }
            RemoteCall::Lov { object } => self.lov(object)?,
        };
        if let Some(t) = rows.first() {
            if t.size() != fields.len() {
                return Err(MedError::ExecutionError(format!(
                    "Call {} returns {} fields but {} were requested",
                    call,
                    t.size(),
                    fields.len()
                )));
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dataset::deleted_schema;
    use common::catalog::MemCatalog;
    use common::testutil::*;

    fn endpoint() -> RemoteEndpoint<MemCatalog> {
        let mut dataset = Dataset::new();
        dataset.add_rows(
            "Account",
            vec![
                Tuple::new(vec![
                    Field::StringField(String::from("001")),
                    Field::StringField(String::from("Acme")),
                    Field::StringField(String::from("info@acme.com")),
                ]),
                Tuple::new(vec![
                    Field::StringField(String::from("002")),
                    Field::StringField(String::from("Globex")),
                    Field::Null,
                ]),
            ],
        );
        let deleted = crate::csv_utils::read_tuples(
            "101,2020-01-05T00:00:00Z\n102,2020-01-20T12:00:00Z\n".as_bytes(),
            &deleted_schema(),
        )
        .unwrap();
        dataset.add_deleted("Account", deleted);
        dataset.add_lov(
            "Account",
            vec![string_tuple(&["Industry", "Banking"]), string_tuple(&["Industry", "Retail"])],
        );
        RemoteEndpoint::with_clock(
            MemCatalog::new(vec![account_object(), opportunity_object()]),
            dataset,
            Box::new(FixedClock(ts("2020-01-25 00:00:00"))),
        )
    }

    #[test]
    fn test_normalize_query_text() {
        assert_eq!(
            "SELECT Id FROM Opportunity WHERE (CloseDate >= DATE '2020-01-01') AND \
             (CreatedDate < TIMESTAMP '2020-02-01 10:30:00')",
            normalize_query_text(
                "SELECT Id FROM Opportunity WHERE (CloseDate >= 2020-01-01) AND \
                 (CreatedDate < 2020-02-01T10:30:00Z)"
            )
        );
        assert_eq!(
            "Name = '2020-01-01'",
            normalize_query_text("Name = '2020-01-01'")
        );
        assert_eq!("Code = X2020-01-01", normalize_query_text("Code = X2020-01-01"));
    }

    #[test]
    fn test_query() {
        let ep = endpoint();
        let rows = ep.query("SELECT Name, Id FROM Account WHERE Email = null").unwrap();
        assert_eq!(vec![string_tuple(&["Globex", "002"])], rows);
        let rows = ep
            .query("SELECT Id FROM Account WHERE (Email != null) AND (Name = 'Acme')")
            .unwrap();
        assert_eq!(vec![string_tuple(&["001"])], rows);
        assert_eq!(2, ep.query("SELECT Id FROM Account").unwrap().len());
        assert!(ep.query("SELECT Id FROM Opportunity").unwrap().is_empty());
        assert!(ep.query("SELECT UPPER(Name) FROM Account").is_err());
        assert!(ep.query("SELECT Id FROM Contact").is_err());
    }

    #[test]
    fn test_get_deleted() {
        let ep = endpoint();
        let rows = ep
            .get_deleted("Account", Some("2020-01-01T00:00:00"), Some("2020-01-10T00:00:00"))
            .unwrap();
        assert_eq!(1, rows.len());
        assert_eq!(
            &Field::StringField(String::from("101")),
            rows[0].get_field(0).unwrap()
        );
        let all = ep
            .get_deleted("Account", Some("2020-01-05T00:00:00"), Some("2020-01-20T12:00:00"))
            .unwrap();
        assert_eq!(2, all.len());
    }

    #[test]
    fn test_get_deleted_errors() {
        let ep = endpoint();
        let range = |start: Option<&str>, end: Option<&str>| ep.get_deleted("Account", start, end);
        assert!(matches!(
            range(None, Some("2020-01-10T00:00:00")),
            Err(MedError::InvalidRange(_))
        ));
        assert!(matches!(
            range(Some("yesterday"), Some("2020-01-10T00:00:00")),
            Err(MedError::InvalidRange(_))
        ));
        assert!(matches!(
            range(Some("2020-01-10T00:00:00"), Some("2020-01-01T00:00:00")),
            Err(MedError::InvalidRange(_))
        ));
        assert!(matches!(
            range(Some("2019-12-01T00:00:00"), Some("2020-01-01T00:00:00")),
            Err(MedError::InvalidRange(_))
        ));
        assert!(matches!(
            ep.get_deleted("Opportunity", Some("2020-01-01T00:00:00"), Some("2020-01-02T00:00:00")),
            Err(MedError::ExecutionError(_))
        ));
        assert!(matches!(
            ep.get_deleted("Contact", Some("2020-01-01T00:00:00"), Some("2020-01-02T00:00:00")),
            Err(MedError::ValidationError(_))
        ));
    }

    #[test]
    fn test_call_dispatch() {
        let ep = endpoint();
        let fields = vec![String::from("Field"), String::from("Value")];
        let types = vec![DataType::Varchar(25), DataType::Varchar(256)];
        let call = RemoteCall::Lov {
            object: String::from("Account"),
        };
        assert_eq!(2, ep.call(&call, &fields, &types).unwrap().len());
        let query = RemoteCall::Query {
            query: String::from("SELECT Id FROM Account"),
            types: String::from("VARCHAR(18)"),
        };
        assert!(ep.call(&query, &fields, &types).is_err());
    }
}
