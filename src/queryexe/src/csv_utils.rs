use common::{Field, MedError, TableSchema, Tuple};
use std::fs::File;
use std::io::Read;

/// Reads headerless csv rows into tuples of the given schema.
///
/// Empty cells are null. A row with the wrong number of cells, or a cell that
/// does not parse as its column's dtype, fails the whole read.
///
/// # Arguments
///
/// * `reader` - Source of the csv text.
/// * `schema` - Schema of the rows.
pub fn read_tuples<R: Read>(reader: R, schema: &TableSchema) -> Result<Vec<Tuple>, MedError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(reader);
    let mut tuples = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let rec = result.map_err(|e| MedError::IOError(format!("Line {}: {}", line + 1, e)))?;
        if rec.len() != schema.size() {
            return Err(MedError::ValidationError(format!(
                "Line {} has {} values, expected {}",
                line + 1,
                rec.len(),
                schema.size()
            )));
        }
        let mut tuple = Tuple::new(Vec::with_capacity(rec.len()));
        for (value, attr) in rec.iter().zip(schema.attributes()) {
            tuple.field_vals.push(Field::parse(value, attr.dtype())?);
        }
        tuples.push(tuple);
    }
    Ok(tuples)
}

/// Reads a headerless csv file into tuples of the given schema.
///
/// # Arguments
///
/// * `path` - Path to the csv file.
/// * `schema` - Schema of the rows.
pub fn read_tuples_from_file(path: &str, schema: &TableSchema) -> Result<Vec<Tuple>, MedError> {
    debug!("Reading csv file {}", path);
    let file = File::open(path)?;
    let tuples = read_tuples(file, schema)?;
    info!("Num records read from {}: {}", path, tuples.len());
    Ok(tuples)
}

#[cfg(test)]
mod test {
    use super::*;
    use common::DataType;

    fn schema() -> TableSchema {
        TableSchema::from_vecs(
            vec!["Id", "Amount", "CloseDate"],
            vec![DataType::Varchar(18), DataType::Decimal(18, 2), DataType::Date],
        )
    }

    #[test]
    fn test_read_tuples() {
        let text = "001,10.50,2020-01-31\n002,,\n";
        let tuples = read_tuples(text.as_bytes(), &schema()).unwrap();
        assert_eq!(2, tuples.len());
        assert_eq!("2020-01-31", tuples[0].get_field(2).unwrap().to_string());
        assert_eq!(&Field::Null, tuples[1].get_field(1).unwrap());
        assert_eq!(&Field::Null, tuples[1].get_field(2).unwrap());
    }

    #[test]
    fn test_read_tuples_errors() {
        assert!(read_tuples("001,10.50\n".as_bytes(), &schema()).is_err());
        assert!(read_tuples("001,ten,2020-01-31\n".as_bytes(), &schema()).is_err());
        assert!(read_tuples_from_file("no/such/file.csv", &schema()).is_err());
    }
}
