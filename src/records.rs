//! The fixed record batch written and verified by the job.

use arrow::array::{Array, ArrayRef, AsArray, Int64Array, RecordBatch, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Int64Type, Schema};
use arrow::util::pretty::pretty_format_batches;

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Column names, in order.
pub const COLUMNS: [&str; 4] = ["id", "name", "age", "join_date"];

#[derive(Debug)]
pub struct RecordError {
    pub(crate) kind: RecordErrorKind,
}

impl RecordError {
    pub(crate) fn new(kind: RecordErrorKind) -> Self {
        RecordError { kind }
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordError: {}", self.kind)
    }
}

impl Error for RecordError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.kind)
    }
}

impl From<arrow::error::ArrowError> for RecordError {
    fn from(error: arrow::error::ArrowError) -> Self {
        RecordError::new(RecordErrorKind::Arrow(error))
    }
}

#[derive(Debug)]
pub(crate) enum RecordErrorKind {
    Arrow(arrow::error::ArrowError),
    MissingColumn(&'static str),
    NullValue { column: &'static str, row: usize },
}

impl fmt::Display for RecordErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arrow(_) => write!(f, "ArrowError"),
            Self::MissingColumn(column) => write!(f, "Column '{column}' is missing from the batch"),
            Self::NullValue { column, row } => write!(f, "Unexpected null in column '{column}' at row {row}"),
        }
    }
}

impl Error for RecordErrorKind {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Arrow(source) => Some(source),
            _ => None,
        }
    }
}

/// One row of the sample table.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SampleRow {
    pub id: i64,
    pub name: String,
    pub age: i64,
    pub join_date: String,
}

impl SampleRow {
    pub fn new(id: i64, name: &str, age: i64, join_date: &str) -> Self {
        SampleRow { id, name: name.to_string(), age, join_date: join_date.to_string() }
    }
}

pub fn sample_rows() -> Vec<SampleRow> {
    vec![
        SampleRow::new(1, "Alice", 34, "2023-01-15"),
        SampleRow::new(2, "Bob", 45, "2023-02-20"),
        SampleRow::new(3, "Charlie", 29, "2023-03-10"),
    ]
}

/// Schema Spark infers for the sample rows: longs and strings, all nullable.
pub fn schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(COLUMNS[0], DataType::Int64, true),
        Field::new(COLUMNS[1], DataType::Utf8, true),
        Field::new(COLUMNS[2], DataType::Int64, true),
        Field::new(COLUMNS[3], DataType::Utf8, true),
    ]))
}

pub fn to_record_batch(rows: &[SampleRow]) -> Result<RecordBatch, RecordError> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|row| row.id))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|row| row.name.as_str()))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|row| row.age))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|row| row.join_date.as_str()))),
    ];

    Ok(RecordBatch::try_new(schema(), columns)?)
}

fn column(batch: &RecordBatch, name: &'static str, data_type: &DataType) -> Result<ArrayRef, RecordError> {
    let array = batch
        .column_by_name(name)
        .ok_or(RecordError::new(RecordErrorKind::MissingColumn(name)))?;

    if let Some(row) = (0..array.len()).find(|&row| array.is_null(row)) {
        return Err(RecordError::new(RecordErrorKind::NullValue { column: name, row }));
    }

    Ok(cast(array, data_type)?)
}

/// Decodes engine output back into rows.
///
/// Integer columns of any width and string-like columns (including dates)
/// are accepted, since the engine may widen or re-type what was written.
pub fn from_record_batches(batches: &[RecordBatch]) -> Result<Vec<SampleRow>, RecordError> {
    let mut rows = vec![];

    for batch in batches {
        let ids = column(batch, "id", &DataType::Int64)?;
        let names = column(batch, "name", &DataType::Utf8)?;
        let ages = column(batch, "age", &DataType::Int64)?;
        let dates = column(batch, "join_date", &DataType::Utf8)?;

        let (ids, names, ages, dates) = (
            ids.as_primitive::<Int64Type>(),
            names.as_string::<i32>(),
            ages.as_primitive::<Int64Type>(),
            dates.as_string::<i32>(),
        );

        for row in 0..batch.num_rows() {
            rows.push(SampleRow {
                id: ids.value(row),
                name: names.value(row).to_string(),
                age: ages.value(row),
                join_date: dates.value(row).to_string(),
            });
        }
    }

    Ok(rows)
}

/// Order-insensitive comparison; duplicates count.
pub fn same_rows(left: &[SampleRow], right: &[SampleRow]) -> bool {
    let mut left = left.to_vec();
    let mut right = right.to_vec();
    left.sort();
    right.sort();
    left == right
}

/// Written rows that do not appear in `read`.
pub fn missing_rows(written: &[SampleRow], read: &[SampleRow]) -> usize {
    let mut remaining = read.to_vec();
    written
        .iter()
        .filter(|row| match remaining.iter().position(|candidate| candidate == *row) {
            Some(index) => {
                remaining.swap_remove(index);
                false
            }
            None => true,
        })
        .count()
}

pub fn pretty(batches: &[RecordBatch]) -> Result<String, RecordError> {
    Ok(pretty_format_batches(batches)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Date32Array, Int32Array};

    #[test]
    fn test_sample_batch_shape() {
        let batch = to_record_batch(&sample_rows()).unwrap();

        assert_eq!(batch.num_rows(), 3);
        let schema = batch.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, COLUMNS);
    }

    #[test]
    fn test_decodes_narrower_types() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, true),
            Field::new("name", DataType::Utf8, true),
            Field::new("age", DataType::Int32, true),
            Field::new("join_date", DataType::Date32, true),
        ]));
        // 2023-02-20 is day 19408 since the epoch.
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![2])),
                Arc::new(StringArray::from(vec!["Bob"])),
                Arc::new(Int32Array::from(vec![45])),
                Arc::new(Date32Array::from(vec![19408])),
            ],
        )
        .unwrap();

        let rows = from_record_batches(&[batch]).unwrap();
        assert_eq!(rows, vec![SampleRow::new(2, "Bob", 45, "2023-02-20")]);
    }

    #[test]
    fn test_missing_column() {
        let batch = to_record_batch(&sample_rows()).unwrap().project(&[0, 1, 2]).unwrap();

        let err = from_record_batches(&[batch]).unwrap_err();
        assert!(matches!(err.kind, RecordErrorKind::MissingColumn("join_date")));
    }

    #[test]
    fn test_null_is_rejected() {
        let batch = RecordBatch::try_new(
            schema(),
            vec![
                Arc::new(Int64Array::from(vec![Some(1)])),
                Arc::new(StringArray::from(vec![None::<&str>])),
                Arc::new(Int64Array::from(vec![Some(3)])),
                Arc::new(StringArray::from(vec![Some("2023-01-15")])),
            ],
        )
        .unwrap();

        let err = from_record_batches(&[batch]).unwrap_err();
        assert!(matches!(err.kind, RecordErrorKind::NullValue { column: "name", row: 0 }));
    }

    #[test]
    fn test_same_rows_ignores_order_but_not_duplicates() {
        let rows = sample_rows();
        let mut reversed = rows.clone();
        reversed.reverse();
        assert!(same_rows(&rows, &reversed));

        let mut doubled = rows.clone();
        doubled.extend(rows.clone());
        assert!(!same_rows(&rows, &doubled));
        assert_eq!(missing_rows(&rows, &rows[..1]), 2);
        assert_eq!(missing_rows(&rows, &doubled), 0);
    }

    #[test]
    fn test_pretty_contains_rows() {
        let batch = to_record_batch(&sample_rows()).unwrap();
        let table = pretty(&[batch]).unwrap();

        assert!(table.contains("join_date"));
        assert!(table.contains("Charlie"));
    }
}
