use arrow::array::RecordBatch;
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub(crate) enum IoError {
    Arrow(arrow::error::ArrowError),
    EmptyBatchList,
    RowCount { expected: i64, got: i64 }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arrow(_) => write!(f, "IoError: ArrowError"),
            Self::EmptyBatchList => write!(f, "IoError: Cannot serialize an empty list of batches."),
            Self::RowCount { expected, got } => write!(f, "IoError: Expected {expected} rows in arrow batch but got {got}.")
        }
    }
}

impl Error for IoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Arrow(source) => Some(source),
            _ => None,
        }
    }
}

impl From<arrow::error::ArrowError> for IoError {
    fn from(error: arrow::error::ArrowError) -> Self {
        IoError::Arrow(error)
    }
}

/// Decodes one `ArrowBatch` payload of an ExecutePlan response.
///
/// `row_count` is the total announced by the server for this payload.
pub(crate) fn deserialize(stream: &[u8], row_count: i64) -> Result<Vec<RecordBatch>, IoError> {
    let reader = StreamReader::try_new(stream, None)?;

    let mut batches: Vec<RecordBatch> = vec![];
    let mut total_count: i64 = 0;

    for batch in reader {
        let record = batch?;
        total_count += record.num_rows() as i64;
        batches.push(record);
    }

    if total_count != row_count {
        return Err(IoError::RowCount { expected: row_count, got: total_count });
    };

    Ok(batches)
}

/// Encodes batches as an Arrow IPC stream, the payload of a `LocalRelation`.
pub(crate) fn serialize(batches: &[RecordBatch]) -> Result<Vec<u8>, IoError> {
    let schema = batches.first().ok_or(IoError::EmptyBatchList)?.schema();

    let mut buffer: Vec<u8> = vec![];
    {
        let mut writer = StreamWriter::try_new(&mut buffer, &schema)?;
        for batch in batches {
            writer.write(batch)?;
        }
        writer.finish()?;
    }

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records;

    #[test]
    fn test_local_relation_payload_decodes() {
        let batch = records::to_record_batch(&records::sample_rows()).unwrap();

        let payload = serialize(std::slice::from_ref(&batch)).unwrap();
        let decoded = deserialize(&payload, 3).unwrap();

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0], batch);
    }

    #[test]
    fn test_row_count_mismatch() {
        let batch = records::to_record_batch(&records::sample_rows()).unwrap();
        let payload = serialize(&[batch]).unwrap();

        match deserialize(&payload, 5).unwrap_err() {
            IoError::RowCount { expected, got } => {
                assert_eq!(expected, 5);
                assert_eq!(got, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_serialize_requires_a_batch() {
        assert!(matches!(serialize(&[]), Err(IoError::EmptyBatchList)));
    }
}
