use crate::types::{DataType, ScalarValue};

pub type ColumnarResult<T> = Result<T, ColumnarError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ColumnarError {
    #[error("length mismatch: expected {expected} rows, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("type mismatch: column is {expected}, got value {actual:?}")]
    TypeMismatch {
        expected: DataType,
        actual: ScalarValue,
    },

    #[error("dictionary code {code} at row {row} is out of bounds for {keys} keys")]
    DictionaryCodeOutOfBounds { row: usize, code: u32, keys: usize },

    #[error("row has {actual} values, table has {expected} columns")]
    RowLengthMismatch { expected: usize, actual: usize },
}
