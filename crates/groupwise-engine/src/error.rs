use crate::aggregation::AggregationKind;
use groupwise_columnar::{ColumnarError, DataType};

pub type GroupByResult<T> = Result<T, GroupByError>;

#[derive(Debug, thiserror::Error)]
pub enum GroupByError {
    #[error("key column {column} has type {data_type}, which cannot be grouped")]
    UnsupportedKeyType { column: usize, data_type: DataType },

    #[error("{kind} is not defined for values of type {data_type}")]
    UnsupportedAggregationForType {
        kind: AggregationKind,
        data_type: DataType,
    },

    #[error("length mismatch: keys have {expected} rows, value column has {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("group by requires at least one key column")]
    NoKeyColumns,

    #[error("column index {index} is out of range for a table with {columns} columns")]
    ColumnIndexOutOfRange { index: usize, columns: usize },

    #[error("hash and sort groupers disagree: {0}")]
    Divergence(String),

    #[error(transparent)]
    Columnar(#[from] ColumnarError),
}
