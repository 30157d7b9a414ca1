#![forbid(unsafe_code)]

use crate::column::Column;
use crate::error::{ColumnarError, ColumnarResult};
use crate::types::{DataType, ScalarValue};

/// An ordered sequence of equal-length columns.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> ColumnarResult<Self> {
        let rows = columns.first().map_or(0, Column::len);
        for column in &columns {
            if column.len() != rows {
                return Err(ColumnarError::LengthMismatch {
                    expected: rows,
                    actual: column.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    pub(crate) fn from_parts(columns: Vec<Column>, rows: usize) -> Self {
        debug_assert!(columns.iter().all(|c| c.len() == rows));
        Self { columns, rows }
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn schema(&self) -> Vec<DataType> {
        self.columns.iter().map(Column::data_type).collect()
    }

    /// New table holding the listed columns, in the listed order.
    pub fn project(&self, indices: &[usize]) -> Option<Table> {
        let columns = indices
            .iter()
            .map(|&idx| self.columns.get(idx).cloned())
            .collect::<Option<Vec<_>>>()?;
        Some(Table {
            columns,
            rows: self.rows,
        })
    }

    /// New table holding rows `indices[0], indices[1], ...` of every column.
    pub fn gather(&self, indices: &[u32]) -> Table {
        Table {
            columns: self.columns.iter().map(|c| c.gather(indices)).collect(),
            rows: indices.len(),
        }
    }

    pub fn row(&self, row: usize) -> Vec<ScalarValue> {
        self.columns.iter().map(|c| c.value(row)).collect()
    }

    /// Column-major decoded values: `out[c][r]`.
    pub fn to_values(&self) -> Vec<Vec<ScalarValue>> {
        self.columns.iter().map(Column::to_values).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ragged_columns() {
        let err = Table::new(vec![
            Column::from_vec(vec![1i32, 2, 3]),
            Column::from_vec(vec![1.0f64]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ColumnarError::LengthMismatch {
                expected: 3,
                actual: 1
            }
        );
    }

    #[test]
    fn project_and_gather() {
        let table = Table::new(vec![
            Column::from_vec(vec![1i32, 2, 3]),
            Column::from_strs(&["a", "b", "c"]),
        ])
        .unwrap();

        let names = table.project(&[1]).unwrap();
        assert_eq!(names.schema(), vec![DataType::String]);
        assert!(table.project(&[2]).is_none());

        let picked = table.gather(&[2, 0]);
        assert_eq!(picked.num_rows(), 2);
        assert_eq!(
            picked.row(0),
            vec![ScalarValue::Int32(3), ScalarValue::string("c")]
        );
    }

    #[test]
    fn empty_table_has_no_rows() {
        let table = Table::new(Vec::new()).unwrap();
        assert_eq!(table.num_rows(), 0);
        assert_eq!(table.num_columns(), 0);
    }
}
