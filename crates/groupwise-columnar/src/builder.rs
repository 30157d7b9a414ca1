#![forbid(unsafe_code)]

use crate::bitmap::BitVec;
use crate::column::{Column, ColumnData};
use crate::error::{ColumnarError, ColumnarResult};
use crate::table::Table;
use crate::types::{DataType, NativeType, ScalarValue};
use std::collections::HashMap;
use std::sync::Arc;

/// Appends [`ScalarValue`]s row by row and materializes a typed [`Column`].
///
/// Dictionary columns deduplicate pushed values into a child key column in first-seen order.
#[derive(Clone, Debug)]
pub struct ColumnBuilder {
    data_type: DataType,
    values: Vec<ScalarValue>,
}

/// Hashable identity of a dictionary key while building.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum DictKey {
    Int(i128),
    Bits(u64),
    Bool(bool),
    Str(Arc<str>),
}

impl DictKey {
    fn of(value: &ScalarValue) -> Option<Self> {
        Some(match value {
            ScalarValue::Null => return None,
            ScalarValue::Int8(v) => DictKey::Int(*v as i128),
            ScalarValue::Int16(v) => DictKey::Int(*v as i128),
            ScalarValue::Int32(v) => DictKey::Int(*v as i128),
            ScalarValue::Int64(v) => DictKey::Int(*v as i128),
            ScalarValue::UInt8(v) => DictKey::Int(*v as i128),
            ScalarValue::UInt16(v) => DictKey::Int(*v as i128),
            ScalarValue::UInt32(v) => DictKey::Int(*v as i128),
            ScalarValue::UInt64(v) => DictKey::Int(*v as i128),
            ScalarValue::Float32(v) => DictKey::Bits(v.to_bits() as u64),
            ScalarValue::Float64(v) => DictKey::Bits(v.to_bits()),
            ScalarValue::Boolean(v) => DictKey::Bool(*v),
            ScalarValue::TimestampMillis(v) => DictKey::Int(*v as i128),
            ScalarValue::Decimal32 { rep, .. } => DictKey::Int(*rep as i128),
            ScalarValue::Decimal64 { rep, .. } => DictKey::Int(*rep as i128),
            ScalarValue::String(s) => DictKey::Str(s.clone()),
        })
    }
}

fn accepts(data_type: &DataType, value: &ScalarValue) -> bool {
    match (data_type, value) {
        (_, ScalarValue::Null) => true,
        (DataType::Int8, ScalarValue::Int8(_))
        | (DataType::Int16, ScalarValue::Int16(_))
        | (DataType::Int32, ScalarValue::Int32(_))
        | (DataType::Int64, ScalarValue::Int64(_))
        | (DataType::UInt8, ScalarValue::UInt8(_))
        | (DataType::UInt16, ScalarValue::UInt16(_))
        | (DataType::UInt32, ScalarValue::UInt32(_))
        | (DataType::UInt64, ScalarValue::UInt64(_))
        | (DataType::Float32, ScalarValue::Float32(_))
        | (DataType::Float64, ScalarValue::Float64(_))
        | (DataType::Boolean, ScalarValue::Boolean(_))
        | (DataType::TimestampMillis, ScalarValue::TimestampMillis(_))
        | (DataType::String, ScalarValue::String(_)) => true,
        (DataType::Decimal32 { scale }, ScalarValue::Decimal32 { scale: s, .. })
        | (DataType::Decimal64 { scale }, ScalarValue::Decimal64 { scale: s, .. }) => scale == s,
        (DataType::Dictionary(inner), value) => accepts(inner, value),
        _ => false,
    }
}

fn natives<T: NativeType>(values: &[ScalarValue]) -> Vec<T> {
    values
        .iter()
        .map(|v| T::from_scalar(v).unwrap_or_default())
        .collect()
}

impl ColumnBuilder {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            values: Vec::new(),
        }
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(&mut self, value: &ScalarValue) -> ColumnarResult<()> {
        if !accepts(&self.data_type, value) {
            return Err(ColumnarError::TypeMismatch {
                expected: self.data_type.clone(),
                actual: value.clone(),
            });
        }
        self.values.push(value.clone());
        Ok(())
    }

    pub fn push_null(&mut self) {
        self.values.push(ScalarValue::Null);
    }

    pub fn finish(self) -> Column {
        let validity: BitVec = self.values.iter().map(|v| !v.is_null()).collect();
        let values = &self.values;
        let data = match &self.data_type {
            DataType::Int8 => ColumnData::Int8(natives(values)),
            DataType::Int16 => ColumnData::Int16(natives(values)),
            DataType::Int32 => ColumnData::Int32(natives(values)),
            DataType::Int64 => ColumnData::Int64(natives(values)),
            DataType::UInt8 => ColumnData::UInt8(natives(values)),
            DataType::UInt16 => ColumnData::UInt16(natives(values)),
            DataType::UInt32 => ColumnData::UInt32(natives(values)),
            DataType::UInt64 => ColumnData::UInt64(natives(values)),
            DataType::Float32 => ColumnData::Float32(natives(values)),
            DataType::Float64 => ColumnData::Float64(natives(values)),
            DataType::Boolean => ColumnData::Boolean(
                values
                    .iter()
                    .map(|v| matches!(v, ScalarValue::Boolean(true)))
                    .collect(),
            ),
            DataType::TimestampMillis => ColumnData::TimestampMillis(
                values
                    .iter()
                    .map(|v| match v {
                        ScalarValue::TimestampMillis(t) => *t,
                        _ => 0,
                    })
                    .collect(),
            ),
            DataType::Decimal32 { scale } => ColumnData::Decimal32 {
                reps: values
                    .iter()
                    .map(|v| match v {
                        ScalarValue::Decimal32 { rep, .. } => *rep,
                        _ => 0,
                    })
                    .collect(),
                scale: *scale,
            },
            DataType::Decimal64 { scale } => ColumnData::Decimal64 {
                reps: values
                    .iter()
                    .map(|v| match v {
                        ScalarValue::Decimal64 { rep, .. } => *rep,
                        _ => 0,
                    })
                    .collect(),
                scale: *scale,
            },
            DataType::String => {
                let mut offsets = Vec::with_capacity(values.len() + 1);
                let mut bytes = Vec::new();
                offsets.push(0);
                for value in values {
                    if let ScalarValue::String(s) = value {
                        bytes.extend_from_slice(s.as_bytes());
                    }
                    offsets.push(bytes.len());
                }
                ColumnData::String { offsets, bytes }
            }
            DataType::Dictionary(inner) => {
                let mut keys = ColumnBuilder::new(inner.as_ref().clone());
                let mut lookup: HashMap<DictKey, u32> = HashMap::new();
                let mut codes = Vec::with_capacity(values.len());
                for value in values {
                    let Some(key) = DictKey::of(value) else {
                        codes.push(0);
                        continue;
                    };
                    let code = *lookup.entry(key).or_insert_with(|| {
                        keys.values.push(value.clone());
                        (keys.values.len() - 1) as u32
                    });
                    codes.push(code);
                }
                ColumnData::Dictionary {
                    codes,
                    keys: Arc::new(keys.finish()),
                }
            }
        };
        Column::from_parts(data, validity)
    }
}

/// Row-oriented table assembly on top of one [`ColumnBuilder`] per column.
#[derive(Clone, Debug)]
pub struct TableBuilder {
    builders: Vec<ColumnBuilder>,
    rows: usize,
}

impl TableBuilder {
    pub fn new(schema: Vec<DataType>) -> Self {
        Self {
            builders: schema.into_iter().map(ColumnBuilder::new).collect(),
            rows: 0,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    /// Append one row. On error nothing is appended.
    pub fn append_row(&mut self, row: &[ScalarValue]) -> ColumnarResult<()> {
        if row.len() != self.builders.len() {
            return Err(ColumnarError::RowLengthMismatch {
                expected: self.builders.len(),
                actual: row.len(),
            });
        }
        for (builder, value) in self.builders.iter().zip(row) {
            if !accepts(builder.data_type(), value) {
                return Err(ColumnarError::TypeMismatch {
                    expected: builder.data_type().clone(),
                    actual: value.clone(),
                });
            }
        }
        for (builder, value) in self.builders.iter_mut().zip(row) {
            builder.values.push(value.clone());
        }
        self.rows += 1;
        Ok(())
    }

    pub fn finish(self) -> Table {
        let columns = self.builders.into_iter().map(ColumnBuilder::finish).collect();
        Table::from_parts(columns, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_wrong_types() {
        let mut builder = ColumnBuilder::new(DataType::Int32);
        builder.push(&ScalarValue::Int32(1)).unwrap();
        let err = builder.push(&ScalarValue::Int64(1)).unwrap_err();
        assert!(matches!(err, ColumnarError::TypeMismatch { .. }));

        let mut decimals = ColumnBuilder::new(DataType::Decimal32 { scale: -2 });
        assert!(decimals
            .push(&ScalarValue::Decimal32 { rep: 1, scale: -1 })
            .is_err());
    }

    #[test]
    fn dictionary_builder_deduplicates_in_first_seen_order() {
        let mut builder = ColumnBuilder::new(DataType::Dictionary(Box::new(DataType::String)));
        for value in ["b", "a", "b", "c", "a"] {
            builder.push(&ScalarValue::string(value)).unwrap();
        }
        builder.push_null();
        let column = builder.finish();

        let keys = column.dictionary_keys().unwrap();
        assert_eq!(keys.to_values(), vec![
            ScalarValue::string("b"),
            ScalarValue::string("a"),
            ScalarValue::string("c"),
        ]);
        assert_eq!(column.code(2), Some(0));
        assert_eq!(column.code(5), None);
        assert_eq!(column.value(4), ScalarValue::string("a"));
        assert_eq!(column.null_count(), 1);
    }

    #[test]
    fn table_builder_is_all_or_nothing_per_row() {
        let mut builder = TableBuilder::new(vec![DataType::Int32, DataType::Float64]);
        builder
            .append_row(&[ScalarValue::Int32(1), ScalarValue::Float64(0.5)])
            .unwrap();
        assert!(builder
            .append_row(&[ScalarValue::Int32(2), ScalarValue::string("x")])
            .is_err());
        assert!(builder.append_row(&[ScalarValue::Int32(2)]).is_err());
        builder
            .append_row(&[ScalarValue::Null, ScalarValue::Null])
            .unwrap();

        let table = builder.finish();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.row(1), vec![ScalarValue::Null, ScalarValue::Null]);
        assert_eq!(table.column(0).unwrap().null_count(), 1);
    }
}
