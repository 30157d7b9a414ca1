#![forbid(unsafe_code)]

use crate::bitmap::BitVec;
use crate::error::{ColumnarError, ColumnarResult};
use crate::types::{DataType, NativeType, ScalarValue};
use std::sync::Arc;

/// Physical storage behind a [`Column`].
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnData {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Boolean(BitVec),
    TimestampMillis(Vec<i64>),
    Decimal32 { reps: Vec<i32>, scale: i32 },
    Decimal64 { reps: Vec<i64>, scale: i32 },
    /// UTF-8 bytes of every row back to back; row `i` spans `offsets[i]..offsets[i + 1]`.
    String { offsets: Vec<usize>, bytes: Vec<u8> },
    Dictionary { codes: Vec<u32>, keys: Arc<Column> },
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int8(v) => v.len(),
            ColumnData::Int16(v) => v.len(),
            ColumnData::Int32(v) => v.len(),
            ColumnData::Int64(v) => v.len(),
            ColumnData::UInt8(v) => v.len(),
            ColumnData::UInt16(v) => v.len(),
            ColumnData::UInt32(v) => v.len(),
            ColumnData::UInt64(v) => v.len(),
            ColumnData::Float32(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Boolean(v) => v.len(),
            ColumnData::TimestampMillis(v) => v.len(),
            ColumnData::Decimal32 { reps, .. } => reps.len(),
            ColumnData::Decimal64 { reps, .. } => reps.len(),
            ColumnData::String { offsets, .. } => offsets.len().saturating_sub(1),
            ColumnData::Dictionary { codes, .. } => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ColumnData::Int8(_) => DataType::Int8,
            ColumnData::Int16(_) => DataType::Int16,
            ColumnData::Int32(_) => DataType::Int32,
            ColumnData::Int64(_) => DataType::Int64,
            ColumnData::UInt8(_) => DataType::UInt8,
            ColumnData::UInt16(_) => DataType::UInt16,
            ColumnData::UInt32(_) => DataType::UInt32,
            ColumnData::UInt64(_) => DataType::UInt64,
            ColumnData::Float32(_) => DataType::Float32,
            ColumnData::Float64(_) => DataType::Float64,
            ColumnData::Boolean(_) => DataType::Boolean,
            ColumnData::TimestampMillis(_) => DataType::TimestampMillis,
            ColumnData::Decimal32 { scale, .. } => DataType::Decimal32 { scale: *scale },
            ColumnData::Decimal64 { scale, .. } => DataType::Decimal64 { scale: *scale },
            ColumnData::String { .. } => DataType::String,
            ColumnData::Dictionary { keys, .. } => DataType::Dictionary(Box::new(keys.data_type())),
        }
    }

    /// Pick rows by index; `None` produces a placeholder slot the caller marks null.
    fn take(&self, indices: &[Option<usize>]) -> ColumnData {
        fn take_vec<T: Copy + Default>(values: &[T], indices: &[Option<usize>]) -> Vec<T> {
            indices
                .iter()
                .map(|idx| idx.map(|i| values[i]).unwrap_or_default())
                .collect()
        }

        match self {
            ColumnData::Int8(v) => ColumnData::Int8(take_vec(v, indices)),
            ColumnData::Int16(v) => ColumnData::Int16(take_vec(v, indices)),
            ColumnData::Int32(v) => ColumnData::Int32(take_vec(v, indices)),
            ColumnData::Int64(v) => ColumnData::Int64(take_vec(v, indices)),
            ColumnData::UInt8(v) => ColumnData::UInt8(take_vec(v, indices)),
            ColumnData::UInt16(v) => ColumnData::UInt16(take_vec(v, indices)),
            ColumnData::UInt32(v) => ColumnData::UInt32(take_vec(v, indices)),
            ColumnData::UInt64(v) => ColumnData::UInt64(take_vec(v, indices)),
            ColumnData::Float32(v) => ColumnData::Float32(take_vec(v, indices)),
            ColumnData::Float64(v) => ColumnData::Float64(take_vec(v, indices)),
            ColumnData::Boolean(bits) => ColumnData::Boolean(
                indices
                    .iter()
                    .map(|idx| idx.is_some_and(|i| bits.get(i)))
                    .collect(),
            ),
            ColumnData::TimestampMillis(v) => ColumnData::TimestampMillis(take_vec(v, indices)),
            ColumnData::Decimal32 { reps, scale } => ColumnData::Decimal32 {
                reps: take_vec(reps, indices),
                scale: *scale,
            },
            ColumnData::Decimal64 { reps, scale } => ColumnData::Decimal64 {
                reps: take_vec(reps, indices),
                scale: *scale,
            },
            ColumnData::String { offsets, bytes } => {
                let mut out_offsets = Vec::with_capacity(indices.len() + 1);
                let mut out_bytes = Vec::new();
                out_offsets.push(0);
                for idx in indices {
                    if let Some(i) = *idx {
                        out_bytes.extend_from_slice(&bytes[offsets[i]..offsets[i + 1]]);
                    }
                    out_offsets.push(out_bytes.len());
                }
                ColumnData::String {
                    offsets: out_offsets,
                    bytes: out_bytes,
                }
            }
            ColumnData::Dictionary { codes, keys } => ColumnData::Dictionary {
                codes: take_vec(codes, indices),
                // Outputs own their keys; never share the input's child column.
                keys: Arc::new(keys.as_ref().clone()),
            },
        }
    }
}

/// A typed, length-N column with an optional validity mask.
///
/// Without a mask every row is valid. With a mask, bit `i = 0` marks row `i` null and the element
/// stored at that slot is unspecified.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    data: ColumnData,
    validity: Option<BitVec>,
}

impl Column {
    /// Wrap raw storage, checking the mask length and every valid dictionary code.
    pub fn from_data(data: ColumnData, validity: Option<BitVec>) -> ColumnarResult<Self> {
        if let Some(mask) = &validity {
            if mask.len() != data.len() {
                return Err(ColumnarError::LengthMismatch {
                    expected: data.len(),
                    actual: mask.len(),
                });
            }
        }
        if let ColumnData::String { offsets, bytes } = &data {
            let well_formed = offsets.first() == Some(&0)
                && offsets.windows(2).all(|w| w[0] <= w[1])
                && offsets.last() == Some(&bytes.len());
            if !well_formed {
                return Err(ColumnarError::LengthMismatch {
                    expected: bytes.len(),
                    actual: offsets.last().copied().unwrap_or(0),
                });
            }
        }
        if let ColumnData::Dictionary { codes, keys } = &data {
            for (row, &code) in codes.iter().enumerate() {
                let valid = validity.as_ref().map_or(true, |mask| mask.get(row));
                if valid && code as usize >= keys.len() {
                    return Err(ColumnarError::DictionaryCodeOutOfBounds {
                        row,
                        code,
                        keys: keys.len(),
                    });
                }
            }
        }
        Ok(Self { data, validity })
    }

    pub(crate) fn from_parts(data: ColumnData, validity: BitVec) -> Self {
        debug_assert_eq!(data.len(), validity.len());
        Self {
            data,
            validity: (!validity.all_true()).then_some(validity),
        }
    }

    pub fn from_vec<T: NativeType>(values: Vec<T>) -> Self {
        Self {
            data: T::into_data(values),
            validity: None,
        }
    }

    pub fn from_options<T: NativeType>(values: Vec<Option<T>>) -> Self {
        let validity: BitVec = values.iter().map(Option::is_some).collect();
        let values = values.into_iter().map(Option::unwrap_or_default).collect();
        Self {
            data: T::into_data(values),
            validity: (!validity.all_true()).then_some(validity),
        }
    }

    pub fn from_bools(values: Vec<bool>) -> Self {
        Self {
            data: ColumnData::Boolean(BitVec::from_bools(&values)),
            validity: None,
        }
    }

    pub fn from_strs<S: AsRef<str>>(values: &[S]) -> Self {
        let options: Vec<Option<&str>> = values.iter().map(|s| Some(s.as_ref())).collect();
        Self::from_opt_strs(&options)
    }

    pub fn from_opt_strs(values: &[Option<&str>]) -> Self {
        let mut offsets = Vec::with_capacity(values.len() + 1);
        let mut bytes = Vec::new();
        offsets.push(0);
        for value in values {
            if let Some(s) = value {
                bytes.extend_from_slice(s.as_bytes());
            }
            offsets.push(bytes.len());
        }
        let validity: BitVec = values.iter().map(Option::is_some).collect();
        Self {
            data: ColumnData::String { offsets, bytes },
            validity: (!validity.all_true()).then_some(validity),
        }
    }

    pub fn timestamp_millis(values: Vec<i64>) -> Self {
        Self {
            data: ColumnData::TimestampMillis(values),
            validity: None,
        }
    }

    pub fn decimal32(reps: Vec<i32>, scale: i32) -> Self {
        Self {
            data: ColumnData::Decimal32 { reps, scale },
            validity: None,
        }
    }

    pub fn decimal64(reps: Vec<i64>, scale: i32) -> Self {
        Self {
            data: ColumnData::Decimal64 { reps, scale },
            validity: None,
        }
    }

    pub fn dictionary(codes: Vec<u32>, keys: Column) -> ColumnarResult<Self> {
        Self::from_data(
            ColumnData::Dictionary {
                codes,
                keys: Arc::new(keys),
            },
            None,
        )
    }

    /// Replace the validity mask. The mask must have one bit per row.
    pub fn with_validity(self, validity: BitVec) -> ColumnarResult<Self> {
        Self::from_data(self.data, Some(validity))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn validity(&self) -> Option<&BitVec> {
        self.validity.as_ref()
    }

    pub fn null_count(&self) -> usize {
        self.validity.as_ref().map_or(0, BitVec::count_zeros)
    }

    /// Validity of this column's own slot `row` (`true` when the column has no mask).
    pub fn is_valid(&self, row: usize) -> bool {
        self.validity.as_ref().map_or(true, |mask| mask.get(row))
    }

    /// Validity after decoding: a dictionary row is null when its code slot is null or the key
    /// it references is null.
    pub fn is_logically_valid(&self, row: usize) -> bool {
        if !self.is_valid(row) {
            return false;
        }
        match &self.data {
            ColumnData::Dictionary { codes, keys } => keys.is_logically_valid(codes[row] as usize),
            _ => true,
        }
    }

    /// Logical validity of every row, or `None` when no row is null.
    pub fn logical_validity(&self) -> Option<BitVec> {
        match &self.data {
            ColumnData::Dictionary { keys, .. } if keys.has_logical_nulls() => {
                Some((0..self.len()).map(|row| self.is_logically_valid(row)).collect())
            }
            _ => self.validity.clone().filter(|mask| !mask.all_true()),
        }
    }

    fn has_logical_nulls(&self) -> bool {
        if self.null_count() > 0 {
            return true;
        }
        match &self.data {
            ColumnData::Dictionary { keys, .. } => keys.has_logical_nulls(),
            _ => false,
        }
    }

    /// Typed view of a fixed-width column's storage.
    pub fn values<T: NativeType>(&self) -> Option<&[T]> {
        T::slice(&self.data)
    }

    /// Byte span of a string row, or `None` for non-string columns and null rows.
    pub fn bytes(&self, row: usize) -> Option<&[u8]> {
        match &self.data {
            ColumnData::String { offsets, bytes } if self.is_valid(row) => {
                Some(&bytes[offsets[row]..offsets[row + 1]])
            }
            _ => None,
        }
    }

    pub fn str_value(&self, row: usize) -> Option<&str> {
        self.bytes(row).and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Dictionary code at `row`, or `None` for non-dictionary columns and null rows.
    pub fn code(&self, row: usize) -> Option<u32> {
        match &self.data {
            ColumnData::Dictionary { codes, .. } if self.is_valid(row) => Some(codes[row]),
            _ => None,
        }
    }

    pub fn dictionary_keys(&self) -> Option<&Column> {
        match &self.data {
            ColumnData::Dictionary { keys, .. } => Some(keys),
            _ => None,
        }
    }

    /// Decoded element at `row`; [`ScalarValue::Null`] when the row is null.
    pub fn value(&self, row: usize) -> ScalarValue {
        if !self.is_valid(row) {
            return ScalarValue::Null;
        }
        match &self.data {
            ColumnData::Int8(v) => ScalarValue::Int8(v[row]),
            ColumnData::Int16(v) => ScalarValue::Int16(v[row]),
            ColumnData::Int32(v) => ScalarValue::Int32(v[row]),
            ColumnData::Int64(v) => ScalarValue::Int64(v[row]),
            ColumnData::UInt8(v) => ScalarValue::UInt8(v[row]),
            ColumnData::UInt16(v) => ScalarValue::UInt16(v[row]),
            ColumnData::UInt32(v) => ScalarValue::UInt32(v[row]),
            ColumnData::UInt64(v) => ScalarValue::UInt64(v[row]),
            ColumnData::Float32(v) => ScalarValue::Float32(v[row]),
            ColumnData::Float64(v) => ScalarValue::Float64(v[row]),
            ColumnData::Boolean(bits) => ScalarValue::Boolean(bits.get(row)),
            ColumnData::TimestampMillis(v) => ScalarValue::TimestampMillis(v[row]),
            ColumnData::Decimal32 { reps, scale } => ScalarValue::Decimal32 {
                rep: reps[row],
                scale: *scale,
            },
            ColumnData::Decimal64 { reps, scale } => ScalarValue::Decimal64 {
                rep: reps[row],
                scale: *scale,
            },
            ColumnData::String { offsets, bytes } => ScalarValue::String(Arc::<str>::from(
                String::from_utf8_lossy(&bytes[offsets[row]..offsets[row + 1]]).as_ref(),
            )),
            ColumnData::Dictionary { codes, keys } => keys.value(codes[row] as usize),
        }
    }

    pub fn to_values(&self) -> Vec<ScalarValue> {
        (0..self.len()).map(|row| self.value(row)).collect()
    }

    /// New column holding rows `indices[0], indices[1], ...` of this one.
    pub fn gather(&self, indices: &[u32]) -> Column {
        let indices: Vec<Option<usize>> = indices.iter().map(|&i| Some(i as usize)).collect();
        self.take(&indices)
    }

    fn take(&self, indices: &[Option<usize>]) -> Column {
        let data = self.data.take(indices);
        let validity: BitVec = indices
            .iter()
            .map(|idx| idx.is_some_and(|i| self.is_valid(i)))
            .collect();
        Column {
            data,
            validity: (!validity.all_true()).then_some(validity),
        }
    }

    /// Materialize a dictionary column into its logical values. Other columns are cloned.
    pub fn decode_dictionary(&self) -> Column {
        match &self.data {
            ColumnData::Dictionary { codes, keys } => {
                let indices: Vec<Option<usize>> = codes
                    .iter()
                    .enumerate()
                    .map(|(row, &code)| self.is_valid(row).then_some(code as usize))
                    .collect();
                keys.decode_dictionary().take(&indices)
            }
            _ => self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_build_a_mask_only_when_needed() {
        let dense = Column::from_options(vec![Some(1i32), Some(2)]);
        assert!(dense.validity().is_none());

        let sparse = Column::from_options(vec![Some(1i32), None, Some(3)]);
        assert_eq!(sparse.null_count(), 1);
        assert!(!sparse.is_valid(1));
        assert_eq!(sparse.value(1), ScalarValue::Null);
        assert_eq!(sparse.value(2), ScalarValue::Int32(3));
    }

    #[test]
    fn strings_expose_byte_spans() {
        let col = Column::from_opt_strs(&[Some("ab"), None, Some(""), Some("xyz")]);
        assert_eq!(col.len(), 4);
        assert_eq!(col.bytes(0), Some(&b"ab"[..]));
        assert_eq!(col.bytes(1), None);
        assert_eq!(col.bytes(2), Some(&b""[..]));
        assert_eq!(col.str_value(3), Some("xyz"));
    }

    #[test]
    fn dictionary_rejects_out_of_bounds_codes() {
        let keys = Column::from_vec(vec![10i64, 20]);
        let err = Column::dictionary(vec![0, 2], keys).unwrap_err();
        assert_eq!(
            err,
            ColumnarError::DictionaryCodeOutOfBounds {
                row: 1,
                code: 2,
                keys: 2
            }
        );
    }

    #[test]
    fn dictionary_codes_under_nulls_are_not_checked() {
        let keys = Column::from_vec(vec![10i64]);
        let col = Column::from_data(
            ColumnData::Dictionary {
                codes: vec![0, 7],
                keys: Arc::new(keys),
            },
            Some(BitVec::from_bools(&[true, false])),
        )
        .unwrap();
        assert_eq!(col.code(0), Some(0));
        assert_eq!(col.code(1), None);
        assert_eq!(
            col.decode_dictionary().to_values(),
            vec![ScalarValue::Int64(10), ScalarValue::Null]
        );
    }

    #[test]
    fn dictionary_decodes_through_null_keys() {
        let keys = Column::from_options(vec![Some(1.5f64), None]);
        let col = Column::dictionary(vec![1, 0, 1], keys).unwrap();
        assert_eq!(
            col.data_type(),
            DataType::Dictionary(Box::new(DataType::Float64))
        );
        assert!(col.is_valid(0));
        assert!(!col.is_logically_valid(0));
        assert_eq!(
            col.logical_validity(),
            Some(BitVec::from_bools(&[false, true, false]))
        );
        assert_eq!(col.decode_dictionary(), Column::from_options(vec![None, Some(1.5f64), None]));
    }

    #[test]
    fn gather_copies_rows_and_validity() {
        let col = Column::from_opt_strs(&[Some("a"), None, Some("c")]);
        let picked = col.gather(&[2, 1, 0, 2]);
        assert_eq!(
            picked.to_values(),
            vec![
                ScalarValue::string("c"),
                ScalarValue::Null,
                ScalarValue::string("a"),
                ScalarValue::string("c"),
            ]
        );
    }

    #[test]
    fn mask_length_must_match() {
        let err = Column::from_vec(vec![1u8, 2, 3])
            .with_validity(BitVec::with_len_all_true(2))
            .unwrap_err();
        assert_eq!(
            err,
            ColumnarError::LengthMismatch {
                expected: 3,
                actual: 2
            }
        );
    }
}
