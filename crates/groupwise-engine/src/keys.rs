//! Row-wise hashing, equality and ordering over a table of key columns.
//!
//! Both groupers see key columns through [`KeyRows`], so the two share one definition of "same
//! key": integers by value, floats by value with `-0.0 == 0.0` and every NaN equal (ordered last),
//! strings by bytes, dictionaries by their decoded key.

use crate::error::{GroupByError, GroupByResult};
use crate::executor::Executor;
use groupwise_columnar::{BitVec, ColumnData, Table};
use ordered_float::OrderedFloat;
use std::cmp::Ordering;

pub(crate) fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// FNV-1a; stable across runs, not cryptographic.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in bytes {
        h ^= *b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

fn combine(seed: u64, h: u64) -> u64 {
    seed.rotate_left(5) ^ h.wrapping_mul(0x9E3779B97F4A7C15)
}

/// Canonical bit pattern so that values comparing equal also hash equal.
fn float_bits(v: f64) -> u64 {
    if v.is_nan() {
        f64::NAN.to_bits()
    } else if v == 0.0 {
        0
    } else {
        v.to_bits()
    }
}

/// Borrowed, type-resolved view of one key column.
#[derive(Clone, Debug)]
enum KeyColumn<'a> {
    I8(&'a [i8]),
    I16(&'a [i16]),
    I32(&'a [i32]),
    I64(&'a [i64]),
    U8(&'a [u8]),
    U16(&'a [u16]),
    U32(&'a [u32]),
    U64(&'a [u64]),
    F32(&'a [f32]),
    F64(&'a [f64]),
    Bool(&'a BitVec),
    Str { offsets: &'a [usize], bytes: &'a [u8] },
    Dict { codes: &'a [u32], keys: Box<KeyColumn<'a>> },
}

impl<'a> KeyColumn<'a> {
    fn new(data: &'a ColumnData, nested: bool) -> Option<Self> {
        Some(match data {
            ColumnData::Int8(v) => KeyColumn::I8(v),
            ColumnData::Int16(v) => KeyColumn::I16(v),
            ColumnData::Int32(v) => KeyColumn::I32(v),
            ColumnData::Int64(v) | ColumnData::TimestampMillis(v) => KeyColumn::I64(v),
            ColumnData::UInt8(v) => KeyColumn::U8(v),
            ColumnData::UInt16(v) => KeyColumn::U16(v),
            ColumnData::UInt32(v) => KeyColumn::U32(v),
            ColumnData::UInt64(v) => KeyColumn::U64(v),
            ColumnData::Float32(v) => KeyColumn::F32(v),
            ColumnData::Float64(v) => KeyColumn::F64(v),
            ColumnData::Boolean(v) => KeyColumn::Bool(v),
            ColumnData::Decimal32 { reps, .. } => KeyColumn::I32(reps),
            ColumnData::Decimal64 { reps, .. } => KeyColumn::I64(reps),
            ColumnData::String { offsets, bytes } => KeyColumn::Str { offsets, bytes },
            // Only one level of dictionary indirection has a hasher.
            ColumnData::Dictionary { .. } if nested => return None,
            ColumnData::Dictionary { codes, keys } => KeyColumn::Dict {
                codes,
                keys: Box::new(KeyColumn::new(keys.data(), true)?),
            },
        })
    }

    fn hash_row(&self, row: usize) -> u64 {
        match self {
            KeyColumn::I8(v) => splitmix64(v[row] as i64 as u64),
            KeyColumn::I16(v) => splitmix64(v[row] as i64 as u64),
            KeyColumn::I32(v) => splitmix64(v[row] as i64 as u64),
            KeyColumn::I64(v) => splitmix64(v[row] as u64),
            KeyColumn::U8(v) => splitmix64(v[row] as u64),
            KeyColumn::U16(v) => splitmix64(v[row] as u64),
            KeyColumn::U32(v) => splitmix64(v[row] as u64),
            KeyColumn::U64(v) => splitmix64(v[row]),
            KeyColumn::F32(v) => splitmix64(float_bits(v[row] as f64)),
            KeyColumn::F64(v) => splitmix64(float_bits(v[row])),
            KeyColumn::Bool(v) => splitmix64(v.get(row) as u64),
            KeyColumn::Str { offsets, bytes } => {
                splitmix64(fnv1a(&bytes[offsets[row]..offsets[row + 1]]))
            }
            KeyColumn::Dict { codes, keys } => keys.hash_row(codes[row] as usize),
        }
    }

    fn cmp_rows(&self, a: usize, b: usize) -> Ordering {
        match self {
            KeyColumn::I8(v) => v[a].cmp(&v[b]),
            KeyColumn::I16(v) => v[a].cmp(&v[b]),
            KeyColumn::I32(v) => v[a].cmp(&v[b]),
            KeyColumn::I64(v) => v[a].cmp(&v[b]),
            KeyColumn::U8(v) => v[a].cmp(&v[b]),
            KeyColumn::U16(v) => v[a].cmp(&v[b]),
            KeyColumn::U32(v) => v[a].cmp(&v[b]),
            KeyColumn::U64(v) => v[a].cmp(&v[b]),
            KeyColumn::F32(v) => OrderedFloat(v[a]).cmp(&OrderedFloat(v[b])),
            KeyColumn::F64(v) => OrderedFloat(v[a]).cmp(&OrderedFloat(v[b])),
            KeyColumn::Bool(v) => v.get(a).cmp(&v.get(b)),
            KeyColumn::Str { offsets, bytes } => bytes[offsets[a]..offsets[a + 1]]
                .cmp(&bytes[offsets[b]..offsets[b + 1]]),
            KeyColumn::Dict { codes, keys } => {
                let (ca, cb) = (codes[a] as usize, codes[b] as usize);
                if ca == cb {
                    Ordering::Equal
                } else {
                    keys.cmp_rows(ca, cb)
                }
            }
        }
    }

    fn eq_rows(&self, a: usize, b: usize) -> bool {
        match self {
            KeyColumn::I8(v) => v[a] == v[b],
            KeyColumn::I16(v) => v[a] == v[b],
            KeyColumn::I32(v) => v[a] == v[b],
            KeyColumn::I64(v) => v[a] == v[b],
            KeyColumn::U8(v) => v[a] == v[b],
            KeyColumn::U16(v) => v[a] == v[b],
            KeyColumn::U32(v) => v[a] == v[b],
            KeyColumn::U64(v) => v[a] == v[b],
            KeyColumn::F32(v) => OrderedFloat(v[a]) == OrderedFloat(v[b]),
            KeyColumn::F64(v) => OrderedFloat(v[a]) == OrderedFloat(v[b]),
            KeyColumn::Bool(v) => v.get(a) == v.get(b),
            KeyColumn::Str { offsets, bytes } => {
                bytes[offsets[a]..offsets[a + 1]] == bytes[offsets[b]..offsets[b + 1]]
            }
            KeyColumn::Dict { codes, keys } => {
                let (ca, cb) = (codes[a] as usize, codes[b] as usize);
                ca == cb || keys.eq_rows(ca, cb)
            }
        }
    }
}

/// All key columns of one group-by call, plus which rows take part in grouping.
///
/// A row takes part when every key column is (logically) valid there and the optional row mask
/// selects it.
#[derive(Debug)]
pub(crate) struct KeyRows<'a> {
    columns: Vec<KeyColumn<'a>>,
    participating: Option<BitVec>,
    rows: usize,
}

impl<'a> KeyRows<'a> {
    pub(crate) fn new(keys: &'a Table, row_mask: Option<&BitVec>) -> GroupByResult<Self> {
        if keys.num_columns() == 0 {
            return Err(GroupByError::NoKeyColumns);
        }

        let rows = keys.num_rows();
        let mut columns = Vec::with_capacity(keys.num_columns());
        let mut participating: Option<BitVec> = None;
        for (idx, column) in keys.columns().iter().enumerate() {
            let view = KeyColumn::new(column.data(), false).ok_or_else(|| {
                GroupByError::UnsupportedKeyType {
                    column: idx,
                    data_type: column.data_type(),
                }
            })?;
            columns.push(view);

            if let Some(validity) = column.logical_validity() {
                match participating.as_mut() {
                    Some(mask) => mask.and_inplace(&validity),
                    None => participating = Some(validity),
                }
            }
        }

        if let Some(selected) = row_mask {
            if selected.len() != rows {
                return Err(GroupByError::LengthMismatch {
                    expected: rows,
                    actual: selected.len(),
                });
            }
            match participating.as_mut() {
                Some(mask) => mask.and_inplace(selected),
                None => participating = Some(selected.clone()),
            }
        }

        Ok(Self {
            columns,
            participating: participating.filter(|mask| !mask.all_true()),
            rows,
        })
    }

    pub(crate) fn num_rows(&self) -> usize {
        self.rows
    }

    pub(crate) fn participates(&self, row: usize) -> bool {
        self.participating.as_ref().map_or(true, |mask| mask.get(row))
    }

    /// Rows that take part in grouping, in ascending order.
    pub(crate) fn participating_rows(&self) -> Vec<u32> {
        match &self.participating {
            Some(mask) => mask.iter_ones().map(|row| row as u32).collect(),
            None => (0..self.rows as u32).collect(),
        }
    }

    pub(crate) fn hash_row(&self, row: usize) -> u64 {
        self.columns
            .iter()
            .fold(0u64, |seed, column| combine(seed, column.hash_row(row)))
    }

    /// Hash of every row. Rows that do not take part hash to 0 without touching their slots,
    /// which may hold out-of-range dictionary codes.
    pub(crate) fn hash_rows(&self, executor: &Executor) -> Vec<u64> {
        executor.tabulate(self.rows, |row| {
            if self.participates(row) {
                self.hash_row(row)
            } else {
                0
            }
        })
    }

    pub(crate) fn eq_rows(&self, a: usize, b: usize) -> bool {
        self.columns.iter().all(|column| column.eq_rows(a, b))
    }

    /// Lexicographic order over the key tuple.
    pub(crate) fn cmp_rows(&self, a: usize, b: usize) -> Ordering {
        for column in &self.columns {
            let ord = column.cmp_rows(a, b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}
