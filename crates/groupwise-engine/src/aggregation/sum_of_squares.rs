//! SUM_OF_SQUARES kernels.
//!
//! Integer inputs square and accumulate in wrapping 64-bit arithmetic. Float inputs are widened
//! to `f64` and each group is summed pairwise over its rows in ascending input order, with leaf
//! blocks of [`PAIRWISE_LEAF`] rows. A group without a valid value produces null.

use super::{AggregationKind, KernelEntry, KernelFn, KernelTable, TypeClass};
use crate::error::{GroupByError, GroupByResult};
use crate::executor::Executor;
use crate::grouping::Grouping;
use groupwise_columnar::{BitVec, Column, ColumnData, DataType, NativeType};

const PAIRWISE_LEAF: usize = 8;

static KERNELS: [KernelEntry; 10] = [
    (TypeClass::Exact(DataType::Int8), DataType::Int64, integer::<i8> as KernelFn),
    (TypeClass::Exact(DataType::Int16), DataType::Int64, integer::<i16> as KernelFn),
    (TypeClass::Exact(DataType::Int32), DataType::Int64, integer::<i32> as KernelFn),
    (TypeClass::Exact(DataType::Int64), DataType::Int64, integer::<i64> as KernelFn),
    (TypeClass::Exact(DataType::UInt8), DataType::Int64, integer::<u8> as KernelFn),
    (TypeClass::Exact(DataType::UInt16), DataType::Int64, integer::<u16> as KernelFn),
    (TypeClass::Exact(DataType::UInt32), DataType::Int64, integer::<u32> as KernelFn),
    (TypeClass::Exact(DataType::UInt64), DataType::Int64, integer::<u64> as KernelFn),
    (TypeClass::Exact(DataType::Float32), DataType::Float64, floating::<f32> as KernelFn),
    (TypeClass::Exact(DataType::Float64), DataType::Float64, floating::<f64> as KernelFn),
];

pub(crate) static SUM_OF_SQUARES: KernelTable = KernelTable::new(&KERNELS);

trait IntegerValue: NativeType {
    /// Two's-complement 64-bit view; `u64` is reinterpreted, which squares to the same value
    /// modulo 2^64.
    fn as_i64(self) -> i64;
}

trait FloatValue: NativeType {
    fn as_f64(self) -> f64;
}

macro_rules! impl_integer_value {
    ($($t:ty),*) => {
        $(impl IntegerValue for $t {
            #[inline]
            fn as_i64(self) -> i64 {
                self as i64
            }
        })*
    };
}

impl_integer_value!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FloatValue for f32 {
    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl FloatValue for f64 {
    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}

/// Typed element access for a plain column or a dictionary over one.
struct Values<'a, T> {
    values: &'a [T],
    codes: Option<&'a [u32]>,
    validity: Option<BitVec>,
}

impl<'a, T: NativeType> Values<'a, T> {
    fn of(column: &'a Column) -> GroupByResult<Self> {
        let (values, codes) = match column.data() {
            ColumnData::Dictionary { codes, keys } => {
                (keys.values::<T>(), Some(codes.as_slice()))
            }
            _ => (column.values::<T>(), None),
        };
        let values = values.ok_or_else(|| GroupByError::UnsupportedAggregationForType {
            kind: AggregationKind::SumOfSquares,
            data_type: column.data_type(),
        })?;
        Ok(Self {
            values,
            codes,
            validity: column.logical_validity(),
        })
    }

    #[inline]
    fn get(&self, row: usize) -> Option<T> {
        if !self.validity.as_ref().map_or(true, |mask| mask.get(row)) {
            return None;
        }
        Some(match self.codes {
            Some(codes) => self.values[codes[row] as usize],
            None => self.values[row],
        })
    }
}

fn integer<T: IntegerValue>(
    column: &Column,
    grouping: &Grouping,
    executor: &Executor,
) -> GroupByResult<Column> {
    let values = Values::<T>::of(column)?;
    let grouped = grouping.grouped_rows();
    let sums = executor.reduce_segments(grouping.group_offsets(), |_, range| {
        grouped[range]
            .iter()
            .filter_map(|&row| values.get(row as usize))
            .fold(None, |acc: Option<i64>, v| {
                let v = v.as_i64();
                Some(acc.unwrap_or(0).wrapping_add(v.wrapping_mul(v)))
            })
    });
    Ok(Column::from_options(sums))
}

fn floating<T: FloatValue>(
    column: &Column,
    grouping: &Grouping,
    executor: &Executor,
) -> GroupByResult<Column> {
    let values = Values::<T>::of(column)?;
    let grouped = grouping.grouped_rows();
    let square = |row: u32| values.get(row as usize).map(|v| v.as_f64() * v.as_f64());
    let sums = executor.reduce_segments(grouping.group_offsets(), |_, range| {
        let rows = &grouped[range];
        if rows.iter().all(|&row| square(row).is_none()) {
            return None;
        }
        Some(pairwise_sum(rows, &square))
    });
    Ok(Column::from_options(sums))
}

fn pairwise_sum(rows: &[u32], square: &impl Fn(u32) -> Option<f64>) -> f64 {
    if rows.len() <= PAIRWISE_LEAF {
        return rows
            .iter()
            .filter_map(|&row| square(row))
            .fold(0.0, |acc, v| acc + v);
    }
    let (left, right) = rows.split_at(rows.len() / 2);
    pairwise_sum(left, square) + pairwise_sum(right, square)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairwise_sum_skips_nulls() {
        let rows: Vec<u32> = (0..37).collect();
        let sum = pairwise_sum(&rows, &|row| (row % 3 != 0).then_some(row as f64));
        let expected: f64 = (0..37).filter(|r| r % 3 != 0).map(|r| r as f64).sum();
        assert_eq!(sum, expected);
    }

    #[test]
    fn u64_squares_wrap_like_two_complement() {
        let v = u64::MAX.as_i64();
        assert_eq!(v, -1);
        assert_eq!(v.wrapping_mul(v), 1);
        assert_eq!((1u64 << 32).as_i64().wrapping_mul((1u64 << 32).as_i64()), 0);
    }
}
