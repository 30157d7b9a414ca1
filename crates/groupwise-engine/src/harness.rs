//! Equivalence checks between the hash and sort groupers.
//!
//! The two groupers number groups differently, so outputs are compared after permuting both into
//! ascending key order. Keys must match exactly (NaN equal to NaN, `-0.0` equal to `0.0`); float
//! aggregates may differ by at most [`MAX_ULPS`] units in the last place.

use crate::aggregation::Aggregation;
use crate::error::{GroupByError, GroupByResult};
use crate::executor::Executor;
use crate::groupby::{GroupBy, GroupByOptions, GroupByOutput};
use crate::keys::KeyRows;
use groupwise_columnar::{Column, ScalarValue, Table};

pub const MAX_ULPS: u64 = 4;

/// `output` with its groups permuted into ascending key order.
pub fn sort_by_keys(output: &GroupByOutput) -> GroupByResult<GroupByOutput> {
    let keys = KeyRows::new(&output.unique_keys, None)?;
    let mut order: Vec<u32> = (0..output.num_groups() as u32).collect();
    Executor::serial().stable_sort_by(&mut order, |&a, &b| keys.cmp_rows(a as usize, b as usize));
    Ok(GroupByOutput {
        unique_keys: output.unique_keys.gather(&order),
        outputs: output.outputs.iter().map(|c| c.gather(&order)).collect(),
    })
}

/// Run `requests` through both groupers and compare the results.
pub fn cross_check(
    keys: &Table,
    requests: &[(&Column, Aggregation)],
    options: GroupByOptions,
) -> GroupByResult<()> {
    let run = |force_sort| {
        let options = GroupByOptions {
            force_sort,
            cross_check: false,
            ..options
        };
        GroupBy::new(keys, options).aggregate_requests(requests)
    };
    check_equivalent(&run(false)?, &run(true)?)
}

/// `Ok` when `a` and `b` agree up to a permutation of groups.
pub fn check_equivalent(a: &GroupByOutput, b: &GroupByOutput) -> GroupByResult<()> {
    if a.num_groups() != b.num_groups() {
        return Err(GroupByError::Divergence(format!(
            "{} groups vs {} groups",
            a.num_groups(),
            b.num_groups()
        )));
    }
    if a.outputs.len() != b.outputs.len() {
        return Err(GroupByError::Divergence(format!(
            "{} outputs vs {} outputs",
            a.outputs.len(),
            b.outputs.len()
        )));
    }

    let a = sort_by_keys(a)?;
    let b = sort_by_keys(b)?;
    for (idx, (x, y)) in a
        .unique_keys
        .columns()
        .iter()
        .zip(b.unique_keys.columns())
        .enumerate()
    {
        compare_columns(&format!("key column {idx}"), x, y, 0)?;
    }
    for (idx, (x, y)) in a.outputs.iter().zip(&b.outputs).enumerate() {
        compare_columns(&format!("output {idx}"), x, y, MAX_ULPS)?;
    }
    Ok(())
}

fn compare_columns(what: &str, a: &Column, b: &Column, max_ulps: u64) -> GroupByResult<()> {
    if a.data_type() != b.data_type() {
        return Err(GroupByError::Divergence(format!(
            "{what}: {} vs {}",
            a.data_type(),
            b.data_type()
        )));
    }
    for row in 0..a.len() {
        let (x, y) = (a.value(row), b.value(row));
        if !values_match(&x, &y, max_ulps) {
            return Err(GroupByError::Divergence(format!(
                "{what}, group {row}: {x:?} vs {y:?}"
            )));
        }
    }
    Ok(())
}

fn values_match(a: &ScalarValue, b: &ScalarValue, max_ulps: u64) -> bool {
    match (a, b) {
        (ScalarValue::Float64(x), ScalarValue::Float64(y)) => floats_match(*x, *y, max_ulps),
        (ScalarValue::Float32(x), ScalarValue::Float32(y)) => {
            floats_match(*x as f64, *y as f64, max_ulps)
        }
        _ => a == b,
    }
}

fn floats_match(a: f64, b: f64, max_ulps: u64) -> bool {
    if a.is_nan() || b.is_nan() {
        return a.is_nan() && b.is_nan();
    }
    a == b || ulp_distance(a, b) <= max_ulps
}

/// Distance between two finite-or-infinite floats in units in the last place.
fn ulp_distance(a: f64, b: f64) -> u64 {
    // Map the bit patterns onto a monotonic integer line, with both zeros at 0.
    let ordered = |v: f64| {
        let bits = v.to_bits() as i64;
        if bits < 0 {
            i64::MIN - bits
        } else {
            bits
        }
    };
    ordered(a).abs_diff(ordered(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ulp_distance_counts_representable_steps() {
        let one = 1.0f64;
        let next = f64::from_bits(one.to_bits() + 3);
        assert_eq!(ulp_distance(one, next), 3);
        assert_eq!(ulp_distance(0.0, -0.0), 0);
        let tiny = f64::MIN_POSITIVE;
        assert_eq!(ulp_distance(-tiny, tiny), 2 * tiny.to_bits());
    }

    #[test]
    fn float_matching_treats_nans_as_equal() {
        assert!(floats_match(f64::NAN, -f64::NAN, 0));
        assert!(!floats_match(f64::NAN, 1.0, MAX_ULPS));
        assert!(floats_match(f64::INFINITY, f64::INFINITY, 0));
        assert!(!floats_match(1.0, 1.0 + 1e-9, MAX_ULPS));
    }

    #[test]
    fn sort_by_keys_permutes_outputs_with_keys() {
        let output = GroupByOutput {
            unique_keys: Table::new(vec![Column::from_strs(&["b", "c", "a"])]).unwrap(),
            outputs: vec![Column::from_options(vec![Some(2i64), None, Some(1)])],
        };
        let sorted = sort_by_keys(&output).unwrap();
        assert_eq!(
            sorted.unique_keys.column(0).unwrap().to_values(),
            vec![
                ScalarValue::string("a"),
                ScalarValue::string("b"),
                ScalarValue::string("c")
            ]
        );
        assert_eq!(
            sorted.outputs[0].to_values(),
            vec![ScalarValue::Int64(1), ScalarValue::Int64(2), ScalarValue::Null]
        );
    }

    #[test]
    fn diverging_outputs_are_reported() {
        let keys = Table::new(vec![Column::from_vec(vec![1i32, 2])]).unwrap();
        let a = GroupByOutput {
            unique_keys: keys.clone(),
            outputs: vec![Column::from_vec(vec![10i32, 20])],
        };
        let b = GroupByOutput {
            unique_keys: keys.gather(&[1, 0]),
            outputs: vec![Column::from_vec(vec![20i32, 11])],
        };
        let err = check_equivalent(&a, &b).unwrap_err();
        assert!(matches!(err, GroupByError::Divergence(_)));

        let c = GroupByOutput {
            unique_keys: keys.gather(&[1, 0]),
            outputs: vec![Column::from_vec(vec![20i32, 10])],
        };
        check_equivalent(&a, &c).unwrap();
    }
}
