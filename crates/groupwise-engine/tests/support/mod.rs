#![allow(dead_code)]

use groupwise_columnar::{BitVec, Column, ScalarValue, Table};
use groupwise_engine::{
    harness, sort_by_keys, Aggregation, ExecutionMode, GroupBy, GroupByOptions, GroupByOutput,
};
use pretty_assertions::assert_eq;

/// Every grouper/executor combination a scenario must pass under.
pub fn all_options() -> Vec<GroupByOptions> {
    let mut out = Vec::new();
    for force_sort in [false, true] {
        for execution in [ExecutionMode::Serial, ExecutionMode::Parallel] {
            out.push(GroupByOptions {
                force_sort,
                execution,
                ..GroupByOptions::default()
            });
        }
    }
    out
}

pub fn keys_table(column: Column) -> Table {
    Table::new(vec![column]).expect("single key column")
}

/// Column from values plus a validity list of 0/1 flags.
pub fn with_validity(column: Column, flags: &[u8]) -> Column {
    let mask: BitVec = flags.iter().map(|&f| f != 0).collect();
    column.with_validity(mask).expect("mask length")
}

pub fn run(
    keys: &Table,
    values: &Column,
    aggregation: Aggregation,
    options: GroupByOptions,
) -> GroupByOutput {
    GroupBy::new(keys, options)
        .aggregate(values, aggregation)
        .expect("group by")
}

/// Group `keys`, aggregate `values` and compare against the expected output in ascending key
/// order, under every option combination. Also checks the two groupers against each other.
pub fn test_single_agg(
    keys: Column,
    values: Column,
    expected_keys: Column,
    expected_values: Column,
    aggregation: Aggregation,
) {
    let keys = keys_table(keys);
    for options in all_options() {
        let out = sort_by_keys(&run(&keys, &values, aggregation, options)).expect("sort");
        assert_eq!(
            out.unique_keys.column(0).unwrap().to_values(),
            expected_keys.to_values(),
            "keys under {options:?}"
        );
        assert_eq!(out.outputs.len(), 1);
        assert_eq!(
            out.outputs[0].data_type(),
            expected_values.data_type(),
            "output type under {options:?}"
        );
        assert_eq!(
            out.outputs[0].to_values(),
            expected_values.to_values(),
            "values under {options:?}"
        );
    }
    harness::cross_check(&keys, &[(&values, aggregation)], GroupByOptions::default())
        .expect("hash and sort groupers agree");
}

pub fn nulls(values: &[ScalarValue]) -> usize {
    values.iter().filter(|v| v.is_null()).count()
}
