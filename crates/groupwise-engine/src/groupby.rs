use crate::aggregation::{resolve, Aggregation, AggregationKind};
use crate::error::{GroupByError, GroupByResult};
use crate::executor::{ExecutionMode, Executor};
use crate::grouping::{Grouping, GroupingStrategy};
use crate::keys::KeyRows;
use groupwise_columnar::{BitVec, Column, Table};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GroupByOptions {
    /// Group with the sort-based grouper instead of the hash-based one.
    pub force_sort: bool,
    /// The caller guarantees key rows are already in ascending order, so the sort grouper can
    /// skip its sort. Checked in debug builds.
    pub keys_presorted: bool,
    pub execution: ExecutionMode,
    /// Debug builds only: also run the other grouper and fail with
    /// [`GroupByError::Divergence`] if the results disagree.
    pub cross_check: bool,
}

impl GroupByOptions {
    pub fn strategy(&self) -> GroupingStrategy {
        if self.force_sort {
            GroupingStrategy::Sort
        } else {
            GroupingStrategy::Hash
        }
    }
}

/// Unique key tuples plus one aggregate column per request, aligned by group.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupByOutput {
    pub unique_keys: Table,
    pub outputs: Vec<Column>,
}

impl GroupByOutput {
    pub fn num_groups(&self) -> usize {
        self.unique_keys.num_rows()
    }
}

/// A group-by over one key table, reusable across aggregation requests.
///
/// ```ignore
/// let out = GroupBy::new(&keys, GroupByOptions::default())
///     .aggregate(&values, Aggregation::sum_of_squares())?;
/// ```
#[derive(Clone, Debug)]
pub struct GroupBy<'a> {
    keys: &'a Table,
    options: GroupByOptions,
    row_mask: Option<BitVec>,
}

impl<'a> GroupBy<'a> {
    pub fn new(keys: &'a Table, options: GroupByOptions) -> Self {
        Self {
            keys,
            options,
            row_mask: None,
        }
    }

    /// Only rows whose mask bit is set take part; the others are treated like null-keyed rows.
    /// The mask must have one bit per key row.
    pub fn with_row_mask(mut self, mask: BitVec) -> Self {
        self.row_mask = Some(mask);
        self
    }

    /// Like [`GroupBy::with_row_mask`], from a list of row indices.
    pub fn with_selected_rows(self, rows: &[usize]) -> GroupByResult<Self> {
        let num_rows = self.keys.num_rows();
        let mut mask = BitVec::with_len_all_false(num_rows);
        for &row in rows {
            if row >= num_rows {
                return Err(GroupByError::LengthMismatch {
                    expected: num_rows,
                    actual: row + 1,
                });
            }
            mask.set(row, true);
        }
        Ok(self.with_row_mask(mask))
    }

    pub fn options(&self) -> &GroupByOptions {
        &self.options
    }

    fn executor(&self) -> Executor {
        Executor::new(self.options.execution)
    }

    fn key_rows(&self) -> GroupByResult<KeyRows<'a>> {
        KeyRows::new(self.keys, self.row_mask.as_ref())
    }

    /// The grouping artifacts alone, without running any aggregation.
    pub fn grouping(&self) -> GroupByResult<Grouping> {
        let key_rows = self.key_rows()?;
        Grouping::build(
            &key_rows,
            self.options.strategy(),
            self.options.keys_presorted,
            &self.executor(),
        )
    }

    pub fn aggregate(
        &self,
        values: &Column,
        aggregation: Aggregation,
    ) -> GroupByResult<GroupByOutput> {
        self.aggregate_requests(&[(values, aggregation)])
    }

    /// Run every `(value column, aggregation)` request against a single grouping.
    ///
    /// All requests are validated before any work starts; on error nothing is computed.
    pub fn aggregate_requests(
        &self,
        requests: &[(&Column, Aggregation)],
    ) -> GroupByResult<GroupByOutput> {
        let rows = self.keys.num_rows();
        let mut resolved = Vec::with_capacity(requests.len());
        for (values, aggregation) in requests {
            if values.len() != rows {
                return Err(GroupByError::LengthMismatch {
                    expected: rows,
                    actual: values.len(),
                });
            }
            resolved.push(resolve(aggregation.kind(), &values.data_type())?);
        }
        let key_rows = self.key_rows()?;

        let executor = self.executor();
        let strategy = self.options.strategy();
        let grouping =
            Grouping::build(&key_rows, strategy, self.options.keys_presorted, &executor)?;
        log::debug!(
            "group by: {:?} grouper, {:?} execution, {} rows, {} groups, {} requests",
            strategy,
            executor.mode(),
            rows,
            grouping.num_groups(),
            requests.len()
        );

        let outputs = resolved
            .iter()
            .zip(requests)
            .map(|(kernel, (values, _))| kernel.run(values, &grouping, &executor))
            .collect::<GroupByResult<Vec<_>>>()?;
        let output = GroupByOutput {
            unique_keys: grouping.unique_keys(self.keys),
            outputs,
        };

        #[cfg(debug_assertions)]
        if self.options.cross_check {
            self.cross_check(requests, &output)?;
        }

        Ok(output)
    }

    #[cfg(debug_assertions)]
    fn cross_check(
        &self,
        requests: &[(&Column, Aggregation)],
        output: &GroupByOutput,
    ) -> GroupByResult<()> {
        let other = GroupBy {
            keys: self.keys,
            options: GroupByOptions {
                force_sort: !self.options.force_sort,
                cross_check: false,
                ..self.options
            },
            row_mask: self.row_mask.clone(),
        };
        log::trace!(
            "cross-checking against the {:?} grouper",
            self.options.strategy().other()
        );
        let other_output = other.aggregate_requests(requests)?;
        crate::harness::check_equivalent(output, &other_output)
    }
}

/// Group `keys` and aggregate `value` once per request.
pub fn groupby(
    keys: &Table,
    value: &Column,
    requests: &[Aggregation],
    force_sort: bool,
) -> GroupByResult<GroupByOutput> {
    let options = GroupByOptions {
        force_sort,
        ..GroupByOptions::default()
    };
    let requests: Vec<(&Column, Aggregation)> =
        requests.iter().map(|&aggregation| (value, aggregation)).collect();
    GroupBy::new(keys, options).aggregate_requests(&requests)
}

/// One aggregation over a column of the input table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnAggregation {
    pub column: usize,
    pub aggregation: Aggregation,
    pub name: Option<String>,
}

impl ColumnAggregation {
    pub fn new(column: usize, aggregation: Aggregation) -> Self {
        Self {
            column,
            aggregation,
            name: None,
        }
    }

    pub fn count(column: usize) -> Self {
        Self::new(column, Aggregation::count())
    }

    pub fn count_all(column: usize) -> Self {
        Self::new(column, Aggregation::from(AggregationKind::CountAll))
    }

    pub fn sum_of_squares(column: usize) -> Self {
        Self::new(column, Aggregation::sum_of_squares())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Explicit name, or `<kind>(<column index>)`.
    pub fn output_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}({})", self.aggregation.kind().name(), self.column),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableGroupByOutput {
    pub unique_keys: Table,
    pub outputs: Vec<Column>,
    pub names: Vec<String>,
}

/// Group `table` by the columns at `key_indices` and evaluate `aggregations` over its columns.
///
/// Requests for the same `(column, kind)` pair are computed once and copied to every output
/// slot that asked for them. Outputs come back in request order.
pub fn groupby_table(
    table: &Table,
    key_indices: &[usize],
    aggregations: &[ColumnAggregation],
    options: GroupByOptions,
) -> GroupByResult<TableGroupByOutput> {
    let columns = table.num_columns();
    let out_of_range = |index: usize| GroupByError::ColumnIndexOutOfRange { index, columns };

    if let Some(&index) = key_indices.iter().find(|&&index| index >= columns) {
        return Err(out_of_range(index));
    }
    let keys = table
        .project(key_indices)
        .ok_or(GroupByError::NoKeyColumns)?;

    let mut distinct: Vec<(usize, AggregationKind)> = Vec::new();
    let mut slots = Vec::with_capacity(aggregations.len());
    for request in aggregations {
        if request.column >= columns {
            return Err(out_of_range(request.column));
        }
        let key = (request.column, request.aggregation.kind());
        let slot = match distinct.iter().position(|seen| *seen == key) {
            Some(slot) => slot,
            None => {
                distinct.push(key);
                distinct.len() - 1
            }
        };
        slots.push(slot);
    }

    let requests: Vec<(&Column, Aggregation)> = distinct
        .iter()
        .map(|&(column, kind)| (&table.columns()[column], Aggregation::from(kind)))
        .collect();
    let computed = GroupBy::new(&keys, options).aggregate_requests(&requests)?;
    if distinct.len() < aggregations.len() {
        log::trace!(
            "{} aggregation requests shared {} computations",
            aggregations.len(),
            distinct.len()
        );
    }

    Ok(TableGroupByOutput {
        unique_keys: computed.unique_keys,
        outputs: slots
            .iter()
            .map(|&slot| computed.outputs[slot].clone())
            .collect(),
        names: aggregations.iter().map(ColumnAggregation::output_name).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupwise_columnar::{DataType, ScalarValue};

    #[test]
    fn validation_happens_before_grouping() {
        // The key column is unsupported too, but the request is rejected first.
        let inner = Column::dictionary(vec![0], Column::from_vec(vec![1i8])).unwrap();
        let keys = Table::new(vec![Column::dictionary(vec![0, 0], inner).unwrap()]).unwrap();
        let values = Column::from_bools(vec![true, false]);
        let err = groupby(&keys, &values, &[Aggregation::sum_of_squares()], false).unwrap_err();
        assert!(matches!(
            err,
            GroupByError::UnsupportedAggregationForType {
                kind: AggregationKind::SumOfSquares,
                data_type: DataType::Boolean
            }
        ));

        let err = groupby(&keys, &values, &[Aggregation::count()], false).unwrap_err();
        assert!(matches!(err, GroupByError::UnsupportedKeyType { column: 0, .. }));
    }

    #[test]
    fn selected_rows_must_exist() {
        let keys = Table::new(vec![Column::from_vec(vec![1i32, 2])]).unwrap();
        let err = GroupBy::new(&keys, GroupByOptions::default())
            .with_selected_rows(&[0, 2])
            .unwrap_err();
        assert!(matches!(
            err,
            GroupByError::LengthMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn row_mask_length_is_checked() {
        let keys = Table::new(vec![Column::from_vec(vec![1i32, 2])]).unwrap();
        let err = GroupBy::new(&keys, GroupByOptions::default())
            .with_row_mask(BitVec::with_len_all_true(3))
            .grouping()
            .unwrap_err();
        assert!(matches!(err, GroupByError::LengthMismatch { .. }));
    }

    #[test]
    fn table_requests_are_deduplicated_and_named() {
        let table = Table::new(vec![
            Column::from_vec(vec![1i32, 1, 2]),
            Column::from_vec(vec![2i64, 3, 4]),
        ])
        .unwrap();
        let out = groupby_table(
            &table,
            &[0],
            &[
                ColumnAggregation::sum_of_squares(1),
                ColumnAggregation::count(1).with_name("n"),
                ColumnAggregation::sum_of_squares(1).with_name("again"),
            ],
            GroupByOptions::default(),
        )
        .unwrap();

        assert_eq!(out.names, vec!["sum_of_squares(1)", "n", "again"]);
        assert_eq!(out.outputs[0], out.outputs[2]);
        assert_eq!(
            out.outputs[0].to_values(),
            vec![ScalarValue::Int64(13), ScalarValue::Int64(16)]
        );
    }

    #[test]
    fn table_column_indices_are_checked() {
        let table = Table::new(vec![Column::from_vec(vec![1i32])]).unwrap();
        let err = groupby_table(&table, &[3], &[], GroupByOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            GroupByError::ColumnIndexOutOfRange {
                index: 3,
                columns: 1
            }
        ));
        let err = groupby_table(
            &table,
            &[0],
            &[ColumnAggregation::count(1)],
            GroupByOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GroupByError::ColumnIndexOutOfRange { index: 1, .. }
        ));
    }
}
