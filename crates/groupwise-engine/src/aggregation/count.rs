use super::{KernelEntry, KernelFn, KernelTable, TypeClass};
use crate::error::GroupByResult;
use crate::executor::Executor;
use crate::grouping::Grouping;
use groupwise_columnar::{Column, DataType};

static COUNT_VALID_KERNELS: [KernelEntry; 1] =
    [(TypeClass::Any, DataType::Int32, count_valid as KernelFn)];
static COUNT_ALL_KERNELS: [KernelEntry; 1] =
    [(TypeClass::Any, DataType::Int32, count_all as KernelFn)];

pub(crate) static COUNT_VALID: KernelTable = KernelTable::new(&COUNT_VALID_KERNELS);
pub(crate) static COUNT_ALL: KernelTable = KernelTable::new(&COUNT_ALL_KERNELS);

fn saturating_i32(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

fn count_valid(values: &Column, grouping: &Grouping, executor: &Executor) -> GroupByResult<Column> {
    // Dictionary rows referencing a null key count as null.
    let validity = values.logical_validity();
    let grouped = grouping.grouped_rows();
    let counts = executor.reduce_segments(grouping.group_offsets(), |_, range| {
        let rows = &grouped[range];
        let count = match &validity {
            Some(mask) => rows.iter().filter(|&&row| mask.get(row as usize)).count(),
            None => rows.len(),
        };
        saturating_i32(count)
    });
    Ok(Column::from_vec(counts))
}

fn count_all(_values: &Column, grouping: &Grouping, executor: &Executor) -> GroupByResult<Column> {
    let counts = executor.reduce_segments(grouping.group_offsets(), |_, range| {
        saturating_i32(range.len())
    });
    Ok(Column::from_vec(counts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::GroupingStrategy;
    use crate::keys::KeyRows;
    use groupwise_columnar::Table;

    #[test]
    fn counts_follow_the_grouped_rows() {
        let keys = Table::new(vec![Column::from_vec(vec![1i32, 2, 1, 1])]).unwrap();
        let values = Column::from_options(vec![Some(1.0f64), None, None, Some(4.0)]);
        let exec = Executor::serial();
        let grouping = Grouping::build(
            &KeyRows::new(&keys, None).unwrap(),
            GroupingStrategy::Hash,
            false,
            &exec,
        )
        .unwrap();

        let valid = count_valid(&values, &grouping, &exec).unwrap();
        assert_eq!(valid.values::<i32>().unwrap(), &[2, 0]);
        assert!(valid.validity().is_none());

        let all = count_all(&values, &grouping, &exec).unwrap();
        assert_eq!(all.values::<i32>().unwrap(), &[3, 1]);
    }

    #[test]
    fn counts_saturate_at_i32_max() {
        assert_eq!(saturating_i32(i32::MAX as usize + 10), i32::MAX);
        assert_eq!(saturating_i32(7), 7);
    }
}
