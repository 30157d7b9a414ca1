use super::{try_filled, Grouping, GroupingStrategy, UNGROUPED};
use crate::error::GroupByResult;
use crate::executor::Executor;
use crate::keys::KeyRows;
use std::cmp::Ordering;

pub(super) fn group(
    keys: &KeyRows<'_>,
    keys_presorted: bool,
    executor: &Executor,
) -> GroupByResult<Grouping> {
    // Null-keyed and unselected rows are partitioned out before sorting.
    let mut order = keys.participating_rows();
    if keys_presorted {
        debug_assert!(
            order
                .windows(2)
                .all(|w| keys.cmp_rows(w[0] as usize, w[1] as usize) != Ordering::Greater),
            "keys were declared presorted but are not in ascending order"
        );
    } else {
        executor.stable_sort_by(&mut order, |&a, &b| keys.cmp_rows(a as usize, b as usize));
    }

    let boundaries = executor.tabulate(order.len(), |i| {
        (i > 0 && !keys.eq_rows(order[i - 1] as usize, order[i] as usize)) as u32
    });
    let sorted_ids = executor.inclusive_scan(&boundaries);

    let mut row_to_group = try_filled(keys.num_rows(), UNGROUPED)?;
    executor.scatter(&sorted_ids, &order, &mut row_to_group);

    // A run starts at position 0 and wherever the key changes. The stable sort keeps the
    // lowest row index first within each run.
    let mut representative_rows = Vec::new();
    let mut group_offsets = Vec::new();
    for (pos, &row) in order.iter().enumerate() {
        if pos == 0 || boundaries[pos] == 1 {
            representative_rows.push(row);
            group_offsets.push(pos as u32);
        }
    }
    group_offsets.push(order.len() as u32);

    Ok(Grouping {
        strategy: GroupingStrategy::Sort,
        representative_rows,
        row_to_group,
        group_offsets,
        // Sorted order is already contiguous by group and ascending within each group.
        grouped_rows: order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupwise_columnar::{Column, Table};

    #[test]
    fn presorted_keys_skip_the_sort_and_agree() {
        let keys = Table::new(vec![Column::from_vec(vec![1i32, 1, 2, 5, 5, 5])]).unwrap();
        let rows = KeyRows::new(&keys, None).unwrap();
        let sorted = group(&rows, false, &Executor::serial()).unwrap();
        let presorted = group(&rows, true, &Executor::serial()).unwrap();
        assert_eq!(sorted, presorted);
        assert_eq!(presorted.group_offsets(), &[0, 2, 3, 6]);
    }

    #[test]
    fn nan_keys_form_one_group_ordered_last() {
        let keys = Table::new(vec![Column::from_vec(vec![
            f64::NAN,
            1.5,
            -f64::NAN,
            -0.0,
            0.0,
        ])])
        .unwrap();
        let rows = KeyRows::new(&keys, None).unwrap();
        let grouping = group(&rows, false, &Executor::serial()).unwrap();

        assert_eq!(grouping.num_groups(), 3);
        assert_eq!(grouping.representative_rows(), &[3, 1, 0]);
        assert_eq!(grouping.group_rows(2), &[0, 2]);
    }
}
