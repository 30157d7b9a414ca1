//! Grouping substrate: turns a key table into group ids.
//!
//! Both strategies produce the same [`Grouping`] artifacts, so aggregation kernels never need to
//! know which one ran:
//! - `representative_rows[g]`: the input row whose key tuple represents group `g`;
//! - `row_to_group[i]`: group id of input row `i`, or [`UNGROUPED`] for rows that were excluded;
//! - `group_offsets`: `G + 1` prefix sums of group sizes;
//! - `grouped_rows`: input rows laid out contiguously by group, each group in ascending row order.

mod hash;
mod sort;

use crate::error::{GroupByError, GroupByResult};
use crate::executor::Executor;
use crate::keys::KeyRows;
use groupwise_columnar::Table;

/// `row_to_group` entry for rows excluded from every group (null key or unselected).
pub const UNGROUPED: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupingStrategy {
    /// Linear-probing hash table; groups are numbered in first-seen order.
    Hash,
    /// Stable sort plus run detection; groups are numbered in ascending key order.
    Sort,
}

impl GroupingStrategy {
    pub fn other(self) -> Self {
        match self {
            GroupingStrategy::Hash => GroupingStrategy::Sort,
            GroupingStrategy::Sort => GroupingStrategy::Hash,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grouping {
    strategy: GroupingStrategy,
    representative_rows: Vec<u32>,
    row_to_group: Vec<u32>,
    group_offsets: Vec<u32>,
    grouped_rows: Vec<u32>,
}

impl Grouping {
    pub(crate) fn build(
        keys: &KeyRows<'_>,
        strategy: GroupingStrategy,
        keys_presorted: bool,
        executor: &Executor,
    ) -> GroupByResult<Self> {
        // Ids and row indices are u32 and `u32::MAX` is reserved for the sentinel.
        if keys.num_rows() >= UNGROUPED as usize {
            return Err(GroupByError::ResourceExhausted(format!(
                "{} rows exceed the 32-bit row id space",
                keys.num_rows()
            )));
        }
        let grouping = match strategy {
            GroupingStrategy::Hash => hash::group(keys, executor)?,
            GroupingStrategy::Sort => sort::group(keys, keys_presorted, executor)?,
        };
        log::trace!(
            "{:?} grouping: {} rows -> {} groups ({} grouped rows)",
            strategy,
            grouping.num_rows(),
            grouping.num_groups(),
            grouping.grouped_rows.len()
        );
        Ok(grouping)
    }

    pub fn strategy(&self) -> GroupingStrategy {
        self.strategy
    }

    pub fn num_groups(&self) -> usize {
        self.representative_rows.len()
    }

    /// Number of input rows, grouped or not.
    pub fn num_rows(&self) -> usize {
        self.row_to_group.len()
    }

    pub fn representative_rows(&self) -> &[u32] {
        &self.representative_rows
    }

    pub fn row_to_group(&self) -> &[u32] {
        &self.row_to_group
    }

    pub fn group_offsets(&self) -> &[u32] {
        &self.group_offsets
    }

    pub fn grouped_rows(&self) -> &[u32] {
        &self.grouped_rows
    }

    /// Member rows of group `g`, ascending.
    pub fn group_rows(&self, g: usize) -> &[u32] {
        let start = self.group_offsets[g] as usize;
        let end = self.group_offsets[g + 1] as usize;
        &self.grouped_rows[start..end]
    }

    pub fn group_of(&self, row: usize) -> Option<u32> {
        self.row_to_group
            .get(row)
            .copied()
            .filter(|&g| g != UNGROUPED)
    }

    /// Representative key tuple of every group, in group id order.
    pub fn unique_keys(&self, keys: &Table) -> Table {
        keys.gather(&self.representative_rows)
    }
}

/// `vec![fill; len]`, reporting allocation failure instead of aborting.
pub(crate) fn try_filled<T: Clone>(len: usize, fill: T) -> GroupByResult<Vec<T>> {
    let mut out = Vec::new();
    out.try_reserve_exact(len).map_err(|err| {
        GroupByError::ResourceExhausted(format!("allocating {len} elements: {err}"))
    })?;
    out.resize(len, fill);
    Ok(out)
}
