use super::{try_filled, Grouping, GroupingStrategy, UNGROUPED};
use crate::error::GroupByResult;
use crate::executor::Executor;
use crate::keys::KeyRows;

const EMPTY: u32 = u32::MAX;
const MIN_SLOTS: usize = 16;

/// Open-addressing table mapping key tuples to group ids. Slots hold group ids; the key of a
/// group is read back through its representative row.
struct GroupTable<'k, 'a> {
    keys: &'k KeyRows<'a>,
    slots: Vec<u32>,
    mask: usize,
    group_hashes: Vec<u64>,
    representatives: Vec<u32>,
}

impl<'k, 'a> GroupTable<'k, 'a> {
    fn with_capacity(keys: &'k KeyRows<'a>, rows: usize) -> GroupByResult<Self> {
        // At most one group per row, and at most half the slots are ever occupied.
        let slots = rows.saturating_mul(2).max(MIN_SLOTS).next_power_of_two();
        Ok(Self {
            keys,
            slots: try_filled(slots, EMPTY)?,
            mask: slots - 1,
            group_hashes: Vec::new(),
            representatives: Vec::new(),
        })
    }

    fn insert(&mut self, row: u32, hash: u64) {
        let mut slot = hash as usize & self.mask;
        loop {
            let g = self.slots[slot];
            if g == EMPTY {
                self.slots[slot] = self.representatives.len() as u32;
                self.representatives.push(row);
                self.group_hashes.push(hash);
                return;
            }
            if self.matches(g, row, hash) {
                return;
            }
            slot = (slot + 1) & self.mask;
        }
    }

    fn find(&self, row: u32, hash: u64) -> Option<u32> {
        let mut slot = hash as usize & self.mask;
        loop {
            let g = self.slots[slot];
            if g == EMPTY {
                return None;
            }
            if self.matches(g, row, hash) {
                return Some(g);
            }
            slot = (slot + 1) & self.mask;
        }
    }

    fn matches(&self, g: u32, row: u32, hash: u64) -> bool {
        self.group_hashes[g as usize] == hash
            && self
                .keys
                .eq_rows(self.representatives[g as usize] as usize, row as usize)
    }
}

pub(super) fn group(keys: &KeyRows<'_>, executor: &Executor) -> GroupByResult<Grouping> {
    let rows = keys.num_rows();
    let hashes = keys.hash_rows(executor);
    let participating = keys.participating_rows();

    let mut table = GroupTable::with_capacity(keys, participating.len())?;
    for &row in &participating {
        table.insert(row, hashes[row as usize]);
    }

    // Read-only second pass.
    let row_to_group = executor.tabulate(rows, |row| {
        if !keys.participates(row) {
            return UNGROUPED;
        }
        let found = table.find(row as u32, hashes[row]);
        debug_assert!(found.is_some(), "row {row} was inserted but cannot be found");
        found.unwrap_or(UNGROUPED)
    });

    let num_groups = table.representatives.len();
    let sizes = executor.histogram(&row_to_group, num_groups);
    let group_offsets = executor.exclusive_scan(&sizes);

    // Stable counting scatter: visiting rows in ascending order keeps each group ascending.
    let mut cursor: Vec<u32> = group_offsets[..num_groups].to_vec();
    let mut grouped_rows = try_filled(participating.len(), 0u32)?;
    for &row in &participating {
        let g = row_to_group[row as usize] as usize;
        grouped_rows[cursor[g] as usize] = row;
        cursor[g] += 1;
    }

    Ok(Grouping {
        strategy: GroupingStrategy::Hash,
        representative_rows: table.representatives,
        row_to_group,
        group_offsets,
        grouped_rows,
    })
}
