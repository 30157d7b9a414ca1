//! Group-by aggregation over columnar, nullable data.
//!
//! A group-by call partitions the rows of a key [`Table`] into groups of equal key tuples and
//! reduces one or more value columns per group. Two interchangeable groupers build the groups:
//!
//! - [`GroupingStrategy::Hash`]: a linear-probing hash table, groups in first-seen order.
//! - [`GroupingStrategy::Sort`]: a stable sort by key with run detection, groups in ascending key
//!   order.
//!
//! Both agree up to a permutation of groups; [`harness`] checks exactly that. Rows with a null in
//! any key column never join a group.
//!
//! [`Table`]: groupwise_columnar::Table

#![forbid(unsafe_code)]

pub mod aggregation;
mod error;
mod executor;
mod groupby;
mod grouping;
pub mod harness;
mod keys;
mod parallel;

pub use crate::aggregation::{target_type, Aggregation, AggregationKind, NullPolicy};
pub use crate::error::{GroupByError, GroupByResult};
pub use crate::executor::{ExecutionMode, Executor};
pub use crate::groupby::{
    groupby, groupby_table, ColumnAggregation, GroupBy, GroupByOptions, GroupByOutput,
    TableGroupByOutput,
};
pub use crate::grouping::{Grouping, GroupingStrategy, UNGROUPED};
pub use crate::harness::sort_by_keys;
