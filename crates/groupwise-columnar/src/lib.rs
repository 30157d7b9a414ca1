//! Columnar, nullable data for the `groupwise` aggregation engine.
//!
//! This crate focuses on:
//! - Typed column storage (fixed-width numerics, timestamps, fixed-point decimals, strings and
//!   dictionaries) with an optional validity bitmap per column.
//! - Read-only logical access (`len` / `is_valid` / `value` / `bytes` / `code`) that the engine's
//!   groupers and kernels are written against.
//! - Row-oriented builders for assembling small tables in tests and benchmarks.

#![forbid(unsafe_code)]

mod bitmap;
mod builder;
mod column;
mod error;
mod table;
mod types;

pub use crate::bitmap::BitVec;
pub use crate::builder::{ColumnBuilder, TableBuilder};
pub use crate::column::{Column, ColumnData};
pub use crate::error::{ColumnarError, ColumnarResult};
pub use crate::table::Table;
pub use crate::types::{DataType, NativeType, ScalarValue};
