//! Aggregation requests and the kernel registry.
//!
//! Every supported `(aggregation kind, value type)` pair resolves to a plain `fn` kernel and an
//! output type through a two-level table: first by kind, then by the value column's logical type.
//! Dictionary value columns resolve through their decoded type and kernels read values through
//! the codes.

mod count;
mod sum_of_squares;

use crate::error::{GroupByError, GroupByResult};
use crate::executor::Executor;
use crate::grouping::Grouping;
use groupwise_columnar::{Column, DataType};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggregationKind {
    /// Number of valid values per group.
    CountValid,
    /// Number of rows per group, null or not.
    CountAll,
    /// Sum of squared valid values per group; null when a group has no valid value.
    SumOfSquares,
}

impl AggregationKind {
    /// Prefix used for default output names, e.g. `sum_of_squares(2)`.
    pub fn name(self) -> &'static str {
        match self {
            AggregationKind::CountValid => "count",
            AggregationKind::CountAll => "count_all",
            AggregationKind::SumOfSquares => "sum_of_squares",
        }
    }
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AggregationKind::CountValid => "COUNT_VALID",
            AggregationKind::CountAll => "COUNT_ALL",
            AggregationKind::SumOfSquares => "SUM_OF_SQUARES",
        };
        f.write_str(label)
    }
}

/// Whether null values take part in an aggregation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NullPolicy {
    #[default]
    Exclude,
    Include,
}

/// A single aggregation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Aggregation {
    kind: AggregationKind,
}

impl Aggregation {
    /// COUNT over valid values.
    pub fn count() -> Self {
        Self::count_with(NullPolicy::Exclude)
    }

    pub fn count_with(null_policy: NullPolicy) -> Self {
        let kind = match null_policy {
            NullPolicy::Exclude => AggregationKind::CountValid,
            NullPolicy::Include => AggregationKind::CountAll,
        };
        Self { kind }
    }

    pub fn sum_of_squares() -> Self {
        Self {
            kind: AggregationKind::SumOfSquares,
        }
    }

    pub fn kind(&self) -> AggregationKind {
        self.kind
    }

    pub fn null_policy(&self) -> NullPolicy {
        match self.kind {
            AggregationKind::CountAll => NullPolicy::Include,
            AggregationKind::CountValid | AggregationKind::SumOfSquares => NullPolicy::Exclude,
        }
    }
}

impl From<AggregationKind> for Aggregation {
    fn from(kind: AggregationKind) -> Self {
        Self { kind }
    }
}

/// Reduces one value column over a grouping into a column with one entry per group.
pub(crate) type KernelFn = fn(&Column, &Grouping, &Executor) -> GroupByResult<Column>;

/// A request resolved against a concrete value type.
#[derive(Clone)]
pub(crate) struct ResolvedAggregation {
    pub(crate) kind: AggregationKind,
    pub(crate) output_type: DataType,
    kernel: KernelFn,
}

impl fmt::Debug for ResolvedAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedAggregation")
            .field("kind", &self.kind)
            .field("output_type", &self.output_type)
            .finish_non_exhaustive()
    }
}

impl ResolvedAggregation {
    pub(crate) fn run(
        &self,
        values: &Column,
        grouping: &Grouping,
        executor: &Executor,
    ) -> GroupByResult<Column> {
        log::trace!(
            "{} kernel over {} -> {} ({} groups)",
            self.kind,
            values.data_type(),
            self.output_type,
            grouping.num_groups()
        );
        let out = (self.kernel)(values, grouping, executor)?;
        debug_assert_eq!(out.len(), grouping.num_groups());
        debug_assert_eq!(out.data_type(), self.output_type);
        Ok(out)
    }
}

pub(crate) fn resolve(
    kind: AggregationKind,
    value_type: &DataType,
) -> GroupByResult<ResolvedAggregation> {
    let entry = match kind {
        AggregationKind::CountValid => count::COUNT_VALID.lookup(value_type),
        AggregationKind::CountAll => count::COUNT_ALL.lookup(value_type),
        AggregationKind::SumOfSquares => sum_of_squares::SUM_OF_SQUARES.lookup(value_type),
    };
    let (output_type, kernel) = entry.ok_or_else(|| GroupByError::UnsupportedAggregationForType {
        kind,
        data_type: value_type.clone(),
    })?;
    Ok(ResolvedAggregation {
        kind,
        output_type,
        kernel,
    })
}

/// Output element type of `kind` over values of `value_type`.
pub fn target_type(kind: AggregationKind, value_type: &DataType) -> GroupByResult<DataType> {
    resolve(kind, value_type).map(|resolved| resolved.output_type)
}

/// Second level of the registry: the kernels of one aggregation kind, keyed by logical value
/// type.
pub(crate) struct KernelTable {
    entries: &'static [KernelEntry],
}

/// Accepted value types, output type, kernel.
pub(crate) type KernelEntry = (TypeClass, DataType, KernelFn);

/// Value types are matched by class so that parameterized types (decimals of any scale) share
/// one entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum TypeClass {
    Any,
    Exact(DataType),
}

impl KernelTable {
    pub(crate) const fn new(entries: &'static [KernelEntry]) -> Self {
        Self { entries }
    }

    fn lookup(&self, value_type: &DataType) -> Option<(DataType, KernelFn)> {
        let logical = value_type.logical();
        // Typed kernels read through at most one level of dictionary codes.
        let nested = matches!(value_type, DataType::Dictionary(inner) if inner.is_dictionary());
        self.entries
            .iter()
            .find(|(class, _, _)| match class {
                TypeClass::Any => true,
                TypeClass::Exact(dt) => !nested && dt == logical,
            })
            .map(|(_, output, kernel)| (output.clone(), *kernel))
    }
}
