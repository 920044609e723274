use std::result;
use thiserror::Error;

/// A specialized `Result` type for counter operations.
pub type MetricResult<T> = result::Result<T, MetricError>;

/// Errors returned by the fallible counter and counter family operations.
///
/// Every panicking convenience method (`add`, `with_label_values`, `must_curry_with`, ...)
/// panics with exactly the error its fallible twin would have returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MetricError {
    /// A counter was asked to go down.
    #[error("counter cannot decrease in value")]
    NegativeIncrement,
    /// The number of label values (or labels) does not match the number of free variable
    /// labels of the family.
    #[error(
        "inconsistent label cardinality: {fq_name:?} has {expected} variable labels named {label_names:?} but {actual} values {values:?} were provided"
    )]
    InconsistentCardinality {
        /// Fully-qualified name of the metric.
        fq_name: String,
        /// Free variable label names, in declaration order.
        label_names: Vec<String>,
        /// Number of free variable labels.
        expected: usize,
        /// Number of values (or labels) provided.
        actual: usize,
        /// The provided values, or the provided label names for by-name lookups.
        values: Vec<String>,
    },
    /// A free variable label is absent from a label map.
    #[error("label name {0:?} missing in label map")]
    MissingLabel(String),
    /// Currying with a label that is already curried on this view.
    #[error("label name {0:?} is already curried")]
    AlreadyCurried(String),
    /// Currying with label names that are not variable labels of the family.
    #[error("{0} unknown label(s) found during currying")]
    UnknownCurriedLabels(usize),
    /// The fully-qualified metric name is not a valid metric name.
    #[error("{0:?} is not a valid metric name")]
    InvalidMetricName(String),
    /// A constant or variable label name is not a valid label name.
    #[error("{0:?} is not a valid label name")]
    InvalidLabelName(String),
    /// The same label name was declared twice across constant and variable labels.
    #[error("duplicate label name {0:?}")]
    DuplicateLabelName(String),
    /// An exemplar label name is not a valid label name.
    #[error("exemplar label name {0:?} is invalid")]
    InvalidExemplarLabelName(String),
    /// The exemplar labels exceed the rune budget.
    #[error("exemplar labels have {runes} runes, exceeding the limit of {limit}")]
    ExemplarLabelsTooLong {
        /// Combined rune count of all label names and values.
        runes: usize,
        /// The maximum allowed rune count.
        limit: usize,
    },
}
