//! Export records handed to whatever walks and serializes the counters.

use std::time::SystemTime;

use crate::exemplar::Exemplar;
use crate::labels::LabelPair;

/// A snapshot of one live counter.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterDataPoint {
    /// Constant and variable label pairs, sorted by name.
    pub labels: Vec<LabelPair>,
    /// The accumulated value.
    pub value: f64,
    /// The exemplar attached by the latest update that carried one.
    pub exemplar: Option<Exemplar>,
    /// When the counter was created. `None` for [`CounterFunc`](crate::CounterFunc).
    pub created: Option<SystemTime>,
}

/// All data points sharing one descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    /// The fully-qualified metric name.
    pub name: String,
    /// The help text.
    pub help: String,
    /// One data point per live counter.
    pub data_points: Vec<CounterDataPoint>,
}
