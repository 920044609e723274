use crate::data::{CounterDataPoint, MetricFamily};
use crate::desc::Desc;

/// A single exportable time series.
pub trait Metric: Send + Sync {
    /// The descriptor of the series.
    fn desc(&self) -> &Desc;

    /// Takes a snapshot of the series.
    fn write(&self) -> CounterDataPoint;
}

/// Something that produces a family of time series on demand.
pub trait Collector: Send + Sync {
    /// The descriptor shared by every series this collector produces.
    fn desc(&self) -> &Desc;

    /// Takes a snapshot of every live series.
    fn collect(&self) -> MetricFamily;
}
