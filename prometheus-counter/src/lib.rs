//! # Prometheus counters
//!
//! Lock-free monotonic counters with Prometheus semantics, and counter families partitioned by
//! label values.
//!
//! A [`Counter`] holds a value that only ever goes up. Updates are wait-free in the common
//! case: integral increments land in an integer register, arbitrary increments in a
//! floating-point register updated by compare-and-swap. An increment too small to change the
//! floating-point value is banked in the integer register instead of being lost. Each counter
//! also carries at most one [`Exemplar`], the sampled observation of its latest annotated
//! update.
//!
//! A [`CounterVec`] creates counters on demand, one per combination of variable label values,
//! and can be [curried](CounterVec::curry_with) into views with some labels fixed.
//!
//! ```
//! use prometheus_counter::{Collector, Counter, CounterOpts, CounterVec, Labels};
//!
//! let hits = Counter::new(CounterOpts::new("cache_hits_total", "Cache hits.")).unwrap();
//! hits.inc();
//! hits.add_with_exemplar(2.0, Some(&Labels::from([("trace_id", "4bf92f35")])));
//! assert_eq!(hits.get(), 3.0);
//!
//! let requests = CounterVec::new(
//!     CounterOpts::new("requests_total", "Requests.").with_namespace("http"),
//!     &["method", "code"],
//! )
//! .unwrap();
//! requests.with_label_values(&["GET", "200"]).inc();
//!
//! let family = requests.collect();
//! assert_eq!(family.name, "http_requests_total");
//! assert_eq!(family.data_points.len(), 1);
//! ```
//!
//! ## Crate Feature Flags
//!
//! * `internal-logs`: emits the crate's own diagnostics (children created in a family,
//!   rejected lookups, rejected exemplars) as `tracing` events. Enabled by default.
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]
#![cfg_attr(test, deny(warnings))]

mod counter;
mod data;
mod desc;
mod error;
mod exemplar;
mod internal_logging;
mod labels;
mod metric;
mod value;
mod vec;

pub use counter::{Clock, Counter, CounterFunc, CounterOpts};
pub use data::{CounterDataPoint, MetricFamily};
pub use desc::{build_fq_name, Desc};
pub use error::{MetricError, MetricResult};
pub use exemplar::{Exemplar, EXEMPLAR_MAX_RUNES};
pub use labels::{
    is_valid_label_name, is_valid_metric_name, ConstrainedLabel, LabelConstraint, LabelPair,
    Labels, VariableLabels,
};
pub use metric::{Collector, Metric};
pub use vec::{CounterVec, CounterVecOpts};

#[cfg(feature = "internal-logs")]
#[doc(hidden)]
pub mod _private {
    pub use tracing::{debug, error, warn}; // Re-export for the internal logging macros
}
