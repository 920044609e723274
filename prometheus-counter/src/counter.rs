use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use crate::data::{CounterDataPoint, MetricFamily};
use crate::desc::{build_fq_name, Desc};
use crate::error::{MetricError, MetricResult};
use crate::exemplar::{Exemplar, ExemplarSlot};
use crate::labels::{LabelPair, Labels, VariableLabels};
use crate::metric::{Collector, Metric};
use crate::value::Accumulator;
use crate::{prom_debug, prom_error, prom_warn};

/// Source of timestamps for creation times and exemplars.
pub type Clock = Arc<dyn Fn() -> SystemTime + Send + Sync>;

fn system_clock() -> Clock {
    Arc::new(SystemTime::now)
}

/// Configuration shared by [`Counter`], [`CounterFunc`] and [`CounterVec`].
///
/// The fully-qualified name is `namespace_subsystem_name`, with empty components left out.
///
/// [`CounterVec`]: crate::CounterVec
#[derive(Clone)]
pub struct CounterOpts {
    pub(crate) namespace: String,
    pub(crate) subsystem: String,
    pub(crate) name: String,
    pub(crate) help: String,
    pub(crate) const_labels: HashMap<String, String>,
    pub(crate) clock: Option<Clock>,
}

impl CounterOpts {
    /// Options with a name and a help text.
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        CounterOpts {
            namespace: String::new(),
            subsystem: String::new(),
            name: name.into(),
            help: help.into(),
            const_labels: HashMap::new(),
            clock: None,
        }
    }

    /// Set the namespace, the first component of the fully-qualified name.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the subsystem, the middle component of the fully-qualified name.
    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = subsystem.into();
        self
    }

    /// Add a label whose value is fixed for every series of the metric.
    pub fn with_const_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.const_labels.insert(name.into(), value.into());
        self
    }

    /// Replace the constant labels.
    pub fn with_const_labels(mut self, const_labels: HashMap<String, String>) -> Self {
        self.const_labels = const_labels;
        self
    }

    /// Use `clock` instead of [`SystemTime::now`] for creation times and exemplar timestamps.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> SystemTime + Send + Sync + 'static,
    {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// The fully-qualified name these options describe.
    pub fn fq_name(&self) -> String {
        build_fq_name(&self.namespace, &self.subsystem, &self.name)
    }

    pub(crate) fn desc(&self, variable_labels: VariableLabels) -> MetricResult<Desc> {
        Desc::new(
            self.fq_name(),
            self.help.as_str(),
            variable_labels,
            &self.const_labels,
        )
    }

    pub(crate) fn clock(&self) -> Clock {
        self.clock.clone().unwrap_or_else(system_clock)
    }
}

impl fmt::Debug for CounterOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterOpts")
            .field("namespace", &self.namespace)
            .field("subsystem", &self.subsystem)
            .field("name", &self.name)
            .field("help", &self.help)
            .field("const_labels", &self.const_labels)
            .finish()
    }
}

struct CounterCore {
    desc: Arc<Desc>,
    label_pairs: Vec<LabelPair>,
    created: SystemTime,
    value: Accumulator,
    exemplar: ExemplarSlot,
    clock: Clock,
}

/// A value that only ever goes up.
///
/// Cloning is cheap and the clones share the same value; use [`Counter::ptr_eq`] to check
/// whether two handles are the same counter.
///
/// The value is tracked in two registers, an `f64` and a `u64`. [`inc`](Counter::inc) and
/// additions too small to change the `f64` go to the `u64`, which is folded into the `f64` once
/// it is large enough to register. Sub-resolution fractions on a large total are dropped.
#[derive(Clone)]
pub struct Counter {
    core: Arc<CounterCore>,
}

impl Counter {
    /// Creates a counter without variable labels.
    pub fn new(opts: CounterOpts) -> MetricResult<Self> {
        let desc = Arc::new(opts.desc(VariableLabels::default())?);
        let label_pairs = desc.const_label_pairs().to_vec();
        Ok(Counter::from_parts(desc, label_pairs, opts.clock()))
    }

    pub(crate) fn from_parts(desc: Arc<Desc>, label_pairs: Vec<LabelPair>, clock: Clock) -> Self {
        let created = clock();
        Counter {
            core: Arc::new(CounterCore {
                desc,
                label_pairs,
                created,
                value: Accumulator::new(),
                exemplar: ExemplarSlot::new(),
                clock,
            }),
        }
    }

    /// Increments the counter by one.
    pub fn inc(&self) {
        self.core.value.inc()
    }

    /// Adds `v` to the counter.
    ///
    /// # Panics
    ///
    /// If `v` is negative. See [`Counter::try_add`].
    pub fn add(&self, v: f64) {
        if let Err(err) = self.try_add(v) {
            prom_error!(name: "Counter.AddFailed", metric = self.core.desc.fq_name(), error = format!("{err}").as_str());
            panic!("{err}");
        }
    }

    /// Adds `v` to the counter, or fails with [`MetricError::NegativeIncrement`] and leaves the
    /// counter untouched if `v` is negative.
    pub fn try_add(&self, v: f64) -> MetricResult<()> {
        if v < 0.0 {
            prom_debug!(name: "Counter.NegativeIncrementRejected", metric = self.core.desc.fq_name(), value = v);
            return Err(MetricError::NegativeIncrement);
        }
        self.core.value.add(v);
        Ok(())
    }

    /// Adds `v` and replaces the current exemplar with one built from `v`, the current time and
    /// `labels`.
    ///
    /// `None` leaves the current exemplar in place; an empty map attaches an exemplar without
    /// labels.
    ///
    /// # Panics
    ///
    /// If `v` is negative, if a label name is invalid or if the labels hold more than
    /// [`EXEMPLAR_MAX_RUNES`](crate::EXEMPLAR_MAX_RUNES) runes.
    pub fn add_with_exemplar(&self, v: f64, labels: Option<&Labels<'_>>) {
        if let Err(err) = self.try_add_with_exemplar(v, labels) {
            prom_error!(name: "Counter.AddWithExemplarFailed", metric = self.core.desc.fq_name(), error = format!("{err}").as_str());
            panic!("{err}");
        }
    }

    /// Fallible twin of [`Counter::add_with_exemplar`].
    ///
    /// The value is committed before the exemplar is built, so invalid exemplar labels still
    /// leave `v` added; only the exemplar is dropped.
    pub fn try_add_with_exemplar(&self, v: f64, labels: Option<&Labels<'_>>) -> MetricResult<()> {
        self.try_add(v)?;
        self.update_exemplar(v, labels)
    }

    fn update_exemplar(&self, v: f64, labels: Option<&Labels<'_>>) -> MetricResult<()> {
        let Some(labels) = labels else {
            return Ok(());
        };
        match Exemplar::new(v, (self.core.clock)(), labels) {
            Ok(exemplar) => {
                self.core.exemplar.store(exemplar);
                Ok(())
            }
            Err(err) => {
                prom_warn!(name: "Counter.ExemplarRejected", metric = self.core.desc.fq_name(), error = format!("{err}").as_str());
                Err(err)
            }
        }
    }

    /// The current value.
    pub fn get(&self) -> f64 {
        self.core.value.get()
    }

    /// The descriptor of this counter.
    pub fn desc(&self) -> &Desc {
        &self.core.desc
    }

    /// Label pairs of this counter, sorted by name.
    pub fn label_pairs(&self) -> &[LabelPair] {
        &self.core.label_pairs
    }

    /// When this counter was created.
    pub fn created(&self) -> SystemTime {
        self.core.created
    }

    /// `true` if both handles refer to the same counter.
    pub fn ptr_eq(&self, other: &Counter) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl Metric for Counter {
    fn desc(&self) -> &Desc {
        &self.core.desc
    }

    fn write(&self) -> CounterDataPoint {
        // Exemplar first: an exemplar must never be exported next to a value that does not yet
        // include its own observation.
        let exemplar = self.core.exemplar.load();
        let value = self.core.value.get();
        CounterDataPoint {
            labels: self.core.label_pairs.clone(),
            value,
            exemplar: exemplar.map(|e| Exemplar::clone(&e)),
            created: Some(self.core.created),
        }
    }
}

impl Collector for Counter {
    fn desc(&self) -> &Desc {
        &self.core.desc
    }

    fn collect(&self) -> MetricFamily {
        MetricFamily {
            name: self.core.desc.fq_name().to_owned(),
            help: self.core.desc.help().to_owned(),
            data_points: vec![self.write()],
        }
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counter")
            .field("fq_name", &self.core.desc.fq_name())
            .field("label_pairs", &self.core.label_pairs)
            .field("value", &self.get())
            .finish()
    }
}

/// A counter whose value is read from a callback at export time.
///
/// The callback may run concurrently from several exporters and should never report a
/// smaller value than before; neither is checked.
#[derive(Clone)]
pub struct CounterFunc {
    desc: Arc<Desc>,
    function: Arc<dyn Fn() -> f64 + Send + Sync>,
}

impl CounterFunc {
    /// Creates a counter reporting whatever `function` returns.
    pub fn new<F>(opts: CounterOpts, function: F) -> MetricResult<Self>
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Ok(CounterFunc {
            desc: Arc::new(opts.desc(VariableLabels::default())?),
            function: Arc::new(function),
        })
    }

    /// The descriptor of this counter.
    pub fn desc(&self) -> &Desc {
        &self.desc
    }
}

impl Metric for CounterFunc {
    fn desc(&self) -> &Desc {
        &self.desc
    }

    fn write(&self) -> CounterDataPoint {
        CounterDataPoint {
            labels: self.desc.const_label_pairs().to_vec(),
            value: (self.function)(),
            exemplar: None,
            created: None,
        }
    }
}

impl Collector for CounterFunc {
    fn desc(&self) -> &Desc {
        &self.desc
    }

    fn collect(&self) -> MetricFamily {
        MetricFamily {
            name: self.desc.fq_name().to_owned(),
            help: self.desc.help().to_owned(),
            data_points: vec![self.write()],
        }
    }
}

impl fmt::Debug for CounterFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterFunc")
            .field("fq_name", &self.desc.fq_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;
    use std::time::Duration;

    fn fixed_clock(secs: u64) -> impl Fn() -> SystemTime + Send + Sync + 'static {
        move || SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn test_counter() -> Counter {
        Counter::new(
            CounterOpts::new("requests_total", "Total requests.")
                .with_namespace("http")
                .with_const_label("instance", "a")
                .with_clock(fixed_clock(42)),
        )
        .unwrap()
    }

    #[test]
    fn inc_and_add() {
        let counter = test_counter();
        counter.inc();
        counter.add(41.5);

        assert_eq!(counter.get(), 42.5);
    }

    #[test]
    #[should_panic(expected = "counter cannot decrease in value")]
    fn add_negative_panics() {
        test_counter().add(-1.0);
    }

    #[test]
    fn try_add_negative_leaves_value() {
        let counter = test_counter();
        counter.add(3.0);

        assert_eq!(counter.try_add(-1.0), Err(MetricError::NegativeIncrement));
        assert_eq!(counter.get(), 3.0);
    }

    #[test]
    fn write_reports_value_labels_and_created() {
        let counter = test_counter();
        counter.add(2.0);

        let point = counter.write();
        assert_eq!(point.value, 2.0);
        assert_eq!(point.labels, vec![LabelPair::new("instance", "a")]);
        assert_eq!(
            point.created,
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(42))
        );
        assert!(point.exemplar.is_none());
        assert_eq!(counter.desc().fq_name(), "http_requests_total");
    }

    #[test]
    fn exemplar_attached_and_replaced() {
        let counter = test_counter();
        counter.add_with_exemplar(1.0, Some(&Labels::from([("trace_id", "a")])));
        counter.add_with_exemplar(2.0, Some(&Labels::from([("trace_id", "b")])));

        let point = counter.write();
        let exemplar = point.exemplar.unwrap();
        assert_eq!(point.value, 3.0);
        assert_eq!(exemplar.value, 2.0);
        assert_eq!(exemplar.labels, vec![LabelPair::new("trace_id", "b")]);
        assert_eq!(
            exemplar.timestamp,
            SystemTime::UNIX_EPOCH + Duration::from_secs(42)
        );
    }

    #[test]
    fn absent_exemplar_labels_keep_current_exemplar() {
        let counter = test_counter();
        counter.add_with_exemplar(1.0, Some(&Labels::from([("trace_id", "a")])));
        counter.add_with_exemplar(5.0, None);

        let point = counter.write();
        assert_eq!(point.value, 6.0);
        assert_eq!(point.exemplar.unwrap().value, 1.0);
    }

    #[test]
    fn empty_exemplar_labels_attach_label_less_exemplar() {
        let counter = test_counter();
        counter.add_with_exemplar(1.0, Some(&Labels::from([("trace_id", "a")])));
        counter.add_with_exemplar(4.0, Some(&Labels::new()));

        let exemplar = counter.write().exemplar.unwrap();
        assert_eq!(exemplar.value, 4.0);
        assert!(exemplar.labels.is_empty());
    }

    #[test]
    fn invalid_exemplar_keeps_value_drops_exemplar() {
        let counter = test_counter();
        let too_long = "x".repeat(200);
        let labels = Labels::from([("trace_id", too_long.as_str())]);

        let err = counter.try_add_with_exemplar(1.0, Some(&labels)).unwrap_err();
        assert!(matches!(err, MetricError::ExemplarLabelsTooLong { .. }));
        assert_eq!(counter.get(), 1.0);
        assert!(counter.write().exemplar.is_none());
    }

    #[test]
    #[should_panic(expected = "exemplar label name")]
    fn invalid_exemplar_label_panics() {
        test_counter().add_with_exemplar(1.0, Some(&Labels::from([("0bad", "x")])));
    }

    #[test]
    fn negative_add_with_exemplar_changes_nothing() {
        let counter = test_counter();
        let result = counter.try_add_with_exemplar(-2.0, Some(&Labels::new()));

        assert_eq!(result, Err(MetricError::NegativeIncrement));
        assert_eq!(counter.get(), 0.0);
        assert!(counter.write().exemplar.is_none());
    }

    #[test]
    fn clones_share_state() {
        let counter = test_counter();
        let clone = counter.clone();
        clone.inc();

        assert!(counter.ptr_eq(&clone));
        assert!(!counter.ptr_eq(&test_counter()));
        assert_eq!(counter.get(), 1.0);
    }

    #[test]
    fn invalid_name_is_rejected() {
        let err = Counter::new(CounterOpts::new("requests-total", "help")).unwrap_err();
        assert_eq!(err, MetricError::InvalidMetricName("requests-total".into()));
    }

    #[test]
    fn collect_single_data_point() {
        let counter = test_counter();
        counter.inc();

        let family = counter.collect();
        assert_eq!(family.name, "http_requests_total");
        assert_eq!(family.help, "Total requests.");
        assert_eq!(family.data_points.len(), 1);
        assert_eq!(family.data_points[0].value, 1.0);
    }

    #[test]
    fn counter_func_reads_callback() {
        let source = Arc::new(AtomicU64::new(0));
        let reader = Arc::clone(&source);
        let func = CounterFunc::new(
            CounterOpts::new("uptime_seconds_total", "Uptime.").with_const_label("host", "h1"),
            move || reader.load(Ordering::Relaxed) as f64,
        )
        .unwrap();

        source.store(7, Ordering::Relaxed);
        let point = func.write();
        assert_eq!(point.value, 7.0);
        assert_eq!(point.labels, vec![LabelPair::new("host", "h1")]);
        assert!(point.created.is_none());
        assert!(point.exemplar.is_none());
    }

    #[test]
    fn exemplar_never_ahead_of_value() {
        // Writers add 1, 2, 3, ... each with an exemplar of the amount added. The value read
        // after an exemplar must include every add its writer made up to that exemplar.
        let counter = Counter::new(CounterOpts::new("ordered_total", "help")).unwrap();
        let writers = 4;
        let adds_per_writer = 5_000u32;

        thread::scope(|s| {
            for _ in 0..writers {
                let counter = counter.clone();
                s.spawn(move || {
                    for i in 1..=adds_per_writer {
                        counter.add_with_exemplar(f64::from(i), Some(&Labels::new()));
                    }
                });
            }

            let counter = counter.clone();
            s.spawn(move || {
                for _ in 0..adds_per_writer {
                    let point = counter.write();
                    if let Some(exemplar) = point.exemplar {
                        // The writer that stored this exemplar has added 1 + 2 + ... + value.
                        let n = exemplar.value;
                        assert!(point.value >= n * (n + 1.0) / 2.0);
                    }
                }
            });
        });

        let n = f64::from(adds_per_writer);
        assert_eq!(counter.get(), f64::from(writers) * n * (n + 1.0) / 2.0);
    }
}
