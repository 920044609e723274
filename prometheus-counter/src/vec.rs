//! Counter families partitioned by label values.
//!
//! A [`CounterVec`] is a view over one shared map from label-value signatures to counters.
//! Currying produces another view over the same map with some label positions pre-filled; no
//! counter is ever copied between views.

use core::fmt;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::counter::{Clock, Counter, CounterOpts};
use crate::data::MetricFamily;
use crate::desc::Desc;
use crate::error::{MetricError, MetricResult};
use crate::labels::{Labels, VariableLabels};
use crate::metric::{Collector, Metric};
use crate::{prom_debug, prom_error};

/// Options for a [`CounterVec`]: the counter options plus the variable labels partitioning the
/// family.
#[derive(Clone, Debug)]
pub struct CounterVecOpts {
    /// Name, help, constant labels and clock of the family.
    pub counter: CounterOpts,
    /// Ordered variable labels, each with an optional constraint.
    pub variable_labels: VariableLabels,
}

impl CounterVecOpts {
    /// Bundle counter options and variable labels.
    pub fn new(counter: CounterOpts, variable_labels: impl Into<VariableLabels>) -> Self {
        CounterVecOpts {
            counter,
            variable_labels: variable_labels.into(),
        }
    }
}

/// Storage shared by every view of a family.
struct MetricMap {
    desc: Arc<Desc>,
    clock: Clock,
    /// Keyed by the full, ordered label values (curried and supplied).
    metrics: RwLock<HashMap<Vec<String>, Counter>>,
}

impl MetricMap {
    fn get_or_create(&self, values: Vec<String>) -> Counter {
        if let Some(counter) = self
            .metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&values)
        {
            return counter.clone();
        }

        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        // Recheck under the write lock in case another thread already inserted.
        metrics
            .entry(values)
            .or_insert_with_key(|values| {
                prom_debug!(
                    name: "CounterVec.ChildCreated",
                    metric = self.desc.fq_name(),
                    label_values = values.join(",").as_str(),
                );
                Counter::from_parts(
                    Arc::clone(&self.desc),
                    self.desc.make_label_pairs(values),
                    Arc::clone(&self.clock),
                )
            })
            .clone()
    }

    fn remove(&self, values: &[String]) -> bool {
        let removed = self
            .metrics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(values)
            .is_some();
        if removed {
            prom_debug!(
                name: "CounterVec.ChildDeleted",
                metric = self.desc.fq_name(),
                label_values = values.join(",").as_str(),
            );
        }
        removed
    }

    fn clear(&self) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        let count = metrics.len();
        metrics.clear();
        prom_debug!(name: "CounterVec.Reset", metric = self.desc.fq_name(), deleted = count);
    }
}

#[derive(Clone, Debug)]
struct CurriedLabelValue {
    index: usize,
    value: String,
}

/// A family of [`Counter`]s sharing one descriptor, partitioned by the values of its variable
/// labels.
///
/// Counters are created on first lookup and live until deleted. Lookups come in pairs: the
/// `get_metric_*` / [`curry_with`](CounterVec::curry_with) methods return a [`MetricError`],
/// [`with_label_values`](CounterVec::with_label_values), [`with`](CounterVec::with) and
/// [`must_curry_with`](CounterVec::must_curry_with) panic with it instead.
///
/// ```
/// use prometheus_counter::{CounterOpts, CounterVec, Labels};
///
/// let requests = CounterVec::new(
///     CounterOpts::new("http_requests_total", "HTTP requests."),
///     &["method", "code"],
/// )
/// .unwrap();
///
/// requests.with_label_values(&["GET", "200"]).inc();
///
/// let gets = requests.must_curry_with(&Labels::from([("method", "GET")]));
/// gets.with_label_values(&["200"]).add(2.0);
///
/// assert_eq!(requests.with_label_values(&["GET", "200"]).get(), 3.0);
/// ```
#[derive(Clone)]
pub struct CounterVec {
    map: Arc<MetricMap>,
    /// Sorted by label index.
    curry: Vec<CurriedLabelValue>,
}

impl CounterVec {
    /// Creates a family partitioned by unconstrained labels named `label_names`.
    pub fn new(opts: CounterOpts, label_names: &[&str]) -> MetricResult<Self> {
        CounterVec::with_opts(CounterVecOpts::new(
            opts,
            VariableLabels::unconstrained(label_names),
        ))
    }

    /// Creates a family from [`CounterVecOpts`], honoring label constraints.
    pub fn with_opts(opts: CounterVecOpts) -> MetricResult<Self> {
        let desc = opts.counter.desc(opts.variable_labels)?;
        Ok(CounterVec {
            map: Arc::new(MetricMap {
                desc: Arc::new(desc),
                clock: opts.counter.clock(),
                metrics: RwLock::new(HashMap::new()),
            }),
            curry: Vec::new(),
        })
    }

    /// The descriptor shared by every counter of the family.
    pub fn desc(&self) -> &Desc {
        &self.map.desc
    }

    /// Names of the labels still to be supplied on this view, in declaration order.
    pub fn free_label_names(&self) -> Vec<&str> {
        let mut curried = self.curry.iter().peekable();
        self.variable_labels()
            .names()
            .enumerate()
            .filter(|(i, _)| match curried.peek() {
                Some(c) if c.index == *i => {
                    curried.next();
                    false
                }
                _ => true,
            })
            .map(|(_, name)| name)
            .collect()
    }

    /// Returns the counter for `values`, one per free label in declaration order, creating it
    /// on first use.
    ///
    /// Fails with [`MetricError::InconsistentCardinality`] if the number of values does not
    /// match the number of free labels.
    pub fn get_metric_with_label_values(&self, values: &[&str]) -> MetricResult<Counter> {
        match self.resolve_label_values(values) {
            Ok(key) => Ok(self.map.get_or_create(key)),
            Err(err) => {
                prom_debug!(name: "CounterVec.LookupRejected", metric = self.desc().fq_name(), error = format!("{err}").as_str());
                Err(err)
            }
        }
    }

    /// Returns the counter for `labels`, whose names must be exactly the free label names,
    /// creating it on first use.
    pub fn get_metric_with(&self, labels: &Labels<'_>) -> MetricResult<Counter> {
        match self.resolve_labels(labels) {
            Ok(key) => Ok(self.map.get_or_create(key)),
            Err(err) => {
                prom_debug!(name: "CounterVec.LookupRejected", metric = self.desc().fq_name(), error = format!("{err}").as_str());
                Err(err)
            }
        }
    }

    /// Works as [`get_metric_with_label_values`](CounterVec::get_metric_with_label_values) but
    /// panics where it would have returned an error.
    ///
    /// ```
    /// # use prometheus_counter::{CounterOpts, CounterVec};
    /// # let vec = CounterVec::new(CounterOpts::new("requests_total", "help"), &["code", "method"]).unwrap();
    /// vec.with_label_values(&["404", "GET"]).add(42.0);
    /// ```
    pub fn with_label_values(&self, values: &[&str]) -> Counter {
        match self.get_metric_with_label_values(values) {
            Ok(counter) => counter,
            Err(err) => {
                prom_error!(name: "CounterVec.WithLabelValuesFailed", metric = self.desc().fq_name(), error = format!("{err}").as_str());
                panic!("{err}")
            }
        }
    }

    /// Works as [`get_metric_with`](CounterVec::get_metric_with) but panics where it would
    /// have returned an error.
    pub fn with(&self, labels: &Labels<'_>) -> Counter {
        match self.get_metric_with(labels) {
            Ok(counter) => counter,
            Err(err) => {
                prom_error!(name: "CounterVec.WithFailed", metric = self.desc().fq_name(), error = format!("{err}").as_str());
                panic!("{err}")
            }
        }
    }

    /// Returns a view of this family with `labels` fixed.
    ///
    /// The view shares every counter with this one; only the lookups change: the curried
    /// labels are taken out of the free labels, the order of the remaining ones stays the
    /// same. A curried view can be curried again, but only with labels that are still free.
    ///
    /// Fails with [`MetricError::AlreadyCurried`] for a label fixed by an earlier curry and
    /// with [`MetricError::UnknownCurriedLabels`] for names that are not variable labels.
    pub fn curry_with(&self, labels: &Labels<'_>) -> MetricResult<CounterVec> {
        let variable_labels = self.variable_labels();
        let mut curry = Vec::with_capacity(self.curry.len() + labels.len());
        let mut old_curry = self.curry.iter().peekable();

        for (index, name) in variable_labels.names().enumerate() {
            let value = labels.get(name);
            match old_curry.peek() {
                Some(curried) if curried.index == index => {
                    if value.is_some() {
                        let err = MetricError::AlreadyCurried(name.to_owned());
                        prom_debug!(name: "CounterVec.CurryRejected", metric = self.desc().fq_name(), error = format!("{err}").as_str());
                        return Err(err);
                    }
                    curry.push((*curried).clone());
                    old_curry.next();
                }
                _ => {
                    if let Some(value) = value {
                        curry.push(CurriedLabelValue {
                            index,
                            value: variable_labels.constrain(index, value),
                        });
                    }
                }
            }
        }

        let unknown = self.curry.len() + labels.len() - curry.len();
        if unknown > 0 {
            let err = MetricError::UnknownCurriedLabels(unknown);
            prom_debug!(name: "CounterVec.CurryRejected", metric = self.desc().fq_name(), error = format!("{err}").as_str());
            return Err(err);
        }

        Ok(CounterVec {
            map: Arc::clone(&self.map),
            curry,
        })
    }

    /// Works as [`curry_with`](CounterVec::curry_with) but panics where it would have
    /// returned an error.
    pub fn must_curry_with(&self, labels: &Labels<'_>) -> CounterVec {
        match self.curry_with(labels) {
            Ok(vec) => vec,
            Err(err) => {
                prom_error!(name: "CounterVec.CurryFailed", metric = self.desc().fq_name(), error = format!("{err}").as_str());
                panic!("{err}")
            }
        }
    }

    /// Deletes the counter for `values`. Returns `false` if there was none or the values do
    /// not fit the free labels.
    ///
    /// A handle obtained earlier keeps working but is no longer exported; a later lookup
    /// creates a new counter.
    pub fn delete_label_values(&self, values: &[&str]) -> bool {
        self.resolve_label_values(values)
            .map(|key| self.map.remove(&key))
            .unwrap_or(false)
    }

    /// Deletes the counter for `labels`. Returns `false` if there was none or the labels do
    /// not fit the free labels.
    pub fn delete(&self, labels: &Labels<'_>) -> bool {
        self.resolve_labels(labels)
            .map(|key| self.map.remove(&key))
            .unwrap_or(false)
    }

    /// Deletes every counter of the family, whichever view this is called on.
    pub fn reset(&self) {
        self.map.clear()
    }

    fn variable_labels(&self) -> &VariableLabels {
        self.map.desc.variable_labels()
    }

    fn cardinality_error(&self, values: Vec<String>) -> MetricError {
        let label_names: Vec<String> = self
            .free_label_names()
            .into_iter()
            .map(str::to_owned)
            .collect();
        MetricError::InconsistentCardinality {
            fq_name: self.desc().fq_name().to_owned(),
            expected: label_names.len(),
            actual: values.len(),
            label_names,
            values,
        }
    }

    /// Interleaves curried values and `values` (constrained) into the full signature.
    fn resolve_label_values(&self, values: &[&str]) -> MetricResult<Vec<String>> {
        let variable_labels = self.variable_labels();
        if values.len() + self.curry.len() != variable_labels.len() {
            return Err(self.cardinality_error(values.iter().map(|v| (*v).to_owned()).collect()));
        }

        let mut key = Vec::with_capacity(variable_labels.len());
        let mut curried = self.curry.iter().peekable();
        let mut supplied = values.iter();
        for index in 0..variable_labels.len() {
            match curried.peek() {
                Some(c) if c.index == index => {
                    key.push(c.value.clone());
                    curried.next();
                }
                _ => {
                    // Lengths were checked above.
                    let value = supplied.next().copied().unwrap_or_default();
                    key.push(variable_labels.constrain(index, value));
                }
            }
        }
        Ok(key)
    }

    /// Resolves a label map against the free labels into the full signature.
    fn resolve_labels(&self, labels: &Labels<'_>) -> MetricResult<Vec<String>> {
        let variable_labels = self.variable_labels();
        if labels.len() + self.curry.len() != variable_labels.len() {
            let mut names: Vec<String> = labels.keys().map(|name| (*name).to_owned()).collect();
            names.sort();
            return Err(self.cardinality_error(names));
        }

        let mut key = Vec::with_capacity(variable_labels.len());
        let mut curried = self.curry.iter().peekable();
        for (index, name) in variable_labels.names().enumerate() {
            let value = labels.get(name);
            match curried.peek() {
                Some(c) if c.index == index => {
                    if value.is_some() {
                        return Err(MetricError::AlreadyCurried(name.to_owned()));
                    }
                    key.push(c.value.clone());
                    curried.next();
                }
                _ => match value {
                    Some(value) => key.push(variable_labels.constrain(index, value)),
                    None => return Err(MetricError::MissingLabel(name.to_owned())),
                },
            }
        }
        Ok(key)
    }
}

impl Collector for CounterVec {
    fn desc(&self) -> &Desc {
        &self.map.desc
    }

    /// One data point per live counter, ordered by label pairs. Curried and uncurried views
    /// collect the same counters.
    fn collect(&self) -> MetricFamily {
        let mut data_points: Vec<_> = self
            .map
            .metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Metric::write)
            .collect();
        data_points.sort_by(|a, b| a.labels.cmp(&b.labels));

        MetricFamily {
            name: self.map.desc.fq_name().to_owned(),
            help: self.map.desc.help().to_owned(),
            data_points,
        }
    }
}

impl fmt::Debug for CounterVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterVec")
            .field("fq_name", &self.map.desc.fq_name())
            .field("curry", &self.curry)
            .finish()
    }
}
