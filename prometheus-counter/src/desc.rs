//! Metric descriptors.
//!
//! A [`Desc`] is the immutable identity shared by a counter and, for a counter family, by every
//! child of the family: the fully-qualified name, the help text, the constant label pairs and
//! the ordered variable labels.

use std::collections::{HashMap, HashSet};

use crate::error::{MetricError, MetricResult};
use crate::labels::{is_valid_metric_name, is_valid_user_label_name, LabelPair, VariableLabels};

/// Joins the non-empty components with `_`.
///
/// An empty `name` yields an empty fully-qualified name, whatever the namespace and subsystem.
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// The descriptor of a counter or counter family.
#[derive(Debug, Clone)]
pub struct Desc {
    fq_name: String,
    help: String,
    const_label_pairs: Vec<LabelPair>,
    variable_labels: VariableLabels,
}

impl Desc {
    /// Validates and builds a descriptor.
    ///
    /// The metric name must match `[a-zA-Z_:][a-zA-Z0-9_:]*`; every label name must match
    /// `[a-zA-Z_][a-zA-Z0-9_]*` and must not start with `__`. A label name may appear only once
    /// across constant and variable labels.
    pub fn new(
        fq_name: impl Into<String>,
        help: impl Into<String>,
        variable_labels: VariableLabels,
        const_labels: &HashMap<String, String>,
    ) -> MetricResult<Self> {
        let fq_name = fq_name.into();
        if !is_valid_metric_name(&fq_name) {
            return Err(MetricError::InvalidMetricName(fq_name));
        }

        let mut seen = HashSet::with_capacity(const_labels.len() + variable_labels.len());
        let mut const_label_pairs = Vec::with_capacity(const_labels.len());
        for (name, value) in const_labels {
            if !is_valid_user_label_name(name) {
                return Err(MetricError::InvalidLabelName(name.clone()));
            }
            seen.insert(name.as_str());
            const_label_pairs.push(LabelPair::new(name.as_str(), value.as_str()));
        }
        const_label_pairs.sort();

        for name in variable_labels.names() {
            if !is_valid_user_label_name(name) {
                return Err(MetricError::InvalidLabelName(name.to_owned()));
            }
            if !seen.insert(name) {
                return Err(MetricError::DuplicateLabelName(name.to_owned()));
            }
        }

        Ok(Desc {
            fq_name,
            help: help.into(),
            const_label_pairs,
            variable_labels,
        })
    }

    /// The fully-qualified metric name.
    pub fn fq_name(&self) -> &str {
        &self.fq_name
    }

    /// The help text.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Constant label pairs, sorted by name.
    pub fn const_label_pairs(&self) -> &[LabelPair] {
        &self.const_label_pairs
    }

    /// The ordered variable labels.
    pub fn variable_labels(&self) -> &VariableLabels {
        &self.variable_labels
    }

    /// Merges the constant label pairs with the variable labels bound to `values`, sorted by
    /// name. `values` must hold one value per variable label.
    pub(crate) fn make_label_pairs(&self, values: &[String]) -> Vec<LabelPair> {
        debug_assert_eq!(values.len(), self.variable_labels.len());
        let mut pairs = Vec::with_capacity(self.const_label_pairs.len() + values.len());
        pairs.extend(self.const_label_pairs.iter().cloned());
        pairs.extend(
            self.variable_labels
                .names()
                .zip(values)
                .map(|(name, value)| LabelPair::new(name, value.as_str())),
        );
        pairs.sort();
        pairs
    }
}
