//! Label names, label pairs and the variable label declarations of a counter family.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A label map used for by-name lookups, currying, deletion and exemplars.
pub type Labels<'a> = HashMap<&'a str, &'a str>;

/// Sanitizes a label value before it takes part in a lookup.
pub type LabelConstraint = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Label name prefix reserved for internal use.
const RESERVED_LABEL_PREFIX: &str = "__";

/// A resolved label: name and value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelPair {
    /// The label name.
    pub name: String,
    /// The label value.
    pub value: String,
}

impl LabelPair {
    /// Create a new label pair.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        LabelPair {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Checks `[a-zA-Z_][a-zA-Z0-9_]*`.
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Checks `[a-zA-Z_][a-zA-Z0-9_]*` and rejects the reserved `__` prefix.
pub(crate) fn is_valid_user_label_name(name: &str) -> bool {
    is_valid_label_name(name) && !name.starts_with(RESERVED_LABEL_PREFIX)
}

/// Checks `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// A variable label with an optional constraint applied to its values.
#[derive(Clone)]
pub struct ConstrainedLabel {
    name: String,
    constraint: Option<LabelConstraint>,
}

impl ConstrainedLabel {
    /// A label whose values pass through unchanged.
    pub fn new(name: impl Into<String>) -> Self {
        ConstrainedLabel {
            name: name.into(),
            constraint: None,
        }
    }

    /// A label whose values are rewritten by `constraint` before every lookup.
    pub fn with_constraint<F>(name: impl Into<String>, constraint: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        ConstrainedLabel {
            name: name.into(),
            constraint: Some(Arc::new(constraint)),
        }
    }

    /// The label name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn constrain(&self, value: &str) -> String {
        match &self.constraint {
            Some(constraint) => constraint(value),
            None => value.to_owned(),
        }
    }
}

impl fmt::Debug for ConstrainedLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstrainedLabel")
            .field("name", &self.name)
            .field("constrained", &self.constraint.is_some())
            .finish()
    }
}

/// The ordered variable labels partitioning a counter family.
#[derive(Clone, Debug, Default)]
pub struct VariableLabels(Vec<ConstrainedLabel>);

impl VariableLabels {
    /// Variable labels without any constraint.
    pub fn unconstrained<S: AsRef<str>>(names: &[S]) -> Self {
        VariableLabels(
            names
                .iter()
                .map(|name| ConstrainedLabel::new(name.as_ref()))
                .collect(),
        )
    }

    /// Number of variable labels.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when there are no variable labels.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Label names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|label| label.name.as_str())
    }

    /// Applies the constraint of the label at `index` to `value`.
    pub(crate) fn constrain(&self, index: usize, value: &str) -> String {
        self.0[index].constrain(value)
    }
}

impl From<Vec<ConstrainedLabel>> for VariableLabels {
    fn from(labels: Vec<ConstrainedLabel>) -> Self {
        VariableLabels(labels)
    }
}

impl FromIterator<ConstrainedLabel> for VariableLabels {
    fn from_iter<I: IntoIterator<Item = ConstrainedLabel>>(iter: I) -> Self {
        VariableLabels(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("code", true)]
    #[case("_code", true)]
    #[case("status_2xx", true)]
    #[case("", false)]
    #[case("2xx", false)]
    #[case("http-code", false)]
    #[case("le:bound", false)]
    #[case("näme", false)]
    fn label_names(#[case] name: &str, #[case] valid: bool) {
        assert_eq!(is_valid_label_name(name), valid, "{name:?}");
    }

    #[rstest]
    #[case("http_requests_total", true)]
    #[case("job:http_requests:rate5m", true)]
    #[case(":leading_colon", true)]
    #[case("", false)]
    #[case("0_requests", false)]
    #[case("requests.total", false)]
    fn metric_names(#[case] name: &str, #[case] valid: bool) {
        assert_eq!(is_valid_metric_name(name), valid, "{name:?}");
    }

    #[test]
    fn reserved_prefix_is_not_a_user_label() {
        assert!(is_valid_label_name("__name__"));
        assert!(!is_valid_user_label_name("__name__"));
        assert!(is_valid_user_label_name("_name"));
    }

    #[test]
    fn constraint_rewrites_value() {
        let labels: VariableLabels = vec![
            ConstrainedLabel::with_constraint("method", |v: &str| v.to_ascii_lowercase()),
            ConstrainedLabel::new("code"),
        ]
        .into();

        assert_eq!(labels.constrain(0, "GET"), "get");
        assert_eq!(labels.constrain(1, "GET"), "GET");
        assert_eq!(labels.names().collect::<Vec<_>>(), vec!["method", "code"]);
    }
}
