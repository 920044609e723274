use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use crate::error::{MetricError, MetricResult};
use crate::labels::{is_valid_label_name, LabelPair, Labels};

/// Maximum combined number of runes in the label names and values of one exemplar.
pub const EXEMPLAR_MAX_RUNES: usize = 128;

/// A sampled observation attached to a counter update.
#[derive(Debug, Clone, PartialEq)]
pub struct Exemplar {
    /// The value that was added to the counter.
    pub value: f64,
    /// When the observation was made.
    pub timestamp: SystemTime,
    /// The exemplar labels, sorted by name. May be empty.
    pub labels: Vec<LabelPair>,
}

impl Exemplar {
    /// Builds an exemplar, checking every label name and the
    /// [rune budget](EXEMPLAR_MAX_RUNES).
    pub fn new(value: f64, timestamp: SystemTime, labels: &Labels<'_>) -> MetricResult<Self> {
        let mut runes = 0;
        let mut pairs = Vec::with_capacity(labels.len());
        for (&name, &value) in labels {
            if !is_valid_label_name(name) {
                return Err(MetricError::InvalidExemplarLabelName(name.to_owned()));
            }
            runes += name.chars().count() + value.chars().count();
            pairs.push(LabelPair::new(name, value));
        }
        if runes > EXEMPLAR_MAX_RUNES {
            return Err(MetricError::ExemplarLabelsTooLong {
                runes,
                limit: EXEMPLAR_MAX_RUNES,
            });
        }
        pairs.sort();

        Ok(Exemplar {
            value,
            timestamp,
            labels: pairs,
        })
    }
}

/// Holds at most one exemplar. Storing replaces the previous one as a whole.
#[derive(Debug, Default)]
pub(crate) struct ExemplarSlot {
    current: RwLock<Option<Arc<Exemplar>>>,
}

impl ExemplarSlot {
    pub(crate) fn new() -> Self {
        ExemplarSlot::default()
    }

    pub(crate) fn store(&self, exemplar: Exemplar) {
        let exemplar = Arc::new(exemplar);
        // Nothing panics while the lock is held, a poisoned slot still holds a whole exemplar.
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Some(exemplar);
    }

    pub(crate) fn load(&self) -> Option<Arc<Exemplar>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
