use std::sync::Mutex;

use crate::counter::CounterSnapshot;

/// Reset support for providers whose raw counters cannot be cleared.
///
/// A reset records the current raw values; later reads report the delta.
#[derive(Debug, Default)]
pub(crate) struct Baseline {
    offset: Mutex<CounterSnapshot>,
}

impl Baseline {
    pub(crate) fn apply(&self, raw: &CounterSnapshot) -> CounterSnapshot {
        let offset = self.offset.lock().unwrap_or_else(|err| err.into_inner());
        raw.since(&offset)
    }

    pub(crate) fn rebase(&self, raw: CounterSnapshot) {
        let mut offset = self.offset.lock().unwrap_or_else(|err| err.into_inner());
        *offset = raw;
    }
}
