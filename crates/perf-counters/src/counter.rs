use std::collections::BTreeMap;
use std::fmt;

/// Port counters every provider reports, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Counter {
    XmitDataBytes,
    RcvDataBytes,
    XmitPkts,
    RcvPkts,
    UnicastXmitPkts,
    UnicastRcvPkts,
    MulticastXmitPkts,
    MulticastRcvPkts,
    SymbolErrors,
    LinkDowned,
    LinkRecoveries,
    RcvErrors,
    RcvRemotePhysicalErrors,
    RcvSwitchRelayErrors,
    XmitDiscards,
    XmitConstraintErrors,
    RcvConstraintErrors,
    LocalLinkIntegrityErrors,
    ExcessiveBufferOverrunErrors,
    Vl15Dropped,
    XmitWait,
}

impl Counter {
    pub const ALL: [Counter; 21] = [
        Counter::XmitDataBytes,
        Counter::RcvDataBytes,
        Counter::XmitPkts,
        Counter::RcvPkts,
        Counter::UnicastXmitPkts,
        Counter::UnicastRcvPkts,
        Counter::MulticastXmitPkts,
        Counter::MulticastRcvPkts,
        Counter::SymbolErrors,
        Counter::LinkDowned,
        Counter::LinkRecoveries,
        Counter::RcvErrors,
        Counter::RcvRemotePhysicalErrors,
        Counter::RcvSwitchRelayErrors,
        Counter::XmitDiscards,
        Counter::XmitConstraintErrors,
        Counter::RcvConstraintErrors,
        Counter::LocalLinkIntegrityErrors,
        Counter::ExcessiveBufferOverrunErrors,
        Counter::Vl15Dropped,
        Counter::XmitWait,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Counter::XmitDataBytes => "Xmit Data",
            Counter::RcvDataBytes => "Rcv Data",
            Counter::XmitPkts => "Xmit Pkts",
            Counter::RcvPkts => "Rcv Pkts",
            Counter::UnicastXmitPkts => "Unicast Xmit Pkts",
            Counter::UnicastRcvPkts => "Unicast Rcv Pkts",
            Counter::MulticastXmitPkts => "Multicast Xmit Pkts",
            Counter::MulticastRcvPkts => "Multicast Rcv Pkts",
            Counter::SymbolErrors => "Symbol Errors",
            Counter::LinkDowned => "Link Downed",
            Counter::LinkRecoveries => "Link Recoveries",
            Counter::RcvErrors => "Rcv Errors",
            Counter::RcvRemotePhysicalErrors => "Rcv Remote Physical Errors",
            Counter::RcvSwitchRelayErrors => "Rcv Switch Relay Errors",
            Counter::XmitDiscards => "Xmit Discards",
            Counter::XmitConstraintErrors => "Xmit Constraint Errors",
            Counter::RcvConstraintErrors => "Rcv Constraint Errors",
            Counter::LocalLinkIntegrityErrors => "Local Link Integrity Errors",
            Counter::ExcessiveBufferOverrunErrors => "Excessive Buffer Overrun Errors",
            Counter::Vl15Dropped => "VL15 Dropped",
            Counter::XmitWait => "Xmit Wait",
        }
    }

    /// Byte counters are rendered with a `Bytes` unit, everything else is a
    /// plain count.
    pub fn is_bytes(self) -> bool {
        matches!(self, Counter::XmitDataBytes | Counter::RcvDataBytes)
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One refresh worth of cumulative counter values.
///
/// `extras` carries provider specific counters (for example the hardware
/// diagnostic counters of an HCA) that have no [`Counter`] variant. They are
/// kept in the order the provider reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    values: BTreeMap<Counter, u64>,
    extras: Vec<(String, u64)>,
}

impl CounterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, counter: Counter, value: u64) {
        self.values.insert(counter, value);
    }

    pub fn with(mut self, counter: Counter, value: u64) -> Self {
        self.set(counter, value);
        self
    }

    pub fn get(&self, counter: Counter) -> Option<u64> {
        self.values.get(&counter).copied()
    }

    /// Value of `counter`, zero when the provider does not report it.
    pub fn value(&self, counter: Counter) -> u64 {
        self.get(counter).unwrap_or(0)
    }

    pub fn xmit_data_bytes(&self) -> u64 {
        self.value(Counter::XmitDataBytes)
    }

    pub fn rcv_data_bytes(&self) -> u64 {
        self.value(Counter::RcvDataBytes)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Counter, u64)> + '_ {
        self.values.iter().map(|(counter, value)| (*counter, *value))
    }

    pub fn set_extra(&mut self, name: impl Into<String>, value: u64) {
        let name = name.into();
        if let Some(entry) = self.extras.iter_mut().find(|(existing, _)| *existing == name) {
            entry.1 = value;
        } else {
            self.extras.push((name, value));
        }
    }

    pub fn extra(&self, name: &str) -> Option<u64> {
        self.extras
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| *value)
    }

    pub fn extras(&self) -> &[(String, u64)] {
        &self.extras
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.extras.is_empty()
    }

    /// Adds every counter of `other` into `self`. Sums
    /// saturate at `u64::MAX`.
    pub fn accumulate(&mut self, other: &CounterSnapshot) {
        for (counter, value) in other.iter() {
            let entry = self.values.entry(counter).or_insert(0);
            *entry = entry.saturating_add(value);
        }
        for (name, value) in &other.extras {
            let current = self.extra(name).unwrap_or(0);
            self.set_extra(name.clone(), current.saturating_add(*value));
        }
    }

    /// Per-counter `self - baseline`, clamped at zero.
    pub fn since(&self, baseline: &CounterSnapshot) -> CounterSnapshot {
        let values = self
            .values
            .iter()
            .map(|(counter, value)| (*counter, value.saturating_sub(baseline.value(*counter))))
            .collect();
        let extras = self
            .extras
            .iter()
            .map(|(name, value)| {
                let base = baseline.extra(name).unwrap_or(0);
                (name.clone(), value.saturating_sub(base))
            })
            .collect();
        CounterSnapshot { values, extras }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_counters_read_as_zero() {
        let snap = CounterSnapshot::new().with(Counter::XmitPkts, 7);
        assert_eq!(snap.value(Counter::XmitPkts), 7);
        assert_eq!(snap.get(Counter::RcvPkts), None);
        assert_eq!(snap.value(Counter::RcvPkts), 0);
    }

    #[test]
    fn accumulate_sums_shared_counters_and_extras() {
        let mut total = CounterSnapshot::new().with(Counter::XmitDataBytes, 10);
        total.set_extra("lifespan", 1);
        let mut other = CounterSnapshot::new()
            .with(Counter::XmitDataBytes, 5)
            .with(Counter::RcvDataBytes, 3);
        other.set_extra("lifespan", 2);
        other.set_extra("rnr_nak_retry_err", 4);

        total.accumulate(&other);

        assert_eq!(total.xmit_data_bytes(), 15);
        assert_eq!(total.rcv_data_bytes(), 3);
        assert_eq!(total.extra("lifespan"), Some(3));
        assert_eq!(total.extra("rnr_nak_retry_err"), Some(4));
    }

    #[test]
    fn since_clamps_at_zero() {
        let current = CounterSnapshot::new()
            .with(Counter::SymbolErrors, 4)
            .with(Counter::LinkDowned, 1);
        let baseline = CounterSnapshot::new()
            .with(Counter::SymbolErrors, 1)
            .with(Counter::LinkDowned, 9);
        let delta = current.since(&baseline);
        assert_eq!(delta.value(Counter::SymbolErrors), 3);
        assert_eq!(delta.value(Counter::LinkDowned), 0);
    }

    #[test]
    fn labels_are_unique() {
        let mut labels: Vec<_> = Counter::ALL.iter().map(|c| c.label()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), Counter::ALL.len());
    }
}
