//! Kernel network-device statistics from `/sys/class/net/<if>/statistics`.
//!
//! Used when no InfiniBand devices are present (IPoIB and Ethernet links
//! expose the same directory layout).

use std::path::PathBuf;

use crate::baseline::Baseline;
use crate::counter::{Counter, CounterSnapshot};
use crate::error::CounterError;
use crate::source::CounterSource;
use crate::sysfs::{read_counter_file, require_dir};

pub const DEFAULT_ROOT: &str = "/sys/class/net";

const STATISTICS: &[(Counter, &str)] = &[
    (Counter::XmitDataBytes, "tx_bytes"),
    (Counter::RcvDataBytes, "rx_bytes"),
    (Counter::XmitPkts, "tx_packets"),
    (Counter::RcvPkts, "rx_packets"),
    (Counter::MulticastRcvPkts, "multicast"),
    (Counter::RcvErrors, "rx_errors"),
    (Counter::XmitDiscards, "tx_dropped"),
    (Counter::SymbolErrors, "rx_crc_errors"),
    (Counter::LocalLinkIntegrityErrors, "carrier_errors"),
    (Counter::ExcessiveBufferOverrunErrors, "rx_over_errors"),
];

pub struct NetDevSource {
    name: String,
    statistics: PathBuf,
    baseline: Baseline,
}

impl NetDevSource {
    pub fn new(name: impl Into<String>, statistics: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            statistics: statistics.into(),
            baseline: Baseline::default(),
        }
    }

    fn read_raw(&self) -> Result<CounterSnapshot, CounterError> {
        require_dir(&self.statistics)?;
        let mut snapshot = CounterSnapshot::new();
        for (counter, file) in STATISTICS {
            if let Some(value) = read_counter_file(&self.statistics.join(file))? {
                snapshot.set(*counter, value);
            }
        }
        Ok(snapshot)
    }
}

impl CounterSource for NetDevSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn refresh(&self) -> Result<CounterSnapshot, CounterError> {
        let raw = self.read_raw()?;
        Ok(self.baseline.apply(&raw))
    }

    fn reset(&self) -> Result<(), CounterError> {
        self.baseline.rebase(self.read_raw()?);
        Ok(())
    }
}
