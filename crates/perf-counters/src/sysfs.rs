//! InfiniBand port counters exported by the kernel under
//! `/sys/class/infiniband/<device>/ports/<n>/`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::baseline::Baseline;
use crate::counter::{Counter, CounterSnapshot};
use crate::error::CounterError;
use crate::source::CounterSource;

pub const DEFAULT_ROOT: &str = "/sys/class/infiniband";

/// `(counter, file name, multiplier)`. The data counters are kept by the
/// hardware in units of four octets.
const PORT_COUNTERS: &[(Counter, &str, u64)] = &[
    (Counter::XmitDataBytes, "port_xmit_data", 4),
    (Counter::RcvDataBytes, "port_rcv_data", 4),
    (Counter::XmitPkts, "port_xmit_packets", 1),
    (Counter::RcvPkts, "port_rcv_packets", 1),
    (Counter::UnicastXmitPkts, "unicast_xmit_packets", 1),
    (Counter::UnicastRcvPkts, "unicast_rcv_packets", 1),
    (Counter::MulticastXmitPkts, "multicast_xmit_packets", 1),
    (Counter::MulticastRcvPkts, "multicast_rcv_packets", 1),
    (Counter::SymbolErrors, "symbol_error", 1),
    (Counter::LinkDowned, "link_downed", 1),
    (Counter::LinkRecoveries, "link_error_recovery", 1),
    (Counter::RcvErrors, "port_rcv_errors", 1),
    (
        Counter::RcvRemotePhysicalErrors,
        "port_rcv_remote_physical_errors",
        1,
    ),
    (
        Counter::RcvSwitchRelayErrors,
        "port_rcv_switch_relay_errors",
        1,
    ),
    (Counter::XmitDiscards, "port_xmit_discards", 1),
    (
        Counter::XmitConstraintErrors,
        "port_xmit_constraint_errors",
        1,
    ),
    (Counter::RcvConstraintErrors, "port_rcv_constraint_errors", 1),
    (
        Counter::LocalLinkIntegrityErrors,
        "local_link_integrity_errors",
        1,
    ),
    (
        Counter::ExcessiveBufferOverrunErrors,
        "excessive_buffer_overrun_errors",
        1,
    ),
    (Counter::Vl15Dropped, "VL15_dropped", 1),
    (Counter::XmitWait, "port_xmit_wait", 1),
];

/// Reads one decimal counter file. A missing file is `Ok(None)`.
pub(crate) fn read_counter_file(path: &Path) -> Result<Option<u64>, CounterError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(CounterError::io(path, err)),
    };
    let trimmed = raw.trim();
    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| CounterError::Parse {
            path: path.to_path_buf(),
            value: trimmed.to_string(),
        })
}

pub(crate) fn require_dir(path: &Path) -> Result<(), CounterError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(CounterError::io(
            path,
            io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        )),
        Err(err) => Err(CounterError::io(path, err)),
    }
}

pub struct IbPortSource {
    name: String,
    number: u32,
    port_dir: PathBuf,
    baseline: Baseline,
}

impl IbPortSource {
    pub fn new(name: impl Into<String>, number: u32, port_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            number,
            port_dir: port_dir.into(),
            baseline: Baseline::default(),
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    fn read_raw(&self) -> Result<CounterSnapshot, CounterError> {
        let counters = self.port_dir.join("counters");
        require_dir(&counters)?;
        let mut snapshot = CounterSnapshot::new();
        for (counter, file, multiplier) in PORT_COUNTERS {
            if let Some(value) = read_counter_file(&counters.join(file))? {
                snapshot.set(*counter, value.saturating_mul(*multiplier));
            }
        }
        self.read_hw_counters(&mut snapshot)?;
        Ok(snapshot)
    }

    fn read_hw_counters(&self, snapshot: &mut CounterSnapshot) -> Result<(), CounterError> {
        let dir = self.port_dir.join("hw_counters");
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(CounterError::io(&dir, err)),
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort();
        for path in files {
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            match read_counter_file(&path) {
                Ok(Some(value)) => snapshot.set_extra(name, value),
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = %err, "skipping hw counter");
                }
            }
        }
        Ok(())
    }
}

impl CounterSource for IbPortSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn refresh(&self) -> Result<CounterSnapshot, CounterError> {
        let raw = self.read_raw()?;
        Ok(self.baseline.apply(&raw))
    }

    fn reset(&self) -> Result<(), CounterError> {
        let raw = self.read_raw()?;
        self.baseline.rebase(raw);
        tracing::debug!(port = %self.name, "counters reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn port_dir(tmp: &TempDir) -> PathBuf {
        let port = tmp.path().join("mlx5_0/ports/1");
        fs::create_dir_all(port.join("counters")).unwrap();
        port
    }

    fn write(port: &Path, file: &str, value: &str) {
        fs::write(port.join("counters").join(file), value).unwrap();
    }

    #[test]
    fn data_counters_are_scaled_to_bytes() {
        let tmp = TempDir::new().unwrap();
        let port = port_dir(&tmp);
        write(&port, "port_xmit_data", "250\n");
        write(&port, "port_rcv_data", "10\n");
        write(&port, "symbol_error", "3\n");

        let source = IbPortSource::new("Port 1", 1, &port);
        let snap = source.refresh().unwrap();
        assert_eq!(snap.xmit_data_bytes(), 1000);
        assert_eq!(snap.rcv_data_bytes(), 40);
        assert_eq!(snap.value(Counter::SymbolErrors), 3);
        assert_eq!(snap.get(Counter::XmitWait), None);
    }

    #[test]
    fn reset_rebases_future_reads() {
        let tmp = TempDir::new().unwrap();
        let port = port_dir(&tmp);
        write(&port, "port_xmit_packets", "40");
        let source = IbPortSource::new("Port 1", 1, &port);
        source.reset().unwrap();
        write(&port, "port_xmit_packets", "45");
        assert_eq!(source.refresh().unwrap().value(Counter::XmitPkts), 5);
    }

    #[test]
    fn garbage_value_is_a_parse_error() {
        let tmp = TempDir::new().unwrap();
        let port = port_dir(&tmp);
        write(&port, "link_downed", "N/A");
        let source = IbPortSource::new("Port 1", 1, &port);
        let err = source.refresh().unwrap_err();
        assert!(matches!(err, CounterError::Parse { ref value, .. } if value == "N/A"));
    }

    #[test]
    fn missing_counters_directory_is_an_io_error() {
        let tmp = TempDir::new().unwrap();
        let source = IbPortSource::new("Port 9", 9, tmp.path().join("gone"));
        assert!(matches!(source.refresh(), Err(CounterError::Io { .. })));
    }

    #[test]
    fn hw_counters_become_extras() {
        let tmp = TempDir::new().unwrap();
        let port = port_dir(&tmp);
        fs::create_dir_all(port.join("hw_counters")).unwrap();
        fs::write(port.join("hw_counters/rnr_nak_retry_err"), "2\n").unwrap();
        fs::write(port.join("hw_counters/lifespan"), "10\n").unwrap();
        fs::write(port.join("hw_counters/bogus"), "abc\n").unwrap();

        let snap = IbPortSource::new("Port 1", 1, &port).refresh().unwrap();
        let names: Vec<_> = snap.extras().iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["lifespan", "rnr_nak_retry_err"]);
    }
}
