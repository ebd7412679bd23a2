use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid counter value {value:?} in {}", path.display())]
    Parse { path: PathBuf, value: String },
    #[error("no devices found under {}", .0.display())]
    NoDevices(PathBuf),
    #[error("{0}")]
    Unavailable(String),
}

impl CounterError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CounterError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_the_path() {
        let err = CounterError::io(
            "/sys/class/infiniband/mlx5_0",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/sys/class/infiniband/mlx5_0"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn no_devices_message() {
        let err = CounterError::NoDevices(PathBuf::from("/tmp/none"));
        assert_eq!(err.to_string(), "no devices found under /tmp/none");
    }
}
