use std::time::Duration;

use crate::constants::DEFAULT_POLL_INTERVAL_MS;
use crate::error::WmError;

#[derive(Debug, Clone)]
pub struct WmConfig {
    /// Longest the loop thread waits for input before re-checking redraw
    /// and resize state.
    pub poll_interval: Duration,
    /// Draw the function-key bar on the last terminal row.
    pub function_bar: bool,
}

impl Default for WmConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            function_bar: true,
        }
    }
}

impl WmConfig {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn validate(&self) -> Result<(), WmError> {
        if self.poll_interval.is_zero() {
            return Err(WmError::Config("poll interval must be non-zero".into()));
        }
        if self.poll_interval > Duration::from_secs(1) {
            return Err(WmError::Config(format!(
                "poll interval {:?} would make the UI unresponsive",
                self.poll_interval
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(WmConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_and_huge_intervals() {
        let zero = WmConfig::default().with_poll_interval(Duration::ZERO);
        assert!(matches!(zero.validate(), Err(WmError::Config(_))));
        let slow = WmConfig::default().with_poll_interval(Duration::from_secs(5));
        assert!(slow.validate().is_err());
    }
}
