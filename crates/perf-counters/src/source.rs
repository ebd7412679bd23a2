use std::fmt;
use std::sync::Arc;

use crate::counter::CounterSnapshot;
use crate::error::CounterError;

/// A provider of cumulative performance counters.
///
/// `refresh` may block on I/O; callers run it from a background thread.
pub trait CounterSource: Send + Sync {
    fn name(&self) -> &str;
    fn refresh(&self) -> Result<CounterSnapshot, CounterError>;
    fn reset(&self) -> Result<(), CounterError>;
}

pub type SharedSource = Arc<dyn CounterSource>;

impl fmt::Debug for dyn CounterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterSource")
            .field("name", &self.name())
            .finish()
    }
}

/// Sums a set of sources, e.g. a node as the total of its ports.
pub struct AggregateSource {
    name: String,
    parts: Vec<SharedSource>,
}

impl AggregateSource {
    pub fn new(name: impl Into<String>, parts: Vec<SharedSource>) -> Self {
        Self {
            name: name.into(),
            parts,
        }
    }

    pub fn parts(&self) -> &[SharedSource] {
        &self.parts
    }
}

impl CounterSource for AggregateSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn refresh(&self) -> Result<CounterSnapshot, CounterError> {
        let mut total = CounterSnapshot::new();
        for part in &self.parts {
            total.accumulate(&part.refresh()?);
        }
        Ok(total)
    }

    fn reset(&self) -> Result<(), CounterError> {
        for part in &self.parts {
            part.reset()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::Counter;
    use std::sync::Mutex;

    struct Fixed {
        snapshot: CounterSnapshot,
        resets: Mutex<u32>,
    }

    impl CounterSource for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn refresh(&self) -> Result<CounterSnapshot, CounterError> {
            Ok(self.snapshot.clone())
        }

        fn reset(&self) -> Result<(), CounterError> {
            *self.resets.lock().unwrap() += 1;
            Ok(())
        }
    }

    struct Broken;

    impl CounterSource for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn refresh(&self) -> Result<CounterSnapshot, CounterError> {
            Err(CounterError::Unavailable("port is down".into()))
        }

        fn reset(&self) -> Result<(), CounterError> {
            Ok(())
        }
    }

    fn fixed(xmit: u64) -> Arc<Fixed> {
        Arc::new(Fixed {
            snapshot: CounterSnapshot::new().with(Counter::XmitDataBytes, xmit),
            resets: Mutex::new(0),
        })
    }

    #[test]
    fn aggregate_sums_parts_and_resets_each() {
        let a = fixed(100);
        let b = fixed(23);
        let node = AggregateSource::new("node", vec![a.clone(), b.clone()]);
        assert_eq!(node.refresh().unwrap().xmit_data_bytes(), 123);
        node.reset().unwrap();
        assert_eq!(*a.resets.lock().unwrap(), 1);
        assert_eq!(*b.resets.lock().unwrap(), 1);
    }

    #[test]
    fn aggregate_propagates_part_failure() {
        let node = AggregateSource::new("node", vec![fixed(1), Arc::new(Broken)]);
        let err = node.refresh().unwrap_err();
        assert!(err.to_string().contains("port is down"));
    }
}
