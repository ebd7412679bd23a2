//! Deterministic synthetic counters for demos, tests, and hosts without any
//! readable fabric.

use std::sync::Mutex;

use crate::counter::{Counter, CounterSnapshot};
use crate::error::CounterError;
use crate::source::CounterSource;

#[derive(Debug)]
struct SimState {
    tick: u64,
    seed: u64,
    totals: CounterSnapshot,
}

pub struct SimulatedSource {
    name: String,
    bytes_per_tick: u64,
    fail_every: Option<u64>,
    state: Mutex<SimState>,
}

impl SimulatedSource {
    pub fn new(name: impl Into<String>, bytes_per_tick: u64) -> Self {
        let name = name.into();
        let seed = name
            .bytes()
            .fold(0x9e37_79b9_7f4a_7c15_u64, |acc, b| {
                (acc ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
            })
            | 1;
        Self {
            name,
            bytes_per_tick,
            fail_every: None,
            state: Mutex::new(SimState {
                tick: 0,
                seed,
                totals: CounterSnapshot::new(),
            }),
        }
    }

    /// Makes every `n`-th refresh fail, to exercise error display.
    pub fn with_failures(mut self, n: u64) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }

    fn next_noise(state: &mut SimState) -> u64 {
        // xorshift64
        let mut x = state.seed;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        state.seed = x;
        x
    }
}

impl CounterSource for SimulatedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn refresh(&self) -> Result<CounterSnapshot, CounterError> {
        let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());
        state.tick += 1;
        if let Some(n) = self.fail_every
            && state.tick % n == 0
        {
            return Err(CounterError::Unavailable(format!(
                "simulated timeout querying {}",
                self.name
            )));
        }

        let noise = Self::next_noise(&mut state);
        let xmit = self.bytes_per_tick + noise % (self.bytes_per_tick / 4 + 1);
        let rcv = self.bytes_per_tick / 2 + (noise >> 16) % (self.bytes_per_tick / 4 + 1);
        let xmit_pkts = xmit / 2048 + 1;
        let rcv_pkts = rcv / 2048 + 1;
        let multicast = (noise >> 8) % 3;
        let symbol_errors = u64::from(noise % 97 == 0);
        let xmit_wait = (noise >> 24) % 64;

        let step = [
            (Counter::XmitDataBytes, xmit),
            (Counter::RcvDataBytes, rcv),
            (Counter::XmitPkts, xmit_pkts),
            (Counter::RcvPkts, rcv_pkts),
            (Counter::UnicastXmitPkts, xmit_pkts.saturating_sub(multicast)),
            (Counter::UnicastRcvPkts, rcv_pkts.saturating_sub(multicast)),
            (Counter::MulticastXmitPkts, multicast),
            (Counter::MulticastRcvPkts, multicast),
            (Counter::SymbolErrors, symbol_errors),
            (Counter::XmitWait, xmit_wait),
        ];
        for (counter, delta) in step {
            let value = state.totals.value(counter).saturating_add(delta);
            state.totals.set(counter, value);
        }
        for counter in Counter::ALL {
            if state.totals.get(counter).is_none() {
                state.totals.set(counter, 0);
            }
        }
        Ok(state.totals.clone())
    }

    fn reset(&self) -> Result<(), CounterError> {
        let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());
        state.totals = CounterSnapshot::new();
        Ok(())
    }
}
