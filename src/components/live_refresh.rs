use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use crossterm::event::KeyEvent;
use perf_counters::{Counter, CounterError, CounterSnapshot, SharedSource};

use super::list::{ListCursor, paint_rows};
use crate::constants::COUNTER_LABEL_WIDTH;
use crate::surface::Canvas;
use crate::window::{KeyOutcome, RedrawSignal, Window, WindowBase};

const PREFIXES: [&str; 7] = ["", "k", "M", "G", "T", "P", "E"];

/// Scale `value` by powers of 1000 and return it with its metric prefix.
pub fn scale_metric(value: f64) -> (f64, &'static str) {
    let mut scaled = value;
    let mut index = 0;
    while scaled >= 1000.0 && index + 1 < PREFIXES.len() {
        scaled /= 1000.0;
        index += 1;
    }
    (scaled, PREFIXES[index])
}

/// `"<label>:"` padded to the label column, then the scaled value with unit
/// and the raw value in parentheses.
pub fn format_counter(label: &str, value: u64, unit: &str) -> String {
    let (scaled, prefix) = scale_metric(value as f64);
    format!(
        "{:<width$} {scaled:.3} {prefix}{unit} ({value})",
        format!("{label}:"),
        width = COUNTER_LABEL_WIDTH
    )
}

/// Throughput derived from consecutive cumulative byte counts.
#[derive(Debug, Default, Clone, PartialEq)]
struct Rates {
    last_xmit: u64,
    last_rcv: u64,
    xmit: f64,
    rcv: f64,
    due: bool,
}

impl Rates {
    fn rate(current: u64, previous: u64, seconds: f64) -> f64 {
        if previous == 0 || seconds <= 0.0 {
            return 0.0;
        }
        current.saturating_sub(previous) as f64 / seconds
    }

    fn update(&mut self, snapshot: &CounterSnapshot, interval: Duration) {
        if !self.due {
            return;
        }
        self.due = false;
        let seconds = interval.as_secs_f64();
        let xmit = snapshot.xmit_data_bytes();
        let rcv = snapshot.rcv_data_bytes();
        self.xmit = Self::rate(xmit, self.last_xmit, seconds);
        self.rcv = Self::rate(rcv, self.last_rcv, seconds);
        self.last_xmit = xmit;
        self.last_rcv = rcv;
    }
}

/// Everything the refresh thread and the draw path share.
struct LiveContent {
    rows: Vec<String>,
    cursor: ListCursor,
    source: SharedSource,
    rates: Rates,
    interval: Duration,
}

impl LiveContent {
    fn regenerate(&mut self) {
        self.rows = match self.source.refresh() {
            Ok(snapshot) => {
                self.rates.update(&snapshot, self.interval);
                counter_rows(&snapshot, &self.rates)
            }
            Err(err) => {
                self.rates.due = false;
                tracing::warn!(source = self.source.name(), error = %err, "counter refresh failed");
                error_rows(&err)
            }
        };
    }

    fn tick(&mut self) {
        self.rates.due = true;
        self.regenerate();
    }
}

fn counter_rows(snapshot: &CounterSnapshot, rates: &Rates) -> Vec<String> {
    let mut rows = vec![
        format_counter("Xmit Throughput", rates.xmit.round() as u64, "Bytes/s"),
        format_counter("Rcv Throughput", rates.rcv.round() as u64, "Bytes/s"),
    ];
    for counter in Counter::ALL {
        if let Some(value) = snapshot.get(counter) {
            let unit = if counter.is_bytes() { "Bytes" } else { "Units" };
            rows.push(format_counter(counter.label(), value, unit));
        }
    }
    for (name, value) in snapshot.extras() {
        rows.push(format_counter(name, *value, "Units"));
    }
    rows
}

fn error_rows(err: &CounterError) -> Vec<String> {
    vec![
        "An error occurred while refreshing the performance counters:".to_string(),
        err.to_string(),
        "Retrying...".to_string(),
    ]
}

fn lock_content(content: &Mutex<LiveContent>) -> MutexGuard<'_, LiveContent> {
    content.lock().unwrap_or_else(|err| err.into_inner())
}

struct RefreshWorker {
    alive: Arc<AtomicBool>,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshWorker {
    fn spawn(
        content: Arc<Mutex<LiveContent>>,
        interval: Duration,
        signal: RedrawSignal,
        name: &str,
    ) -> Option<Self> {
        let alive = Arc::new(AtomicBool::new(true));
        let (stop, stopped) = crossbeam_channel::bounded::<()>(0);
        let thread_alive = alive.clone();
        let spawned = thread::Builder::new()
            .name("live-refresh".into())
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        _ => break,
                    }
                    if !thread_alive.load(Ordering::Acquire) {
                        break;
                    }
                    lock_content(&content).tick();
                    signal.request_refresh();
                }
            });
        match spawned {
            Ok(handle) => Some(Self {
                alive,
                stop: Some(stop),
                handle: Some(handle),
            }),
            Err(err) => {
                tracing::error!(window = name, error = %err, "failed to spawn refresh thread");
                None
            }
        }
    }
}

impl Drop for RefreshWorker {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
        self.stop.take();
        if let Some(handle) = self.handle.take()
            && handle.thread().id() != thread::current().id()
        {
            let _ = handle.join();
        }
    }
}

/// List window whose rows are rebuilt from a counter source on a fixed
/// interval by a background thread.
///
/// Rows, cursor, and source sit behind one content lock: a draw never sees
/// a half rebuilt row set, and a source swap is visible atomically.
pub struct LiveRefreshWindow {
    base: WindowBase,
    content: Arc<Mutex<LiveContent>>,
    worker: Option<RefreshWorker>,
}

impl LiveRefreshWindow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        title: impl Into<String>,
        source: SharedSource,
        interval: Duration,
        signal: RedrawSignal,
    ) -> Self {
        let mut base = WindowBase::new(x, y, width, height, title);
        base.attach(signal.clone());
        let mut content = LiveContent {
            rows: Vec::new(),
            cursor: ListCursor::default(),
            source,
            rates: Rates::default(),
            interval,
        };
        content.regenerate();
        let content = Arc::new(Mutex::new(content));
        let worker = RefreshWorker::spawn(content.clone(), interval, signal, base.title());
        Self {
            base,
            content,
            worker,
        }
    }

    fn content(&self) -> MutexGuard<'_, LiveContent> {
        lock_content(&self.content)
    }

    pub fn source(&self) -> SharedSource {
        self.content().source.clone()
    }

    pub fn interval(&self) -> Duration {
        self.content().interval
    }

    pub fn rows(&self) -> Vec<String> {
        self.content().rows.clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.worker.is_some()
    }

    /// Swap the source and rebuild the rows before returning.
    pub fn set_source(&self, source: SharedSource) {
        {
            let mut content = self.content();
            tracing::debug!(window = self.base.title(), source = source.name(), "source changed");
            content.source = source;
            content.cursor.reset();
            content.rates = Rates::default();
            content.regenerate();
        }
        self.base.request_redraw();
    }

    /// Rebuild the rows now without computing rates.
    pub fn refresh_now(&self) {
        self.content().regenerate();
        self.base.request_redraw();
    }

    /// Zero the source's counters and the rate state.
    pub fn reset_counters(&self) -> Result<(), CounterError> {
        let result = {
            let mut content = self.content();
            let result = content.source.reset();
            content.rates = Rates::default();
            content.regenerate();
            result
        };
        if let Err(err) = &result {
            tracing::warn!(window = self.base.title(), error = %err, "counter reset failed");
        }
        self.base.request_redraw();
        result
    }
}

impl Window for LiveRefreshWindow {
    fn base(&self) -> &WindowBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WindowBase {
        &mut self.base
    }

    fn handle_key(&mut self, key: &KeyEvent) -> KeyOutcome {
        let visible = self.base.content_height();
        let mut content = lock_content(&self.content);
        let total = content.rows.len();
        if content.cursor.navigate(key, total, visible) {
            KeyOutcome::Handled
        } else {
            KeyOutcome::Ignored
        }
    }

    fn draw_content(&mut self, canvas: &mut Canvas<'_>) {
        let mut content = lock_content(&self.content);
        let LiveContent { rows, cursor, .. } = &mut *content;
        paint_rows(canvas, rows, cursor);
    }
}
