use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use indoc::formatdoc;
use perf_counters::{DiscoveryRoots, Fabric, SharedSource, SourceKind};
use tracing::Level;

use perfmon_wm::components::debug_log::{self, DebugLogHandle};
use perfmon_wm::components::{
    DebugLogWindow, ExpandableMenu, LiveRefreshWindow, MenuNode, MenuSelection, MessageWindow,
    OkMessageWindow, acknowledge, confirm,
};
use perfmon_wm::drivers::console::{ConsoleInputDriver, ConsoleOutputDriver};
use perfmon_wm::{Window, WindowHandle, WindowManager, WmConfig, WmError, WmResult, tracing_sub};

const MAX_SLOTS: usize = 9;
const MIN_MENU_WIDTH: u16 = 20;
const SIMULATED_NODES: usize = 4;
const SIMULATED_PORTS: u32 = 2;

#[derive(Parser, Debug)]
#[command(name = "perfmon", version, about = "Live fabric performance-counter monitor")]
struct Cli {
    /// Counter refresh interval in milliseconds.
    #[arg(long, default_value_t = 2000)]
    interval_ms: u64,
    /// Counter source: auto, infiniband, netdev, or simulated.
    #[arg(long, default_value = "auto")]
    source: String,
    /// Root of the InfiniBand sysfs class.
    #[arg(long, default_value = perf_counters::sysfs::DEFAULT_ROOT)]
    ib_root: PathBuf,
    /// Root of the net device sysfs class.
    #[arg(long, default_value = perf_counters::netdev::DEFAULT_ROOT)]
    net_root: PathBuf,
    /// Number of counter windows (1-9).
    #[arg(long, default_value_t = 4)]
    slots: usize,
    /// Width of the fabric menu column.
    #[arg(long, default_value_t = 70)]
    menu_width: u16,
    /// Log level for the in-app log window.
    #[arg(long, default_value = "info")]
    log_level: String,
    /// Input poll interval of the UI loop in milliseconds.
    #[arg(long, default_value_t = 20)]
    poll_ms: u64,
}

#[derive(Debug, Clone)]
struct MonitorConfig {
    interval: Duration,
    source: SourceKind,
    roots: DiscoveryRoots,
    slots: usize,
    menu_width: u16,
    log_level: Level,
    wm: WmConfig,
}

impl TryFrom<&Cli> for MonitorConfig {
    type Error = WmError;

    fn try_from(cli: &Cli) -> Result<Self, Self::Error> {
        if !(100..=3_600_000).contains(&cli.interval_ms) {
            return Err(WmError::Config(format!(
                "refresh interval {}ms is outside 100..=3600000",
                cli.interval_ms
            )));
        }
        if !(1..=MAX_SLOTS).contains(&cli.slots) {
            return Err(WmError::Config(format!(
                "slot count {} is outside 1..={MAX_SLOTS}",
                cli.slots
            )));
        }
        if cli.menu_width < MIN_MENU_WIDTH {
            return Err(WmError::Config(format!(
                "menu width must be at least {MIN_MENU_WIDTH}"
            )));
        }
        let source = cli.source.parse().map_err(WmError::Config)?;
        let log_level = tracing_sub::parse_level(&cli.log_level)
            .ok_or_else(|| WmError::Config(format!("unknown log level {:?}", cli.log_level)))?;
        let wm = WmConfig::default().with_poll_interval(Duration::from_millis(cli.poll_ms));
        wm.validate()?;
        Ok(Self {
            interval: Duration::from_millis(cli.interval_ms),
            source,
            roots: DiscoveryRoots {
                infiniband: cli.ib_root.clone(),
                netdev: cli.net_root.clone(),
            },
            slots: cli.slots,
            menu_width: cli.menu_width,
            log_level,
            wm,
        })
    }
}

type MonitorAction = Box<dyn Fn(&Monitor) + Send + Sync>;

/// What a menu entry shows when assigned to a slot.
#[derive(Clone)]
struct Target {
    title: String,
    source: SharedSource,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|err| err.into_inner())
}

/// Window layout and menu actions of the running monitor.
struct Monitor {
    wm: WindowManager,
    fabric: Fabric,
    menu: WindowHandle<ExpandableMenu<Target>>,
    slots: Vec<WindowHandle<LiveRefreshWindow>>,
    visible: Mutex<usize>,
    menu_width: u16,
    log: WindowHandle<DebugLogWindow>,
    help: Mutex<Option<WindowHandle<OkMessageWindow>>>,
    quit: Sender<()>,
}

impl Monitor {
    fn new(
        wm: &WindowManager,
        fabric: Fabric,
        config: &MonitorConfig,
        log: DebugLogHandle,
        quit: Sender<()>,
    ) -> Arc<Self> {
        let (width, height) = wm.terminal_size();
        let targets = fabric_targets(&fabric);
        let slots = (0..config.slots)
            .map(|index| {
                let target = &targets[index % targets.len().max(1)];
                WindowHandle::new(LiveRefreshWindow::new(
                    config.menu_width,
                    0,
                    width.saturating_sub(config.menu_width),
                    height.saturating_sub(1),
                    slot_title(index, &target.title),
                    target.source.clone(),
                    config.interval,
                    wm.redraw_signal(),
                ))
            })
            .collect();
        let log = WindowHandle::new(DebugLogWindow::new(
            width / 8,
            height / 8,
            width - width / 4,
            height - height / 4,
            "Log",
            log,
        ));

        Arc::new_cyclic(|this: &Weak<Monitor>| {
            let menu = WindowHandle::new(build_menu(
                &fabric,
                this,
                config.menu_width,
                height.saturating_sub(1),
                config.slots,
            ));
            Monitor {
                wm: wm.clone(),
                fabric,
                menu,
                slots,
                visible: Mutex::new(config.slots),
                menu_width: config.menu_width,
                log,
                help: Mutex::new(None),
                quit,
            }
        })
    }

    fn install_functions(self: &Arc<Self>) {
        let mut entries: Vec<(String, MonitorAction)> = Vec::new();
        entries.push(("Help".into(), Box::new(Monitor::show_help)));
        entries.push(("Reset Current".into(), Box::new(Monitor::reset_current)));
        entries.push(("Reset All".into(), Box::new(Monitor::reset_all)));
        for count in layout_counts(self.slots.len()) {
            let label = if count == 1 {
                "1 Window".to_string()
            } else {
                format!("{count} Windows")
            };
            entries.push((
                label,
                Box::new(move |monitor: &Monitor| monitor.set_window_count(count)),
            ));
        }
        entries.push(("Log".into(), Box::new(Monitor::toggle_log)));
        entries.push(("Exit".into(), Box::new(Monitor::request_quit)));
        for (label, action) in entries {
            let this = Arc::downgrade(self);
            let added = self.wm.add_menu_function(label.as_str(), move || {
                if let Some(monitor) = this.upgrade() {
                    action(&monitor);
                }
            });
            if !added {
                tracing::warn!(label = %label, "no function key left");
            }
        }
        let this = Arc::downgrade(self);
        self.wm.set_quit_handler(move || {
            if let Some(monitor) = this.upgrade() {
                monitor.request_quit();
            }
        });
    }

    fn request_quit(&self) {
        let _ = self.quit.try_send(());
    }

    /// Stack `count` slots in the area right of the menu, menu focused.
    fn set_window_count(&self, count: usize) {
        let count = count.clamp(1, self.slots.len());
        *lock(&self.visible) = count;
        let (width, height) = self.wm.terminal_size();
        let usable = height.saturating_sub(1);
        let slot_height = usable / count as u16;
        let slot_width = width.saturating_sub(self.menu_width);

        for slot in &self.slots {
            self.wm.deregister(slot);
        }
        {
            let mut menu = self.menu.lock();
            menu.base_mut().move_to(0, 0);
            menu.base_mut().resize(self.menu_width, usable);
        }
        for (index, slot) in self.slots.iter().take(count).enumerate().rev() {
            {
                let mut window = slot.lock();
                window.base_mut().move_to(self.menu_width, slot_height * index as u16);
                window.base_mut().resize(slot_width, slot_height);
            }
            self.wm.register(slot);
        }
        self.wm.register(&self.menu);
        self.wm.set_focus(&self.menu);
        tracing::debug!(count, "layout changed");
    }

    /// Point slot `index` at `target`. Slots beyond the current layout are
    /// brought into view by widening it.
    fn assign(&self, index: usize, target: &Target) {
        let Some(slot) = self.slots.get(index) else {
            return;
        };
        {
            let mut window = slot.lock();
            window.base_mut().set_title(slot_title(index, &target.title));
            window.set_source(target.source.clone());
        }
        let visible = *lock(&self.visible);
        if index >= visible {
            self.set_window_count(index + 1);
        }
        tracing::info!(slot = index + 1, target = %target.title, "slot assigned");
    }

    fn show_single(&self, target: &Target) {
        self.assign(0, target);
        self.set_window_count(1);
    }

    fn reset_current(&self) {
        let focused = self.wm.focused();
        let slot = self
            .slots
            .iter()
            .find(|slot| Some(slot.id()) == focused)
            .unwrap_or(&self.slots[0]);
        let _ = slot.lock().reset_counters();
    }

    fn reset_all(&self) {
        if let Err(err) = self.fabric.reset_all() {
            tracing::warn!(error = %err, "reset all failed");
        }
        for slot in &self.slots {
            slot.lock().refresh_now();
        }
    }

    fn toggle_log(&self) {
        let handle = self.log.lock().handle().clone();
        if self.wm.is_registered(&self.log) {
            handle.set_redraw_signal(None);
            self.wm.deregister(&self.log);
        } else {
            handle.set_redraw_signal(Some(self.wm.redraw_signal()));
            self.wm.register(&self.log);
            self.wm.set_focus(&self.log);
        }
    }

    fn show_help(&self) {
        let window = WindowHandle::new(OkMessageWindow::new(
            &self.wm,
            "Help",
            &help_text(self.slots.len()),
            || {},
        ));
        self.wm.register(&window);
        self.wm.set_focus(&window);
        if let Some(previous) = lock(&self.help).replace(window) {
            self.wm.deregister(&previous);
        }
    }
}

fn slot_title(index: usize, target: &str) -> String {
    format!("Slot {}: {target}", index + 1)
}

/// 1, 2, 4, ... up to `slots`, always ending with `slots` itself.
fn layout_counts(slots: usize) -> Vec<usize> {
    let mut counts: Vec<usize> = std::iter::successors(Some(1), |n| Some(n * 2))
        .take_while(|n| *n < slots)
        .collect();
    counts.push(slots);
    counts
}

fn fabric_targets(fabric: &Fabric) -> Vec<Target> {
    fabric
        .nodes()
        .iter()
        .map(|node| Target {
            title: node.name.clone(),
            source: node.source.clone(),
        })
        .collect()
}

fn build_menu(
    fabric: &Fabric,
    monitor: &Weak<Monitor>,
    width: u16,
    height: u16,
    slots: usize,
) -> ExpandableMenu<Target> {
    let mut menu = ExpandableMenu::new(0, 0, width, height, format!("Fabric ({})", fabric.kind()));
    for node in fabric.nodes() {
        let target = Target {
            title: node.name.clone(),
            source: node.source.clone(),
        };
        let item = menu.add_item(activating(MenuNode::new(&node.name), monitor, target));
        for port in &node.ports {
            let target = Target {
                title: format!("{} {}", node.name, port.name),
                source: port.source.clone(),
            };
            item.add_child(activating(MenuNode::new(&port.name), monitor, target));
        }
    }
    for slot in 0..slots {
        let Some(digit) = char::from_digit(slot as u32 + 1, 10) else {
            continue;
        };
        let monitor = monitor.clone();
        menu.bind_selection(digit, move |selection: &MenuSelection<Target>| {
            if let (Some(monitor), Some(target)) = (monitor.upgrade(), &selection.payload) {
                monitor.assign(slot, target);
            }
        });
    }
    menu
}

fn activating(node: MenuNode<Target>, monitor: &Weak<Monitor>, target: Target) -> MenuNode<Target> {
    let monitor = monitor.clone();
    let shown = target.clone();
    node.with_payload(target).on_activate(move || {
        if let Some(monitor) = monitor.upgrade() {
            monitor.show_single(&shown);
        }
    })
}

fn help_text(slots: usize) -> String {
    let host = hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown host".to_string());
    formatdoc!(
        "
        perfmon on {host}

        Up/Down     move the highlight
        Right/Left  expand or collapse a node
        Enter       show the entry in a single window
        1-{slots}         show the entry in that slot
        Tab         switch window
        F-keys      menu on the bottom row
        Ctrl+Q      quit
        ",
        host = host,
        slots = slots,
    )
}

/// Scan the fabric behind a busy notice. A failed scan offers simulated
/// counters instead; `None` means the user declined.
fn scan(wm: &WindowManager, config: &MonitorConfig) -> WmResult<Option<Fabric>> {
    let busy = MessageWindow::show(wm, "Please wait", "Scanning fabric...");
    let scanned = Fabric::discover(config.source, &config.roots);
    wm.deregister(&busy);
    let fabric = match scanned {
        Ok(fabric) => fabric,
        Err(err) => {
            tracing::warn!(error = %err, "fabric scan failed");
            let question = format!("{err}\n\nContinue with simulated counters?");
            if !confirm(wm, "Fabric scan failed", &question)? {
                return Ok(None);
            }
            Fabric::simulated(SIMULATED_NODES, SIMULATED_PORTS)
        }
    };
    let ports: usize = fabric.nodes().iter().map(|node| node.ports.len()).sum();
    acknowledge(
        wm,
        "Scan complete",
        &format!("Found {} nodes with {ports} ports ({}).", fabric.len(), fabric.kind()),
    )?;
    Ok(Some(fabric))
}

fn wait_for_quit(wm: &WindowManager, quit: &Receiver<()>) {
    loop {
        match quit.recv_timeout(Duration::from_millis(100)) {
            Err(RecvTimeoutError::Timeout) if wm.is_running() => {}
            _ => return,
        }
    }
}

fn run(config: &MonitorConfig, log: DebugLogHandle) -> WmResult<()> {
    let wm = WindowManager::new(config.wm.clone());
    wm.initialize(ConsoleInputDriver::new(), ConsoleOutputDriver::new()?)?;
    wm.start()?;

    let session = scan(&wm, config).map(|fabric| {
        let fabric = fabric?;
        let (quit, quitting) = crossbeam_channel::bounded(1);
        let monitor = Monitor::new(&wm, fabric, config, log, quit);
        monitor.install_functions();
        monitor.set_window_count(config.slots);
        Some((monitor, quitting))
    });
    if let Ok(Some((_monitor, quitting))) = &session {
        wait_for_quit(&wm, quitting);
    }
    let stopped = wm.stop();
    session.and(stopped)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match MonitorConfig::try_from(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("perfmon: {err}");
            return ExitCode::from(2);
        }
    };
    let log = DebugLogHandle::default();
    debug_log::set_global_debug_log(log.clone());
    debug_log::install_panic_hook();
    tracing_sub::init(config.log_level);

    match run(&config, log) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("perfmon: {err}");
            ExitCode::FAILURE
        }
    }
}
