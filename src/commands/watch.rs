use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::auth::SessionContext;
use crate::bus::EventBus;
use crate::client::HttpMonitorClient;
use crate::commands::breaks;
use crate::config::Config;
use crate::db::Database;
use crate::format::render_line;
use crate::models::ProjectId;
use crate::widget::{Mount, Phase, Render, TrackerView, TrackerWidget};

const POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchKey {
    ToggleHeader,
    ToggleMonitor,
    Refresh,
    BreakStart(i64),
    BreakStop,
    Quit,
}

fn parse_key(line: &str) -> Option<WatchKey> {
    let line = line.trim();
    let mut chars = line.chars();
    match chars.next()? {
        't' => Some(WatchKey::ToggleHeader),
        'T' => Some(WatchKey::ToggleMonitor),
        'r' | 'R' => Some(WatchKey::Refresh),
        'b' => chars.as_str().trim().parse().ok().map(WatchKey::BreakStart),
        'B' => Some(WatchKey::BreakStop),
        'q' | 'Q' => Some(WatchKey::Quit),
        _ => None,
    }
}

struct BreakKeys<'a> {
    db: &'a Database,
    client: &'a HttpMonitorClient,
    bus: &'a EventBus,
}

impl BreakKeys<'_> {
    fn start(&self, policy_id: i64) {
        println!();
        if let Err(e) = breaks::start(self.db, self.client, Some(self.bus), policy_id) {
            warn!(policy_id, error = %e, "break start failed");
            eprintln!("{:#}", e);
        }
    }

    fn stop(&self) {
        println!();
        if let Err(e) = breaks::stop(self.db, self.client, Some(self.bus)) {
            warn!(error = %e, "break stop failed");
            eprintln!("{:#}", e);
        }
    }
}

pub struct TerminalRender<W: Write + Send> {
    screen: Mutex<Screen<W>>,
}

struct Screen<W> {
    out: W,
    lines: BTreeMap<String, String>,
}

impl<W: Write + Send> TerminalRender<W> {
    pub fn new(out: W) -> Self {
        TerminalRender {
            screen: Mutex::new(Screen {
                out,
                lines: BTreeMap::new(),
            }),
        }
    }

    pub fn into_inner(self) -> W {
        self.screen
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .out
    }
}

impl<W: Write + Send> Render for TerminalRender<W> {
    fn render(&self, view: &TrackerView) {
        let mut screen = self.screen.lock().unwrap_or_else(PoisonError::into_inner);
        screen.lines.insert(view.label.clone(), render_line(view));
        let joined = screen.lines.values().cloned().collect::<Vec<_>>().join(" | ");
        // Terminal write failures are not worth tearing the view down for.
        let _ = write!(screen.out, "\r\x1b[2K{}", joined);
        let _ = screen.out.flush();
    }
}

pub fn run(
    db: &Database,
    client: Arc<HttpMonitorClient>,
    config: &Config,
    project: Option<ProjectId>,
) -> Result<()> {
    let context = SessionContext::load(db)?.with_project(project);
    let bus = EventBus::new();
    let screen = Arc::new(TerminalRender::new(io::stdout()));

    let mount = |label: &str| {
        Mount::new(label, context.clone(), client.clone(), bus.clone())
            .render(screen.clone())
            .tick_interval(config.tick_interval)
            .mount()
    };
    let header = mount("header");
    let monitor = mount("monitor");

    if let Phase::Disabled(_) = header.phase() {
        let line = render_line(&header.view());
        header.unmount();
        monitor.unmount();
        bail!("Cannot watch: {}", line.trim_end());
    }

    let quit = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&quit))
            .context("Failed to install signal handler")?;
    }

    eprintln!(
        "t: toggle (header)  T: toggle (monitor)  r: refresh  b <policy>: start break  B: end break  q: quit"
    );
    debug!(listeners = bus.listener_count(), "watch started");
    let keys = spawn_stdin_reader();
    let break_keys = BreakKeys {
        db,
        client: &client,
        bus: &bus,
    };
    drive(&header, &monitor, &break_keys, &keys, &quit);

    header.unmount();
    monitor.unmount();
    println!();
    info!("watch finished");
    Ok(())
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Runs until `q`, or until `quit` is raised. A closed input keeps the view
/// alive so `watch < /dev/null` still works as a passive display.
fn drive(
    header: &TrackerWidget,
    monitor: &TrackerWidget,
    break_keys: &BreakKeys<'_>,
    keys: &Receiver<String>,
    quit: &AtomicBool,
) {
    let mut input_open = true;
    while !quit.load(Ordering::SeqCst) {
        if !input_open {
            thread::sleep(POLL);
            continue;
        }
        match keys.recv_timeout(POLL) {
            Ok(line) => {
                let Some(key) = parse_key(&line) else {
                    debug!(input = %line, "ignoring unknown key");
                    continue;
                };
                match key {
                    WatchKey::ToggleHeader => {
                        header.toggle();
                    }
                    WatchKey::ToggleMonitor => {
                        monitor.toggle();
                    }
                    WatchKey::Refresh => {
                        header.refresh();
                        monitor.refresh();
                    }
                    WatchKey::BreakStart(policy_id) => break_keys.start(policy_id),
                    WatchKey::BreakStop => break_keys.stop(),
                    WatchKey::Quit => break,
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => input_open = false,
        }
    }
}
