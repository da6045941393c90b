use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, info, warn};

use super::render::{self, Snapshot};
use super::term::{Input, Key, Terminal};
use super::theme::Theme;
use super::view::TunnelRow;
use crate::config::Config;
use crate::port::{self, PortProbe, SystemProbe};
use crate::ssh_config::HostEntry;
use crate::supervisor::{SshLauncher, Supervisor, SupervisorEvent, TunnelId, TunnelRequest};
use crate::wizard::{Transition, Wizard, WizardEvent};

const TOAST_TTL: Duration = Duration::from_secs(3);
// how soon to retry collecting a process whose output has ended
const REAP_RETRY: Duration = Duration::from_millis(200);
const PAGE: usize = 10;
const WHEEL_STEP: usize = 3;

pub const READY: &str = "Ready • Press ? for help";

/// Everything the event loop reacts to, on one channel.
#[derive(Debug)]
pub enum AppEvent {
    Key(Key),
    Resize,
    InputClosed,
    Supervisor(SupervisorEvent),
}

pub enum View {
    Main,
    NewTunnel(Wizard),
    QuitConfirm,
    DeleteConfirm(TunnelId),
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Tunnels,
    Logs,
}

pub struct Toast {
    pub text: String,
    pub error: bool,
    pub expires: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

pub struct App {
    pub view: View,
    pub focus: Focus,
    /// Index into the supervisor's list.
    pub selected: usize,
    /// Lines scrolled back from the newest log line.
    pub log_scroll: usize,
    /// (rows, cols)
    pub size: (usize, usize),
    pub status: String,
    pub toast: Option<Toast>,
    hosts: Vec<HostEntry>,
    verbose_default: bool,
}

impl App {
    pub fn new(hosts: Vec<HostEntry>, verbose_default: bool) -> Self {
        Self {
            view: View::Main,
            focus: Focus::Tunnels,
            selected: 0,
            log_scroll: 0,
            size: (24, 80),
            status: READY.to_string(),
            toast: None,
            hosts,
            verbose_default,
        }
    }

    pub fn snapshot(&self, sup: &Supervisor) -> Snapshot {
        let tunnels = sup.list();
        let selected = tunnels.get(self.selected);
        Snapshot {
            logs: selected
                .map(|t| sup.logs(t.id, usize::MAX))
                .unwrap_or_default(),
            listening: selected
                .filter(|t| t.active)
                .and_then(|t| port::is_listening(t.local_port)),
            rows: tunnels.iter().map(TunnelRow::from_summary).collect(),
        }
    }

    pub fn handle_event(&mut self, event: AppEvent, sup: &mut Supervisor, probe: &dyn PortProbe) -> Control {
        match event {
            AppEvent::Key(key) => self.handle_key(key, sup, probe),
            // the next frame picks up the new size
            AppEvent::Resize => Control::Continue,
            AppEvent::InputClosed => {
                info!("terminal closed, shutting down");
                sup.shutdown_all();
                Control::Quit
            }
            AppEvent::Supervisor(ev) => {
                self.handle_supervisor(ev, sup);
                Control::Continue
            }
        }
    }

    pub fn handle_key(&mut self, key: Key, sup: &mut Supervisor, probe: &dyn PortProbe) -> Control {
        match std::mem::replace(&mut self.view, View::Main) {
            View::Main => self.main_key(key, sup),
            // any key closes help
            View::Help => {}
            View::QuitConfirm => {
                if matches!(key, Key::Char('y' | 'Y' | 'q') | Key::CtrlC) {
                    sup.shutdown_all();
                    return Control::Quit;
                }
            }
            View::DeleteConfirm(id) => {
                if matches!(key, Key::Char('y' | 'Y')) {
                    self.delete(id, sup);
                }
            }
            View::NewTunnel(wizard) => self.wizard_key(wizard, key, sup, probe),
        }
        Control::Continue
    }

    pub fn handle_supervisor(&mut self, event: SupervisorEvent, sup: &mut Supervisor) {
        match event {
            SupervisorEvent::LogAppended(id) => {
                // keep a scrolled-back view on the same lines
                if self.log_scroll > 0 && self.selected_id(sup) == Some(id) {
                    self.scroll_up(1, sup);
                }
            }
            SupervisorEvent::Exited(id) => {
                debug!(tunnel = %id, "tunnel output ended");
                sup.reap();
            }
        }
    }

    /// When the loop must wake up without an event: toast expiry or a pending reap.
    pub fn wake_deadline(&self, sup: &Supervisor) -> Option<Instant> {
        let toast = self.toast.as_ref().map(|t| t.expires);
        let reap = sup
            .has_pending_reap()
            .then(|| Instant::now() + REAP_RETRY);
        match (toast, reap) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn expire_toast(&mut self, now: Instant) {
        if self.toast.as_ref().is_some_and(|t| t.expires <= now) {
            self.toast = None;
        }
    }

    fn notify(&mut self, text: String, error: bool) {
        self.toast = Some(Toast {
            text,
            error,
            expires: Instant::now() + TOAST_TTL,
        });
    }

    fn selected_id(&self, sup: &Supervisor) -> Option<TunnelId> {
        sup.list().get(self.selected).map(|t| t.id)
    }

    fn select(&mut self, idx: usize) {
        if idx != self.selected {
            self.selected = idx;
            self.log_scroll = 0;
        }
    }

    fn main_key(&mut self, key: Key, sup: &mut Supervisor) {
        let count = sup.list().len();
        match key {
            Key::Char('?') => self.view = View::Help,
            Key::Char('q') | Key::CtrlC => self.view = View::QuitConfirm,
            Key::Tab | Key::BackTab => {
                self.focus = match self.focus {
                    Focus::Tunnels => Focus::Logs,
                    Focus::Logs => Focus::Tunnels,
                }
            }
            Key::Char('n') => {
                self.view = View::NewTunnel(Wizard::new(self.hosts.clone(), self.verbose_default))
            }
            Key::Char('d') => {
                if let Some(id) = self.selected_id(sup) {
                    self.view = View::DeleteConfirm(id);
                }
            }
            Key::Char('s') => self.stop_selected(sup),
            Key::Up | Key::Char('k') => match self.focus {
                Focus::Tunnels => self.select(self.selected.saturating_sub(1)),
                Focus::Logs => self.scroll_up(1, sup),
            },
            Key::Down | Key::Char('j') => match self.focus {
                Focus::Tunnels => self.select((self.selected + 1).min(count.saturating_sub(1))),
                Focus::Logs => self.scroll_down(1),
            },
            Key::PageUp => self.scroll_up(PAGE, sup),
            Key::PageDown => self.scroll_down(PAGE),
            Key::WheelUp => self.scroll_up(WHEEL_STEP, sup),
            Key::WheelDown => self.scroll_down(WHEEL_STEP),
            Key::Click { col, row } => {
                if let Some(idx) = render::sidebar_item_at(col, row, count, self.selected, self.size.0) {
                    self.focus = Focus::Tunnels;
                    self.select(idx);
                } else if col > render::SIDEBAR_WIDTH {
                    self.focus = Focus::Logs;
                } else {
                    self.focus = Focus::Tunnels;
                }
            }
            _ => {}
        }
    }

    fn scroll_up(&mut self, lines: usize, sup: &Supervisor) {
        let Some(id) = self.selected_id(sup) else {
            return;
        };
        let total = sup.logs(id, usize::MAX).len();
        let max = total.saturating_sub(render::log_rows(self.size.0));
        self.log_scroll = (self.log_scroll + lines).min(max);
    }

    fn scroll_down(&mut self, lines: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(lines);
    }

    fn stop_selected(&mut self, sup: &mut Supervisor) {
        let Some(tunnel) = sup.list().into_iter().nth(self.selected) else {
            return;
        };
        if !tunnel.active {
            self.notify(format!("Tunnel '{}' is not running", tunnel.tag), true);
            return;
        }
        match sup.stop(tunnel.id) {
            Ok(()) => self.notify(format!("Tunnel '{}' stopped", tunnel.tag), false),
            Err(e) => debug!("stop ignored: {}", e),
        }
    }

    fn delete(&mut self, id: TunnelId, sup: &mut Supervisor) {
        match sup.remove(id) {
            Ok(()) => {
                let count = sup.list().len();
                if self.selected >= count {
                    self.selected = count.saturating_sub(1);
                }
                self.log_scroll = 0;
                self.notify("Tunnel deleted".to_string(), false);
            }
            Err(e) => debug!("remove ignored: {}", e),
        }
    }

    fn wizard_key(&mut self, mut wizard: Wizard, key: Key, sup: &mut Supervisor, probe: &dyn PortProbe) {
        let event = match key {
            Key::Up => WizardEvent::Up,
            Key::Down => WizardEvent::Down,
            Key::Enter => WizardEvent::Enter,
            Key::Escape | Key::CtrlC => WizardEvent::Back,
            Key::Backspace => WizardEvent::Backspace,
            Key::Char(c) => WizardEvent::Char(c),
            _ => {
                self.view = View::NewTunnel(wizard);
                return;
            }
        };
        match wizard.handle(event, probe) {
            Transition::Continue => self.view = View::NewTunnel(wizard),
            Transition::Cancel => {}
            Transition::Submit(request) => self.start(request, sup),
        }
    }

    fn start(&mut self, request: TunnelRequest, sup: &mut Supervisor) {
        let tag = request.tag.clone();
        match sup.start(request) {
            Ok(id) => {
                if let Some(idx) = sup.list().iter().position(|t| t.id == id) {
                    self.selected = idx;
                }
                self.log_scroll = 0;
                self.notify(format!("Tunnel '{}' started", tag), false);
            }
            Err(e) => {
                warn!(tag = %tag, "{}", e);
                self.notify(format!("Failed to start tunnel: {}", e), true);
            }
        }
    }
}

/// Run the terminal UI until the user quits. Every tunnel is shut down on the way out.
pub fn run(config: &Config, hosts: Vec<HostEntry>) -> Result<()> {
    let (tx, rx) = mpsc::channel();

    let notify_tx = tx.clone();
    let mut sup = Supervisor::new(SshLauncher::new(config.ssh_program.clone()))
        .with_log_capacity(config.log_capacity)
        .with_notifier(move |ev| {
            let _ = notify_tx.send(AppEvent::Supervisor(ev));
        });

    let term = Terminal::open()?;
    term.spawn_reader(move |input| {
        let event = match input {
            Input::Key(key) => AppEvent::Key(key),
            Input::Resize => AppEvent::Resize,
            Input::Closed => AppEvent::InputClosed,
        };
        tx.send(event).is_ok()
    })?;

    let theme = Theme::default();
    let probe = SystemProbe;
    let mut app = App::new(hosts, config.verbose_default);
    info!(hosts = app.hosts.len(), ssh = %config.ssh_program, "ui started");

    'outer: loop {
        app.size = term.size();
        term.draw(&render::frame(&app, &app.snapshot(&sup), &theme));

        let first = match app.wake_deadline(&sup) {
            Some(deadline) => {
                match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(ev) => Some(ev),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(ev) => Some(ev),
                Err(_) => break,
            },
        };

        // drain whatever else is queued so a burst of log lines costs one frame
        for event in first.into_iter().chain(rx.try_iter()) {
            if app.handle_event(event, &mut sup, &probe) == Control::Quit {
                break 'outer;
            }
        }
        sup.reap();
        app.expire_toast(Instant::now());
    }

    drop(term);
    sup.shutdown_all();
    info!("ui stopped");
    Ok(())
}
