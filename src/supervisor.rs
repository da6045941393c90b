use std::fmt;
use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::SystemTime;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::logs::{self, LogBuffer};

/// Identifier of a tunnel. Allocated from 1 upwards and never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TunnelId(u64);

#[cfg(test)]
impl TunnelId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TunnelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything needed to open a tunnel: forward 127.0.0.1:local_port to
/// localhost:remote_port as seen from `host`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelRequest {
    pub host: String,
    pub remote_port: u16,
    pub local_port: u16,
    pub tag: String,
    pub verbose: bool,
}

impl TunnelRequest {
    /// Arguments for `ssh`: no remote command, one local forward, optional -v.
    pub fn ssh_args(&self) -> Vec<String> {
        let mut args = vec![
            "-N".to_string(),
            "-o".to_string(),
            "ExitOnForwardFailure=yes".to_string(),
            "-L".to_string(),
            format!("127.0.0.1:{}:localhost:{}", self.local_port, self.remote_port),
        ];
        if self.verbose {
            args.push("-v".to_string());
        }
        args.push(self.host.clone());
        args
    }
}

/// Builds the command that carries a tunnel. The supervisor owns stdio setup and spawning.
pub trait Launcher: Send {
    fn command(&self, request: &TunnelRequest) -> Command;
}

/// Launches the system `ssh` client (or whatever program the config names).
pub struct SshLauncher {
    program: String,
}

impl SshLauncher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Launcher for SshLauncher {
    fn command(&self, request: &TunnelRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(request.ssh_args());
        cmd
    }
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error("failed to start {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum StopError {
    #[error("no tunnel with id {0}")]
    NotFound(TunnelId),
}

#[derive(Debug, Error)]
pub enum RemoveError {
    #[error("no tunnel with id {0}")]
    NotFound(TunnelId),
}

/// Sent from capture workers so the UI can redraw without polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorEvent {
    LogAppended(TunnelId),
    Exited(TunnelId),
}

pub type Notifier = Arc<dyn Fn(SupervisorEvent) + Send + Sync>;

/// Read-only snapshot of one tunnel.
#[derive(Debug, Clone)]
pub struct TunnelSummary {
    pub id: TunnelId,
    pub host: String,
    pub local_port: u16,
    pub remote_port: u16,
    pub tag: String,
    pub verbose: bool,
    pub active: bool,
    pub started_at: SystemTime,
    pub pid: u32,
}

/// State shared between a tunnel and its capture worker.
struct Shared {
    logs: Mutex<LogBuffer>,
    active: AtomicBool,
}

impl Shared {
    fn new(capacity: usize) -> Self {
        Self {
            logs: Mutex::new(LogBuffer::with_capacity(capacity)),
            active: AtomicBool::new(true),
        }
    }

    fn append(&self, line: String) {
        self.logs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }

    fn tail(&self, max: usize) -> Vec<String> {
        self.logs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tail(max)
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

struct Tunnel {
    id: TunnelId,
    request: TunnelRequest,
    started_at: SystemTime,
    pid: u32,
    /// Present until the process has been reaped.
    child: Option<Child>,
    stopped: bool,
    shared: Arc<Shared>,
}

impl Tunnel {
    /// Kill the process if it is still running and mark the tunnel inactive.
    fn terminate(&mut self) {
        let was_active = self.shared.active.swap(false, Ordering::SeqCst);
        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(Some(_)) => {}
                _ => {
                    self.stopped = true;
                    if let Err(e) = child.kill() {
                        warn!(tunnel = %self.id, pid = self.pid, "failed to kill ssh: {}", e);
                    }
                }
            }
        }
        if was_active {
            self.stopped = true;
            self.shared.append(logs::stamp("Tunnel stopped"));
            info!(tunnel = %self.id, tag = %self.request.tag, "tunnel stopped");
        }
    }

    /// Non-blocking reap. Returns the exit status when the process has just been collected.
    fn reap(&mut self) -> Option<ExitStatus> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                self.child = None;
                self.shared.active.store(false, Ordering::SeqCst);
                Some(status)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(tunnel = %self.id, "failed to query ssh status: {}", e);
                None
            }
        }
    }

    fn summary(&self) -> TunnelSummary {
        TunnelSummary {
            id: self.id,
            host: self.request.host.clone(),
            local_port: self.request.local_port,
            remote_port: self.request.remote_port,
            tag: self.request.tag.clone(),
            verbose: self.request.verbose,
            active: self.shared.is_active(),
            started_at: self.started_at,
            pid: self.pid,
        }
    }
}

/// Owns every tunnel and the ssh process behind it.
pub struct Supervisor {
    launcher: Box<dyn Launcher>,
    tunnels: Vec<Tunnel>,
    next_id: u64,
    log_capacity: usize,
    notifier: Option<Notifier>,
    /// Killed processes of removed tunnels that have not been reaped yet.
    parked: Vec<Child>,
}

impl Supervisor {
    pub fn new(launcher: impl Launcher + 'static) -> Self {
        Self {
            launcher: Box::new(launcher),
            tunnels: Vec::new(),
            next_id: 1,
            log_capacity: logs::DEFAULT_CAPACITY,
            notifier: None,
            parked: Vec::new(),
        }
    }

    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity.clamp(1, logs::DEFAULT_CAPACITY);
        self
    }

    pub fn with_notifier(mut self, notify: impl Fn(SupervisorEvent) + Send + Sync + 'static) -> Self {
        self.notifier = Some(Arc::new(notify));
        self
    }

    /// Spawn the forwarding process and its log capture worker.
    pub fn start(&mut self, request: TunnelRequest) -> Result<TunnelId, StartError> {
        let mut cmd = self.launcher.command(&request);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        let program = cmd.get_program().to_string_lossy().into_owned();

        let mut child = cmd.spawn().map_err(|source| StartError::SpawnFailed {
            program: program.clone(),
            source,
        })?;

        let Some(stderr) = child.stderr.take() else {
            kill_quietly(&mut child);
            return Err(StartError::SpawnFailed {
                program,
                source: io::Error::other("stderr was not captured"),
            });
        };

        let id = TunnelId(self.next_id);
        let shared = Arc::new(Shared::new(self.log_capacity));
        shared.append(logs::stamp("Tunnel started"));

        let worker = {
            let shared = Arc::clone(&shared);
            let notifier = self.notifier.clone();
            thread::Builder::new()
                .name(format!("burrow-tunnel-{}", id))
                .spawn(move || capture(id, stderr, &shared, notifier.as_deref()))
        };
        if let Err(source) = worker {
            kill_quietly(&mut child);
            return Err(StartError::SpawnFailed { program, source });
        }

        self.next_id += 1;
        let pid = child.id();
        info!(
            tunnel = %id,
            pid,
            host = %request.host,
            local = request.local_port,
            remote = request.remote_port,
            tag = %request.tag,
            "tunnel started"
        );
        self.tunnels.push(Tunnel {
            id,
            request,
            started_at: SystemTime::now(),
            pid,
            child: Some(child),
            stopped: false,
            shared,
        });
        Ok(id)
    }

    /// Kill the tunnel's process. Stopping an inactive tunnel is a no-op.
    pub fn stop(&mut self, id: TunnelId) -> Result<(), StopError> {
        let tunnel = self
            .tunnels
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StopError::NotFound(id))?;
        tunnel.terminate();
        Ok(())
    }

    /// Stop (if needed) and forget a tunnel.
    pub fn remove(&mut self, id: TunnelId) -> Result<(), RemoveError> {
        let idx = self
            .tunnels
            .iter()
            .position(|t| t.id == id)
            .ok_or(RemoveError::NotFound(id))?;
        let mut tunnel = self.tunnels.remove(idx);
        tunnel.terminate();
        if let Some(child) = tunnel.child.take() {
            self.parked.push(child);
        }
        info!(tunnel = %id, "tunnel removed");
        Ok(())
    }

    pub fn list(&self) -> Vec<TunnelSummary> {
        self.tunnels.iter().map(Tunnel::summary).collect()
    }

    /// The last `max_lines` log lines of a tunnel, oldest first. Unknown ids yield nothing.
    pub fn logs(&self, id: TunnelId, max_lines: usize) -> Vec<String> {
        self.tunnels
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.shared.tail(max_lines))
            .unwrap_or_default()
    }

    /// Collect exited processes without blocking and note unexpected exits in the tunnel log.
    pub fn reap(&mut self) {
        for tunnel in &mut self.tunnels {
            if let Some(status) = tunnel.reap() {
                if !tunnel.stopped {
                    tunnel
                        .shared
                        .append(logs::stamp(&format!("ssh exited with {}", status)));
                    info!(tunnel = %tunnel.id, %status, "ssh exited");
                }
            }
        }
        self.parked
            .retain_mut(|child| !matches!(child.try_wait(), Ok(Some(_)) | Err(_)));
    }

    /// True while some process has ended or been killed but not yet been collected.
    pub fn has_pending_reap(&self) -> bool {
        !self.parked.is_empty()
            || self
                .tunnels
                .iter()
                .any(|t| t.child.is_some() && !t.shared.is_active())
    }

    /// Kill every running tunnel. Used on exit.
    pub fn shutdown_all(&mut self) {
        let active = self.tunnels.iter().filter(|t| t.shared.is_active()).count();
        if active > 0 {
            info!(active, "shutting down tunnels");
        }
        for tunnel in &mut self.tunnels {
            tunnel.terminate();
        }
        for child in &mut self.parked {
            kill_quietly(child);
        }
        self.reap();
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}

fn kill_quietly(child: &mut Child) {
    let _ = child.kill();
    let _ = child.try_wait();
}

/// Copy the diagnostic stream into the tunnel log, one stamped line at a time.
/// Returns at end-of-stream, which means the process exited or closed stderr.
fn capture<R: Read>(
    id: TunnelId,
    stream: R,
    shared: &Shared,
    notify: Option<&(dyn Fn(SupervisorEvent) + Send + Sync)>,
) {
    debug!(tunnel = %id, "log capture started");
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let line = text.trim_end_matches(['\r', '\n']);
                if line.is_empty() {
                    continue;
                }
                shared.append(logs::stamp(line));
                if let Some(notify) = notify {
                    notify(SupervisorEvent::LogAppended(id));
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(tunnel = %id, "reading ssh output failed: {}", e);
                break;
            }
        }
    }
    shared.active.store(false, Ordering::SeqCst);
    debug!(tunnel = %id, "log capture finished");
    if let Some(notify) = notify {
        notify(SupervisorEvent::Exited(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{self, Receiver};
    use std::time::Duration;

    /// Runs a shell script in place of ssh.
    struct ScriptLauncher(&'static str);

    impl Launcher for ScriptLauncher {
        fn command(&self, _request: &TunnelRequest) -> Command {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(self.0);
            cmd
        }
    }

    fn request(tag: &str) -> TunnelRequest {
        TunnelRequest {
            host: "db.example.com".to_string(),
            remote_port: 5432,
            local_port: 5432,
            tag: tag.to_string(),
            verbose: false,
        }
    }

    fn supervisor(script: &'static str) -> (Supervisor, Receiver<SupervisorEvent>) {
        let (tx, rx) = mpsc::channel();
        let sup = Supervisor::new(ScriptLauncher(script)).with_notifier(move |ev| {
            let _ = tx.send(ev);
        });
        (sup, rx)
    }

    fn wait_for(rx: &Receiver<SupervisorEvent>, want: SupervisorEvent) {
        loop {
            match rx.recv_timeout(Duration::from_secs(10)) {
                Ok(ev) if ev == want => return,
                Ok(_) => continue,
                Err(e) => panic!("timed out waiting for {:?}: {}", want, e),
            }
        }
    }

    #[test]
    fn ssh_args_forward_loopback_port() {
        let req = request("db");
        assert_eq!(
            req.ssh_args(),
            vec![
                "-N",
                "-o",
                "ExitOnForwardFailure=yes",
                "-L",
                "127.0.0.1:5432:localhost:5432",
                "db.example.com",
            ]
        );
    }

    #[test]
    fn ssh_args_verbose_flag() {
        let req = TunnelRequest {
            host: "admin@bastion".into(),
            remote_port: 80,
            local_port: 8080,
            tag: "web".into(),
            verbose: true,
        };
        let args = req.ssh_args();
        assert!(args.contains(&"-v".to_string()));
        assert!(args.contains(&"127.0.0.1:8080:localhost:80".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("admin@bastion"));
    }

    #[test]
    fn ssh_launcher_uses_configured_program() {
        let cmd = SshLauncher::new("/usr/bin/ssh").command(&request("db"));
        assert_eq!(cmd.get_program(), "/usr/bin/ssh");
        assert_eq!(cmd.get_args().count(), 6);
    }

    #[test]
    fn start_capture_and_stop() {
        let (mut sup, rx) =
            supervisor("echo 'Warning: remote host key changed' >&2; exec sleep 30");

        let id = sup.start(request("happy-otter")).unwrap();
        assert_eq!(id, TunnelId(1));

        let list = sup.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].tag, "happy-otter");
        assert!(list[0].active);

        wait_for(&rx, SupervisorEvent::LogAppended(id));
        let logs = sup.logs(id, 10);
        assert!(logs[0].ends_with("Tunnel started"));
        assert!(logs
            .iter()
            .any(|l| l.ends_with("Warning: remote host key changed")));

        sup.stop(id).unwrap();
        assert!(!sup.list()[0].active);
        let before = sup.logs(id, 100).len();

        sup.stop(id).unwrap();
        assert!(!sup.list()[0].active);
        assert_eq!(sup.logs(id, 100).len(), before);
        assert_eq!(sup.list().len(), 1);
    }

    #[test]
    fn ids_are_distinct_and_increasing() {
        let (mut sup, _rx) = supervisor("exec sleep 30");
        for i in 0..3 {
            sup.start(request(&format!("t{}", i))).unwrap();
        }
        let ids: Vec<TunnelId> = sup.list().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![TunnelId(1), TunnelId(2), TunnelId(3)]);

        sup.remove(TunnelId(2)).unwrap();
        let next = sup.start(request("t3")).unwrap();
        assert_eq!(next, TunnelId(4));

        sup.shutdown_all();
        assert!(sup.list().iter().all(|t| !t.active));
    }

    #[test]
    fn remove_unknown_id_leaves_collection() {
        let (mut sup, _rx) = supervisor("exec sleep 30");
        let id = sup.start(request("keep")).unwrap();
        assert!(matches!(
            sup.remove(TunnelId(42)),
            Err(RemoveError::NotFound(TunnelId(42)))
        ));
        assert_eq!(sup.list().len(), 1);
        assert_eq!(sup.list()[0].id, id);
    }

    #[test]
    fn remove_active_tunnel_stops_it() {
        let (mut sup, rx) = supervisor("exec sleep 30");
        let id = sup.start(request("gone")).unwrap();
        sup.remove(id).unwrap();
        assert!(sup.list().is_empty());
        assert!(matches!(sup.stop(id), Err(StopError::NotFound(_))));
        assert!(sup.logs(id, 10).is_empty());
        wait_for(&rx, SupervisorEvent::Exited(id));
    }

    #[test]
    fn spawn_failure_registers_nothing() {
        let mut sup = Supervisor::new(SshLauncher::new("/nonexistent/burrow-ssh"));
        let err = sup.start(request("broken")).unwrap_err();
        assert!(matches!(err, StartError::SpawnFailed { .. }));
        assert!(err.to_string().contains("/nonexistent/burrow-ssh"));
        assert!(sup.list().is_empty());
    }

    #[test]
    fn failed_start_does_not_consume_an_id() {
        let (mut sup, _rx) = supervisor("exec sleep 30");
        sup.launcher = Box::new(SshLauncher::new("/nonexistent/burrow-ssh"));
        assert!(sup.start(request("broken")).is_err());
        sup.launcher = Box::new(ScriptLauncher("exec sleep 30"));
        assert_eq!(sup.start(request("ok")).unwrap(), TunnelId(1));
    }

    #[test]
    fn unexpected_exit_marks_inactive() {
        let (mut sup, rx) = supervisor("echo 'connection refused' >&2; exit 255");
        let id = sup.start(request("flaky")).unwrap();
        wait_for(&rx, SupervisorEvent::Exited(id));
        assert!(!sup.list()[0].active);

        // The process may outlive its stderr briefly; keep reaping until it is collected.
        for _ in 0..100 {
            sup.reap();
            if sup.logs(id, 100).iter().any(|l| l.contains("ssh exited")) {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        let logs = sup.logs(id, 100);
        assert!(logs.iter().any(|l| l.ends_with("connection refused")));
        assert!(logs.iter().any(|l| l.contains("ssh exited")));

        sup.stop(id).unwrap();
        assert_eq!(sup.list().len(), 1);
    }

    #[test]
    fn lines_arrive_in_order_without_blanks() {
        let (mut sup, rx) =
            supervisor("for i in 1 2 3 4 5; do echo line$i >&2; echo >&2; done");
        let id = sup.start(request("ordered")).unwrap();
        wait_for(&rx, SupervisorEvent::Exited(id));

        let logs = sup.logs(id, 100);
        assert_eq!(logs.len(), 6);
        for (i, line) in logs[1..].iter().enumerate() {
            assert!(line.ends_with(&format!("line{}", i + 1)), "{}", line);
        }
        assert_eq!(sup.logs(id, 2).len(), 2);
        assert!(sup.logs(id, 2)[1].ends_with("line5"));
    }

    #[test]
    fn log_buffer_is_bounded_per_tunnel() {
        let (sup, rx) = supervisor("i=1; while [ $i -le 150 ]; do echo line$i >&2; i=$((i+1)); done");
        let mut sup = sup.with_log_capacity(100);
        let id = sup.start(request("chatty")).unwrap();
        wait_for(&rx, SupervisorEvent::Exited(id));

        let logs = sup.logs(id, 1000);
        assert_eq!(logs.len(), 100);
        assert!(logs[0].ends_with("line51"));
        assert!(logs[99].ends_with("line150"));
    }

    #[test]
    fn stopped_and_removed_processes_are_collected() {
        let (mut sup, _rx) = supervisor("exec sleep 30");
        let a = sup.start(request("a")).unwrap();
        let b = sup.start(request("b")).unwrap();
        assert!(!sup.has_pending_reap());

        sup.stop(a).unwrap();
        sup.remove(b).unwrap();
        assert!(sup.has_pending_reap());

        for _ in 0..100 {
            sup.reap();
            if !sup.has_pending_reap() {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        assert!(!sup.has_pending_reap());
        // a stopped tunnel does not report an unexpected exit
        assert!(!sup.logs(a, 100).iter().any(|l| l.contains("ssh exited")));
    }

    #[test]
    fn capture_handles_crlf_and_invalid_utf8() {
        let shared = Shared::new(10);
        let input: &[u8] = b"first\r\nsecond \xff\n";
        capture(TunnelId(7), input, &shared, None);
        let logs = shared.tail(10);
        assert_eq!(logs.len(), 2);
        assert!(logs[0].ends_with("] first"));
        assert!(logs[1].ends_with("second \u{fffd}"));
        assert!(!shared.is_active());
    }

    #[test]
    fn capture_keeps_at_most_a_hundred_lines() {
        let shared = Shared::new(500);
        let input: String = (1..=150).map(|i| format!("line {}\n", i)).collect();
        capture(TunnelId(8), input.as_bytes(), &shared, None);
        let logs = shared.tail(1000);
        assert_eq!(logs.len(), 100);
        assert!(logs[0].ends_with("] line 51"));
        assert!(logs[99].ends_with("] line 150"));

        let sup = Supervisor::new(SshLauncher::new("ssh")).with_log_capacity(500);
        assert_eq!(sup.log_capacity, 100);
    }
}
