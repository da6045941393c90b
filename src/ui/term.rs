use anyhow::{Context, Result};
use std::fs::{self, File};
use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

// ─── SIGWINCH flag ──────────────────────────────────────────

static RESIZED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_winch(_: libc::c_int) {
    RESIZED.store(true, Ordering::SeqCst);
}

/// Get terminal size directly via ioctl on a given fd.
fn get_size(fd: i32) -> (usize, usize) {
    unsafe {
        let mut ws: libc::winsize = std::mem::zeroed();
        if libc::ioctl(fd, libc::TIOCGWINSZ as libc::c_ulong, &mut ws) == 0
            && ws.ws_row > 0
            && ws.ws_col > 0
        {
            (ws.ws_row as usize, ws.ws_col as usize)
        } else {
            (24, 80)
        }
    }
}

// ─── Keys ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Enter,
    Tab,
    BackTab,
    Backspace,
    Escape,
    CtrlC,
    Char(char),
    /// Left button press at a 1-based screen position.
    Click { col: usize, row: usize },
    WheelUp,
    WheelDown,
    Unknown,
}

/// What the input thread reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Key(Key),
    Resize,
    /// The tty went away; no more input will follow.
    Closed,
}

/// Read a single byte from a non-blocking `fd`, retrying only on EINTR.
/// Returns WouldBlock if no data is available (spurious poll wakeup).
fn read_byte(fd: i32) -> std::io::Result<u8> {
    let mut buf = [0u8; 1];
    loop {
        let ret = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, 1) };
        if ret == 1 {
            return Ok(buf[0]);
        }
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "EOF"));
    }
}

/// Try to read a byte within `timeout_ms`; returns None on timeout or no data.
fn read_byte_timeout(fd: i32, timeout_ms: i32) -> Option<u8> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if ret <= 0 {
        return None;
    }
    let mut buf = [0u8; 1];
    let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, 1) };
    if n == 1 { Some(buf[0]) } else { None }
}

/// Read a complete key from the raw tty fd.
fn read_key(fd: i32) -> std::io::Result<Key> {
    let b = read_byte(fd)?;
    Ok(decode_key(b, || read_byte_timeout(fd, 50)))
}

/// Decode one key starting at `first`. `next` yields the following bytes of an
/// escape sequence, or None once the sequence has gone quiet.
pub fn decode_key(first: u8, mut next: impl FnMut() -> Option<u8>) -> Key {
    match first {
        b'\r' | b'\n' => Key::Enter,
        b'\t' => Key::Tab,
        0x7f | 0x08 => Key::Backspace,
        0x03 => Key::CtrlC,
        0x1b => match next() {
            None => Key::Escape,
            Some(b'[') => decode_csi(&mut next),
            Some(b'O') => match next() {
                Some(b'A') => Key::Up,
                Some(b'B') => Key::Down,
                Some(b'C') => Key::Right,
                Some(b'D') => Key::Left,
                _ => Key::Unknown,
            },
            // Alt+key
            Some(_) => Key::Unknown,
        },
        0x01..=0x1a => Key::Unknown,
        b' '..=b'~' => Key::Char(first as char),
        _ => Key::Unknown,
    }
}

fn decode_csi(next: &mut impl FnMut() -> Option<u8>) -> Key {
    match next() {
        Some(b'A') => Key::Up,
        Some(b'B') => Key::Down,
        Some(b'C') => Key::Right,
        Some(b'D') => Key::Left,
        Some(b'Z') => Key::BackTab,
        Some(b'<') => {
            let mut seq = String::new();
            while seq.len() < 32 {
                match next() {
                    Some(b'M') => return decode_mouse(&seq),
                    Some(b'm') | None => return Key::Unknown,
                    Some(b) => seq.push(b as char),
                }
            }
            Key::Unknown
        }
        Some(b) if b.is_ascii_digit() => {
            // CSI sequences like \x1b[5~ or \x1b[1;5C: read until the final byte
            let mut seq = String::new();
            let mut last = b;
            while !(0x40..=0x7e).contains(&last) {
                seq.push(last as char);
                match next() {
                    Some(b) => last = b,
                    None => return Key::Unknown,
                }
            }
            match (seq.as_str(), last) {
                ("5", b'~') => Key::PageUp,
                ("6", b'~') => Key::PageDown,
                _ => Key::Unknown,
            }
        }
        _ => Key::Unknown,
    }
}

/// SGR mouse report body, e.g. "0;12;5" for a left press at column 12, row 5.
fn decode_mouse(seq: &str) -> Key {
    let mut parts = seq.split(';').map(|p| p.parse::<usize>().ok());
    let (Some(Some(button)), Some(Some(col)), Some(Some(row))) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Key::Unknown;
    };
    if button & 64 != 0 {
        return if button & 1 == 0 {
            Key::WheelUp
        } else {
            Key::WheelDown
        };
    }
    match button {
        0 => Key::Click { col, row },
        _ => Key::Unknown,
    }
}

// ─── Terminal ───────────────────────────────────────────────

unsafe fn set_raw_mode(fd: i32) -> libc::termios {
    unsafe {
        let mut orig: libc::termios = std::mem::zeroed();
        libc::tcgetattr(fd, &mut orig);
        let mut raw = orig;
        libc::cfmakeraw(&mut raw);
        // Keep output post-processing so \n still maps to \r\n
        raw.c_oflag |= libc::OPOST;
        libc::tcsetattr(fd, libc::TCSANOW, &raw);
        orig
    }
}

unsafe fn restore_mode(fd: i32, orig: &libc::termios) {
    unsafe { libc::tcsetattr(fd, libc::TCSANOW, orig) };
}

const ENTER_SCREEN: &str = "\x1b[?25l\x1b[?1049h\x1b[?1000h\x1b[?1006h";
const LEAVE_SCREEN: &str = "\x1b[?1006l\x1b[?1000l\x1b[?1049l\x1b[?25h";

/// Raw-mode session on /dev/tty with the alternate screen and mouse reporting on.
/// Everything is put back when dropped.
pub struct Terminal {
    tty: File,
    orig: libc::termios,
    old_winch: libc::sigaction,
    closed: Arc<AtomicBool>,
}

impl Terminal {
    pub fn open() -> Result<Self> {
        let tty = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open("/dev/tty")
            .context("failed to open /dev/tty")?;
        let fd = tty.as_raw_fd();

        // Non-blocking so reads never hang on spurious poll(POLLIN)
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFL);
            libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
        }
        let orig = unsafe { set_raw_mode(fd) };

        RESIZED.store(false, Ordering::SeqCst);
        let old_winch = unsafe {
            let mut sa: libc::sigaction = std::mem::zeroed();
            sa.sa_sigaction = handle_winch as *const () as usize;
            sa.sa_flags = 0;
            let mut old: libc::sigaction = std::mem::zeroed();
            libc::sigaction(libc::SIGWINCH, &sa, &mut old);
            old
        };

        tty_write(fd, ENTER_SCREEN);
        Ok(Self {
            tty,
            orig,
            old_winch,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// (rows, cols)
    pub fn size(&self) -> (usize, usize) {
        get_size(self.tty.as_raw_fd())
    }

    /// Paint a full frame. Each row is positioned explicitly and cleared first, so a
    /// resize inside the alternate screen cannot leave stale content behind.
    pub fn draw(&self, lines: &[String]) {
        let (rows, cols) = self.size();
        let mut frame = String::from("\x1b[r");
        for row in 1..=rows {
            frame.push_str(&format!("\x1b[{};1H\x1b[2K", row));
            if let Some(line) = lines.get(row - 1) {
                frame.push_str(&console::truncate_str(line, cols, ""));
                frame.push_str("\x1b[0m");
            }
        }
        tty_write(self.tty.as_raw_fd(), &frame);
    }

    /// Start the input thread. It hands every key and resize to `sink` and exits
    /// once `sink` returns false, the tty closes, or the terminal is dropped.
    pub fn spawn_reader(
        &self,
        sink: impl Fn(Input) -> bool + Send + 'static,
    ) -> Result<JoinHandle<()>> {
        let tty = self.tty.try_clone().context("failed to clone tty handle")?;
        let closed = Arc::clone(&self.closed);
        thread::Builder::new()
            .name("burrow-input".into())
            .spawn(move || {
                let fd = tty.as_raw_fd();
                while !closed.load(Ordering::SeqCst) {
                    let mut pfd = libc::pollfd {
                        fd,
                        events: libc::POLLIN,
                        revents: 0,
                    };
                    let ret = unsafe { libc::poll(&mut pfd, 1, 100) };

                    if RESIZED.swap(false, Ordering::SeqCst) && !sink(Input::Resize) {
                        return;
                    }
                    if ret <= 0 || closed.load(Ordering::SeqCst) {
                        continue;
                    }
                    match read_key(fd) {
                        Ok(key) => {
                            if !sink(Input::Key(key)) {
                                return;
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                        Err(e) => {
                            tracing::warn!("terminal input closed: {}", e);
                            sink(Input::Closed);
                            return;
                        }
                    }
                }
            })
            .context("failed to start input thread")
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        let fd = self.tty.as_raw_fd();
        tty_write(fd, LEAVE_SCREEN);
        unsafe {
            restore_mode(fd, &self.orig);
            libc::sigaction(libc::SIGWINCH, &self.old_winch, std::ptr::null_mut());
        }
    }
}

fn tty_write(fd: i32, data: &str) {
    let bytes = data.as_bytes();
    let mut offset = 0;
    while offset < bytes.len() {
        let ret = unsafe {
            libc::write(
                fd,
                bytes[offset..].as_ptr() as *const libc::c_void,
                bytes[offset..].len(),
            )
        };
        if ret > 0 {
            offset += ret as usize;
        } else if ret < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            if err.kind() == std::io::ErrorKind::WouldBlock {
                let mut pfd = libc::pollfd {
                    fd,
                    events: libc::POLLOUT,
                    revents: 0,
                };
                unsafe { libc::poll(&mut pfd, 1, 100) };
                continue;
            }
            break;
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Key {
        let mut rest = bytes[1..].iter().copied();
        decode_key(bytes[0], || rest.next())
    }

    #[test]
    fn plain_keys() {
        assert_eq!(decode(b"q"), Key::Char('q'));
        assert_eq!(decode(b"\r"), Key::Enter);
        assert_eq!(decode(b"\t"), Key::Tab);
        assert_eq!(decode(&[0x7f]), Key::Backspace);
        assert_eq!(decode(&[0x03]), Key::CtrlC);
        assert_eq!(decode(&[0x1b]), Key::Escape);
    }

    #[test]
    fn arrows_in_both_modes() {
        assert_eq!(decode(b"\x1b[A"), Key::Up);
        assert_eq!(decode(b"\x1b[B"), Key::Down);
        assert_eq!(decode(b"\x1bOA"), Key::Up);
        assert_eq!(decode(b"\x1bOD"), Key::Left);
        assert_eq!(decode(b"\x1b[Z"), Key::BackTab);
    }

    #[test]
    fn paging_keys() {
        assert_eq!(decode(b"\x1b[5~"), Key::PageUp);
        assert_eq!(decode(b"\x1b[6~"), Key::PageDown);
        assert_eq!(decode(b"\x1b[1;5C"), Key::Unknown);
    }

    #[test]
    fn truncated_sequence_is_unknown() {
        assert_eq!(decode(b"\x1b[5"), Key::Unknown);
        assert_eq!(decode(b"\x1b[<0;3"), Key::Unknown);
    }

    #[test]
    fn mouse_reports() {
        assert_eq!(decode(b"\x1b[<0;12;5M"), Key::Click { col: 12, row: 5 });
        assert_eq!(decode(b"\x1b[<64;1;1M"), Key::WheelUp);
        assert_eq!(decode(b"\x1b[<65;1;1M"), Key::WheelDown);
        // release and right button are ignored
        assert_eq!(decode(b"\x1b[<0;12;5m"), Key::Unknown);
        assert_eq!(decode(b"\x1b[<2;12;5M"), Key::Unknown);
    }

    #[test]
    fn alt_and_control_chords_are_unknown() {
        assert_eq!(decode(b"\x1bx"), Key::Unknown);
        assert_eq!(decode(&[0x01]), Key::Unknown);
        assert_eq!(decode(&[0xc3]), Key::Unknown);
    }
}
