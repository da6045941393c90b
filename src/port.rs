use std::fs;
use std::net::{Ipv4Addr, TcpListener};

/// Answers whether a local TCP port is already taken.
pub trait PortProbe {
    fn is_port_bound(&self, port: u16) -> bool;
}

/// Probe backed by the kernel's listening-socket tables, with a bind test as fallback.
pub struct SystemProbe;

impl PortProbe for SystemProbe {
    fn is_port_bound(&self, port: u16) -> bool {
        match listening_ports() {
            Some(ports) if ports.contains(&port) => true,
            // The tables only cover TCP sockets in LISTEN; a bind test also
            // catches ports held without listening.
            _ => !is_port_free(port),
        }
    }
}

/// Check if a local port is free (not already bound by another process).
pub fn is_port_free(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok()
}

/// Whether something is listening on `port`, read from the kernel tables only.
/// Never connects, so it adds no traffic to a forwarded port. None when the tables are unavailable.
pub fn is_listening(port: u16) -> Option<bool> {
    listening_ports().map(|ports| ports.contains(&port))
}

/// Ports in LISTEN state from /proc/net/tcp and /proc/net/tcp6. None when unavailable.
fn listening_ports() -> Option<Vec<u16>> {
    let mut ports = Vec::new();
    let mut found = false;
    for table in ["/proc/net/tcp", "/proc/net/tcp6"] {
        if let Ok(content) = fs::read_to_string(table) {
            found = true;
            ports.extend(parse_proc_net_tcp(&content));
        }
    }
    found.then_some(ports)
}

// Socket state code for LISTEN in /proc/net/tcp.
const TCP_LISTEN: &str = "0A";

/// Parse the local ports of listening sockets out of a /proc/net/tcp{,6} table.
fn parse_proc_net_tcp(content: &str) -> Vec<u16> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let local = cols.nth(1)?;
            let state = cols.nth(1)?;
            if !state.eq_ignore_ascii_case(TCP_LISTEN) {
                return None;
            }
            let (_, port_hex) = local.rsplit_once(':')?;
            u16::from_str_radix(port_hex, 16).ok()
        })
        .collect()
}
