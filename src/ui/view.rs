use std::time::{SystemTime, UNIX_EPOCH};

use crate::supervisor::{TunnelId, TunnelSummary};

/// Display fields for one tunnel in the sidebar and detail panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelRow {
    pub id: TunnelId,
    pub title: String,
    pub description: String,
    pub host: String,
    pub local_port: String,
    pub remote_port: String,
    pub active: bool,
    pub status: String,
    pub pid: u32,
    pub verbose: bool,
}

impl TunnelRow {
    pub fn from_summary(t: &TunnelSummary) -> Self {
        let bullet = if t.active { "●" } else { "○" };
        let status = if t.active {
            format!("ACTIVE · up {}", format_uptime(epoch_secs(t.started_at)))
        } else {
            "INACTIVE".to_string()
        };
        Self {
            id: t.id,
            title: t.tag.clone(),
            description: format!("{} {}  {} → {}", bullet, t.host, t.local_port, t.remote_port),
            host: t.host.clone(),
            local_port: t.local_port.to_string(),
            remote_port: t.remote_port.to_string(),
            active: t.active,
            status,
            pid: t.pid,
            verbose: t.verbose,
        }
    }
}

fn epoch_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn now_secs() -> u64 {
    epoch_secs(SystemTime::now())
}

/// Format a duration as a human-readable string like "2h 14m" or "3d 1h".
pub fn format_uptime(start_epoch: u64) -> String {
    let elapsed = now_secs().saturating_sub(start_epoch);

    let days = elapsed / 86400;
    let hours = (elapsed % 86400) / 3600;
    let minutes = (elapsed % 3600) / 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes.max(1))
    }
}
