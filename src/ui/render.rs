use colored::Colorize;
use console::{Alignment, measure_text_width, pad_str, truncate_str};

use super::app::{App, Focus, View};
use super::theme::{Role, Theme};
use super::view::TunnelRow;
use crate::wizard::{MAX_VISIBLE, Step, Wizard};

pub const MIN_COLS: usize = 80;
pub const MIN_ROWS: usize = 20;
pub const SIDEBAR_WIDTH: usize = 40;

const TOP_BAR_HEIGHT: usize = 3;
// footer hints + status bar
const BOTTOM_HEIGHT: usize = 2;
const ITEM_HEIGHT: usize = 3;
// sidebar: top border, title, blank line
const FIRST_ITEM_ROW: usize = TOP_BAR_HEIGHT + 3 + 1;
// tag, blank, host, local, remote, status, blank, logs title, separator
const BODY_HEADER_ROWS: usize = 9;
const MODAL_WIDTH: usize = 60;

/// What the renderer needs from the supervisor for one frame.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub rows: Vec<TunnelRow>,
    /// Full log of the selected tunnel, oldest first.
    pub logs: Vec<String>,
    /// Whether the selected tunnel's local port shows up as listening.
    pub listening: Option<bool>,
}

impl Snapshot {
    fn active(&self) -> usize {
        self.rows.iter().filter(|r| r.active).count()
    }
}

// ─── Geometry shared with input handling ────────────────────

fn panel_height(rows: usize) -> usize {
    rows.saturating_sub(TOP_BAR_HEIGHT + BOTTOM_HEIGHT)
}

fn sidebar_capacity(rows: usize) -> usize {
    // borders, title, blank line
    (panel_height(rows).saturating_sub(4) / ITEM_HEIGHT).max(1)
}

/// Index of the first tunnel drawn in the sidebar, keeping `selected` in view.
pub fn sidebar_start(selected: usize, rows: usize) -> usize {
    let cap = sidebar_capacity(rows);
    if selected < cap { 0 } else { selected + 1 - cap }
}

/// Tunnel under a 1-based screen position, if any.
pub fn sidebar_item_at(col: usize, row: usize, total: usize, selected: usize, rows: usize) -> Option<usize> {
    if col == 0 || col > SIDEBAR_WIDTH || row < FIRST_ITEM_ROW {
        return None;
    }
    let slot = (row - FIRST_ITEM_ROW) / ITEM_HEIGHT;
    if slot >= sidebar_capacity(rows) {
        return None;
    }
    let idx = sidebar_start(selected, rows) + slot;
    (idx < total).then_some(idx)
}

/// Log lines that fit in the detail panel.
pub fn log_rows(rows: usize) -> usize {
    panel_height(rows)
        .saturating_sub(2 + BODY_HEADER_ROWS)
        .max(1)
}

/// Slice of a `total`-line log to show, `scroll` lines back from the newest.
pub fn log_window(total: usize, scroll: usize, height: usize) -> (usize, usize) {
    let scroll = scroll.min(total.saturating_sub(height));
    let end = total - scroll;
    (end.saturating_sub(height), end)
}

// ─── Frame ──────────────────────────────────────────────────

pub fn frame(app: &App, snap: &Snapshot, theme: &Theme) -> Vec<String> {
    let (rows, cols) = app.size;
    if rows < MIN_ROWS || cols < MIN_COLS {
        return too_small(rows, cols, theme);
    }

    let mut lines = top_bar(cols, theme);
    let height = panel_height(rows);
    let left = sidebar(app, snap, height, theme);
    let right = body(app, snap, cols - SIDEBAR_WIDTH, height, theme);
    lines.extend(left.into_iter().zip(right).map(|(l, r)| l + &r));
    lines.push(footer(app, cols, theme));
    lines.push(status_bar(app, snap, cols, theme));

    let modal = match &app.view {
        View::Main => return lines,
        View::NewTunnel(wizard) => wizard_lines(wizard, theme),
        View::QuitConfirm => quit_lines(snap, theme),
        View::DeleteConfirm(id) => match snap.rows.iter().find(|r| r.id == *id) {
            Some(row) => delete_lines(row, theme),
            None => return lines,
        },
        View::Help => help_lines(theme),
    };
    overlay(lines, modal_box(&modal, MODAL_WIDTH, theme), cols)
}

fn too_small(rows: usize, cols: usize, theme: &Theme) -> Vec<String> {
    let mut lines = vec![String::new(); rows.max(1)];
    lines[0] = theme.paint(
        Role::Subtle,
        &format!(
            "Terminal too small. Please resize to at least {}x{} (now {}x{})",
            MIN_COLS, MIN_ROWS, cols, rows
        ),
    );
    lines
}

/// Pad or truncate to exactly `width` columns.
fn fit(text: &str, width: usize) -> String {
    pad_str(text, width, Alignment::Left, Some("…")).into_owned()
}

/// Rounded box of `width` x `height` with two columns of horizontal padding.
fn boxed(lines: &[String], width: usize, height: usize, pad_v: usize, border: Role, theme: &Theme) -> Vec<String> {
    let inner = width.saturating_sub(6);
    let body_rows = height.saturating_sub(2);
    let side = theme.paint(border, "│");

    let mut out = Vec::with_capacity(height);
    out.push(theme.paint(border, &format!("╭{}╮", "─".repeat(width.saturating_sub(2)))));
    for i in 0..body_rows {
        let content = if i < pad_v || i + pad_v >= body_rows {
            ""
        } else {
            lines.get(i - pad_v).map(String::as_str).unwrap_or("")
        };
        out.push(format!("{}  {}\x1b[0m  {}", side, fit(content, inner), side));
    }
    out.push(theme.paint(border, &format!("╰{}╯", "─".repeat(width.saturating_sub(2)))));
    out
}

fn top_bar(cols: usize, theme: &Theme) -> Vec<String> {
    let title = format!(
        "{} {}",
        theme.paint(Role::Title, "SSH TUNNEL MANAGER"),
        theme.paint(Role::Subtle, &format!("v{}", env!("CARGO_PKG_VERSION")))
    );
    let rule = "─".repeat(cols - 2);
    let side = theme.paint(Role::Title, "│");
    vec![
        theme.paint(Role::Title, &format!("╭{}╮", rule)),
        format!("{}{}{}", side, pad_str(&title, cols - 2, Alignment::Center, None), side),
        theme.paint(Role::Title, &format!("╰{}╯", rule)),
    ]
}

fn border_for(app: &App, panel: Focus) -> Role {
    if app.focus == panel {
        Role::BorderFocus
    } else {
        Role::Border
    }
}

fn sidebar(app: &App, snap: &Snapshot, height: usize, theme: &Theme) -> Vec<String> {
    let mut content = Vec::new();
    if snap.rows.is_empty() {
        content.push(theme.paint(Role::Title, "ACTIVE TUNNELS"));
        content.push(String::new());
        content.push(theme.paint(Role::Subtle, "No tunnels active"));
        content.push(String::new());
        content.push(theme.paint(Role::Subtle, "Press 'n' to create one"));
    } else {
        content.push(format!(
            "{}  {}",
            theme.paint(Role::Title, "ACTIVE TUNNELS"),
            theme.paint(Role::Subtle, &format!("{}/{}", snap.active(), snap.rows.len()))
        ));
        content.push(String::new());

        let start = sidebar_start(app.selected, app.size.0);
        let cap = sidebar_capacity(app.size.0);
        for (i, row) in snap.rows.iter().enumerate().skip(start).take(cap) {
            if i == app.selected {
                content.push(theme.paint(Role::Selected, &format!("▶ {}", row.title)));
            } else {
                content.push(format!("  {}", row.title));
            }
            let state = if row.active { Role::Active } else { Role::Inactive };
            let (bullet, rest) = row.description.split_at(row.description.find(' ').unwrap_or(0));
            content.push(format!(
                "  {}{}",
                theme.paint(state, bullet),
                theme.paint(Role::Subtle, rest)
            ));
            content.push(String::new());
        }
    }
    boxed(&content, SIDEBAR_WIDTH, height, 0, border_for(app, Focus::Tunnels), theme)
}

fn body(app: &App, snap: &Snapshot, width: usize, height: usize, theme: &Theme) -> Vec<String> {
    let border = border_for(app, Focus::Logs);
    let Some(row) = snap.rows.get(app.selected) else {
        let content = vec![
            theme.paint(Role::Title, "TUNNEL OUTPUT"),
            String::new(),
            theme.paint(Role::Subtle, "No tunnel selected"),
        ];
        return boxed(&content, width, height, 0, border, theme);
    };

    let mut status = if row.active {
        theme.paint(Role::Active, &format!("● {}", row.status))
    } else {
        theme.paint(Role::Inactive, &format!("○ {}", row.status))
    };
    if row.active {
        match snap.listening {
            Some(true) => status.push_str(&theme.paint(Role::Active, " · listening ✓")),
            Some(false) => status.push_str(&theme.paint(Role::Subtle, " · not listening yet")),
            None => {}
        }
    }
    status.push_str(&theme.paint(Role::Subtle, &format!(" · pid {}", row.pid)));

    let label = |name: &str, value: &str| format!("{:<13}{}", name, theme.paint(Role::Selected, value));

    let height_logs = log_rows(app.size.0);
    let (start, end) = log_window(snap.logs.len(), app.log_scroll, height_logs);
    let mut logs_title = theme.paint(Role::Highlight, "Logs:");
    if row.verbose {
        logs_title.push_str(&theme.paint(Role::Subtle, " (verbose)"));
    }
    if start > 0 {
        logs_title.push_str(&theme.paint(Role::Subtle, &format!("  ↑ {} older", start)));
    }
    if end < snap.logs.len() {
        logs_title.push_str(&theme.paint(Role::Subtle, &format!("  ↓ {} newer", snap.logs.len() - end)));
    }

    let mut content = vec![
        theme.paint(Role::Success, &format!("▶ {}", row.title)),
        String::new(),
        label("Host:", &row.host),
        label("Local Port:", &row.local_port),
        label("Remote Port:", &row.remote_port),
        format!("{:<13}{}", "Status:", status),
        String::new(),
        logs_title,
        theme.paint(Role::Subtle, &"─".repeat(width.saturating_sub(6))),
    ];
    if snap.logs.is_empty() {
        content.push(theme.paint(Role::Subtle, "No logs yet..."));
    } else {
        content.extend(snap.logs[start..end].iter().map(|l| theme.paint(Role::Subtle, l)));
    }
    boxed(&content, width, height, 0, border, theme)
}

fn footer(app: &App, cols: usize, theme: &Theme) -> String {
    let key = |k: &str| theme.paint(Role::Key, k);
    let left = format!("{}: switch", key("Tab"));
    let center = match app.focus {
        Focus::Tunnels => format!(
            "{}: new  {}: delete  {}: stop  {}: nav",
            key("n"),
            key("d"),
            key("s"),
            key("↑/↓")
        ),
        Focus::Logs => format!("{}: scroll  {}: page", key("↑/↓"), key("PgUp/PgDn")),
    };
    let right = format!("{}: help", key("?"));
    let side = cols / 5;
    format!(
        "{}{}{}",
        pad_str(&left, side, Alignment::Left, Some("…")),
        pad_str(&center, cols - 2 * side, Alignment::Center, Some("…")),
        pad_str(&right, side, Alignment::Right, Some("…"))
    )
}

fn status_bar(app: &App, snap: &Snapshot, cols: usize, theme: &Theme) -> String {
    if let Some(ref toast) = app.toast {
        return theme.toast(&fit(&format!(" {}", toast.text), cols), toast.error);
    }
    let left = format!(" {}", app.status);
    let right = format!("{} active · {} total ", snap.active(), snap.rows.len());
    let used = measure_text_width(&left) + measure_text_width(&right);
    let line = if used <= cols {
        format!("{}{}{}", left, " ".repeat(cols - used), right)
    } else {
        fit(&left, cols)
    };
    theme.status_bar(&line)
}

// ─── Modals ─────────────────────────────────────────────────

fn modal_box(lines: &[String], width: usize, theme: &Theme) -> Vec<String> {
    boxed(lines, width, lines.len() + 4, 1, Role::BorderFocus, theme)
}

/// Draw `modal` centered over `background`. Background columns right of the
/// modal are dropped on the covered rows.
fn overlay(mut background: Vec<String>, modal: Vec<String>, cols: usize) -> Vec<String> {
    let width = modal.iter().map(|l| measure_text_width(l)).max().unwrap_or(0);
    let top = background.len().saturating_sub(modal.len()) / 2;
    let left = cols.saturating_sub(width) / 2;
    for (i, line) in modal.into_iter().enumerate() {
        if let Some(slot) = background.get_mut(top + i) {
            let cut = truncate_str(slot, left, "");
            let merged = format!("{}\x1b[0m{}", pad_str(&cut, left, Alignment::Left, None), line);
            *slot = merged;
        }
    }
    background
}

fn centered(lines: Vec<String>) -> Vec<String> {
    let inner = MODAL_WIDTH - 6;
    lines
        .into_iter()
        .map(|l| pad_str(&l, inner, Alignment::Center, None).into_owned())
        .collect()
}

fn choice(label: &str, selected: bool, theme: &Theme) -> String {
    if selected {
        theme.paint(Role::Selected, &format!("  ▶  {}", label))
    } else {
        format!("     {}", label)
    }
}

fn wizard_lines(wizard: &Wizard, theme: &Theme) -> Vec<String> {
    let subtle = |s: &str| theme.paint(Role::Subtle, s);
    let host_line = |host: &str| {
        format!(
            "Host: {} {}",
            theme.paint(Role::Selected, host),
            subtle(&format!("as {}", wizard.effective_user(host)))
        )
    };
    let error_lines = |out: &mut Vec<String>, error: &Option<String>| {
        if let Some(e) = error {
            out.push(String::new());
            out.push(theme.paint(Role::Error, &format!("✗ {}", e)));
        }
    };

    let mut out = vec![theme.paint(Role::Title, "New Tunnel"), String::new()];
    match wizard.step() {
        Step::ChooseHost { cursor, scroll } => {
            let hosts = wizard.hosts();
            out.push("Select SSH Host:".bold().to_string());
            out.push(String::new());
            for (i, host) in hosts.iter().enumerate().skip(*scroll).take(MAX_VISIBLE) {
                out.push(choice(&host.label(), i == *cursor, theme));
            }
            out.push(String::new());
            if hosts.len() > MAX_VISIBLE {
                out.push(subtle(&format!(
                    "({}/{}) ↑/↓ to scroll • Enter to select • m for manual • Esc to cancel",
                    cursor + 1,
                    hosts.len()
                )));
            } else {
                out.push(subtle("↑/↓ to move • Enter to select • m for manual • Esc to cancel"));
            }
        }
        Step::ChooseAddress {
            host_cursor,
            targets,
            cursor,
            ..
        } => {
            let alias = wizard
                .hosts()
                .get(*host_cursor)
                .map(|h| h.alias.as_str())
                .unwrap_or("host");
            out.push(format!("Connect to {} via:", alias).bold().to_string());
            out.push(String::new());
            for (i, target) in targets.iter().enumerate() {
                out.push(choice(target, i == *cursor, theme));
            }
            out.push(String::new());
            out.push(subtle("↑/↓ to move • Enter to select • Esc to go back"));
        }
        Step::ManualHost { input } => {
            out.push("Enter SSH host manually:".bold().to_string());
            out.push(String::new());
            out.push(format!("Host: {}█", input));
            out.push(String::new());
            out.push(subtle("Format: user@host or host • Esc to cancel"));
        }
        Step::RemotePort { host, input, error } => {
            out.push(host_line(host));
            out.push(String::new());
            out.push(format!("Remote port: {}█", input));
            error_lines(&mut out, error);
            out.push(String::new());
            out.push(subtle("Enter port number • Esc to cancel"));
        }
        Step::LocalPort {
            host,
            remote,
            input,
            error,
        } => {
            out.push(host_line(host));
            out.push(format!("Remote port: {}", theme.paint(Role::Success, &remote.to_string())));
            out.push(String::new());
            out.push(format!("Local port: {}█", input));
            error_lines(&mut out, error);
            out.push(String::new());
            out.push(subtle("Enter port number • Esc to cancel"));
        }
        Step::Tag {
            host,
            remote,
            local,
            input,
        } => {
            out.push(host_line(host));
            out.push(subtle(&format!("127.0.0.1:{} → localhost:{}", local, remote)));
            out.push(String::new());
            out.push(format!("Tag: {}█", input));
            out.push(String::new());
            out.push(subtle("Enter tag or press Enter for random • Esc to cancel"));
        }
        Step::Verbose {
            host,
            remote,
            local,
            tag,
        } => {
            out.push(host_line(host));
            out.push(subtle(&format!("127.0.0.1:{} → localhost:{}", local, remote)));
            out.push(format!("Tag: {}", theme.paint(Role::Highlight, tag)));
            out.push(String::new());
            let default = if wizard.verbose_default() { "yes" } else { "no" };
            out.push(format!(
                "Show verbose SSH logs? {}",
                subtle(&format!("(y/n or just Enter for {})", default))
            ));
        }
    }
    out
}

fn quit_lines(snap: &Snapshot, theme: &Theme) -> Vec<String> {
    let mut out = vec![theme.paint(Role::Error, "Quit Confirmation"), String::new()];
    let active = snap.active();
    if active > 0 {
        out.push(format!(
            "You have {} active tunnel(s).",
            theme.paint(Role::Highlight, &active.to_string())
        ));
        out.push("All tunnels will be closed.".to_string());
    } else {
        out.push("Are you sure you want to quit?".to_string());
    }
    out.push(String::new());
    out.push(format!(
        "{}{}{}{}",
        theme.paint(Role::Success, "Y"),
        theme.paint(Role::Subtle, " - Yes, quit   "),
        theme.paint(Role::Error, "Any key"),
        theme.paint(Role::Subtle, " - Cancel")
    ));
    centered(out)
}

fn delete_lines(row: &TunnelRow, theme: &Theme) -> Vec<String> {
    let mut out = vec![
        theme.paint(Role::Error, "Delete Tunnel"),
        String::new(),
        format!("Delete tunnel {}?", theme.paint(Role::Highlight, &row.title)),
        format!("Host: {} → {}", row.host, row.remote_port),
    ];
    if row.active {
        out.push(theme.paint(Role::Subtle, "The ssh process will be stopped."));
    }
    out.push(String::new());
    out.push(format!(
        "{}{}{}{}",
        theme.paint(Role::Success, "Y"),
        theme.paint(Role::Subtle, " - Yes, delete   "),
        theme.paint(Role::Error, "Any key"),
        theme.paint(Role::Subtle, " - Cancel")
    ));
    centered(out)
}

const SHORTCUTS: &[(&str, &str)] = &[
    ("Tab", "Switch between panels"),
    ("n", "Create new tunnel"),
    ("d", "Delete selected tunnel"),
    ("s", "Stop selected tunnel"),
    ("↑/↓ or j/k", "Navigate list / scroll logs"),
    ("PgUp/PgDn", "Page through logs"),
    ("enter", "Select / Confirm"),
    ("esc", "Cancel / Go back"),
    ("q or ctrl+c", "Quit (with confirmation)"),
    ("?", "Show this help"),
];

fn help_lines(theme: &Theme) -> Vec<String> {
    let mut out = vec![theme.paint(Role::Title, "Keyboard Shortcuts"), String::new()];
    for (key, desc) in SHORTCUTS {
        out.push(format!(
            "{}{}",
            theme.paint(Role::Key, &format!("{:<15}", format!("{}: ", key))),
            theme.paint(Role::Subtle, desc)
        ));
    }
    out.push(String::new());
    out.push(theme.paint(Role::Title, "Tips"));
    out.push(String::new());
    for tip in [
        "• Click on tunnels to select them",
        "• Use scroll wheel to scroll logs",
        "• Press any key to close this help",
    ] {
        out.push(theme.paint(Role::Subtle, tip));
    }
    out.push(String::new());
    out.push(theme.paint(Role::Subtle, &format!("Version: {}", env!("CARGO_PKG_VERSION"))));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::TunnelId;

    fn plain(lines: &[String]) -> Vec<String> {
        lines
            .iter()
            .map(|l| console::strip_ansi_codes(l).into_owned())
            .collect()
    }

    fn app(rows: usize, cols: usize) -> App {
        let mut app = App::new(Vec::new(), false);
        app.size = (rows, cols);
        app
    }

    fn row(id: u64, tag: &str, active: bool) -> TunnelRow {
        TunnelRow {
            id: TunnelId::new(id),
            title: tag.to_string(),
            description: format!("● db  {} → 5432", 15000 + id),
            host: "db".to_string(),
            local_port: (15000 + id).to_string(),
            remote_port: "5432".to_string(),
            active,
            status: if active { "ACTIVE · up 1m".into() } else { "INACTIVE".into() },
            pid: 100 + id as u32,
            verbose: false,
        }
    }

    #[test]
    fn small_terminal_gets_notice() {
        let lines = plain(&frame(&app(19, 120), &Snapshot::default(), &Theme::default()));
        assert_eq!(lines.len(), 19);
        assert!(lines[0].starts_with("Terminal too small"));

        let lines = plain(&frame(&app(40, 79), &Snapshot::default(), &Theme::default()));
        assert!(lines[0].starts_with("Terminal too small"));
    }

    #[test]
    fn frame_fills_screen_exactly() {
        let lines = frame(&app(24, 100), &Snapshot::default(), &Theme::default());
        assert_eq!(lines.len(), 24);
        for line in &lines {
            assert_eq!(measure_text_width(line), 100);
        }
    }

    #[test]
    fn empty_state_text() {
        let text = plain(&frame(&app(24, 100), &Snapshot::default(), &Theme::default())).join("\n");
        assert!(text.contains("SSH TUNNEL MANAGER v"));
        assert!(text.contains("No tunnels active"));
        assert!(text.contains("Press 'n' to create one"));
        assert!(text.contains("No tunnel selected"));
        assert!(text.contains("Ready • Press ? for help"));
    }

    #[test]
    fn selected_tunnel_details_and_logs() {
        let snap = Snapshot {
            rows: vec![row(1, "happy-otter", true)],
            logs: vec!["[10:00:00] Tunnel started".into()],
            listening: Some(true),
        };
        let text = plain(&frame(&app(24, 100), &snap, &Theme::default())).join("\n");
        assert!(text.contains("▶ happy-otter"));
        assert!(text.contains("Local Port:  15001"));
        assert!(text.contains("● ACTIVE · up 1m · listening ✓ · pid 101"));
        assert!(text.contains("[10:00:00] Tunnel started"));
        assert!(text.contains("1 active · 1 total"));
    }

    #[test]
    fn quit_modal_counts_active_tunnels() {
        let mut a = app(30, 100);
        a.view = View::QuitConfirm;
        let snap = Snapshot {
            rows: vec![row(1, "a", true), row(2, "b", false)],
            ..Snapshot::default()
        };
        let text = plain(&frame(&a, &snap, &Theme::default())).join("\n");
        assert!(text.contains("You have 1 active tunnel(s)."));
        assert!(text.contains("Y - Yes, quit"));
    }

    #[test]
    fn delete_modal_names_tunnel() {
        let mut a = app(30, 100);
        a.view = View::DeleteConfirm(TunnelId::new(2));
        let snap = Snapshot {
            rows: vec![row(1, "a", true), row(2, "sleepy-vole", false)],
            ..Snapshot::default()
        };
        let text = plain(&frame(&a, &snap, &Theme::default())).join("\n");
        assert!(text.contains("Delete tunnel sleepy-vole?"));
        assert!(!text.contains("will be stopped"));
    }

    #[test]
    fn log_window_scrolls_back_from_newest() {
        assert_eq!(log_window(100, 0, 10), (90, 100));
        assert_eq!(log_window(100, 5, 10), (85, 95));
        // scrolling past the top stops at the oldest page
        assert_eq!(log_window(100, 500, 10), (0, 10));
        assert_eq!(log_window(3, 2, 10), (0, 3));
        assert_eq!(log_window(0, 0, 10), (0, 0));
    }

    #[test]
    fn sidebar_follows_selection() {
        // 24 rows: panel of 19, capacity 5 items
        assert_eq!(sidebar_capacity(24), 5);
        assert_eq!(sidebar_start(4, 24), 0);
        assert_eq!(sidebar_start(5, 24), 1);
        assert_eq!(sidebar_start(9, 24), 5);
    }

    #[test]
    fn clicks_map_to_sidebar_items() {
        assert_eq!(sidebar_item_at(5, FIRST_ITEM_ROW, 3, 0, 24), Some(0));
        assert_eq!(sidebar_item_at(5, FIRST_ITEM_ROW + 2, 3, 0, 24), Some(0));
        assert_eq!(sidebar_item_at(5, FIRST_ITEM_ROW + 3, 3, 0, 24), Some(1));
        assert_eq!(sidebar_item_at(5, FIRST_ITEM_ROW + 9, 3, 0, 24), None);
        assert_eq!(sidebar_item_at(5, FIRST_ITEM_ROW - 1, 3, 0, 24), None);
        assert_eq!(sidebar_item_at(SIDEBAR_WIDTH + 1, FIRST_ITEM_ROW, 3, 0, 24), None);
        // scrolled list
        assert_eq!(sidebar_item_at(5, FIRST_ITEM_ROW, 10, 9, 24), Some(5));
    }

    #[test]
    fn overlay_centers_modal() {
        let bg = vec!["x".repeat(20); 5];
        let out = overlay(bg, vec!["abcd".to_string()], 20);
        let text = plain(&out);
        assert_eq!(text[2], format!("{}abcd", "x".repeat(8)));
        assert_eq!(text[0], "x".repeat(20));
    }
}
