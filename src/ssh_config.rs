use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// A concrete (non-wildcard) Host alias from the SSH config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub alias: String,
    pub hostname: Option<String>,
    pub user: Option<String>,
}

impl HostEntry {
    /// Display label, e.g. "db (10.0.0.5)".
    pub fn label(&self) -> String {
        match self.hostname {
            Some(ref hn) if *hn != self.alias => format!("{} ({})", self.alias, hn),
            _ => self.alias.clone(),
        }
    }

    /// Values that can be handed to ssh for this entry: the alias first, then
    /// the raw hostname (with the configured user) when it differs.
    pub fn targets(&self) -> Vec<String> {
        let mut targets = vec![self.alias.clone()];
        if let Some(ref hn) = self.hostname {
            if *hn != self.alias {
                match self.user {
                    Some(ref u) => targets.push(format!("{}@{}", u, hn)),
                    None => targets.push(hn.clone()),
                }
            }
        }
        targets
    }
}

/// Default SSH config location (~/.ssh/config).
pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".ssh").join("config"))
}

/// List every concrete host in the given SSH config (and its includes), in file order.
/// An unreadable or missing config yields an empty list.
pub fn list_hosts(path: &Path) -> Vec<HostEntry> {
    if !path.exists() {
        debug!(path = %path.display(), "ssh config not found");
        return Vec::new();
    }
    let base = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut hosts = Vec::new();
    if let Err(e) = parse_file(path, &base, &mut hosts, 0) {
        debug!(path = %path.display(), "failed to read ssh config: {:#}", e);
    }
    hosts
}

// Include nesting deeper than this is treated as a loop.
const MAX_INCLUDE_DEPTH: usize = 16;

fn parse_file(path: &Path, ssh_dir: &Path, hosts: &mut Vec<HostEntry>, depth: usize) -> Result<()> {
    if depth > MAX_INCLUDE_DEPTH {
        debug!(path = %path.display(), "include depth exceeded, skipping");
        return Ok(());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    // Indices into `hosts` for the aliases of the Host block being read.
    let mut current: Vec<usize> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = match split_directive(line) {
            Some(pair) => pair,
            None => continue,
        };

        match key.to_lowercase().as_str() {
            "include" => {
                current.clear();
                for pattern in value.split_whitespace() {
                    process_include(pattern, ssh_dir, hosts, depth);
                }
            }
            "host" => {
                current.clear();
                for name in value.split_whitespace() {
                    if name.contains('*') || name.contains('?') || name.starts_with('!') {
                        continue;
                    }
                    if hosts.iter().any(|h| h.alias == name) {
                        continue;
                    }
                    current.push(hosts.len());
                    hosts.push(HostEntry {
                        alias: name.to_string(),
                        hostname: None,
                        user: None,
                    });
                }
            }
            "match" => current.clear(),
            "hostname" => {
                for &i in &current {
                    hosts[i].hostname.get_or_insert_with(|| value.to_string());
                }
            }
            "user" => {
                for &i in &current {
                    hosts[i].user.get_or_insert_with(|| value.to_string());
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn split_directive(line: &str) -> Option<(&str, &str)> {
    // SSH config directives can use whitespace or '=' as separator
    let line = line.trim();
    if let Some(eq_pos) = line.find('=') {
        let key = line[..eq_pos].trim();
        let value = line[eq_pos + 1..].trim();
        if !key.is_empty() && !value.is_empty() && !key.contains(char::is_whitespace) {
            return Some((key, value));
        }
    }
    let mut parts = line.splitn(2, char::is_whitespace);
    let key = parts.next()?;
    let value = parts.next()?.trim();
    if value.is_empty() {
        return None;
    }
    Some((key, value))
}

fn expand_include_path(pattern: &str, ssh_dir: &Path) -> Option<PathBuf> {
    if let Some(rest) = pattern.strip_prefix("~/") {
        Some(dirs::home_dir()?.join(rest))
    } else if pattern.starts_with('/') {
        Some(PathBuf::from(pattern))
    } else {
        Some(ssh_dir.join(pattern))
    }
}

fn process_include(pattern: &str, ssh_dir: &Path, hosts: &mut Vec<HostEntry>, depth: usize) {
    let Some(expanded) = expand_include_path(pattern, ssh_dir) else {
        return;
    };
    let pattern_str = expanded.to_string_lossy().to_string();
    let paths = match glob::glob(&pattern_str) {
        Ok(paths) => paths,
        Err(e) => {
            debug!(pattern = %pattern_str, "bad include pattern: {}", e);
            return;
        }
    };
    for path in paths.flatten() {
        if !path.is_file() {
            continue;
        }
        if let Err(e) = parse_file(&path, ssh_dir, hosts, depth + 1) {
            debug!(path = %path.display(), "skipping include: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(name: &str, content: &str) -> Vec<HostEntry> {
        let dir = std::env::temp_dir();
        let config = dir.join(name);
        std::fs::write(&config, content).unwrap();
        let hosts = list_hosts(&config);
        std::fs::remove_file(&config).unwrap();
        hosts
    }

    #[test]
    fn split_directive_whitespace() {
        let (k, v) = split_directive("Host my-host").unwrap();
        assert_eq!(k, "Host");
        assert_eq!(v, "my-host");
    }

    #[test]
    fn split_directive_equals() {
        let (k, v) = split_directive("HostName = 10.0.0.1").unwrap();
        assert_eq!(k, "HostName");
        assert_eq!(v, "10.0.0.1");
    }

    #[test]
    fn split_directive_value_containing_equals() {
        let (k, v) = split_directive("LocalCommand echo a=b").unwrap();
        assert_eq!(k, "LocalCommand");
        assert_eq!(v, "echo a=b");
    }

    #[test]
    fn split_directive_empty() {
        assert!(split_directive("").is_none());
        assert!(split_directive("   ").is_none());
        assert!(split_directive("KeyOnly").is_none());
    }

    #[test]
    fn missing_config_is_empty() {
        let hosts = list_hosts(Path::new("/nonexistent/burrow/ssh_config"));
        assert!(hosts.is_empty());
    }

    #[test]
    fn parse_hosts_with_hostname_and_user() {
        let hosts = parse(
            "burrow_test_ssh_basic",
            "Host db\n  HostName 10.0.0.5\n  User postgres\n\nHost web\n  HostName web.example.com\n",
        );
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].alias, "db");
        assert_eq!(hosts[0].hostname.as_deref(), Some("10.0.0.5"));
        assert_eq!(hosts[0].user.as_deref(), Some("postgres"));
        assert_eq!(hosts[1].alias, "web");
        assert_eq!(hosts[1].user, None);
    }

    #[test]
    fn parse_skips_wildcards_and_negations() {
        let hosts = parse(
            "burrow_test_ssh_wildcard",
            "Host *\n  ServerAliveInterval 60\n\nHost dev-* !prod\n  User admin\n\nHost bastion\n",
        );
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].alias, "bastion");
        assert_eq!(hosts[0].user, None);
    }

    #[test]
    fn parse_multi_alias_line() {
        let hosts = parse(
            "burrow_test_ssh_multi_alias",
            "Host db db-primary\n  HostName 10.0.0.5\n",
        );
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].alias, "db");
        assert_eq!(hosts[1].alias, "db-primary");
        assert_eq!(hosts[1].hostname.as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn first_value_wins() {
        let hosts = parse(
            "burrow_test_ssh_first_wins",
            "Host db\n  HostName 10.0.0.5\n  HostName 10.0.0.6\n",
        );
        assert_eq!(hosts[0].hostname.as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn match_block_does_not_leak_into_previous_host() {
        let hosts = parse(
            "burrow_test_ssh_match",
            "Host db\n  HostName 10.0.0.5\nMatch user root\n  User admin\n",
        );
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].user, None);
    }

    #[test]
    fn parse_follows_includes() {
        let dir = std::env::temp_dir().join("burrow_test_ssh_include");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("conf.d")).unwrap();
        std::fs::write(dir.join("conf.d").join("work"), "Host work\n  HostName work.example.com\n").unwrap();
        let config = dir.join("config");
        std::fs::write(&config, "Include conf.d/*\n\nHost home\n  HostName 192.168.1.2\n").unwrap();

        let hosts = list_hosts(&config);
        std::fs::remove_dir_all(&dir).unwrap();

        let aliases: Vec<&str> = hosts.iter().map(|h| h.alias.as_str()).collect();
        assert_eq!(aliases, vec!["work", "home"]);
    }

    #[test]
    fn self_include_keeps_later_hosts() {
        let dir = std::env::temp_dir().join("burrow_test_ssh_self_include");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let config = dir.join("config");
        std::fs::write(&config, "Include *\n\nHost db\n  HostName 10.0.0.5\n").unwrap();

        let hosts = list_hosts(&config);
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].alias, "db");
        assert_eq!(hosts[0].hostname.as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn unreadable_include_is_skipped() {
        let dir = std::env::temp_dir().join("burrow_test_ssh_bad_include");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("broken"), [0xff, 0xfe, 0x00]).unwrap();
        let config = dir.join("config");
        std::fs::write(&config, "Include broken\nHost web\n").unwrap();

        let hosts = list_hosts(&config);
        std::fs::remove_dir_all(&dir).unwrap();

        let aliases: Vec<&str> = hosts.iter().map(|h| h.alias.as_str()).collect();
        assert_eq!(aliases, vec!["web"]);
    }

    #[test]
    fn label_and_targets() {
        let entry = HostEntry {
            alias: "db".into(),
            hostname: Some("10.0.0.5".into()),
            user: Some("postgres".into()),
        };
        assert_eq!(entry.label(), "db (10.0.0.5)");
        assert_eq!(entry.targets(), vec!["db", "postgres@10.0.0.5"]);

        let bare = HostEntry {
            alias: "bastion".into(),
            hostname: None,
            user: None,
        };
        assert_eq!(bare.label(), "bastion");
        assert_eq!(bare.targets(), vec!["bastion"]);
    }
}
