use rand::seq::SliceRandom;

use crate::port::PortProbe;
use crate::ssh_config::HostEntry;
use crate::supervisor::TunnelRequest;

/// Rows of a host or address list shown at once.
pub const MAX_VISIBLE: usize = 10;

const MAX_TAG_LEN: usize = 32;
const MAX_HOST_LEN: usize = 253;

/// Input understood by the wizard. Letters that act as commands on list steps
/// ('m', 'j', 'k', 'y', 'n') arrive as `Char` and are interpreted per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardEvent {
    Up,
    Down,
    Enter,
    Back,
    Backspace,
    Char(char),
}

/// One variant per form step, carrying what has been collected so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    ChooseHost {
        cursor: usize,
        scroll: usize,
    },
    ChooseAddress {
        host_cursor: usize,
        host_scroll: usize,
        targets: Vec<String>,
        cursor: usize,
    },
    ManualHost {
        input: String,
    },
    RemotePort {
        host: String,
        input: String,
        error: Option<String>,
    },
    LocalPort {
        host: String,
        remote: u16,
        input: String,
        error: Option<String>,
    },
    Tag {
        host: String,
        remote: u16,
        local: u16,
        input: String,
    },
    Verbose {
        host: String,
        remote: u16,
        local: u16,
        tag: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Continue,
    Cancel,
    Submit(TunnelRequest),
}

enum Next {
    Go(Step),
    Cancel,
    Submit(TunnelRequest),
}

/// New-tunnel form: host, remote port, local port, tag, verbose flag.
pub struct Wizard {
    hosts: Vec<HostEntry>,
    step: Step,
    verbose_default: bool,
}

impl Wizard {
    pub fn new(hosts: Vec<HostEntry>, verbose_default: bool) -> Self {
        let step = if hosts.is_empty() {
            Step::ManualHost {
                input: String::new(),
            }
        } else {
            Step::ChooseHost {
                cursor: 0,
                scroll: 0,
            }
        };
        Self {
            hosts,
            step,
            verbose_default,
        }
    }

    pub fn step(&self) -> &Step {
        &self.step
    }

    pub fn hosts(&self) -> &[HostEntry] {
        &self.hosts
    }

    pub fn verbose_default(&self) -> bool {
        self.verbose_default
    }

    /// User ssh will log in as for `host`: explicit `user@`, then the config's User, then the local user.
    pub fn effective_user(&self, host: &str) -> String {
        if let Some((user, _)) = host.split_once('@') {
            return user.to_string();
        }
        self.hosts
            .iter()
            .find(|h| h.alias == host)
            .and_then(|h| h.user.clone())
            .unwrap_or_else(whoami::username)
    }

    pub fn handle(&mut self, event: WizardEvent, probe: &dyn PortProbe) -> Transition {
        let step = std::mem::replace(
            &mut self.step,
            Step::ManualHost {
                input: String::new(),
            },
        );
        match self.next(step, event, probe) {
            Next::Go(step) => {
                self.step = step;
                Transition::Continue
            }
            Next::Cancel => Transition::Cancel,
            Next::Submit(request) => Transition::Submit(request),
        }
    }

    fn next(&self, step: Step, event: WizardEvent, probe: &dyn PortProbe) -> Next {
        use WizardEvent::*;

        match (step, event) {
            (Step::ChooseHost { .. }, Back) => Next::Cancel,
            (Step::ChooseHost { .. }, Char('m')) => Next::Go(Step::ManualHost {
                input: String::new(),
            }),
            (Step::ChooseHost { cursor, scroll }, Up | Char('k')) => {
                let (cursor, scroll) = move_up(cursor, scroll);
                Next::Go(Step::ChooseHost { cursor, scroll })
            }
            (Step::ChooseHost { cursor, scroll }, Down | Char('j')) => {
                let (cursor, scroll) = move_down(cursor, scroll, self.hosts.len());
                Next::Go(Step::ChooseHost { cursor, scroll })
            }
            (Step::ChooseHost { cursor, scroll }, Enter) => match self.hosts.get(cursor) {
                None => Next::Go(Step::ChooseHost { cursor, scroll }),
                Some(entry) => {
                    let targets = entry.targets();
                    if targets.len() > 1 {
                        Next::Go(Step::ChooseAddress {
                            host_cursor: cursor,
                            host_scroll: scroll,
                            targets,
                            cursor: 0,
                        })
                    } else {
                        Next::Go(remote_port(entry.alias.clone()))
                    }
                }
            },

            (
                Step::ChooseAddress {
                    host_cursor,
                    host_scroll,
                    ..
                },
                Back,
            ) => Next::Go(Step::ChooseHost {
                cursor: host_cursor,
                scroll: host_scroll,
            }),
            (
                Step::ChooseAddress {
                    host_cursor,
                    host_scroll,
                    targets,
                    cursor,
                },
                Up | Down | Char('j') | Char('k'),
            ) => {
                let cursor = if matches!(event, Up | Char('k')) {
                    cursor.saturating_sub(1)
                } else {
                    (cursor + 1).min(targets.len().saturating_sub(1))
                };
                Next::Go(Step::ChooseAddress {
                    host_cursor,
                    host_scroll,
                    targets,
                    cursor,
                })
            }
            (Step::ChooseAddress { targets, cursor, .. }, Enter) => {
                let host = targets.get(cursor).cloned().unwrap_or_default();
                Next::Go(remote_port(host))
            }

            (Step::ManualHost { mut input }, Char(c)) => {
                if is_host_char(c) && input.len() < MAX_HOST_LEN {
                    input.push(c);
                }
                Next::Go(Step::ManualHost { input })
            }
            (Step::ManualHost { mut input }, Backspace) => {
                input.pop();
                Next::Go(Step::ManualHost { input })
            }
            (Step::ManualHost { input }, Enter) => {
                if input.is_empty() {
                    Next::Go(Step::ManualHost { input })
                } else {
                    Next::Go(remote_port(input))
                }
            }

            (Step::RemotePort { host, mut input, .. }, Char(c)) => {
                push_digit(&mut input, c);
                Next::Go(Step::RemotePort {
                    host,
                    input,
                    error: None,
                })
            }
            (Step::RemotePort { host, mut input, .. }, Backspace) => {
                input.pop();
                Next::Go(Step::RemotePort {
                    host,
                    input,
                    error: None,
                })
            }
            (Step::RemotePort { host, input, .. }, Enter) => match parse_port(&input) {
                Ok(remote) => Next::Go(Step::LocalPort {
                    host,
                    remote,
                    input: String::new(),
                    error: None,
                }),
                Err(e) => Next::Go(Step::RemotePort {
                    host,
                    input,
                    error: Some(e),
                }),
            },

            (
                Step::LocalPort {
                    host,
                    remote,
                    mut input,
                    ..
                },
                Char(c),
            ) => {
                push_digit(&mut input, c);
                Next::Go(Step::LocalPort {
                    host,
                    remote,
                    input,
                    error: None,
                })
            }
            (
                Step::LocalPort {
                    host,
                    remote,
                    mut input,
                    ..
                },
                Backspace,
            ) => {
                input.pop();
                Next::Go(Step::LocalPort {
                    host,
                    remote,
                    input,
                    error: None,
                })
            }
            (
                Step::LocalPort {
                    host,
                    remote,
                    input,
                    ..
                },
                Enter,
            ) => match parse_port(&input) {
                Ok(local) if probe.is_port_bound(local) => Next::Go(Step::LocalPort {
                    host,
                    remote,
                    input: String::new(),
                    error: Some(format!("port {} is already in use", local)),
                }),
                Ok(local) => Next::Go(Step::Tag {
                    host,
                    remote,
                    local,
                    input: String::new(),
                }),
                Err(e) => Next::Go(Step::LocalPort {
                    host,
                    remote,
                    input,
                    error: Some(e),
                }),
            },

            (
                Step::Tag {
                    host,
                    remote,
                    local,
                    mut input,
                },
                Char(c),
            ) => {
                if let Some(c) = tag_char(c) {
                    if input.len() < MAX_TAG_LEN {
                        input.push(c);
                    }
                }
                Next::Go(Step::Tag {
                    host,
                    remote,
                    local,
                    input,
                })
            }
            (
                Step::Tag {
                    host,
                    remote,
                    local,
                    mut input,
                },
                Backspace,
            ) => {
                input.pop();
                Next::Go(Step::Tag {
                    host,
                    remote,
                    local,
                    input,
                })
            }
            (
                Step::Tag {
                    host,
                    remote,
                    local,
                    input,
                },
                Enter,
            ) => {
                let tag = if input.is_empty() { random_tag() } else { input };
                Next::Go(Step::Verbose {
                    host,
                    remote,
                    local,
                    tag,
                })
            }

            (
                Step::Verbose {
                    host,
                    remote,
                    local,
                    tag,
                },
                Enter | Char('y') | Char('Y') | Char('n') | Char('N'),
            ) => {
                let verbose = match event {
                    Char('y') | Char('Y') => true,
                    Char('n') | Char('N') => false,
                    _ => self.verbose_default,
                };
                Next::Submit(TunnelRequest {
                    host,
                    remote_port: remote,
                    local_port: local,
                    tag,
                    verbose,
                })
            }

            (_, Back) => Next::Cancel,
            (step, _) => Next::Go(step),
        }
    }
}

fn remote_port(host: String) -> Step {
    Step::RemotePort {
        host,
        input: String::new(),
        error: None,
    }
}

fn move_up(cursor: usize, scroll: usize) -> (usize, usize) {
    let cursor = cursor.saturating_sub(1);
    (cursor, scroll.min(cursor))
}

fn move_down(cursor: usize, scroll: usize, len: usize) -> (usize, usize) {
    let cursor = (cursor + 1).min(len.saturating_sub(1));
    let scroll = if cursor >= scroll + MAX_VISIBLE {
        cursor + 1 - MAX_VISIBLE
    } else {
        scroll
    };
    (cursor, scroll)
}

fn push_digit(input: &mut String, c: char) {
    if c.is_ascii_digit() && input.len() < 5 {
        input.push(c);
    }
}

fn parse_port(input: &str) -> Result<u16, String> {
    if input.is_empty() {
        return Err("port cannot be empty".into());
    }
    match input.parse::<u16>() {
        Ok(0) | Err(_) => Err("must be a number between 1 and 65535".into()),
        Ok(p) => Ok(p),
    }
}

fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '@')
}

/// Normalize a typed tag character: lowercase, space becomes underscore.
fn tag_char(c: char) -> Option<char> {
    match c {
        ' ' => Some('_'),
        'A'..='Z' => Some(c.to_ascii_lowercase()),
        'a'..='z' | '0'..='9' | '-' | '_' => Some(c),
        _ => None,
    }
}

const ADJECTIVES: &[&str] = &[
    "brave", "calm", "clever", "eager", "fuzzy", "gentle", "happy", "jolly", "keen", "lucky",
    "mellow", "nimble", "proud", "quiet", "rapid", "shy", "sleepy", "swift", "tidy", "witty",
];

const ANIMALS: &[&str] = &[
    "badger", "beaver", "ferret", "fox", "gopher", "hedgehog", "lemming", "marmot", "meerkat",
    "mole", "otter", "rabbit", "shrew", "squirrel", "vole", "weasel", "wombat", "chipmunk",
    "armadillo", "aardvark",
];

/// A throwaway display name such as "happy-otter".
pub fn random_tag() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("quiet");
    let animal = ANIMALS.choose(&mut rng).copied().unwrap_or("mole");
    format!("{}-{}", adjective, animal)
}
