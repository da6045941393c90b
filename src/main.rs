mod cli;
mod config;
mod logging;
mod logs;
mod port;
mod ssh_config;
mod supervisor;
mod ui;
mod wizard;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::Colorize;

use cli::{Cli, Command};
use config::Config;

fn main() -> Result<()> {
    clap_complete::CompleteEnv::with_factory(Cli::command).complete();

    let cli = Cli::parse();
    let mut cfg = Config::load();
    if let Some(program) = cli.ssh_program {
        cfg.ssh_program = program;
    }
    if let Some(path) = cli.ssh_config {
        cfg.ssh_config = Some(path);
    }

    if cli.no_color {
        colored::control::set_override(false);
    }

    match cli.command {
        None => cmd_ui(&cfg, cli.no_color),
        Some(Command::Hosts) => cmd_hosts(&cfg),
        Some(Command::Config) => cmd_config(&cfg),
        Some(Command::Completions { shell }) => cmd_completions(shell, &cfg),
    }
}

fn cmd_ui(cfg: &Config, no_color: bool) -> Result<()> {
    match cfg.log_file_path().and_then(|path| logging::init(&path)) {
        Ok(()) => {}
        Err(e) => eprintln!("{} diagnostic log disabled: {:#}", "⚠".yellow(), e),
    }

    // Frames go to /dev/tty, so a redirected stdout says nothing about color support.
    if !no_color && std::env::var_os("NO_COLOR").is_none() {
        colored::control::set_override(true);
    }

    let hosts = match cfg.ssh_config_path() {
        Some(path) => ssh_config::list_hosts(&path),
        None => Vec::new(),
    };
    tracing::info!(count = hosts.len(), "loaded ssh hosts");

    ui::run(cfg, hosts)
}

fn cmd_hosts(cfg: &Config) -> Result<()> {
    let path = cfg
        .ssh_config_path()
        .context("cannot determine home directory")?;
    let hosts = ssh_config::list_hosts(&path);

    if hosts.is_empty() {
        println!(
            "{}",
            format!("No hosts found in {}", path.display()).yellow()
        );
        return Ok(());
    }

    let width = hosts.iter().map(|h| h.alias.len()).max().unwrap_or(0);
    for host in &hosts {
        let extra = host.targets().split_off(1).join(", ");
        println!(
            "{} {}  {}",
            "●".green(),
            format!("{:<width$}", host.alias, width = width).bold(),
            extra.dimmed()
        );
    }
    Ok(())
}

fn cmd_config(cfg: &Config) -> Result<()> {
    let path = Config::init()?;
    let editor = cfg.resolve_editor();

    let status = std::process::Command::new(&editor)
        .arg(&path)
        .status()
        .with_context(|| format!("failed to launch editor '{}'", editor))?;

    if !status.success() {
        anyhow::bail!("editor exited with {}", status);
    }

    Ok(())
}

fn cmd_completions(shell: Option<clap_complete::Shell>, cfg: &Config) -> Result<()> {
    let shell = match shell {
        Some(s) => s,
        None => {
            let name = cfg.shell.as_deref().ok_or_else(|| {
                anyhow::anyhow!(
                    "no shell specified: use `burrow completions <shell>` or set `shell` in ~/.burrow/config.toml"
                )
            })?;
            name.parse::<clap_complete::Shell>()
                .map_err(|_| anyhow::anyhow!("unknown shell '{}' in config", name))?
        }
    };

    let shell_name = match shell {
        clap_complete::Shell::Bash => "bash",
        clap_complete::Shell::Zsh => "zsh",
        clap_complete::Shell::Fish => "fish",
        clap_complete::Shell::Elvish => "elvish",
        clap_complete::Shell::PowerShell => "powershell",
        _ => anyhow::bail!("unsupported shell"),
    };
    unsafe { std::env::set_var("COMPLETE", shell_name) };
    clap_complete::CompleteEnv::with_factory(Cli::command).complete();
    Ok(())
}
