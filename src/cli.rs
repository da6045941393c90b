use clap::{Parser, Subcommand, ValueHint};

#[derive(Parser)]
#[command(
    name = "burrow",
    about = "Terminal UI for local SSH port-forwarding tunnels",
    version
)]
pub struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// SSH config to read hosts from (default ~/.ssh/config)
    #[arg(long, global = true, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub ssh_config: Option<String>,

    /// SSH client to launch tunnels with (default ssh)
    #[arg(long = "ssh", global = true, value_name = "PROGRAM", value_hint = ValueHint::CommandName)]
    pub ssh_program: Option<String>,

    /// Without a subcommand the tunnel manager UI starts
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the hosts found in the SSH config
    #[command(alias = "ls")]
    Hosts,
    /// Initialize or edit ~/.burrow/config.toml
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (reads from config if omitted)
        shell: Option<clap_complete::Shell>,
    },
}
