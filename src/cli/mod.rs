//! CLI surface: global flags plus one file per subcommand, following the CLI teacher's
//! `command.rs` (subcommand enum + dispatch) and `command/*.rs` (one `Args` struct per command).

pub mod args;
mod completions;
mod demo;
mod deploy;
mod describe_changeset;
mod drift;
mod exports;
mod history;
mod report;
mod resources;

use crate::config::Config;

/// Flags that apply to every subcommand, following spec.md §6.
#[derive(Debug, clap::Parser)]
pub struct Global {
    /// The AWS region to use. Overrides config/env settings.
    #[clap(long, global = true, env = "AWS_REGION")]
    pub region: Option<String>,

    /// The AWS profile to use.
    #[clap(long, global = true, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    /// The project root directory (where `config/`, `templates/`, etc. are resolved relative to).
    #[clap(long, global = true)]
    pub rootdir: Option<std::path::PathBuf>,

    /// IANA timezone used to render timestamps, e.g. `Europe/London`. Defaults to config/`UTC`.
    #[clap(long, global = true)]
    pub timezone: Option<String>,

    /// Never prompt; assume the default answer to every confirmation.
    #[clap(long, global = true)]
    pub non_interactive: bool,

    /// Disable colored output.
    #[clap(long, global = true)]
    pub no_color: bool,

    /// Emit debug-level tracing and verbose error rendering.
    #[clap(short, long, global = true)]
    pub verbose: bool,
}

impl Global {
    #[must_use]
    pub fn color(&self) -> bool {
        !self.no_color
    }
}

/// The full command line: global flags plus the chosen subcommand. This is the type
/// `clap::CommandFactory` introspects for shell-completion generation.
#[derive(Debug, clap::Parser)]
#[clap(name = "fog")]
pub struct Cli {
    #[clap(flatten)]
    pub global: Global,

    #[clap(subcommand)]
    pub command: Command,
}

/// The top-level command, dispatched after global flags are parsed.
#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Create and/or execute a change set for a stack, following it through to completion.
    Deploy(self::deploy::Args),
    /// Create a change set and report what it would do, without executing it.
    DescribeChangeset(self::describe_changeset::Args),
    /// Detect drift between a stack's template and the live resources it manages.
    Drift(self::drift::Args),
    /// Render the event timeline for a stack's most recent operation.
    Report(self::report::Args),
    /// Show previously recorded deployments from the Deployment Log.
    History(self::history::Args),
    /// List the physical resources belonging to a stack.
    Resources(self::resources::Args),
    /// List a stack's exported values and what imports them.
    Exports(self::exports::Args),
    /// Render a sample document through the chosen output format, without contacting a provider.
    Demo(self::demo::Args),
    /// Write a shell completion script to STDOUT.
    Completions(self::completions::Args),
}

pub async fn main(global: Global, config: Config, command: Command) -> i32 {
    match command {
        Command::Deploy(args) => self::deploy::run(&global, &config, args).await,
        Command::DescribeChangeset(args) => self::describe_changeset::run(&global, &config, args).await,
        Command::Drift(args) => self::drift::run(&global, &config, args).await,
        Command::Report(args) => self::report::run(&global, &config, args).await,
        Command::History(args) => self::history::run(&global, &config, args),
        Command::Resources(args) => self::resources::run(&global, &config, args).await,
        Command::Exports(args) => self::exports::run(&global, &config, args).await,
        Command::Demo(args) => self::demo::run(&global, args),
        Command::Completions(args) => self::completions::run(args),
    }
}
