use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use codex_switch::{
    bridge::{Bridge, EnvironmentProbe},
    commands,
    config::Settings,
    paths::Paths,
    ui::{ColorMode, Ui},
};

#[derive(Parser)]
#[command(name = "codex-switch")]
#[command(about = "Codex account switcher - save, switch and sync auth.json profiles")]
#[command(version)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// When to use colors: always, auto, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    /// Log debug details to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved profiles
    List,

    /// Show the active account
    Current,

    /// Save the active auth.json as a profile
    Save {
        /// Name of the profile
        name: String,

        /// Overwrite an existing profile without asking
        #[arg(long, short)]
        force: bool,
    },

    /// Switch to a saved profile
    Use {
        /// Name of the profile to activate
        name: String,
    },

    /// Delete a saved profile
    Remove {
        /// Name of the profile to delete
        name: String,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Show details of a saved profile
    Inspect {
        /// Name of the profile to inspect
        name: String,
    },

    /// Manage auth.json backups
    #[command(subcommand)]
    Backup(BackupCommands),

    /// Show the result of the WSL ↔ Windows sync
    Sync,

    /// Run diagnostics
    Doctor,

    /// Print shell completions
    Completions {
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum BackupCommands {
    /// List backups, newest first
    List,

    /// Restore a backup as the active auth.json
    Restore {
        /// Backup id as shown by `backup list`
        id: String,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CODEX_SWITCH_LOG")
                .unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "codex-switch", &mut std::io::stdout());
        return Ok(());
    }

    let settings = Settings::from_env();
    let paths = Paths::new(&settings)?;
    let ui = Ui::new(cli.color, cli.no_color);

    // Must run before anything reads the active credential.
    let report = Bridge::from_settings(&settings).run(&paths, &EnvironmentProbe::from_system());

    match cli.command {
        Commands::List => commands::list(&paths, &ui),
        Commands::Current => commands::current(&paths, &report, &ui),
        Commands::Save { name, force } => commands::save(&paths, &name, force, &ui),
        Commands::Use { name } => commands::use_profile(&paths, &name, &ui),
        Commands::Remove { name, force } => commands::remove(&paths, &name, force, &ui),
        Commands::Inspect { name } => commands::inspect(&paths, &name, &ui),
        Commands::Backup(BackupCommands::List) => commands::backup_list(&paths, &ui),
        Commands::Backup(BackupCommands::Restore { id, force }) => {
            commands::backup_restore(&paths, &id, force, &ui)
        }
        Commands::Sync => commands::sync(&report, &ui),
        Commands::Doctor => commands::doctor(&paths, &report, &ui),
        Commands::Completions { .. } => Ok(()),
    }
}
