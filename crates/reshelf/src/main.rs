//! Reshelf command-line launcher
//!
//! Reorganizes a content tree according to a class rule table:
//! - `reconcile`: move every item under a scope to its canonical path
//! - `rename`: reconcile one item, optionally with a new name
//! - `rules` / `name`: validate the rule table and preview names
//! - `config`: show resolved paths

use clap::{Parser, Subcommand};
use reshelf_logging::{init_logging, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "reshelf", version, about = "Rule-driven asset taxonomy and reorganization")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Move every item under a scope to its canonical name and directory
    Reconcile {
        /// Namespace root directory
        root: PathBuf,

        /// Namespace scope to reconcile, relative to the root
        #[arg(short, long, default_value = "/")]
        scope: String,

        /// Rule table JSON (overrides config)
        #[arg(short, long, env = "RESHELF_RULES")]
        rules: Option<PathBuf>,

        /// Config file (default: ~/.reshelf/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Classification rule PATTERN=TAG, tried before config rules.
        /// Can be specified multiple times.
        #[arg(short = 'c', long = "classify")]
        classify: Vec<String>,

        /// Worker threads (overrides config)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Report what would move without touching anything
        #[arg(long)]
        dry_run: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reconcile a single item, optionally renaming it
    Rename {
        /// Namespace root directory
        root: PathBuf,

        /// Item location relative to the root, without extension (e.g. /Props/rock)
        item: String,

        /// Use this name instead of the current one
        #[arg(short, long)]
        name: Option<String>,

        /// Extra directory segment under the class directory
        #[arg(long)]
        sub_category: Option<String>,

        /// Rule table JSON (overrides config)
        #[arg(short, long, env = "RESHELF_RULES")]
        rules: Option<PathBuf>,

        /// Config file (default: ~/.reshelf/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Classification rule PATTERN=TAG, tried before config rules
        #[arg(short = 'c', long = "classify")]
        classify: Vec<String>,

        /// Report what would move without touching anything
        #[arg(long)]
        dry_run: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the rule table and list it
    Rules {
        /// Rule table JSON (overrides config)
        #[arg(short, long, env = "RESHELF_RULES")]
        rules: Option<PathBuf>,

        /// Config file (default: ~/.reshelf/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Preview the canonical path of a name for a class
    Name {
        /// Item name (e.g. hero_body.v003)
        name: String,

        /// Class tag (e.g. StaticMesh)
        #[arg(long)]
        class: String,

        /// Extra directory segment under the class directory
        #[arg(long)]
        sub_category: Option<String>,

        /// Rule table JSON (overrides config)
        #[arg(short, long, env = "RESHELF_RULES")]
        rules: Option<PathBuf>,

        /// Config file (default: ~/.reshelf/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration paths
    Config {
        /// Config file (default: ~/.reshelf/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn command_wants_json(command: &Commands) -> bool {
    match command {
        Commands::Reconcile { json, .. } => *json,
        Commands::Rename { json, .. } => *json,
        Commands::Rules { json, .. } => *json,
        Commands::Name { json, .. } => *json,
        Commands::Config { json, .. } => *json,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = command_wants_json(&cli.command);

    match init_logging(LogConfig {
        verbose: cli.verbose,
        quiet_console: json_mode,
    }) {
        Ok(log_file) => tracing::debug!(log_file = %log_file.display(), "Logging initialized"),
        Err(err) => eprintln!("Warning: failed to initialize logging: {:#}", err),
    }

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json_mode {
                cli::error::print_json_error(&err);
            } else {
                eprintln!("{:?}", err);
            }
            ExitCode::from(1)
        }
    }
}

fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Reconcile {
            root,
            scope,
            rules,
            config,
            classify,
            workers,
            dry_run,
            json,
        } => cli::reconcile::run(cli::reconcile::ReconcileArgs {
            engine: cli::reconcile::EngineArgs {
                root,
                rules,
                config,
                classify,
                workers,
                dry_run,
                json,
            },
            scope,
        }),
        Commands::Rename {
            root,
            item,
            name,
            sub_category,
            rules,
            config,
            classify,
            dry_run,
            json,
        } => cli::reconcile::run_rename(cli::reconcile::RenameArgs {
            engine: cli::reconcile::EngineArgs {
                root,
                rules,
                config,
                classify,
                workers: Some(1),
                dry_run,
                json,
            },
            item,
            name,
            sub_category,
        }),
        Commands::Rules {
            rules,
            config,
            json,
        } => cli::rules::run(cli::rules::RulesArgs {
            rules,
            config,
            json,
        }),
        Commands::Name {
            name,
            class,
            sub_category,
            rules,
            config,
            json,
        } => cli::rules::run_name(cli::rules::NameArgs {
            name,
            class,
            sub_category,
            rules,
            config,
            json,
        }),
        Commands::Config { config, init, json } => {
            cli::config::run(cli::config::ConfigArgs { config, init, json })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_reconcile() {
        let cli = Cli::try_parse_from([
            "reshelf",
            "reconcile",
            "/tmp/content",
            "--scope",
            "/Incoming",
            "--classify",
            "*.fbx=StaticMesh",
            "--dry-run",
            "--json",
        ])
        .unwrap();
        assert!(command_wants_json(&cli.command));
        match cli.command {
            Commands::Reconcile {
                scope,
                classify,
                dry_run,
                ..
            } => {
                assert_eq!(scope, "/Incoming");
                assert_eq!(classify, vec!["*.fbx=StaticMesh"]);
                assert!(dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
