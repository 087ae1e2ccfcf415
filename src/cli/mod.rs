pub mod commands;
pub mod output;

use crate::errors::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "svnstash")]
#[command(about = "Provides stashing functionality for svn")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging and detailed listings
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Save everything in the working directory, with an optional comment, without reverting
    Save {
        /// Comment stored with the stash
        comment: Vec<String>,
    },

    /// Stash everything in the working directory, with an optional comment, and revert it
    Push {
        /// Comment stored with the stash
        comment: Vec<String>,
    },

    /// Apply the most recent stash, or the one given by index, and delete it
    Pop {
        /// Stash index as shown by `list`
        #[arg(default_value_t = 0, allow_negative_numbers = true)]
        index: i64,

        /// Answer yes to every confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Apply the most recent stash, or the one given by index, without deleting it
    Apply {
        /// Stash index as shown by `list`
        #[arg(default_value_t = 0, allow_negative_numbers = true)]
        index: i64,

        /// Answer yes to every confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Remove a stash without applying it
    #[command(visible_alias = "rm")]
    Remove {
        /// Stash index as shown by `list`
        #[arg(allow_negative_numbers = true)]
        index: i64,
    },

    /// Show the list of all stashes, most recent first; `--verbose` adds the changed files
    #[command(visible_alias = "ls")]
    List,

    /// Show the changes made in the given stash; `--no-color` prints it plain
    Show {
        /// Stash index as shown by `list`
        #[arg(allow_negative_numbers = true)]
        index: i64,
    },

    /// Print the status of the external tools svnstash relies on
    Dependencies,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., tools.patch)
        key: String,
        /// Configuration value
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// List all configuration values
    List,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        self.setup_logging();

        if self.no_color {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        }

        match self.command.unwrap_or(Commands::List) {
            Commands::Save { comment } => commands::stash::save(&comment.join(" ")),
            Commands::Push { comment } => commands::stash::push(&comment.join(" ")),
            Commands::Pop { index, yes } => commands::stash::pop(index, yes),
            Commands::Apply { index, yes } => commands::stash::apply(index, yes),
            Commands::Remove { index } => commands::stash::remove(index),
            Commands::List => commands::stash::list(self.verbose),
            Commands::Show { index } => commands::stash::show(index, !self.no_color),
            Commands::Dependencies => commands::dependencies::run(),
            Commands::Config { action } => commands::config::run(action),
            Commands::Completions { shell } => commands::completions::generate_completions(shell),
        }
    }

    fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        };

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr);

        let installed = if self.no_color {
            subscriber.with_ansi(false).try_init()
        } else {
            subscriber.try_init()
        };

        // a subscriber may already exist when embedded in tests
        let _ = installed;
    }
}
