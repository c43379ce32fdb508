//! This module defines the command line arguments wpgate accepts.

use std::path::PathBuf;
use termcolor::ColorChoice;


#[derive(Debug, clap::Parser)]
#[clap(about = "GraphQL API for the users of a WordPress installation.")]
pub(crate) struct Args {
    #[clap(subcommand)]
    pub(crate) cmd: Command,

    /// Whether to use colors when printing to stdout or stderr.
    #[clap(long, global = true, value_enum, default_value_t = ColorMode::Auto)]
    pub(crate) color: ColorMode,
}

#[derive(Debug, clap::Subcommand)]
pub(crate) enum Command {
    /// Starts the HTTP server serving the GraphQL API.
    Serve {
        #[clap(flatten)]
        shared: Shared,
    },

    /// Checks config, DB connection and the users table to find problems in
    /// wpgate's environment.
    ///
    /// Exits with 0 if everything is Ok, and with 1 otherwise.
    Check {
        #[clap(flatten)]
        shared: Shared,
    },

    /// Outputs a template for the configuration file (which includes
    /// descriptions of all options).
    WriteConfig {
        /// Target file. If not specified, the template is written to stdout.
        target: Option<PathBuf>,
    },

    /// Exports the API as GraphQL schema.
    ExportApiSchema {
        /// Target file. If not specified, the schema is written to stdout.
        target: Option<PathBuf>,

        /// Write the result of the introspection query as JSON (as needed by
        /// Relay tooling) instead of the schema definition language.
        #[clap(long)]
        json: bool,
    },

    /// Reads a password from stdin and prints a hash of it in the format
    /// WordPress uses. Useful to set passwords directly in the DB.
    HashPassword,
}

#[derive(Debug, clap::Args)]
pub(crate) struct Shared {
    /// Path to the configuration file. If this is not specified, wpgate will
    /// try opening `config.toml` or `/etc/wpgate/config.toml`.
    #[clap(short, long)]
    pub(crate) config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum ColorMode {
    Never,
    Auto,
    Always,
}

impl Args {
    pub(crate) fn stdout_color(&self) -> ColorChoice {
        self.color_choice(std::io::IsTerminal::is_terminal(&std::io::stdout()))
    }

    pub(crate) fn stderr_color(&self) -> ColorChoice {
        self.color_choice(std::io::IsTerminal::is_terminal(&std::io::stderr()))
    }

    fn color_choice(&self, is_terminal: bool) -> ColorChoice {
        match self.color {
            ColorMode::Never => ColorChoice::Never,
            ColorMode::Always => ColorChoice::Always,
            ColorMode::Auto if is_terminal => ColorChoice::Auto,
            ColorMode::Auto => ColorChoice::Never,
        }
    }

    /// Name of the subcommand, used in log file names.
    pub(crate) fn cmd_name(&self) -> &'static str {
        match self.cmd {
            Command::Serve { .. } => "serve",
            _ => "other",
        }
    }
}
