use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::task::{Category, Priority, TaskId};

/// Arguments with positional `rc.key=value` settings split out.
#[derive(Debug, Clone, Default)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

/// `--rc key=value`.
#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((key, value)) = s.split_once('=') else {
            return Err(anyhow!("--rc wants KEY=VALUE, got {s:?}"));
        };
        Ok(Self {
            key: key.trim().to_string(),
            value: value.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "docket",
    version,
    about = "Docket: a localized task list with filters, search and manual ordering",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "docketrc")]
    pub docketrc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    /// Print every frame as JSON instead of a table.
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add a task.
    Add(AddArgs),
    /// Toggle a task between pending and completed.
    Done {
        #[arg(value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<TaskId>()))]
        id: TaskId,
    },
    /// Delete a task.
    Delete {
        #[arg(value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<TaskId>()))]
        id: TaskId,
    },
    /// List tasks. Any flag replaces the whole current filter; none keeps it.
    List(ListArgs),
    /// Reorder tasks; every task id must be given exactly once.
    Move {
        #[arg(
            required = true,
            num_args = 1..,
            value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<TaskId>())
        )]
        ids: Vec<TaskId>,
    },
    /// Switch the display language.
    Lang { code: String },
    /// Toggle between the light and dark theme.
    Theme,
    /// Show task counts.
    Stats,
    /// Read one command per line from stdin, keeping filters between lines.
    Shell,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AddArgs {
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,

    #[arg(
        short = 'c',
        long = "category",
        default_value = "work",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<Category>())
    )]
    pub category: Category,

    #[arg(
        short = 'p',
        long = "priority",
        default_value = "medium",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<Priority>())
    )]
    pub priority: Priority,

    /// YYYY-MM-DD, today, tomorrow, +3d, 2w or a weekday name.
    #[arg(short = 'd', long = "due")]
    pub due: Option<String>,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ListArgs {
    #[arg(
        short = 'c',
        long = "category",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<Category>())
    )]
    pub category: Option<Category>,

    #[arg(
        short = 'p',
        long = "priority",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<Priority>())
    )]
    pub priority: Option<Priority>,

    #[arg(short = 's', long = "search")]
    pub search: Option<String>,
}

/// One line of `docket shell`.
#[derive(Parser, Debug, Clone)]
#[command(name = "docket>", no_binary_name = true, disable_help_subcommand = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: ShellCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    #[command(flatten)]
    Base(Command),
    /// Set the category and priority filters; omitted ones are cleared.
    Filter {
        #[arg(
            short = 'c',
            long = "category",
            value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<Category>())
        )]
        category: Option<Category>,

        #[arg(
            short = 'p',
            long = "priority",
            value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<Priority>())
        )]
        priority: Option<Priority>,
    },
    /// Set the search query; no words clears it.
    Search { words: Vec<String> },
    /// Clear every filter.
    Clear,
    /// Leave the shell.
    #[command(alias = "exit")]
    Quit,
}

fn default_log_level(verbose: u8, quiet: u8) -> &'static str {
    match (quiet, verbose) {
        (2.., _) => "error",
        (1, _) => "warn",
        (0, 3..) => "trace",
        (0, 2) => "debug",
        (0, 1) => "info",
        _ => "warn",
    }
}

/// Logs go to stderr so table and JSON output on stdout stay clean.
/// `RUST_LOG` overrides the `-v`/`-q` level.
pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let level = default_log_level(verbose, quiet);
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| anyhow!("bad log filter {level}: {e}"))?,
    };

    let stderr_is_tty = std::io::stderr().is_terminal();
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(stderr_is_tty)
        .try_init()
    {
        debug!(error = %err, "global subscriber already installed");
    }

    Ok(())
}

fn rc_override(arg: &str) -> Option<(String, String)> {
    let rest = arg.strip_prefix("rc.")?;
    let (key, value) = rest.split_once('=').or_else(|| rest.split_once(':'))?;
    Some((format!("rc.{key}"), value.to_string()))
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of the
/// argument list before clap sees it. The binary name is never treated as
/// an override.
#[tracing::instrument(skip_all, fields(count = raw.len()))]
pub fn preprocess_args(raw: &[OsString]) -> PreprocessedArgs {
    let Some((bin, rest)) = raw.split_first() else {
        return PreprocessedArgs::default();
    };

    let mut pre = PreprocessedArgs {
        cleaned_args: vec![bin.clone()],
        rc_overrides: Vec::new(),
    };
    for arg in rest {
        match rc_override(&arg.to_string_lossy()) {
            Some((key, value)) => {
                debug!(key = %key, value = %value, "positional rc override");
                pre.rc_overrides.push((key, value));
            }
            None => pre.cleaned_args.push(arg.clone()),
        }
    }
    pre
}
