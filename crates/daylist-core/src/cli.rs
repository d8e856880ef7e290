use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::selection::{CategoryScope, StatusFilter};

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "daylist",
    version,
    about = "Daylist: a small personal task list",
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

    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Add a task scheduled for today.
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,

        #[arg(short = 'c', long = "category")]
        category: Option<String>,
    },

    /// Show the tasks matching a view.
    List(ListArgs),

    /// Flip a task between active and completed.
    #[command(visible_alias = "done")]
    Toggle { id: String },

    #[command(visible_alias = "rm")]
    Remove { id: String },

    Rename {
        id: String,

        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },

    /// Set a task's category; omit it to uncategorize.
    Categorize { id: String, category: Option<String> },

    /// Move a task to another day (today, tomorrow, friday, +3d, 2026-05-01).
    Schedule {
        id: String,

        #[arg(allow_hyphen_values = true)]
        when: String,
    },

    ClearCompleted,

    /// List categories with their open task counts.
    Categories,

    /// Badge counts: open, today, per category.
    Summary,

    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(short = 's', long = "status", value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<StatusFilter>()))]
    pub status: Option<StatusFilter>,

    /// today, all, or a category id.
    #[arg(long = "scope", value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<CategoryScope>()))]
    pub scope: Option<CategoryScope>,

    #[arg(long = "search")]
    pub search: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProfileCommand {
    Show,

    Login { email: String, password: String },

    Logout,

    Update {
        #[arg(long = "username")]
        username: Option<String>,

        #[arg(long = "avatar", conflicts_with = "clear_avatar")]
        avatar: Option<String>,

        #[arg(long = "clear-avatar")]
        clear_avatar: bool,
    },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls `rc.key=value` / `rc.key:value` words out of the argument list so
/// they can appear anywhere on the command line.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}
