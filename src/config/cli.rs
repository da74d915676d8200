use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use uuid::Uuid;

use crate::domain::entities::TodoId;
use crate::domain::todos::Filter;

/// Command-line arguments for the quire binary.
#[derive(Debug, Parser)]
#[command(name = "quire", version, about = "Cached remote queries and local todo stores")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "QUIRE_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the directory holding persisted stores.
    #[arg(
        long = "storage-dir",
        value_name = "PATH",
        value_hint = ValueHint::DirPath,
        global = true
    )]
    pub storage_dir: Option<PathBuf>,

    /// Override the remote backend base URL.
    #[arg(long = "remote-url", value_name = "URL", global = true)]
    pub remote_url: Option<String>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Manage the local todo list.
    #[command(subcommand)]
    Todo(TodoCommand),
    /// Query the remote backend through the query cache.
    #[command(subcommand)]
    Remote(RemoteCommand),
    /// Sign in with email and password and print the session owner.
    SignIn(SignInArgs),
}

#[derive(Debug, Subcommand, Clone)]
pub enum TodoCommand {
    /// Add a todo.
    Add {
        /// Todo text; surrounding whitespace is trimmed.
        text: String,
    },
    /// Flip a todo between active and completed.
    Toggle { id: String },
    /// Replace the text of a todo.
    Edit { id: String, text: String },
    /// Delete a todo.
    Remove { id: String },
    /// List todos.
    List {
        /// Show only todos matching this filter (all|active|completed).
        #[arg(long, default_value_t = Filter::All)]
        filter: Filter,
    },
    /// Delete every completed todo.
    ClearCompleted,
}

#[derive(Debug, Subcommand, Clone)]
pub enum RemoteCommand {
    /// List remote todos.
    Todos,
    /// Show one remote todo.
    Todo { id: TodoId },
    /// List posts.
    Posts,
    /// Show a profile.
    Profile { id: Uuid },
}

#[derive(Debug, Args, Clone)]
pub struct SignInArgs {
    #[arg(long, env = "QUIRE_EMAIL")]
    pub email: String,

    #[arg(long, env = "QUIRE_PASSWORD", hide_env_values = true)]
    pub password: String,
}
