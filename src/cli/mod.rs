//! CLI command definitions for multitask
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::format::OutputFormat;
use crate::types::TaskFilter;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Output format flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FormatArg {
    #[default]
    Text,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

/// Which tasks to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FilterArg {
    #[default]
    All,
    Pending,
    Completed,
}

impl From<FilterArg> for TaskFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::All => TaskFilter::All,
            FilterArg::Pending => TaskFilter::Pending,
            FilterArg::Completed => TaskFilter::Completed,
        }
    }
}

/// Checklist tasks from the command line
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = FormatArg::Text, global = true)]
    pub format: FormatArg,

    /// Disable the terminal bell
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage tasks
    #[command(subcommand)]
    Task(TaskCommand),

    /// Manage checklist items
    #[command(subcommand)]
    Item(ItemCommand),

    /// List tasks
    List {
        /// Which tasks to show
        #[arg(value_enum, default_value_t = FilterArg::All)]
        filter: FilterArg,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Create a task
    Add {
        name: String,
        /// Explicit task id
        #[arg(long)]
        id: Option<String>,
    },
    /// Rename a task
    Rename { id: String, name: String },
    /// Delete a task and its items
    Rm { id: String },
    /// Show a task with its checklist
    Show { id: String },
}

#[derive(Subcommand, Debug)]
pub enum ItemCommand {
    /// Append an item to a task
    Add(AddItemArgs),
    /// Check an item off
    Done { task: String, item: String },
    /// Mark an item as not done
    Undo { task: String, item: String },
    /// Change an item's title
    Edit { item: String, title: String },
    /// Delete items from a task
    Rm {
        task: String,
        #[arg(required = true)]
        items: Vec<String>,
    },
}

#[derive(Args, Debug)]
pub struct AddItemArgs {
    pub task: String,
    pub title: String,
    /// Create the item already checked off
    #[arg(long)]
    pub done: bool,
    /// Explicit item id
    #[arg(long)]
    pub id: Option<String>,
}
