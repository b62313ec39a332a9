//! multitask CLI
//!
//! Thin command-line front end over the task store and the completion
//! coordinator.

use anyhow::Result;
use clap::Parser;
use multitask::bus::{EventKind, NotificationBus};
use multitask::cli::{Cli, Command, ItemCommand, TaskCommand};
use multitask::config::Config;
use multitask::coordinator::TaskCompletionCoordinator;
use multitask::db::{Database, now_ms};
use multitask::error::TaskError;
use multitask::feedback::{Feedback, SilentFeedback, TerminalBell};
use multitask::format::{
    OutputFormat, format_outcome_text, format_task_text, format_tasks_text, to_json,
};
use multitask::logging::{self, LogTarget};
use multitask::types::{ItemUpdate, MutationOutcome, NewItem};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::load(path)?;
            config.apply_env();
            config
        }
        None => Config::load_or_default(),
    };

    if let Some(db) = &cli.database {
        config.store.db_path = PathBuf::from(db);
    }
    if cli.quiet {
        config.feedback.sound = false;
    }
    Ok(config)
}

fn print_outcome(format: OutputFormat, outcome: &MutationOutcome) {
    match format {
        OutputFormat::Text => print!("{}", format_outcome_text(outcome)),
        OutputFormat::Json => println!("{}", to_json(outcome)),
    }
}

fn run(cli: &Cli, coordinator: &TaskCompletionCoordinator) -> Result<()> {
    let db = coordinator.database();
    let format = OutputFormat::from(cli.format);

    match &cli.command {
        Command::Task(cmd) => match cmd {
            TaskCommand::Add { name, id } => {
                let task = db.create_task(id.clone(), name)?;
                match format {
                    OutputFormat::Text => println!("Created task {}", task.id),
                    OutputFormat::Json => println!("{}", to_json(&task)),
                }
            }
            TaskCommand::Rename { id, name } => {
                let task = db.rename_task(id, name)?;
                match format {
                    OutputFormat::Text => println!("Renamed task {} to \"{}\"", task.id, task.name),
                    OutputFormat::Json => println!("{}", to_json(&task)),
                }
            }
            TaskCommand::Rm { id } => {
                let deleted = db.delete_task(id)?;
                match format {
                    OutputFormat::Text if deleted => println!("Deleted task {}", id),
                    OutputFormat::Text => println!("Task {} was already deleted", id),
                    OutputFormat::Json => {
                        println!("{}", to_json(&serde_json::json!({ "id": id, "deleted": deleted })))
                    }
                }
            }
            TaskCommand::Show { id } => {
                let task = db.get_task(id)?.ok_or_else(|| TaskError::task_not_found(id))?;
                match format {
                    OutputFormat::Text => {
                        let items = db.list_items_for_display(id)?;
                        print!("{}", format_task_text(&task, &items, now_ms()));
                    }
                    OutputFormat::Json => println!("{}", to_json(&task)),
                }
            }
        },
        Command::Item(cmd) => match cmd {
            ItemCommand::Add(args) => {
                let mut new_item = NewItem::new(args.title.clone()).completed(args.done);
                if let Some(ref id) = args.id {
                    new_item = new_item.with_id(id.clone());
                }
                let outcome = coordinator.on_item_created(&args.task, new_item)?;
                print_outcome(format, &outcome);
            }
            ItemCommand::Done { task, item } => {
                let outcome = coordinator.on_item_mutated(task, item, ItemUpdate::complete())?;
                print_outcome(format, &outcome);
            }
            ItemCommand::Undo { task, item } => {
                let outcome = coordinator.on_item_mutated(task, item, ItemUpdate::revert())?;
                print_outcome(format, &outcome);
            }
            ItemCommand::Edit { item, title } => {
                let outcome = coordinator.on_item_edited(item, ItemUpdate::title(title.clone()))?;
                print_outcome(format, &outcome);
            }
            ItemCommand::Rm { task, items } => match coordinator.on_item_deleted(task, items.as_slice())? {
                Some(outcome) => print_outcome(format, &outcome),
                None => match format {
                    OutputFormat::Text => println!("Task {} was already deleted", task),
                    OutputFormat::Json => println!("null"),
                },
            },
        },
        Command::List { filter } => {
            let tasks = db.list_tasks((*filter).into())?;
            match format {
                OutputFormat::Text => print!("{}", format_tasks_text(&tasks, now_ms())),
                OutputFormat::Json => println!("{}", to_json(&tasks)),
            }
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = logging::init(&LogTarget::parse(&cli.log), cli.verbose) {
        eprintln!("Failed to initialize logging: {:#}", err);
        std::process::exit(2);
    }

    let coordinator = match setup(&cli) {
        Ok(coordinator) => coordinator,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            std::process::exit(2);
        }
    };

    if let Err(err) = run(&cli, &coordinator) {
        let err = TaskError::from(err);
        debug!(code = ?err.code(), error = %err, "Command failed");
        eprintln!("{}", err.user_message());
        std::process::exit(1);
    }
}

fn setup(cli: &Cli) -> Result<TaskCompletionCoordinator> {
    let config = load_config(cli)?;
    config.ensure_db_dir()?;
    debug!(db_path = %config.store.db_path.display(), "Opening database");
    let db = Database::open(&config.store.db_path)?;

    let bus = Arc::new(NotificationBus::new());
    for kind in [EventKind::TaskCompletion, EventKind::TaskPending] {
        bus.subscribe(kind, |event| {
            info!(event = event.kind.as_str(), task_id = %event.task_id, "Task state changed");
        });
    }

    let feedback: Arc<dyn Feedback> = if config.feedback.sound {
        Arc::new(TerminalBell)
    } else {
        Arc::new(SilentFeedback)
    };

    Ok(TaskCompletionCoordinator::new(db, bus, feedback))
}
