//! Operator CLI for upgrade workflows.
//!
//! Each editing command loads the workflow, applies one edit and saves.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;
use tracing::info;
use tracing_subscriber::EnvFilter;

use swim_console::{
    config::Config,
    store::create_store,
    workflow::{catalog, StepType, Workflow, WorkflowEditor},
};

#[derive(Parser)]
#[command(author, version, about = "Manage software upgrade workflows", long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is not set (debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List workflows
    List,

    /// Show the steps of a workflow
    Show { id: i64 },

    /// Create a workflow seeded with the readiness and distribution steps
    Create {
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Append a step (readiness, distribution, precheck, activation, postcheck, wait, ping)
    AddStep { id: i64, step_type: String },

    /// Remove the step at a 1-based position
    RemoveStep { id: i64, position: usize },

    /// Move a step from one 1-based position to another
    MoveStep { id: i64, from: usize, to: usize },

    /// Set a config value on the step at a 1-based position
    SetConfig {
        id: i64,
        position: usize,
        key: String,
        /// JSON value; bare words are taken as strings
        value: String,
    },

    /// Make a workflow the default
    SetDefault { id: i64 },

    /// Delete a workflow
    Delete { id: i64 },

    /// Create the standard default workflow if none is marked default
    Seed,

    /// List available step types
    StepTypes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load()?;
    info!("Loaded configuration: {:?}", config);

    let store = create_store(&config.database).await?;
    store.init().await?;

    let mut editor = WorkflowEditor::new(store);
    editor.load().await?;

    match cli.command {
        Commands::List => {
            for workflow in editor.workflows() {
                println!(
                    "{:>4}  {:<32} {:>2} steps{}",
                    workflow.id,
                    workflow.name,
                    workflow.steps.len(),
                    if workflow.is_default { "  [default]" } else { "" }
                );
            }
        }
        Commands::Show { id } => {
            let workflow = editor
                .workflow(id)
                .with_context(|| format!("workflow {} not found", id))?;
            print_workflow(workflow);
        }
        Commands::Create { name, description } => {
            let workflow = editor.create_workflow(&name, &description).await?;
            print_workflow(&workflow);
        }
        Commands::AddStep { id, step_type } => {
            let step_type: StepType = step_type.parse()?;
            editor.select(id)?;
            editor.add_step(step_type)?;
            save_and_show(&mut editor, id).await?;
        }
        Commands::RemoveStep { id, position } => {
            editor.select(id)?;
            if !editor.remove_step(to_index(position)?)? {
                bail!("step {} cannot be removed", position);
            }
            save_and_show(&mut editor, id).await?;
        }
        Commands::MoveStep { id, from, to } => {
            editor.select(id)?;
            if !editor.move_step(to_index(from)?, to_index(to)?)? {
                bail!("step {} cannot be moved to position {}", from, to);
            }
            save_and_show(&mut editor, id).await?;
        }
        Commands::SetConfig {
            id,
            position,
            key,
            value,
        } => {
            let value = serde_json::from_str(&value).unwrap_or(JsonValue::String(value));
            editor.select(id)?;
            editor.set_config_field(to_index(position)?, &key, value)?;
            save_and_show(&mut editor, id).await?;
        }
        Commands::SetDefault { id } => {
            editor.set_default(id).await?;
            println!("Workflow {} is now the default", id);
        }
        Commands::Delete { id } => {
            editor.delete_workflow(id).await?;
            println!("Workflow {} deleted", id);
        }
        Commands::Seed => match editor.ensure_default_workflow().await? {
            Some(workflow) => print_workflow(&workflow),
            None => println!("A default workflow already exists"),
        },
        Commands::StepTypes => {
            for def in catalog::all() {
                println!(
                    "{:<14} {:<24} {}",
                    def.step_type,
                    def.display_name,
                    serde_json::to_string(&def.default_config())?
                );
            }
        }
    }

    Ok(())
}

fn to_index(position: usize) -> Result<usize> {
    position
        .checked_sub(1)
        .context("positions start at 1")
}

async fn save_and_show(editor: &mut WorkflowEditor, id: i64) -> Result<()> {
    editor.save().await?;
    let workflow = editor
        .workflow(id)
        .with_context(|| format!("workflow {} disappeared after save", id))?;
    print_workflow(workflow);
    Ok(())
}

fn print_workflow(workflow: &Workflow) {
    println!(
        "{} (#{}){}",
        workflow.name,
        workflow.id,
        if workflow.is_default { " [default]" } else { "" }
    );
    if !workflow.description.is_empty() {
        println!("  {}", workflow.description);
    }
    if workflow.needs_repair {
        println!("  (stored steps are incomplete; the next save repairs them)");
    }
    for step in &workflow.steps {
        let config = serde_json::to_string(&step.config).unwrap_or_default();
        println!(
            "  {:>2}. {:<24} {:<13} {}",
            step.order, step.name, step.step_type, config
        );
    }
}
