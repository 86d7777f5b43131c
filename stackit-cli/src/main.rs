mod configuration;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::info;

use stackit_core::differ::{create_plan, destroy_plan};
use stackit_core::effect::Effect;
use stackit_core::interpreter::{ApplyResult, EffectOutcome, Interpreter};
use stackit_core::plan::{Plan, format_effect_brief};
use stackit_core::provider::{Provider, ResourceKind};
use stackit_core::resource::{ResourceId, State};
use stackit_core::schema::ResourceSchema;
use stackit_provider::StackitProvider;
use stackit_state::{StateBackend, StateFile, create_backend};

use crate::configuration::{Configuration, short_type_name};

#[derive(Parser)]
#[command(name = "stackit")]
#[command(about = "Converge STACKIT cloud resources to a declared configuration", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, short, global = true, default_value = "main.json")]
    file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the changes apply would make
    Plan,
    /// Create, update and delete resources to match the configuration
    Apply {
        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Delete every resource tracked in state
    Destroy {
        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Re-read tracked resources and drop the ones deleted out of band
    Refresh,
    /// Adopt an existing remote object into state
    Import {
        /// Resource type, with or without the `stackit_` prefix
        resource_type: String,
        /// Name to track the resource under
        name: String,
        /// Comma-separated identifier, e.g. `<project_id>,<instance_id>`
        import_id: String,
    },
    /// Inspect and repair state
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// List tracked resources
    List,
    /// Remove a lock left behind by an interrupted run
    ForceUnlock { lock_id: String },
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Plan => run_plan(&cli.file).await,
        Commands::Apply { auto_approve } => run_apply(&cli.file, auto_approve).await,
        Commands::Destroy { auto_approve } => run_destroy(&cli.file, auto_approve).await,
        Commands::Refresh => run_refresh(&cli.file).await,
        Commands::Import {
            resource_type,
            name,
            import_id,
        } => run_import(&cli.file, &resource_type, &name, &import_id).await,
        Commands::State { command } => match command {
            StateCommands::List => run_state_list(&cli.file).await,
            StateCommands::ForceUnlock { lock_id } => run_force_unlock(&cli.file, &lock_id).await,
        },
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Everything a command needs: the parsed file, the provider and the backend
struct Workspace {
    config: Configuration,
    backend: Box<dyn StateBackend>,
}

impl Workspace {
    fn load(file: &Path) -> Result<Self, String> {
        let config = Configuration::load(file)?;
        let backend = create_backend(&config.backend).map_err(|e| e.to_string())?;
        Ok(Self { config, backend })
    }

    fn provider(&self) -> Result<StackitProvider, String> {
        StackitProvider::new(self.config.provider.clone().resolve()).map_err(|e| e.to_string())
    }

    async fn read_state(&self) -> Result<StateFile, String> {
        Ok(self
            .backend
            .read_state()
            .await
            .map_err(|e| e.to_string())?
            .unwrap_or_default())
    }

    async fn write_state(
        &self,
        state: &mut StateFile,
        states: &HashMap<ResourceId, State>,
    ) -> Result<(), String> {
        state.set_states(states);
        state.increment_serial();
        self.backend
            .write_state(state)
            .await
            .map_err(|e| format!("Failed to save state: {}", e))
    }

    /// Run `body` while holding the state lock; the lock is released on
    /// failure too
    async fn locked<T>(
        &self,
        operation: &str,
        body: impl AsyncFnOnce() -> Result<T, String>,
    ) -> Result<T, String> {
        let lock = self
            .backend
            .acquire_lock(operation)
            .await
            .map_err(|e| e.to_string())?;
        let result = body().await;
        let released = self.backend.release_lock(&lock).await;
        let value = result?;
        released.map_err(|e| format!("Failed to release state lock: {}", e))?;
        Ok(value)
    }
}

fn resource_schemas(provider: &StackitProvider) -> HashMap<String, ResourceSchema> {
    provider
        .resource_types()
        .into_iter()
        .filter(|t| t.kind() == ResourceKind::Resource)
        .map(|t| (t.name().to_string(), t.schema()))
        .collect()
}

async fn run_plan(file: &Path) -> Result<(), String> {
    let workspace = Workspace::load(file)?;
    let provider = workspace.provider()?;
    workspace.config.validate(&provider)?;

    let state = workspace.read_state().await?;
    let plan = create_plan(
        &workspace.config.desired(),
        &state.states(),
        &resource_schemas(&provider),
    );
    print_plan(&plan);
    Ok(())
}

async fn run_apply(file: &Path, auto_approve: bool) -> Result<(), String> {
    let workspace = Workspace::load(file)?;
    let provider = workspace.provider()?;
    workspace.config.validate(&provider)?;
    let schemas = resource_schemas(&provider);
    let interpreter = Interpreter::new(provider);

    workspace
        .locked("apply", async || {
            let mut state = workspace.read_state().await?;
            let mut states = state.states();
            let plan = create_plan(&workspace.config.desired(), &states, &schemas);
            print_plan(&plan);

            if plan.mutation_count() == 0 {
                return Ok(());
            }
            if !auto_approve && !confirm("Do you want to perform these actions?")? {
                println!("{}", "Apply cancelled.".yellow());
                return Ok(());
            }

            println!("{}", "Applying changes...".cyan().bold());
            println!();
            let result = interpreter.apply(&plan, &mut states).await;
            print_outcomes(&plan, &result);

            // Partial progress is still recorded
            workspace.write_state(&mut state, &states).await?;
            finish(&result, "Apply")
        })
        .await
}

async fn run_destroy(file: &Path, auto_approve: bool) -> Result<(), String> {
    let workspace = Workspace::load(file)?;
    let interpreter = Interpreter::new(workspace.provider()?);

    workspace
        .locked("destroy", async || {
            let mut state = workspace.read_state().await?;
            let mut states = state.states();
            let plan = destroy_plan(&states);
            if plan.is_empty() {
                println!("{}", "No resources tracked in state.".yellow());
                return Ok(());
            }

            println!("{}", "Destroy Plan:".red().bold());
            println!();
            for effect in plan.effects() {
                println!("  {} {}", "-".red().bold(), effect.resource_id());
            }
            println!();
            println!("Plan: {} to destroy.", plan.effects().len().to_string().red());
            println!();

            if !auto_approve
                && !confirm("Do you really want to destroy all resources? This cannot be undone.")?
            {
                println!("{}", "Destroy cancelled.".yellow());
                return Ok(());
            }

            println!("{}", "Destroying resources...".red().bold());
            println!();
            let result = interpreter.apply(&plan, &mut states).await;
            print_outcomes(&plan, &result);

            workspace.write_state(&mut state, &states).await?;
            finish(&result, "Destroy")
        })
        .await
}

async fn run_refresh(file: &Path) -> Result<(), String> {
    let workspace = Workspace::load(file)?;
    let interpreter = Interpreter::new(workspace.provider()?);

    workspace
        .locked("refresh", async || {
            let mut state = workspace.read_state().await?;
            let mut states = state.states();
            let result = interpreter.refresh(&mut states).await;

            for id in &result.drifted {
                println!("  {} {} (deleted outside of this tool)", "-".red().bold(), id);
            }
            for error in &result.errors {
                println!("  {} {}", "✗".red(), error);
            }

            workspace.write_state(&mut state, &states).await?;
            println!();
            println!(
                "Refreshed {} resources, {} removed from state.",
                states.len() + result.drifted.len(),
                result.drifted.len()
            );
            if result.errors.is_empty() {
                Ok(())
            } else {
                Err(format!("{} resources could not be read", result.errors.len()))
            }
        })
        .await
}

async fn run_import(
    file: &Path,
    resource_type: &str,
    name: &str,
    import_id: &str,
) -> Result<(), String> {
    let workspace = Workspace::load(file)?;
    let interpreter = Interpreter::new(workspace.provider()?);
    let id = ResourceId::new(short_type_name(resource_type), name);

    workspace
        .locked("import", async || {
            let mut state = workspace.read_state().await?;
            let mut states = state.states();
            if states.contains_key(&id) {
                return Err(format!("{} is already tracked in state", id));
            }

            let imported = interpreter
                .import(&id, import_id)
                .await
                .map_err(|e| e.to_string())?;
            states.insert(id.clone(), imported);
            workspace.write_state(&mut state, &states).await?;

            info!("imported {} from {:?}", id, import_id);
            println!("{}", format!("Import complete: {}", id).green().bold());
            Ok(())
        })
        .await
}

async fn run_state_list(file: &Path) -> Result<(), String> {
    let workspace = Workspace::load(file)?;
    let state = workspace.read_state().await?;
    for resource in &state.resources {
        match &resource.identifier {
            Some(identifier) => println!(
                "{}.{}  {}",
                resource.resource_type,
                resource.name,
                identifier.dimmed()
            ),
            None => println!("{}.{}", resource.resource_type, resource.name),
        }
    }
    Ok(())
}

async fn run_force_unlock(file: &Path, lock_id: &str) -> Result<(), String> {
    let workspace = Workspace::load(file)?;
    workspace
        .backend
        .force_unlock(lock_id)
        .await
        .map_err(|e| e.to_string())?;
    println!("{}", "State unlocked.".green());
    Ok(())
}

fn confirm(question: &str) -> Result<bool, String> {
    println!("{}", question.yellow().bold());
    println!("  {}", "Only 'yes' will be accepted to approve.".yellow());
    print!("\n  Enter a value: ");
    std::io::Write::flush(&mut std::io::stdout()).map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    println!();
    Ok(input.trim() == "yes")
}

fn print_plan(plan: &Plan) {
    if plan.mutation_count() == 0 {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();
    for effect in plan.effects() {
        print_effect(effect);
    }
    println!();
    println!("{}", plan.summary());
    println!();
}

fn print_effect(effect: &Effect) {
    let brief = format_effect_brief(effect);
    let line = match effect {
        Effect::Create(_) => brief.green(),
        Effect::Update { .. } => brief.yellow(),
        Effect::Replace { .. } => brief.magenta(),
        Effect::Delete(_) => brief.red(),
        Effect::Read(_) => brief.dimmed(),
    };
    println!("  {}", line);

    let changed = match effect {
        Effect::Update { from, to } | Effect::Replace { from, to } => Some((from, to)),
        _ => None,
    };
    if let Some((from, to)) = changed {
        let mut keys: Vec<&String> = to.attributes.keys().collect();
        keys.sort();
        for key in keys {
            let desired = &to.attributes[key];
            match from.attributes.get(key) {
                Some(current) if current == desired => {}
                Some(current) => println!(
                    "      {}: {} → {}",
                    key,
                    format!("{:?}", current).red(),
                    format!("{:?}", desired).green()
                ),
                None => println!("      {}: {}", key, format!("{:?}", desired).green()),
            }
        }
    }
}

fn print_outcomes(plan: &Plan, result: &ApplyResult) {
    for (effect, outcome) in plan.effects().iter().zip(&result.outcomes) {
        match outcome {
            Ok(EffectOutcome::Skipped { reason }) => {
                println!("  {} {} ({})", "-".dimmed(), format_effect_brief(effect), reason)
            }
            Ok(_) => println!("  {} {}", "✓".green(), format_effect_brief(effect)),
            Err(e) => println!("  {} {} - {}", "✗".red(), format_effect_brief(effect), e),
        }
    }
    let skipped = plan.effects().len().saturating_sub(result.outcomes.len());
    if skipped > 0 {
        println!(
            "  {}",
            format!("{} remaining changes not attempted", skipped).dimmed()
        );
    }
    println!();
}

fn finish(result: &ApplyResult, what: &str) -> Result<(), String> {
    if result.is_success() {
        println!(
            "{}",
            format!(
                "{} complete! {} changes applied.",
                what, result.success_count
            )
            .green()
            .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "{} failed. {} succeeded, {} failed.",
            what, result.success_count, result.failure_count
        ))
    }
}
