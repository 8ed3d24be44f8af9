use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand};

use envbox_core::context::Ctx;
use envbox_core::naming;
use envbox_env::{Environment, EnvironmentController};
use envbox_vm::DEFAULT_VM_NAME;

use crate::display::EnvironmentRow;
use crate::{logging, ui};

#[derive(Parser)]
#[command(
    name = "envbox",
    version,
    about = "Per-project isolated execution environments backed by a single Lima VM"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enter an environment's shell, creating it first if needed
    Shell {
        /// Project directory (default: current directory)
        path: Option<PathBuf>,
        /// Command to run instead of an interactive shell
        #[arg(last = true)]
        cmd: Vec<String>,
    },
    /// List all provisioned environments
    List,
    /// Delete the environment for a project path
    Delete {
        /// Project directory (default: current directory)
        path: Option<PathBuf>,
        /// Skip the confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },
    /// Delete every provisioned environment
    DeleteAll {
        /// Skip the confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },
}

/// The top-level command graph, exposed for man-page generation (see
/// `xtask`).
pub fn command() -> clap::Command {
    Cli::command()
}

pub fn run() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Shell { path, cmd } => cmd_shell(path, cmd),
        Commands::List => cmd_list(),
        Commands::Delete { path, force } => cmd_delete(path, force),
        Commands::DeleteAll { force } => cmd_delete_all(force),
    }
}

fn controller() -> EnvironmentController {
    EnvironmentController::new(DEFAULT_VM_NAME)
}

fn resolve_path(path: Option<PathBuf>) -> Result<PathBuf> {
    let path = path.unwrap_or(PathBuf::from("."));
    let metadata = std::fs::metadata(&path)
        .with_context(|| format!("{} does not exist or is inaccessible", path.display()))?;
    if !metadata.is_dir() {
        bail!("{} is not a directory", path.display());
    }
    Ok(path)
}

fn cmd_shell(path: Option<PathBuf>, cmd: Vec<String>) -> Result<()> {
    let path = resolve_path(path)?;
    let ctx = Ctx::background();
    let ctl = controller();

    let spinner = ui::spinner("Preparing environment...");
    let env = ctl.create(&ctx, &path);
    spinner.finish_and_clear();
    let env = env.context("failed to provision environment")?;

    ctl.enter(&ctx, &env, &cmd).context("failed to enter environment")?;
    Ok(())
}

fn cmd_list() -> Result<()> {
    let ctx = Ctx::background();
    let ctl = controller();

    ui::info("Looking up environments...");
    let envs = ctl.list(&ctx).context("failed to list environments")?;
    let envs: Vec<Environment> = envs
        .into_iter()
        .filter(|e| naming::is_environment_name(&e.name))
        .collect();

    let rows: Vec<EnvironmentRow> = envs
        .iter()
        .map(|e| {
            let project_path = ctl
                .get_project_path(&ctx, &e.name)
                .ok()
                .flatten()
                .unwrap_or_else(|| "-".to_string());
            EnvironmentRow {
                name: e.name.clone(),
                project_path,
            }
        })
        .collect();

    if rows.is_empty() {
        ui::info("No environments found.");
    } else {
        println!("{}", tabled::Table::new(&rows));
    }
    println!("Total: {} environment(s)", rows.len());
    Ok(())
}

fn cmd_delete(path: Option<PathBuf>, force: bool) -> Result<()> {
    // Unlike `shell`, the project directory need not still exist: you
    // may want to delete an environment after removing its checkout.
    let path = path.unwrap_or(PathBuf::from("."));
    let name = naming::generate(&path).context("failed to derive environment name")?;
    let ctx = Ctx::background();
    let ctl = controller();

    if !force && !ui::confirm(&format!("Delete environment '{name}' ({})?", path.display())) {
        ui::info("Cancelled.");
        return Ok(());
    }

    ctl.delete(&ctx, &name).context("failed to delete environment")?;
    ui::success(&format!("Deleted '{name}'."));
    Ok(())
}

fn cmd_delete_all(force: bool) -> Result<()> {
    let ctx = Ctx::background();
    let ctl = controller();

    if !force && !ui::confirm("Delete every provisioned environment?") {
        ui::info("Cancelled.");
        return Ok(());
    }

    match ctl.delete_all(&ctx) {
        Ok(()) => {
            ui::success("Deleted all environments.");
            Ok(())
        }
        Err(e) => {
            ui::error(&e.to_string());
            Err(e.into())
        }
    }
}
