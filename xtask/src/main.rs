//! Developer-only build helpers, invoked with `cargo run -p xtask -- <task>`.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask")]
struct Cli {
    #[command(subcommand)]
    task: Task,
}

#[derive(Subcommand)]
enum Task {
    /// Render man pages for the `envbox` CLI into `target/man`.
    Man,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.task {
        Task::Man => man(),
    }
}

fn man() -> Result<()> {
    let out_dir = PathBuf::from("target/man");
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let cmd = envbox_cli::command();
    render_recursive(&cmd, &out_dir)?;

    println!("xtask: rendered man pages to {}", out_dir.display());
    Ok(())
}

fn render_recursive(cmd: &clap::Command, out_dir: &PathBuf) -> Result<()> {
    let man = clap_mangen::Man::new(cmd.clone());
    let mut buffer = Vec::new();
    man.render(&mut buffer)?;

    let name = cmd.get_name();
    let path = out_dir.join(format!("{name}.1"));
    fs::write(&path, buffer).with_context(|| format!("failed to write {}", path.display()))?;

    for sub in cmd.get_subcommands() {
        if sub.is_hide_set() {
            continue;
        }
        let qualified = sub.clone().name(format!("{}-{}", name, sub.get_name()));
        render_recursive(&qualified, out_dir)?;
    }
    Ok(())
}
