use std::io::IsTerminal;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

// ---------------------------------------------------------------------------
// Colored message helpers
//
// Informational/warning/success/error lines all go to standard error
// with a level tag; only primary data (tables) goes to standard output.
// Color is applied only when stderr is a terminal.
// ---------------------------------------------------------------------------

fn colorize() -> bool {
    std::io::stderr().is_terminal()
}

fn prefix() -> String {
    if colorize() {
        "[envbox]".bold().cyan().to_string()
    } else {
        "[envbox]".to_string()
    }
}

/// Print an informational message: [envbox] INFO message
pub fn info(msg: &str) {
    eprintln!("{} INFO {}", prefix(), msg);
}

/// Print a success message: [envbox] SUCCESS message (in green)
pub fn success(msg: &str) {
    let msg = if colorize() { msg.green().to_string() } else { msg.to_string() };
    eprintln!("{} SUCCESS {}", prefix(), msg);
}

/// Print an error message: [envbox] ERROR message (in red)
pub fn error(msg: &str) {
    let tag = if colorize() { "[envbox]".bold().red().to_string() } else { "[envbox]".to_string() };
    let msg = if colorize() { msg.red().to_string() } else { msg.to_string() };
    eprintln!("{tag} ERROR {msg}");
}

/// Print a warning message: [envbox] WARN message (in yellow)
pub fn warn(msg: &str) {
    let msg = if colorize() { msg.yellow().to_string() } else { msg.to_string() };
    eprintln!("{} WARN {}", prefix(), msg);
}

// ---------------------------------------------------------------------------
// Interactive prompts
// ---------------------------------------------------------------------------

/// Show a y/N confirmation prompt. Returns true if confirmed.
pub fn confirm(msg: &str) -> bool {
    inquire::Confirm::new(msg)
        .with_default(false)
        .prompt()
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Spinners
// ---------------------------------------------------------------------------

/// Create and start a spinner with the given message.
/// Call `.finish_with_message()` or `.finish_and_clear()` when done.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.cyan} {msg}")
            .expect("invalid spinner template"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}
