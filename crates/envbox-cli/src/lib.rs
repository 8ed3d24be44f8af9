//! envbox-cli: clap commands, colored UI, and tracing bootstrap for the
//! `envbox` binary.

pub mod commands;
pub mod display;
pub mod logging;
pub mod ui;

pub use commands::{command, run};
