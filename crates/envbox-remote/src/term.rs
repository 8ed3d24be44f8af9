//! Scoped raw-mode acquisition for `exec_interactive`. The terminal must
//! be restored on every exit path, including panic, so `RawModeGuard`
//! lowers that to a `Drop` impl that runs unconditionally.

use crossterm::terminal;

pub struct RawModeGuard {
    was_enabled: bool,
}

impl RawModeGuard {
    /// Enter raw mode, unless it is already enabled by an outer scope
    /// (unwinding-safe: we only restore what we actually changed).
    pub fn enter() -> std::io::Result<Self> {
        let was_enabled = terminal::is_raw_mode_enabled()?;
        if !was_enabled {
            terminal::enable_raw_mode()?;
        }
        Ok(RawModeGuard { was_enabled })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if !self.was_enabled {
            let _ = terminal::disable_raw_mode();
        }
    }
}

/// Current terminal size, falling back to 80x24 when it cannot be
/// determined (e.g. stdout is not a TTY).
pub fn terminal_size() -> (u16, u16) {
    terminal::size().unwrap_or((80, 24))
}
