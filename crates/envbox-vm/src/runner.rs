//! Injectable command execution: a first-class trait, rather than a
//! thread-local hook, so VM controller tests can assert on the exact
//! argument vectors observed without any global mutable state.

use std::process::Command;
use std::sync::Arc;

use crate::error::VmError;

/// The outcome of running a subprocess to completion.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn stdout_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

/// `(program, args...) -> bytes | error`. The VM Controller never spawns
/// a subprocess directly — it always goes through this trait, which is
/// what lets tests supply canned outputs per argument vector.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, VmError>;
}

/// The real runner: spawns `program` as a child process.
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, VmError> {
        if which::which(program).is_err() {
            return Err(VmError::BackendUnavailable);
        }

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(VmError::Io)?;

        Ok(CommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
            code: output.status.code(),
        })
    }
}

pub type SharedRunner = Arc<dyn CommandRunner>;

pub fn default_runner() -> SharedRunner {
    Arc::new(ProcessCommandRunner)
}

#[cfg(test)]
pub mod fixtures {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records every `(program, args)` vector it was asked to run, and
    /// answers from a table of canned responses keyed by the full
    /// argument vector (joined with a single space).
    pub struct FixtureRunner {
        pub responses: Mutex<HashMap<String, CommandOutput>>,
        pub calls: Mutex<Vec<Vec<String>>>,
    }

    impl FixtureRunner {
        pub fn new() -> Self {
            FixtureRunner {
                responses: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn with(self, args: &[&str], output: CommandOutput) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(args.join(" "), output);
            self
        }

        pub fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for FixtureRunner {
        fn run(&self, _program: &str, args: &[&str]) -> Result<CommandOutput, VmError> {
            self.calls
                .lock()
                .unwrap()
                .push(args.iter().map(|s| s.to_string()).collect());
            let key = args.join(" ");
            self.responses
                .lock()
                .unwrap()
                .get(&key)
                .cloned()
                .ok_or_else(|| VmError::BackendProtocolError(format!("no fixture for: {key}")))
        }
    }

    pub fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
            success: true,
            code: Some(0),
        }
    }

    pub fn failure(stderr: &str) -> CommandOutput {
        CommandOutput {
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
            success: false,
            code: Some(1),
        }
    }
}
