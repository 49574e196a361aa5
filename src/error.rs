//! Error taxonomy for the harness.
//!
//! Setup and spawn failures abort a run before anything is recorded. Script
//! failures carry the combined output so callers can log it. Assertion errors
//! are kept in their own enum because they are returned from read-only
//! queries that never touch the filesystem.

use crate::recorder::ArgumentVector;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("setup failed: {context}: {source}")]
    Setup {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid command name for mocking: {0:?}")]
    InvalidCommandName(String),

    #[error("mock registry was already settled by a previous run")]
    AlreadySettled,

    #[error("failed to spawn interpreter {}: {source}", .interpreter.display())]
    Spawn {
        interpreter: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "script exited with {}\noutput:\n{}",
        describe_status(.status),
        String::from_utf8_lossy(.output)
    )]
    Script { status: ExitStatus, output: Vec<u8> },

    #[error("failed to remove {}: {source}", .path.display())]
    Teardown {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("listener for {command} failed: {source}")]
    Listener {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Assertion(#[from] AssertionError),
}

impl HarnessError {
    pub(crate) fn setup(context: impl Into<String>, source: io::Error) -> Self {
        HarnessError::Setup {
            context: context.into(),
            source,
        }
    }

    /// Combined output of a failed script, if this is a script failure.
    pub fn script_output(&self) -> Option<&[u8]> {
        match self {
            HarnessError::Script { output, .. } => Some(output),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssertionError {
    #[error("cmd {command} not mocked")]
    NotMocked { command: String },

    #[error("cmd {command} not called")]
    NeverCalled { command: String },

    #[error(
        "cmd {command} not called with {expected:?}\nrecorded calls:\n{}",
        render_calls(.recorded)
    )]
    NoMatch {
        command: String,
        expected: Vec<String>,
        recorded: Vec<ArgumentVector>,
    },

    #[error(
        "cmd {command} called {actual} time(s) with {expected:?}, expected {times}\nrecorded calls:\n{}",
        render_calls(.recorded)
    )]
    CountMismatch {
        command: String,
        expected: Vec<String>,
        times: usize,
        actual: usize,
        recorded: Vec<ArgumentVector>,
    },

    #[error("cmd {command} was called\nrecorded calls:\n{}", render_calls(.recorded))]
    UnexpectedCall {
        command: String,
        recorded: Vec<ArgumentVector>,
    },
}

impl AssertionError {
    pub fn command(&self) -> &str {
        match self {
            AssertionError::NotMocked { command }
            | AssertionError::NeverCalled { command }
            | AssertionError::NoMatch { command, .. }
            | AssertionError::CountMismatch { command, .. }
            | AssertionError::UnexpectedCall { command, .. } => command,
        }
    }
}

fn render_calls(calls: &[ArgumentVector]) -> String {
    if calls.is_empty() {
        return "  (none)".to_string();
    }
    calls
        .iter()
        .map(|call| format!("  {call}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_status(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("status {code}"),
        None => "termination by signal".to_string(),
    }
}
