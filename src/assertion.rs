//! Queries over recorded calls.
//!
//! All checks are read-only: running the same assertion twice yields the same
//! result. `None` stands for a command that was never registered.

use crate::error::AssertionError;
use crate::recorder::CallRecorder;

/// Succeeds when at least one recorded call equals `[command] + expected`.
pub fn assert_called_with<S: AsRef<str>>(
    recorder: Option<&CallRecorder>,
    command: &str,
    expected: &[S],
) -> Result<(), AssertionError> {
    let recorder = require_called(recorder, command)?;
    if recorder.count_matching(expected) > 0 {
        return Ok(());
    }
    Err(AssertionError::NoMatch {
        command: command.to_string(),
        expected: owned(expected),
        recorded: recorder.calls().to_vec(),
    })
}

/// Succeeds when exactly `times` recorded calls equal `[command] + expected`.
pub fn assert_call_count<S: AsRef<str>>(
    recorder: Option<&CallRecorder>,
    command: &str,
    expected: &[S],
    times: usize,
) -> Result<(), AssertionError> {
    let recorder = require_mocked(recorder, command)?;
    if times > 0 && recorder.is_empty() {
        return Err(AssertionError::NeverCalled {
            command: command.to_string(),
        });
    }
    let actual = recorder.count_matching(expected);
    if actual == times {
        return Ok(());
    }
    Err(AssertionError::CountMismatch {
        command: command.to_string(),
        expected: owned(expected),
        times,
        actual,
        recorded: recorder.calls().to_vec(),
    })
}

/// Succeeds when the command was registered and never invoked.
pub fn assert_not_called(
    recorder: Option<&CallRecorder>,
    command: &str,
) -> Result<(), AssertionError> {
    let recorder = require_mocked(recorder, command)?;
    if recorder.is_empty() {
        return Ok(());
    }
    Err(AssertionError::UnexpectedCall {
        command: command.to_string(),
        recorded: recorder.calls().to_vec(),
    })
}

fn require_mocked<'a>(
    recorder: Option<&'a CallRecorder>,
    command: &str,
) -> Result<&'a CallRecorder, AssertionError> {
    recorder.ok_or_else(|| AssertionError::NotMocked {
        command: command.to_string(),
    })
}

fn require_called<'a>(
    recorder: Option<&'a CallRecorder>,
    command: &str,
) -> Result<&'a CallRecorder, AssertionError> {
    let recorder = require_mocked(recorder, command)?;
    if recorder.is_empty() {
        return Err(AssertionError::NeverCalled {
            command: command.to_string(),
        });
    }
    Ok(recorder)
}

fn owned<S: AsRef<str>>(args: &[S]) -> Vec<String> {
    args.iter().map(|arg| arg.as_ref().to_string()).collect()
}
