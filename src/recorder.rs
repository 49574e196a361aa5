//! Call recording and the wire format shared with the shell shim.
//!
//! A shim emits one record per invocation: the command name and each
//! positional argument joined by [`FIELD_DELIMITER`], closed by
//! [`RECORD_TERMINATOR`]. Control characters are used instead of spaces and
//! newlines so arguments containing either survive the trip.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separates the fields of one record (ASCII unit separator).
pub const FIELD_DELIMITER: u8 = 0x1f;
/// Closes one record (ASCII record separator).
pub const RECORD_TERMINATOR: u8 = 0x1e;

/// One observed invocation: the command name followed by its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgumentVector(Vec<String>);

impl ArgumentVector {
    pub fn new(argv: Vec<String>) -> Self {
        Self(argv)
    }

    /// Builds the vector a call to `command` with `args` would produce.
    pub fn from_call<S: AsRef<str>>(command: &str, args: &[S]) -> Self {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(command.to_string());
        argv.extend(args.iter().map(|arg| arg.as_ref().to_string()));
        Self(argv)
    }

    pub fn command(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Positional arguments, without the command name.
    pub fn args(&self) -> &[String] {
        self.0.get(1..).unwrap_or(&[])
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Exact element-wise match against `[command] + args`.
    ///
    /// Lengths must agree; a prefix never matches.
    pub fn matches<S: AsRef<str>>(&self, command: &str, args: &[S]) -> bool {
        if self.0.len() != args.len() + 1 {
            return false;
        }
        self.0[0] == command
            && self.0[1..]
                .iter()
                .zip(args)
                .all(|(seen, want)| seen == want.as_ref())
    }
}

impl fmt::Display for ArgumentVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_words::join(&self.0))
    }
}

/// Ordered log of the calls observed for one mocked command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallRecorder {
    command: String,
    calls: Vec<ArgumentVector>,
}

impl CallRecorder {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            calls: Vec::new(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Appends a call. Identical vectors are kept as separate entries.
    pub fn record(&mut self, call: ArgumentVector) {
        self.calls.push(call);
    }

    pub fn extend(&mut self, calls: impl IntoIterator<Item = ArgumentVector>) {
        self.calls.extend(calls);
    }

    pub fn calls(&self) -> &[ArgumentVector] {
        &self.calls
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Number of recorded calls exactly matching `[command] + args`.
    pub fn count_matching<S: AsRef<str>>(&self, args: &[S]) -> usize {
        self.calls
            .iter()
            .filter(|call| call.matches(&self.command, args))
            .count()
    }
}

/// Decodes everything a listener drained from its channel.
///
/// Blank records are skipped; each token has trailing line terminators
/// trimmed, which keeps shims that end records with a newline compatible.
pub fn decode_records(bytes: &[u8]) -> Vec<ArgumentVector> {
    bytes
        .split(|byte| *byte == RECORD_TERMINATOR)
        .filter(|record| !record.iter().all(|b| matches!(b, b'\n' | b'\r')))
        .map(decode_record)
        .collect()
}

fn decode_record(record: &[u8]) -> ArgumentVector {
    let record = trim_leading_newlines(record);
    ArgumentVector(
        record
            .split(|byte| *byte == FIELD_DELIMITER)
            .map(|token| {
                String::from_utf8_lossy(token)
                    .trim_end_matches(['\n', '\r'])
                    .to_string()
            })
            .collect(),
    )
}

fn trim_leading_newlines(record: &[u8]) -> &[u8] {
    let start = record
        .iter()
        .position(|b| !matches!(b, b'\n' | b'\r'))
        .unwrap_or(record.len());
    &record[start..]
}

/// Encodes one invocation the way the shell shim writes it.
pub fn encode_record<S: AsRef<str>>(argv: &[S]) -> Vec<u8> {
    let mut out = Vec::new();
    for (idx, arg) in argv.iter().enumerate() {
        if idx > 0 {
            out.push(FIELD_DELIMITER);
        }
        out.extend_from_slice(arg.as_ref().as_bytes());
    }
    out.push(RECORD_TERMINATOR);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_multiple_records_in_order() {
        let mut bytes = encode_record(&["chown", "root:root", "/tmp/x/plf_test.log"]);
        bytes.extend(encode_record(&["chown", "a:b", "/tmp/y"]));
        let calls = decode_records(&bytes);
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].as_slice(),
            &["chown", "root:root", "/tmp/x/plf_test.log"]
        );
        assert_eq!(calls[1].args(), &["a:b", "/tmp/y"]);
    }

    #[test]
    fn empty_arguments_survive_decoding() {
        let calls = decode_records(&encode_record(&["touch", "", "b"]));
        assert_eq!(calls[0].as_slice(), &["touch", "", "b"]);
    }

    #[test]
    fn trailing_newlines_are_trimmed_from_tokens() {
        let calls = decode_records(b"chown\x1froot:root\x1f/tmp/f\n\x1e\n");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].as_slice(), &["chown", "root:root", "/tmp/f"]);
    }

    #[test]
    fn blank_input_yields_no_calls() {
        assert!(decode_records(b"").is_empty());
        assert!(decode_records(b"\n").is_empty());
    }

    #[test]
    fn matching_requires_full_vector() {
        let call = ArgumentVector::from_call("chown", &["root:root", "/tmp/f"]);
        assert!(call.matches("chown", &["root:root", "/tmp/f"]));
        assert!(!call.matches("chown", &["root:root"]));
        assert!(!call.matches("chown", &["root:root", "/tmp/f", "extra"]));
        assert!(!call.matches("chmod", &["root:root", "/tmp/f"]));
        assert!(!call.matches("chown", &["root:wheel", "/tmp/f"]));
    }

    #[test]
    fn recorder_keeps_repeated_calls() {
        let mut recorder = CallRecorder::new("chown");
        recorder.record(ArgumentVector::from_call("chown", &["a", "f"]));
        recorder.record(ArgumentVector::from_call("chown", &["a", "f"]));
        assert_eq!(recorder.calls().len(), 2);
        assert_eq!(recorder.count_matching(&["a", "f"]), 2);
        assert_eq!(recorder.count_matching(&["a"]), 0);
    }

    #[test]
    fn display_quotes_arguments() {
        let call = ArgumentVector::from_call("echo", &["hello world"]);
        assert_eq!(call.to_string(), "echo 'hello world'");
    }
}
