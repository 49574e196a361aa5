//! Per-name dispatch between the real program and a recording stub.
//!
//! The composer asks the registry for an [`Executable`] per command name and
//! only stubs contribute shell text. Stubs are plain shell functions, so a
//! mocked name is intercepted wherever bash resolves it, including inside
//! functions defined by sourced scripts and in exported child shells.

use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Executable {
    /// Left alone: the interpreter resolves the name as usual.
    RealProcess,
    /// Replaced by a shim writing each call into `channel`.
    RecordingStub { channel: PathBuf },
}

impl Executable {
    pub fn recording(channel: &Path) -> Self {
        Executable::RecordingStub {
            channel: channel.to_path_buf(),
        }
    }

    pub fn is_stub(&self) -> bool {
        matches!(self, Executable::RecordingStub { .. })
    }

    /// Shell definition installing this executable under `name`.
    ///
    /// The record is assembled in a variable and emitted with one `printf` so
    /// concurrent invocations never interleave inside a record. Every builtin
    /// the shim relies on goes through `builtin`, so mocking `local`, `printf`
    /// or `export` cannot redirect the shim into another stub.
    pub fn shell_definition(&self, name: &str) -> Option<String> {
        let Executable::RecordingStub { channel } = self else {
            return None;
        };
        let channel = shell_words::quote(&channel.to_string_lossy()).into_owned();
        let quoted_name = shell_words::quote(name).into_owned();
        Some(format!(
            "{name}() {{ builtin local __pipemock_call; \
             builtin printf -v __pipemock_call '%s\\037' {quoted_name} \"$@\"; \
             builtin printf '%s\\036' \"${{__pipemock_call%$'\\037'}}\" >> {channel}; }}\n\
             builtin export -f {name}\n"
        ))
    }
}
