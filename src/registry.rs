//! Registry of mocked commands for a single run.
//!
//! The registry owns the per-run pipe directory, one [`InterceptChannel`] and
//! one [`CallRecorder`] per command name. Recorders only fill up once the
//! registry is settled, which the runner does after the child exits.

use crate::assertion;
use crate::channel::InterceptChannel;
use crate::error::{AssertionError, HarnessError, Result};
use crate::executable::Executable;
use crate::recorder::{ArgumentVector, CallRecorder};
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;
use tracing::debug;

const PIPE_DIR_PREFIX: &str = "pipes";

#[derive(Debug)]
struct MockedCommand {
    channel: InterceptChannel,
    recorder: CallRecorder,
}

#[derive(Debug)]
pub struct MockRegistry {
    mocks: BTreeMap<String, MockedCommand>,
    dir: Option<TempDir>,
    settled: bool,
}

impl MockRegistry {
    /// Register `names` with pipes under the system temp directory.
    pub fn register<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::register_in(None, names)
    }

    /// Register `names` with pipes under `parent` when given.
    ///
    /// On any failure the partially built registry is dropped, which removes
    /// the pipe directory and releases every listener already started.
    pub fn register_in<I, S>(parent: Option<&Path>, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|name| validate_command_name(name.as_ref()).map(str::to_string))
            .collect::<Result<Vec<_>>>()?;

        let builder = {
            let mut builder = tempfile::Builder::new();
            builder.prefix(PIPE_DIR_PREFIX);
            builder
        };
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|err| HarnessError::setup("create pipe directory", err))?;

        let mut registry = Self {
            mocks: BTreeMap::new(),
            dir: None,
            settled: false,
        };
        for name in names {
            if registry.mocks.contains_key(&name) {
                continue;
            }
            let channel = InterceptChannel::open(&name, &dir.path().join(&name))?;
            debug!(command = %name, path = %channel.path().display(), "registered mock");
            registry.mocks.insert(
                name.clone(),
                MockedCommand {
                    channel,
                    recorder: CallRecorder::new(name),
                },
            );
        }
        registry.dir = Some(dir);
        Ok(registry)
    }

    pub fn pipe_dir(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    pub fn is_mocked(&self, name: &str) -> bool {
        self.mocks.contains_key(name)
    }

    pub fn mocked_names(&self) -> impl Iterator<Item = &str> {
        self.mocks.keys().map(String::as_str)
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// How `name` runs inside the composed environment.
    pub fn executable_for(&self, name: &str) -> Executable {
        match self.mocks.get(name) {
            Some(mock) => Executable::recording(mock.channel.path()),
            None => Executable::RealProcess,
        }
    }

    /// Shell text that installs a recording stub for every mocked name.
    ///
    /// Must come first in a composed invocation.
    pub fn interception_fragment(&self) -> String {
        self.mocked_names()
            .filter_map(|name| self.executable_for(name).shell_definition(name))
            .collect()
    }

    /// Close the harness write ends and collect every listener's records.
    ///
    /// Every channel is settled even if one listener fails; the first failure
    /// is returned.
    pub fn settle(&mut self) -> Result<()> {
        if self.settled {
            return Ok(());
        }
        self.settled = true;
        let mut first_err = None;
        for mock in self.mocks.values_mut() {
            match mock.channel.settle() {
                Ok(calls) => mock.recorder.extend(calls),
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn recorder(&self, name: &str) -> Option<&CallRecorder> {
        self.mocks.get(name).map(|mock| &mock.recorder)
    }

    pub fn calls(&self, name: &str) -> Option<&[ArgumentVector]> {
        self.recorder(name).map(CallRecorder::calls)
    }

    /// Every recorded call keyed by command name.
    pub fn call_log(&self) -> BTreeMap<String, Vec<ArgumentVector>> {
        self.mocks
            .iter()
            .map(|(name, mock)| (name.clone(), mock.recorder.calls().to_vec()))
            .collect()
    }

    pub fn assert_called_with<S: AsRef<str>>(
        &self,
        name: &str,
        expected: &[S],
    ) -> Result<(), AssertionError> {
        assertion::assert_called_with(self.recorder(name), name, expected)
    }

    pub fn assert_call_count<S: AsRef<str>>(
        &self,
        name: &str,
        expected: &[S],
        times: usize,
    ) -> Result<(), AssertionError> {
        assertion::assert_call_count(self.recorder(name), name, expected, times)
    }

    pub fn assert_not_called(&self, name: &str) -> Result<(), AssertionError> {
        assertion::assert_not_called(self.recorder(name), name)
    }

    /// Remove the pipe directory.
    ///
    /// Listeners are detached rather than joined, so this never waits on a
    /// pipe that no shim opened.
    pub fn teardown(mut self) -> Result<()> {
        for mock in self.mocks.values_mut() {
            mock.channel.detach();
        }
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        let path = dir.path().to_path_buf();
        debug!(path = %path.display(), "removing pipe directory");
        dir.close()
            .map_err(|source| HarnessError::Teardown { path, source })
    }
}

/// Accept names that are safe both as a bash function name and a file name.
pub fn validate_command_name(name: &str) -> Result<&str> {
    let valid = !name.is_empty()
        && !name.starts_with('-')
        && name != "."
        && name != ".."
        && name != "builtin"
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.' | '+'));
    if valid {
        Ok(name)
    } else {
        Err(HarnessError::InvalidCommandName(name.to_string()))
    }
}
