//! Harness configuration.
//!
//! Defaults run `bash` from PATH with pipes under the system temp directory.
//! `PIPEMOCK_SHELL` and `PIPEMOCK_TMPDIR` override those two when loading
//! from the environment; empty values are ignored.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

pub const SHELL_ENV: &str = "PIPEMOCK_SHELL";
pub const TMPDIR_ENV: &str = "PIPEMOCK_TMPDIR";
pub const DEFAULT_INTERPRETER: &str = "bash";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HarnessConfig {
    pub interpreter: PathBuf,
    /// Parent for the per-run pipe directory.
    pub pipe_root: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
    /// Extra variables exported to the child on top of the inherited ones.
    pub env: BTreeMap<String, String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from(DEFAULT_INTERPRETER),
            pipe_root: None,
            working_dir: None,
            env: BTreeMap::new(),
        }
    }
}

impl HarnessConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(shell) = non_empty_var(SHELL_ENV) {
            config.interpreter = PathBuf::from(shell);
        }
        if let Some(root) = non_empty_var(TMPDIR_ENV) {
            config.pipe_root = Some(PathBuf::from(root));
        }
        config
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    pub fn with_pipe_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.pipe_root = Some(root.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn pipe_root(&self) -> Option<&Path> {
        self.pipe_root.as_deref()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
