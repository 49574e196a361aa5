#![allow(dead_code)]

use anyhow::{Context, Result, bail};
use pipemock::telemetry::init_tracing;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const ENV_FILE_NAME: &str = "kube-env";
pub const LOG_FILE_NAME: &str = "plf_test.log";

pub fn init_logging() {
    init_tracing("warn");
}

/// Path to the bash procedure the suites exercise.
pub fn helper_script() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("configure-helper.sh")
}

pub fn mock_run_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mock-run"))
}

/// Per-case scratch home holding the rendered env file.
pub struct CaseHome {
    dir: TempDir,
}

impl CaseHome {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("configure-helper-test")
            .tempdir()
            .context("failed to create temp directory")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn env_file(&self) -> PathBuf {
        self.path().join(ENV_FILE_NAME)
    }

    pub fn log_file(&self) -> PathBuf {
        self.path().join(LOG_FILE_NAME)
    }

    pub fn log_file_str(&self) -> String {
        self.log_file().to_string_lossy().into_owned()
    }

    /// Render the env file: `KUBE_HOME` plus any extra assignments.
    pub fn write_env(&self, assignments: &[(&str, &str)]) -> Result<PathBuf> {
        let mut contents = format!(
            "readonly KUBE_HOME={}\n",
            shell_words::quote(&self.path().to_string_lossy())
        );
        for (key, value) in assignments {
            contents.push_str(&format!("{key}={}\n", shell_words::quote(value)));
        }
        let path = self.env_file();
        fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

pub fn run_command(mut cmd: Command) -> Result<Output> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to run command: {:?}", cmd))?;
    if output.status.success() {
        Ok(output)
    } else {
        bail!(
            "command {:?} failed: status {:?}\nstdout: {}\nstderr: {}",
            cmd,
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    }
}
