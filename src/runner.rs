//! Spawns the composed invocation and waits for it.
//!
//! Stdout and stderr of the child share one anonymous temp file so the
//! combined output keeps its real interleaving and a chatty script can never
//! fill a pipe the harness is not draining.

use crate::compose::{ComposedInvocation, SourceUnit};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::registry::MockRegistry;
use crate::runtime::resolve_interpreter;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Composing,
    Spawned,
    Completed,
}

#[derive(Debug)]
pub struct RunOutput {
    /// Interleaved stdout and stderr.
    pub output: Vec<u8>,
    pub status: ExitStatus,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

#[derive(Debug)]
pub struct Runner {
    interpreter: PathBuf,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    phase: RunPhase,
}

impl Runner {
    /// Resolve the configured interpreter up front.
    ///
    /// A missing interpreter is a spawn failure, reported before any pipe is
    /// opened by a run.
    pub fn new(config: &HarnessConfig) -> Result<Self> {
        let interpreter =
            resolve_interpreter(&config.interpreter).ok_or_else(|| HarnessError::Spawn {
                interpreter: config.interpreter.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "interpreter not found"),
            })?;
        Ok(Self {
            interpreter,
            working_dir: config.working_dir.clone(),
            env: config.env.clone(),
            phase: RunPhase::Idle,
        })
    }

    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Run `command args` inside an environment built from `registry` and
    /// `sources`, then settle the registry so its calls can be queried.
    ///
    /// A non-zero exit is returned as [`HarnessError::Script`] with the
    /// combined output; the registry is settled either way.
    pub fn run<S: AsRef<str>>(
        &mut self,
        registry: &mut MockRegistry,
        sources: &[SourceUnit],
        command: &str,
        args: &[S],
    ) -> Result<RunOutput> {
        if registry.is_settled() {
            return Err(HarnessError::AlreadySettled);
        }
        self.phase = RunPhase::Composing;
        let invocation = ComposedInvocation::compose(registry, sources, command, args);
        debug!(script = %invocation, "composed invocation");

        let (sink, stdout, stderr) = match output_sink() {
            Ok(files) => files,
            Err(err) => {
                self.phase = RunPhase::Idle;
                return Err(HarnessError::setup("allocate output file", err));
            }
        };

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg("-c")
            .arg(invocation.script())
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .envs(&self.env);
        if let Some(dir) = self.working_dir.as_ref() {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                self.phase = RunPhase::Idle;
                return Err(HarnessError::Spawn {
                    interpreter: self.interpreter.clone(),
                    source,
                });
            }
        };
        self.phase = RunPhase::Spawned;
        info!(command, pid = child.id(), "spawned");

        let status = self.finish_wait(child.wait())?;
        info!(command, exit_code = ?status.code(), "completed");

        let output = read_sink(sink)
            .map_err(|err| HarnessError::setup("read combined output", err))?;
        registry.settle()?;

        if !status.success() {
            warn!(
                command,
                exit_code = ?status.code(),
                output = %String::from_utf8_lossy(&output),
                "script failed"
            );
            return Err(HarnessError::Script { status, output });
        }
        Ok(RunOutput { output, status })
    }

    /// A failed wait leaves the child's status unknown; the runner drops back
    /// to `Idle` as it does when spawning fails.
    fn finish_wait(&mut self, waited: io::Result<ExitStatus>) -> Result<ExitStatus> {
        match waited {
            Ok(status) => {
                self.phase = RunPhase::Completed;
                Ok(status)
            }
            Err(source) => {
                self.phase = RunPhase::Idle;
                Err(HarnessError::Spawn {
                    interpreter: self.interpreter.clone(),
                    source,
                })
            }
        }
    }
}

fn output_sink() -> io::Result<(File, File, File)> {
    let sink = tempfile::tempfile()?;
    let stdout = sink.try_clone()?;
    let stderr = sink.try_clone()?;
    Ok((sink, stdout, stderr))
}

fn read_sink(mut sink: File) -> io::Result<Vec<u8>> {
    // The child advanced the shared offset.
    sink.seek(SeekFrom::Start(0))?;
    let mut output = Vec::new();
    sink.read_to_end(&mut output)?;
    Ok(output)
}
