//! Runs one shell invocation with selected commands mocked.
//!
//! The binary composes the same environment the library builds for tests:
//! recording stubs first, then `--source`/`--declare` files in the order
//! given, then `COMMAND ARGS...`. It prints a JSON report with the combined
//! output and every recorded call so shell-level callers can inspect what a
//! procedure would have executed.

use anyhow::{Context, Result, bail};
use pipemock::runtime::split_list;
use pipemock::telemetry::init_tracing;
use pipemock::{HarnessConfig, HarnessError, MockEnvironment, SourceUnit};
use serde::Serialize;
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

fn main() {
    init_tracing("warn");
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let args = CliArgs::parse()?;
    let mut config = HarnessConfig::from_env();
    if let Some(shell) = args.shell {
        config = config.with_interpreter(shell);
    }
    if let Some(cwd) = args.cwd {
        config = config.with_working_dir(cwd);
    }
    for (key, value) in args.env {
        config = config.with_env(key, value);
    }

    let mut environment = MockEnvironment::with_config(&config, args.sources, &args.mocks)
        .context("failed to prepare mock environment")?;

    let (exit_code, output) = match environment.call(&args.command, &args.command_args) {
        Ok(out) => (out.exit_code(), out.output),
        Err(HarnessError::Script { status, output }) => (status.code(), output),
        Err(err) => return Err(err).context("failed to run command"),
    };

    let report = Report {
        command: std::iter::once(args.command.clone())
            .chain(args.command_args.iter().cloned())
            .collect(),
        exit_code,
        success: exit_code == Some(0),
        output: String::from_utf8_lossy(&output).into_owned(),
        calls: environment
            .call_log()
            .into_iter()
            .map(|(name, calls)| {
                let calls = calls
                    .into_iter()
                    .map(|call| call.as_slice().to_vec())
                    .collect();
                (name, calls)
            })
            .collect(),
    };
    environment.teardown().context("failed to remove pipe directory")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(exit_code.unwrap_or(1))
}

#[derive(Serialize)]
struct Report {
    command: Vec<String>,
    exit_code: Option<i32>,
    success: bool,
    output: String,
    calls: BTreeMap<String, Vec<Vec<String>>>,
}

struct CliArgs {
    mocks: Vec<String>,
    sources: Vec<SourceUnit>,
    shell: Option<PathBuf>,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
    command: String,
    command_args: Vec<String>,
}

impl CliArgs {
    fn parse() -> Result<Self> {
        let mut args_iter = env::args().skip(1);
        let mut mocks = Vec::new();
        let mut sources = Vec::new();
        let mut shell = None;
        let mut cwd = None;
        let mut env_pairs = Vec::new();
        let mut positionals = Vec::new();

        while let Some(arg) = args_iter.next() {
            if let Some((flag, value)) = arg.split_once('=') {
                if flag.starts_with("--") {
                    apply_flag(
                        flag,
                        value.to_string(),
                        &mut mocks,
                        &mut sources,
                        &mut shell,
                        &mut cwd,
                        &mut env_pairs,
                    )?;
                    continue;
                }
            }

            match arg.as_str() {
                "--mock" | "--source" | "--declare" | "--shell" | "--cwd" | "--env" => {
                    let value = args_iter.next().unwrap_or_else(|| {
                        eprintln!("Missing value for {arg}");
                        usage(1);
                    });
                    apply_flag(
                        &arg,
                        value,
                        &mut mocks,
                        &mut sources,
                        &mut shell,
                        &mut cwd,
                        &mut env_pairs,
                    )?;
                }
                "-h" | "--help" => usage(0),
                "--" => {
                    positionals.extend(args_iter);
                    break;
                }
                _ if arg.starts_with("--") => {
                    eprintln!("Unknown option: {arg}");
                    usage(1);
                }
                _ => {
                    positionals.push(arg);
                    positionals.extend(args_iter);
                    break;
                }
            }
        }

        let mut positionals = positionals.into_iter();
        let Some(command) = positionals.next() else {
            usage(1);
        };

        Ok(Self {
            mocks,
            sources,
            shell,
            cwd,
            env: env_pairs,
            command,
            command_args: positionals.collect(),
        })
    }
}

fn apply_flag(
    flag: &str,
    value: String,
    mocks: &mut Vec<String>,
    sources: &mut Vec<SourceUnit>,
    shell: &mut Option<PathBuf>,
    cwd: &mut Option<PathBuf>,
    env_pairs: &mut Vec<(String, String)>,
) -> Result<()> {
    match flag {
        "--mock" => mocks.extend(split_list(&value)),
        "--source" => sources.push(SourceUnit::execute(value)),
        "--declare" => sources.push(SourceUnit::declare_only(value)),
        "--shell" => *shell = Some(PathBuf::from(value)),
        "--cwd" => *cwd = Some(PathBuf::from(value)),
        "--env" => {
            let Some((key, val)) = value.split_once('=') else {
                bail!("--env expects KEY=VALUE, got {value:?}");
            };
            if key.is_empty() {
                bail!("--env expects a non-empty key, got {value:?}");
            }
            env_pairs.push((key.to_string(), val.to_string()));
        }
        other => bail!("Unknown option: {other}"),
    }
    Ok(())
}

fn usage(code: i32) -> ! {
    eprintln!(
        "Usage: mock-run [--mock NAME[,NAME...]]... [--source PATH]... [--declare PATH]...\n                [--shell PATH] [--cwd DIR] [--env KEY=VALUE]... [--] COMMAND [ARGS...]\n\nOptions:\n  --mock NAMES      Replace NAMES with recording stubs (comma or space separated).\n  --source PATH     Source PATH before the command, running its top level.\n  --declare PATH    Source PATH with --source-only so only definitions load.\n  --shell PATH      Interpreter to run (default: bash on PATH).\n  --cwd DIR         Working directory for the child.\n  --env KEY=VALUE   Extra environment variable for the child.\n\nEnvironment:\n  PIPEMOCK_SHELL    Default interpreter when --shell is not given.\n  PIPEMOCK_TMPDIR   Parent directory for the per-run pipe directory.\n  RUST_LOG          Log filter (default: warn).\n\nPrints a JSON report with the combined output and recorded calls, and exits\nwith the command's exit status."
    );
    std::process::exit(code);
}
