//! One-run mock environment: registry, source units and runner together.

use crate::compose::SourceUnit;
use crate::config::HarnessConfig;
use crate::error::{AssertionError, Result};
use crate::recorder::ArgumentVector;
use crate::registry::MockRegistry;
use crate::runner::{RunOutput, Runner};
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct MockEnvironment {
    registry: MockRegistry,
    sources: Vec<SourceUnit>,
    runner: Runner,
}

impl MockEnvironment {
    /// Build an environment configured from `PIPEMOCK_*` variables.
    pub fn new<I, S>(sources: Vec<SourceUnit>, mocks: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_config(&HarnessConfig::from_env(), sources, mocks)
    }

    /// The interpreter is resolved before any pipe is created, so a missing
    /// shell never leaves listeners behind.
    pub fn with_config<I, S>(
        config: &HarnessConfig,
        sources: Vec<SourceUnit>,
        mocks: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let runner = Runner::new(config)?;
        let registry = MockRegistry::register_in(config.pipe_root(), mocks)?;
        Ok(Self {
            registry,
            sources,
            runner,
        })
    }

    /// Invoke `command args` with every source unit loaded and mocks active.
    pub fn call<S: AsRef<str>>(&mut self, command: &str, args: &[S]) -> Result<RunOutput> {
        self.runner
            .run(&mut self.registry, &self.sources, command, args)
    }

    pub fn registry(&self) -> &MockRegistry {
        &self.registry
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    pub fn sources(&self) -> &[SourceUnit] {
        &self.sources
    }

    pub fn calls(&self, name: &str) -> Option<&[ArgumentVector]> {
        self.registry.calls(name)
    }

    pub fn call_log(&self) -> BTreeMap<String, Vec<ArgumentVector>> {
        self.registry.call_log()
    }

    pub fn assert_called_with<S: AsRef<str>>(
        &self,
        name: &str,
        expected: &[S],
    ) -> Result<(), AssertionError> {
        self.registry.assert_called_with(name, expected)
    }

    pub fn assert_call_count<S: AsRef<str>>(
        &self,
        name: &str,
        expected: &[S],
        times: usize,
    ) -> Result<(), AssertionError> {
        self.registry.assert_call_count(name, expected, times)
    }

    pub fn assert_not_called(&self, name: &str) -> Result<(), AssertionError> {
        self.registry.assert_not_called(name)
    }

    pub fn teardown(self) -> Result<()> {
        self.registry.teardown()
    }

    pub fn into_registry(self) -> MockRegistry {
        self.registry
    }
}

/// Run one invocation with `mocks` intercepted.
///
/// The outer error covers building the environment. Errors from the run itself
/// come back in the inner result next to the registry, so calls recorded by a
/// failing script can still be asserted on.
pub fn run<S, I, N>(
    command: &str,
    args: &[S],
    sources: Vec<SourceUnit>,
    mocks: I,
) -> Result<(Result<RunOutput>, MockRegistry)>
where
    S: AsRef<str>,
    I: IntoIterator<Item = N>,
    N: AsRef<str>,
{
    let mut env = MockEnvironment::new(sources, mocks)?;
    let outcome = env.call(command, args);
    Ok((outcome, env.into_registry()))
}
