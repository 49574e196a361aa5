//! Composition of the single command line executed per run.
//!
//! Order is fixed: interception stubs, then source units in declaration
//! order, then the target call. Stubs must be defined before anything else is
//! read so sourced functions resolve mocked names to them.

use crate::registry::MockRegistry;
use std::fmt;
use std::path::{Path, PathBuf};

/// Argument a sourced script checks to skip its main entry point.
pub const DECLARE_ONLY_FLAG: &str = "--source-only";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Source the file and run its top level.
    #[default]
    Execute,
    /// Source only definitions; the script must honor [`DECLARE_ONLY_FLAG`].
    DeclareOnly,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub mode: LoadMode,
}

impl SourceUnit {
    pub fn execute(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: LoadMode::Execute,
        }
    }

    pub fn declare_only(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: LoadMode::DeclareOnly,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_statement(&self) -> String {
        let path = shell_words::quote(&self.path.to_string_lossy()).into_owned();
        match self.mode {
            LoadMode::Execute => format!("builtin source {path}"),
            LoadMode::DeclareOnly => format!("builtin source {path} {DECLARE_ONLY_FLAG}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposedInvocation {
    setup: String,
    loads: Vec<String>,
    target: String,
}

impl ComposedInvocation {
    pub fn compose<S: AsRef<str>>(
        registry: &MockRegistry,
        sources: &[SourceUnit],
        command: &str,
        args: &[S],
    ) -> Self {
        let mut target = Vec::with_capacity(args.len() + 1);
        target.push(command);
        target.extend(args.iter().map(|arg| arg.as_ref()));
        Self {
            setup: registry.interception_fragment(),
            loads: sources.iter().map(SourceUnit::load_statement).collect(),
            target: shell_words::join(target),
        }
    }

    pub fn setup(&self) -> &str {
        &self.setup
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// The full text handed to `<interpreter> -c`.
    pub fn script(&self) -> String {
        let mut out = self.setup.clone();
        for load in &self.loads {
            out.push_str(load);
            out.push('\n');
        }
        out.push_str(&self.target);
        out.push('\n');
        out
    }
}

impl fmt::Display for ComposedInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.script())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_follow_the_fixed_order() {
        let registry = MockRegistry::register(["chown"]).expect("registry");
        let sources = vec![
            SourceUnit::execute("/tmp/home/kube-env"),
            SourceUnit::declare_only("/tmp/helper.sh"),
        ];
        let invocation = ComposedInvocation::compose(
            &registry,
            &sources,
            "prepare-log-file",
            &["/tmp/x/plf_test.log"],
        );
        let script = invocation.script();
        let setup_at = script.find("chown() {").expect("setup");
        let env_at = script.find("builtin source /tmp/home/kube-env\n").expect("env");
        let helper_at = script
            .find("builtin source /tmp/helper.sh --source-only\n")
            .expect("helper");
        let target_at = script
            .find("prepare-log-file /tmp/x/plf_test.log\n")
            .expect("target");
        assert!(setup_at < env_at && env_at < helper_at && helper_at < target_at);
        assert!(script.ends_with("prepare-log-file /tmp/x/plf_test.log\n"));
        registry.teardown().expect("teardown");
    }

    #[test]
    fn arguments_and_paths_are_quoted() {
        let registry = MockRegistry::register(Vec::<String>::new()).expect("registry");
        let sources = vec![SourceUnit::execute("/tmp/my env")];
        let invocation =
            ComposedInvocation::compose(&registry, &sources, "run", &["a b", "", "$HOME"]);
        let script = invocation.script();
        assert!(script.starts_with("builtin source '/tmp/my env'\n"));
        assert_eq!(invocation.target(), "run 'a b' '' '$HOME'");
        assert!(invocation.setup().is_empty());
        registry.teardown().expect("teardown");
    }

    #[test]
    fn default_load_mode_executes() {
        assert_eq!(LoadMode::default(), LoadMode::Execute);
    }
}
