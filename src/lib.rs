//! Shared library for the pipemock harness.
//!
//! The crate runs a shell procedure with selected external commands replaced
//! by recording stubs. Each stub writes its argument vector into a per-command
//! FIFO that a listener thread drains while the script runs; after the child
//! exits the recorded calls can be asserted against. Public types here form
//! the contract the `mock-run` binary and the integration tests depend on.
//!
//! ```ignore
//! let mut env = MockEnvironment::new(
//!     vec![SourceUnit::execute(env_file), SourceUnit::declare_only(helper)],
//!     ["chown"],
//! )?;
//! env.call("prepare-log-file", &[log_path])?;
//! env.assert_called_with("chown", &["root:root", log_path])?;
//! env.teardown()?;
//! ```

pub mod assertion;
pub mod channel;
pub mod compose;
pub mod config;
pub mod environment;
pub mod error;
pub mod executable;
pub mod recorder;
pub mod registry;
pub mod runner;
pub mod runtime;
pub mod telemetry;

pub use channel::InterceptChannel;
pub use compose::{ComposedInvocation, DECLARE_ONLY_FLAG, LoadMode, SourceUnit};
pub use config::HarnessConfig;
pub use environment::{MockEnvironment, run};
pub use error::{AssertionError, HarnessError, Result};
pub use executable::Executable;
pub use recorder::{ArgumentVector, CallRecorder};
pub use registry::MockRegistry;
pub use runner::{RunOutput, RunPhase, Runner};
