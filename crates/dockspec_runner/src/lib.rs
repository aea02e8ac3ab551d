//! # dockspec_runner
//!
//! Run infrastructure verification commands inside Docker Compose containers.
//!
//! A [`CommandRunner`] brings up the stack described by a compose file, runs
//! shell commands in one of its services, and tears the stack down again.
//!
//! # Features
//!
//! - **Two backends**: Docker exec API (bollard), or `lxc-attach` for hosts
//!   on the LXC exec driver
//! - **Error classification**: Docker API and attach-helper failures are
//!   returned as errors; everything else becomes a failed [`CommandResult`]
//! - **Grace period**: wait for services to settle after `up`, minus the time
//!   `up` already took
//! - **Scoped teardown**: [`RunnerBuilder::scoped`] finalizes the stack on
//!   every exit path
//! - **Mock collaborators**: for testing without Docker
//!
//! # Example
//!
//! ```rust,no_run
//! use dockspec_runner::{CommandRunner, ComposeConfig, ExecOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ComposeConfig::new("tests/data/docker-compose.yml")
//!         .container("wordpress")
//!         .wait(15.0);
//!
//!     let mut runner = CommandRunner::start(config).await?;
//!     let result = runner.run_command("apache2 -v", &ExecOptions::default()).await?;
//!     println!("Exit code: {}", result.exit_status);
//!
//!     runner.finalize().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod descriptor;
pub mod docker;
pub mod engine;
pub mod error;
pub mod executor;
pub mod metadata;
pub mod mock;
pub mod process;
pub mod runner;
pub mod session;

pub use config::{Backend, ComposeConfig, ExecOptions};
pub use descriptor::ComposeFile;
pub use docker::{ContainerRuntime, DockerRuntime, ExecOutput};
pub use engine::{ComposeCli, ComposeEngine, ComposeFlavor, ComposeProject};
pub use error::{RunnerError, RunnerResult};
pub use executor::{CommandExecutor, CommandHooks, LxcAttachExec, NativeExec};
pub use metadata::{ExampleMetadata, MemoryMetadata, MetadataRecord};
pub use mock::{CapturedCall, MockComposeEngine, MockProcess, MockResponse, MockRuntime};
pub use process::{ProcessExecutor, ProcessOutput, SystemProcess};
pub use runner::{CommandResult, CommandRunner, RunnerBuilder};
pub use session::{ComposeSession, ContainerHandle};
