//! Run directory artifacts and log sinks for CLI commands.

mod logging;
mod run;

pub use logging::{init_run_logging, init_stderr_logging};
pub use run::{RunContext, start_run};
