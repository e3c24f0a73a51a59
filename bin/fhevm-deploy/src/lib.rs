//! Command-line front end of `fhevm-predeploy`.
//!
//! Every subcommand prints its result as JSON on stdout and logs to stderr. Failures map to a
//! distinct exit status, see [`DeployError::exit_code`].

pub mod common;
pub use common::{DeployError, Result};

mod cmd;
pub use cmd::*;

pub mod deploy;
pub mod grant;
pub mod materialize;
pub mod predict;
