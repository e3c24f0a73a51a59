//! Arguments, errors, logging and output shared by the subcommands.

mod args;
mod error;
mod logging;
mod output;

pub use args::*;
pub use error::*;
pub use logging::*;
pub use output::*;
