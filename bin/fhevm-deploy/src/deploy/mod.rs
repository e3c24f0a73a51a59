//! The full bootstrap run.

mod cmd;

pub use cmd::*;
