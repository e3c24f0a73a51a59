//! Writes the predicted addresses of a plan without touching the chain.

mod cmd;

pub use cmd::*;
