//! Address prediction for a single deployer and nonce.

mod cmd;

pub use cmd::*;
