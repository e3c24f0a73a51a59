//! Stand-alone relayer authorization.

mod cmd;

pub use cmd::*;
