//! Test utilities: an in-memory ledger, an in-memory artifact store and fhEVM fixtures.

mod compiler;
mod fixtures;
mod ledger;
mod store;

pub use compiler::*;
pub use fixtures::*;
pub use ledger::*;
pub use store::*;
