use std::io::Write;

use serde::Serialize;

use super::{DeployError, Result};

/// Writes `value` to stdout as pretty JSON followed by a newline.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout).map_err(|source| DeployError::Output { path: "<stdout>".into(), source })
}
