use std::process::ExitCode;

use clap::Parser;
use fhevm_deploy::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = cli.log.init() {
        eprintln!("Error: {err}");
        return ExitCode::from(err.exit_code());
    }
    match cli.cmd.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
