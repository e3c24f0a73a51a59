use clap::Parser;
use fhevm_predeploy::predict_str;

use crate::common::{print_json, Result};

/// Predict the address of a plain deployment
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Deployer address
    #[arg(long = "deployer")]
    pub deployer: String,

    /// Deployer transaction count at deployment time, decimal or 0x-hex
    #[arg(long = "nonce")]
    pub nonce: String,

    /// Print deployer, nonce and address as JSON
    #[arg(long = "json")]
    pub json: bool,
}

impl Cmd {
    /// Execute the predict command
    pub fn run(&self) -> Result<()> {
        let predicted = predict_str(&self.deployer, &self.nonce)?;
        if self.json {
            print_json(&predicted)
        } else {
            println!("{}", predicted.address);
            Ok(())
        }
    }
}
