use clap::Parser;
use eyre::Result;

use cryostat::CliOpts;

fn main() -> Result<()> {
    let opts = CliOpts::parse();

    cryostat::init()?;
    cryostat::banner();

    cryostat::cli(opts)
}
