//! dockgroup - command-line front end for the docked window group engine

use dockgroup::{cli::run_cli, Result};

#[tokio::main]
async fn main() -> Result<()> {
    run_cli().await
}
