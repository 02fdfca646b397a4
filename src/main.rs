// dualpack
// Entry point with clean separation of concerns

use anyhow::Context;
use dualpack::cli::CliHandler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    CliHandler::new()
        .run()
        .await
        .context("dualpack did not finish cleanly")
}
