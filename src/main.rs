use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    droidpilot_cli::cli::run().await
}
