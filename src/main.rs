use anyhow::anyhow;
use fnpack::cli::CliHandler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    CliHandler::new()
        .run()
        .await
        .map_err(|e| anyhow!("❌ {}", e.format_detailed()))
}
