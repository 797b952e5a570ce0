use anyhow::Context;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    chatsync_lib::run(config_path)
        .await
        .context("chatsync driver failed")?;
    Ok(())
}
