use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    orderbot_server::run().await
}
