#[tokio::main]
async fn main() -> anyhow::Result<()> {
    safetyconnect_server::run().await
}
