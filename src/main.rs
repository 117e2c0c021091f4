#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pluginkeeper_lib::commands::run().await
}
