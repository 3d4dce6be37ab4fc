mod api;
mod app;
mod config;
mod models;
mod services;

use tracing_subscriber::EnvFilter;

use app::App;
use config::ClientConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env()?;
    tracing::debug!("Loaded config: {:?}", config);

    App::init(config).await?.run().await
}
