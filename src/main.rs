use chat_gateway::{config, server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::Settings::load()?;

    // Use configured host/port to bind the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = server::create_app(config)?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Chat gateway running on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
