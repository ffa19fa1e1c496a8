use chat_service::config::ChatConfig;
use chat_service::services::providers::gemini::{GeminiConfig, GeminiConnector};
use chat_service::services::providers::ModelConnector;
use chat_service::services::{start_tunnel_if_configured, NgrokTunnel};
use chat_service::startup::Application;
use service_core::observability::init_tracing;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ChatConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "chat-service",
        &config.logging.level,
        config.logging.otlp_endpoint.as_deref(),
    );

    let connector: Arc<dyn ModelConnector> = Arc::new(
        GeminiConnector::new(GeminiConfig {
            api_base: config.google.api_base.clone(),
        })
        .map_err(|e| anyhow::anyhow!("Failed to create Gemini connector: {}", e))?,
    );

    let app = Application::build(&config, connector)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start: {}", e))?;

    // Dropping the tunnel stops the agent, so keep it until shutdown.
    let _tunnel = start_tunnel_if_configured(
        &config.tunnel,
        &NgrokTunnel::new(&config.tunnel),
        app.port(),
    )
    .await;

    app.run_until_stopped().await?;

    Ok(())
}
