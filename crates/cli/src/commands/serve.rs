//! `dataclaw serve`: Start the HTTP API server.

use dataclaw_config::AppConfig;

pub async fn run(mut config: AppConfig, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port {
        config.gateway.port = port;
    }

    println!("🦀 DataClaw Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:  {} ({})", config.default_provider, config.default_model);

    dataclaw_gateway::start(config).await?;

    Ok(())
}
