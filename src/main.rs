use anyhow::Context;

use remit_onboard::config::AppConfig;
use remit_onboard::server;
use remit_onboard::session::SessionManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    eprintln!("💸 Remit Onboard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Gateway: {}", config.gateway.base_url);

    let sessions =
        SessionManager::from_config(&config).context("Failed to initialize sessions")?;

    let addr = config.server.bind_addr();
    eprintln!("   REST: http://{addr}/api/sessions");
    eprintln!("   WS:   ws://{addr}/ws/sessions/{{id}}\n");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "Onboarding server started");
    axum::serve(listener, server::routes(sessions)).await?;

    Ok(())
}
