use prd_service::{LogFormat, ServiceConfig, create_app};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing, JSON unless LOG_FORMAT=pretty
fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "prd_service=debug,prd_core=info,tower_http=debug".into());

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env()?;
    init_tracing(config.log_format);

    // Without a key the service still parses and validates, but PDF OCR and
    // dimension analysis report failures.
    if config.openrouter_api_key.is_none() {
        warn!("OPENROUTER_API_KEY not set; AI analysis and PDF OCR are unavailable");
    }

    let port = config.port;
    let app = create_app(config).await;
    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    let addr = listener.local_addr()?;

    info!("PRD Analysis Service starting on {}", addr);
    info!("API Documentation available at http://{}/", addr);
    info!("Analysis endpoint: POST http://{}/prd/analyze", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
