use anyhow::Context;
use tracing_subscriber::EnvFilter;

use flight_delay_predictor::{web, AppConfig, Assets};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();
    tracing::info!(
        model = %config.model_path.display(),
        columns = %config.columns_path.display(),
        "loading assets"
    );

    // No form is served without both assets.
    let assets = match Assets::load(&config) {
        Ok(assets) => assets,
        Err(e) => {
            tracing::error!(error = %e, "model or column manifest unavailable");
            return Err(e).context("cannot start without the model and its column manifest");
        }
    };
    tracing::info!(
        columns = assets.schema().len(),
        model = %assets.classifier().describe(),
        "loaded model"
    );

    let state = web::AppState::new(assets).context("failed to load page templates")?;
    let app = web::router(state);

    tracing::info!("listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
