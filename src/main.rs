/// API сервер прогноза погоды

use std::sync::Arc;

use anyhow::Context;

use weather_forecast::{
    api::{router, AppState},
    ForecastConfig, ForecastPipeline,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Инициализация логирования
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ForecastConfig::from_env().context("failed to load configuration")?;
    let addr = config.listen_addr;
    let pipeline = ForecastPipeline::new(config).context("invalid configuration")?;

    let app = router(AppState {
        pipeline: Arc::new(pipeline),
    });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
