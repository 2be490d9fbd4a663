use std::sync::Arc;

use airsense_core::BoundsTable;
use airsense_model::{ModelArtifact, Predictor};
use airsense_pipeline::{ChannelMap, HttpSensorClient, InMemoryStore, MeasurementStore, Pipeline};

use airsense_api::app::{self, AppServices};
use airsense_api::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    airsense_api::telemetry::init();

    let config = Config::from_env();

    let store = build_store(&config).await?;
    let artifact = ModelArtifact::load(&config.model_path)?;
    let predictor = Predictor::new(artifact);

    let client = Arc::new(HttpSensorClient::new(
        config.sensor.clone(),
        ChannelMap::default(),
    )?);
    let pipeline = Pipeline::new(
        client,
        BoundsTable::default(),
        predictor.clone(),
        store.clone(),
        config.pipeline.clone(),
    );
    let stats = pipeline.stats_handle();
    // Keep the handle alive for the process lifetime; shutdown is process exit.
    let _pipeline = pipeline.spawn();

    let services = Arc::new(AppServices {
        store,
        predictor,
        stats,
    });
    let app = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "postgres")]
async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn MeasurementStore>> {
    if let Some(url) = &config.database_url {
        let pool = sqlx::PgPool::connect(url).await?;
        tracing::info!("using postgres store");
        return Ok(Arc::new(airsense_pipeline::store::PostgresStore::new(pool)));
    }
    tracing::warn!("DATABASE_URL not set; falling back to in-memory store");
    Ok(Arc::new(InMemoryStore::new()))
}

#[cfg(not(feature = "postgres"))]
async fn build_store(_config: &Config) -> anyhow::Result<Arc<dyn MeasurementStore>> {
    Ok(Arc::new(InMemoryStore::new()))
}
