use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use tumorboard_core::{CoreConfig, PatientCatalog};

const ENV_REST_ADDR: &str = "TUMORBOARD_REST_ADDR";
const DEFAULT_REST_ADDR: &str = "0.0.0.0:5001";

/// Main entry point for the tumour board server
///
/// Resolves configuration once, builds the patient catalogue and the evaluation service, then
/// serves the REST API.
///
/// # Environment Variables
/// - `TUMORBOARD_REST_ADDR`: REST server address (default: "0.0.0.0:5001")
/// - `PATIENT_DATA_ROOT`: batch output directory (default: "patient_data")
/// - `PATIENT_IDS`: comma-separated patient allow-list
/// - `WORKFLOW_MONGODB_URI`, `BASELINE_MONGODB_URI`, `EVALUATION_MONGODB_URI`: optional stores
/// - `PATIENT_CACHE_TTL_SECS`: snapshot lifetime (default: 300)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, store setup or serving fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tumorboard_run=info".parse()?)
                .add_directive("tumorboard_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Arc::new(CoreConfig::from_lookup(|key| std::env::var(key).ok())?);
    let rest_addr = std::env::var(ENV_REST_ADDR).unwrap_or_else(|_| DEFAULT_REST_ADDR.into());

    let catalog = PatientCatalog::from_config(&cfg).await?;
    let evaluations = tumorboard_core::evaluation_service(&cfg).await?;

    tracing::info!(
        "++ Serving patients from {} (cache TTL {}s)",
        cfg.patient_data_root().display(),
        cfg.cache_ttl().as_secs()
    );
    tracing::info!("++ Starting tumorboard REST on {}", rest_addr);

    let app = api_rest::router(AppState {
        cfg,
        catalog,
        evaluations,
    });

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
