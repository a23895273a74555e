use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use consult_core::{
    CoreConfig, LexicalRetriever, presence_fallback_from_env_value,
    retrieval_top_k_from_env_value, review_policy_from_env_value,
};

/// Main entry point for the consultation service
///
/// Resolves configuration once from the environment (and `.env`), then serves the REST API
/// with OpenAPI/Swagger documentation at `/swagger-ui`.
///
/// # Environment Variables
/// - `CONSULT_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CONSULT_DATA_DIR`: directory holding the EMR and pharmacy stores (default: "consult_data")
/// - `CONSULT_RETRIEVAL_TOP_K`: guideline hits per planning run (default: 3)
/// - `CONSULT_PRESENCE_FALLBACK`: `fail-closed` (default) or `fail-open`
/// - `CONSULT_REVIEW_POLICY`: `amend` (default) or `reject-repeat`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - a configuration value is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("consult=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("CONSULT_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let data_dir = std::env::var("CONSULT_DATA_DIR")
        .unwrap_or_else(|_| consult_core::constants::DEFAULT_DATA_DIR.into());
    let cfg = Arc::new(CoreConfig::new(
        PathBuf::from(data_dir),
        retrieval_top_k_from_env_value(std::env::var("CONSULT_RETRIEVAL_TOP_K").ok())?,
        presence_fallback_from_env_value(std::env::var("CONSULT_PRESENCE_FALLBACK").ok())?,
        review_policy_from_env_value(std::env::var("CONSULT_REVIEW_POLICY").ok())?,
    )?);

    tracing::info!(
        data_dir = %cfg.data_dir().display(),
        top_k = cfg.retrieval_top_k(),
        presence_fallback = ?cfg.presence_fallback(),
        review_policy = ?cfg.review_policy(),
        "configuration resolved"
    );

    let retriever = Arc::new(LexicalRetriever::builtin());
    let app = api_rest::router(AppState::new(cfg, retriever));

    tracing::info!("-- Starting consultation REST API on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
