use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use finsight_core::domain::AnalysisResult;
use finsight_core::storage::analyses::{self, StoredAnalysis};
use finsight_core::{AnalysisErrorKind, Analyzer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = finsight_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match finsight_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "DATABASE_URL missing; analyses will not be persisted");
            None
        }
    };

    let analyzer = Analyzer::from_settings(&settings, false)?;
    let state = AppState {
        analyzer: Arc::new(analyzer),
        pool,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/analyze", post(analyze))
        .route("/analyses/:ticker/latest", get(get_latest_analysis))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    analyzer: Arc<Analyzer>,
    pool: Option<PgPool>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    ticker: String,
}

#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis_id: Option<Uuid>,
    #[serde(flatten)]
    result: AnalysisResult,
}

async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> (StatusCode, Json<AnalyzeResponse>) {
    let result = state.analyzer.analyze(&req.ticker).await;

    // Rejected input is not worth a row.
    let analysis_id = match (&state.pool, result.error_kind) {
        (Some(pool), kind) if kind != Some(AnalysisErrorKind::InvalidInput) => {
            match analyses::persist_analysis(pool, &result).await {
                Ok(id) => Some(id),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(ticker = %result.ticker, error = %e, "persist analysis failed");
                    None
                }
            }
        }
        _ => None,
    };

    (
        status_for(&result),
        Json(AnalyzeResponse {
            analysis_id,
            result,
        }),
    )
}

async fn get_latest_analysis(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<StoredAnalysis>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let ticker =
        finsight_core::pipeline::validate_ticker(&ticker).map_err(|_| StatusCode::BAD_REQUEST)?;

    let stored = analyses::latest_for_ticker(pool, &ticker)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(stored))
}

fn status_for(result: &AnalysisResult) -> StatusCode {
    match result.error_kind {
        None => StatusCode::OK,
        Some(AnalysisErrorKind::InvalidInput) => StatusCode::BAD_REQUEST,
        Some(AnalysisErrorKind::DataUnavailable) => StatusCode::NOT_FOUND,
        Some(AnalysisErrorKind::InsufficientHistory) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &finsight_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
