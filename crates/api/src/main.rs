use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use valuescan_core::domain::filter::{self, FilterParams};
use valuescan_core::domain::stock::{StockRow, TickerSymbol};
use valuescan_core::ingest::types::CompanyProfile;
use valuescan_core::scan::{ScanOutcome, ScanWorkflow};
use valuescan_core::time::month::ScanClock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = valuescan_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let workflow = ScanWorkflow::from_settings(&settings)?;
    let app = router(AppState::new(workflow));

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

#[derive(Clone)]
struct AppState {
    workflow: Arc<ScanWorkflow>,
    /// Held for the whole session so concurrent scan requests queue.
    scan_lock: Arc<Mutex<()>>,
}

impl AppState {
    fn new(workflow: ScanWorkflow) -> Self {
        Self {
            workflow: Arc::new(workflow),
            scan_lock: Arc::new(Mutex::new(())),
        }
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/results", get(get_results))
        .route("/results.csv", get(get_results_csv))
        .route("/scan", post(post_scan))
        .route("/stocks/:symbol", get(get_stock))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct ApiResults {
    month: String,
    total: usize,
    filter: FilterParams,
    rows: Vec<StockRow>,
}

type ApiError = (StatusCode, String);

fn filtered_rows(
    state: &AppState,
    clock: &ScanClock,
    params: &FilterParams,
) -> Result<(usize, Vec<StockRow>), ApiError> {
    params
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let cached = state.workflow.load_cached(clock).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!("no scan for {} yet", clock.current_month()),
        )
    })?;
    Ok((cached.len(), filter::apply(&cached.rows, params)))
}

async fn get_results(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<ApiResults>, ApiError> {
    let clock = ScanClock::local_now();
    let (total, rows) = filtered_rows(&state, &clock, &params)?;
    Ok(Json(ApiResults {
        month: clock.current_month(),
        total,
        filter: params,
        rows,
    }))
}

async fn get_results_csv(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<impl IntoResponse, ApiError> {
    let clock = ScanClock::local_now();
    let (_, rows) = filtered_rows(&state, &clock, &params)?;
    let body = valuescan_core::export::to_csv_bytes(&rows).map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
    })?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        valuescan_core::export::export_file_name(&clock.current_month())
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

async fn post_scan(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let _guard = state.scan_lock.lock().await;
    let clock = ScanClock::local_now();

    let outcome = state
        .workflow
        .session(&clock, true, None)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
        })?;

    let status = match &outcome {
        ScanOutcome::SourceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}

#[derive(Debug, Serialize)]
struct ApiStock {
    profile: CompanyProfile,
    /// This month's cached row, when the symbol made the top-N.
    row: Option<StockRow>,
}

async fn get_stock(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiStock>, StatusCode> {
    let symbol = TickerSymbol::normalize(&symbol).ok_or(StatusCode::BAD_REQUEST)?;

    let profile = state
        .workflow
        .company_profile(&symbol)
        .await
        .map_err(|e| {
            tracing::warn!(%symbol, error = %format!("{e:#}"), "profile lookup failed");
            StatusCode::BAD_GATEWAY
        })?;

    let row = state
        .workflow
        .load_cached(&ScanClock::local_now())
        .and_then(|r| r.find(&symbol).cloned());

    Ok(Json(ApiStock { profile, row }))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &valuescan_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
