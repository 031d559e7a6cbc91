// Farm Report - Web Server
// JSON API over the same report the CLI prints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Local;
use clap::Parser;
use farm_report::{assemble_report, Config, FarmReport, FarmStats, MetricWarning, StatusFilter, Store};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "farm-server")]
#[command(about = "Serve farm reports over HTTP")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    config: Config,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Store,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message.into()),
        }
    }
}

#[derive(Serialize)]
struct FarmsResponse {
    farms: Vec<String>,
    warnings: Vec<MetricWarning>,
}

#[derive(Debug, Deserialize)]
struct ReportQuery {
    status: Option<String>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/farms - Distinct farm names
async fn get_farms(State(state): State<AppState>) -> Response {
    let result = tokio::task::spawn_blocking(move || {
        let mut stats = FarmStats::new(&state.store, Local::now().naive_local());
        let farms = stats.farms();
        FarmsResponse {
            farms,
            warnings: stats.into_warnings(),
        }
    })
    .await;

    match result {
        Ok(response) => (StatusCode::OK, Json(ApiResponse::ok(response))).into_response(),
        Err(e) => {
            error!("Farm listing task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err("farm listing failed")),
            )
                .into_response()
        }
    }
}

/// GET /api/report/:farm?status=<filter> - Full report for one farm
async fn get_report(
    State(state): State<AppState>,
    Path(farm): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Response {
    let status = match query.status.as_deref() {
        None => StatusFilter::default(),
        Some(raw) => match raw.parse::<StatusFilter>() {
            Ok(status) => status,
            Err(e) => {
                warn!(%farm, "Rejected report request: {}", e);
                return (StatusCode::BAD_REQUEST, Json(ApiResponse::err(e.to_string())))
                    .into_response();
            }
        },
    };

    info!(%farm, %status, "assembling report");
    let result: Result<FarmReport, _> = tokio::task::spawn_blocking(move || {
        assemble_report(&state.store, &farm, status, Local::now().naive_local())
    })
    .await;

    match result {
        Ok(report) => (StatusCode::OK, Json(ApiResponse::ok(report))).into_response(),
        Err(e) => {
            error!("Report task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err("report assembly failed")),
            )
                .into_response()
        }
    }
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/farms", get(get_farms))
        .route("/report/:farm", get(get_report))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🌐 Farm Report - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if let Err(err) = cli.config.validate() {
        eprintln!("❌ {err}");
        eprintln!("   Pass --db <path> or set FARM_REPORT_DB.");
        std::process::exit(1);
    }

    let addr = match cli.config.socket_addr() {
        Ok(addr) => addr,
        Err(err) => {
            eprintln!("❌ {err}");
            std::process::exit(1);
        }
    };

    let store = cli.config.store();
    println!("✓ Database: {}", store.path().display());

    let app = router(AppState { store });

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("❌ Failed to bind to {addr}: {err}");
            std::process::exit(1);
        }
    };

    println!("\n🚀 Server running on http://{addr}");
    println!("   API: http://{addr}/api/farms");
    println!("\n   Press Ctrl+C to stop\n");

    if let Err(err) = axum::serve(listener, app).await {
        eprintln!("❌ Server error: {err}");
        std::process::exit(1);
    }
}
