use crate::assets::LogoResolver;
use crate::config::AppConfig;
use crate::data::DatasetCache;
use crate::error::LoadError;
use crate::render::{build_dashboard, render_error_page, render_page, Dashboard, DashboardStatus};
use crate::types::{Filters, Selection, SummaryRow};
use anyhow::Result;
use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

pub struct AppState {
    pub config: AppConfig,
    pub cache: DatasetCache,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    status: DashboardStatus,
    location_count: usize,
    marker_count: usize,
    rows: Vec<SummaryRow>,
}

/// Reads repeated `domain`/`retailer` parameters. Without `filtered` the
/// page was not submitted through the form and nothing is filtered; with
/// it, a missing dimension means the user cleared that selection.
pub fn parse_filters(query: Option<&str>) -> Filters {
    let Some(query) = query else {
        return Filters::default();
    };

    let mut submitted = false;
    let mut domains = Vec::new();
    let mut retailers = Vec::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "filtered" => submitted = true,
            "domain" => domains.push(value.into_owned()),
            "retailer" => retailers.push(value.into_owned()),
            _ => {}
        }
    }

    if !submitted {
        return Filters::default();
    }
    Filters {
        domains: Selection::only(domains),
        retailers: Selection::only(retailers),
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api/summary", get(summary_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig) -> Result<()> {
    let state = Arc::new(AppState {
        config: config.clone(),
        cache: DatasetCache::default(),
    });

    // Fail fast on bad sources rather than on the first request.
    state.cache.get_or_load(&state.config)?;

    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Runs the synchronous pipeline off the async runtime.
async fn run_pipeline(state: Arc<AppState>, filters: Filters) -> Result<Dashboard, String> {
    let joined = tokio::task::spawn_blocking(move || -> Result<Dashboard, LoadError> {
        let dataset = state.cache.get_or_load(&state.config)?;
        let logos = LogoResolver::open(&state.config.input.logo_dir, state.config.map.logo_width);
        Ok(build_dashboard(&state.config, &dataset, &filters, &logos))
    })
    .await;

    match joined {
        Ok(Ok(dashboard)) => Ok(dashboard),
        Ok(Err(e)) => {
            error!("Failed to load data: {}", e);
            Err(e.to_string())
        }
        Err(e) => {
            error!("Pipeline task failed: {}", e);
            Err("Internal error while building the dashboard".to_string())
        }
    }
}

async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Response {
    let filters = parse_filters(query.as_deref());
    debug!("Dashboard request with filters {:?}", filters);

    let map = state.config.map.clone();
    let dashboard = match run_pipeline(state, filters).await {
        Ok(d) => d,
        Err(message) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, Html(render_error_page(&message))).into_response();
        }
    };

    match render_page(&dashboard, &map, true) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Failed to render dashboard: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Html(render_error_page(&e.to_string()))).into_response()
        }
    }
}

async fn summary_handler(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Response {
    let filters = parse_filters(query.as_deref());

    match run_pipeline(state, filters).await {
        Ok(dashboard) => Json(SummaryResponse {
            status: dashboard.status,
            location_count: dashboard.location_count,
            marker_count: dashboard.markers.len(),
            rows: dashboard.summary,
        })
        .into_response(),
        Err(message) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": message })),
        )
            .into_response(),
    }
}
