//! Waveform archive HTTP service.
//!
//! Binds event, station and waveform intake, retrieval and listings to
//! routes under `/event_based_data`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Extension, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Build the router with every route and middleware layer.
pub fn build_router(state: Arc<AppState>, metrics: PrometheusHandle) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        // Events
        .route(
            "/event_based_data/event",
            get(handlers::events::get_event_handler)
                .post(handlers::events::upload_event_handler)
                .delete(handlers::events::delete_event_handler),
        )
        .route(
            "/event_based_data/event/getList",
            get(handlers::events::list_events_handler),
        )
        // Stations
        .route(
            "/event_based_data/station",
            get(handlers::stations::get_station_handler)
                .post(handlers::stations::upload_station_handler),
        )
        .route(
            "/event_based_data/station/getList",
            get(handlers::stations::list_stations_handler),
        )
        // Waveforms
        .route(
            "/event_based_data/waveform",
            get(handlers::waveforms::get_waveform_handler)
                .post(handlers::waveforms::upload_waveform_handler),
        )
        .route(
            "/event_based_data/waveform/getList",
            get(handlers::waveforms::list_waveforms_handler),
        )
        // Files
        .route(
            "/event_based_data/downloadFile",
            get(handlers::files::download_handler),
        )
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(Extension(state))
        .layer(Extension(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
