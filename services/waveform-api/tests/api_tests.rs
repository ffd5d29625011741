//! In-process HTTP tests for the waveform API.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use ingestion::IngestionConfig;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::Value;
use storage::Archive;
use test_utils::fixtures::ids;
use test_utils::{create_mseed_record, create_quakeml, create_xseed, SacBuilder};
use tower::ServiceExt; // for oneshot()

use waveform_api::build_router;
use waveform_api::handlers::health::HealthResponse;
use waveform_api::handlers::waveforms::IngestionResponse;
use waveform_api::state::AppState;

fn app() -> Router {
    let state = AppState::with_archive(
        Archive::in_memory(),
        IngestionConfig::default(),
        16 * 1024 * 1024,
    );
    let metrics = PrometheusBuilder::new().build_recorder().handle();
    build_router(Arc::new(state), metrics)
}

struct Reply {
    status: StatusCode,
    content_type: Option<String>,
    disposition: Option<String>,
    body: Bytes,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

async fn send(app: &Router, method: Method, uri: &str, body: Vec<u8>) -> Reply {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let header_text = |name| {
        response
            .headers()
            .get(name)
            .map(|v: &header::HeaderValue| v.to_str().unwrap().to_string())
    };
    let status = response.status();
    let content_type = header_text(header::CONTENT_TYPE);
    let disposition = header_text(header::CONTENT_DISPOSITION);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    Reply {
        status,
        content_type,
        disposition,
        body,
    }
}

async fn get(app: &Router, uri: &str) -> Reply {
    send(app, Method::GET, uri, Vec::new()).await
}

async fn post(app: &Router, uri: &str, body: Vec<u8>) -> Reply {
    send(app, Method::POST, uri, body).await
}

async fn app_with_event() -> Router {
    let app = app();
    let quakeml = create_quakeml("smi:local/quake1", "2012-08-27T04:37:19.0Z", 7.3);
    let reply = post(&app, "/event_based_data/event?name=quake1", quakeml.into_bytes()).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    app
}

fn furt_sac(channel: &str) -> Vec<u8> {
    SacBuilder::new("BW", "FURT", "", channel).build()
}

#[tokio::test]
async fn test_health() {
    let app = app_with_event().await;
    let reply = get(&app, "/health").await;
    assert_eq!(reply.status, StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&reply.body).unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.events, 1);
    assert_eq!(health.waveforms, 0);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let reply = get(&app(), "/metrics").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.content_type.unwrap().starts_with("text/plain"));
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_event_lifecycle() {
    let app = app_with_event().await;

    let quakeml = create_quakeml("smi:local/quake1", "2012-08-27T04:37:19.0Z", 7.3);
    let reply = post(&app, "/event_based_data/event?name=quake1", quakeml.clone().into_bytes()).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.json()["code"], "DUPLICATE_EVENT");
    assert_eq!(reply.json()["key"], "quake1");

    let reply = post(&app, "/event_based_data/event", quakeml.into_bytes()).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.json()["name"], "0");

    let reply = get(&app, "/event_based_data/event?name=quake1").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(std::str::from_utf8(&reply.body).unwrap().contains("smi:local/quake1"));

    let reply = get(&app, "/event_based_data/event/getList?format=json").await;
    let names: Vec<String> = reply
        .json()
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["0", "quake1"]);

    let reply = send(&app, Method::DELETE, "/event_based_data/event?name=0", Vec::new()).await;
    assert_eq!(reply.status, StatusCode::OK);
    let reply = get(&app, "/event_based_data/event?name=0").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_event_requires_body_and_name() {
    let app = app();
    let reply = post(&app, "/event_based_data/event", Vec::new()).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["code"], "MISSING_PARAMETER");

    let reply = get(&app, "/event_based_data/event").await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["key"], "name");
}

// ============================================================================
// Waveforms
// ============================================================================

#[tokio::test]
async fn test_waveform_needs_existing_event() {
    let app = app();
    let reply = post(&app, "/event_based_data/waveform?event=quake1", furt_sac("EHZ")).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["code"], "UNBOUND_EVENT");
}

#[tokio::test]
async fn test_waveform_upload_and_fetch() {
    let app = app_with_event().await;
    let body = furt_sac("EHZ");

    let reply = post(&app, "/event_based_data/waveform?event=quake1", body.clone()).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let report: IngestionResponse = serde_json::from_slice(&reply.body).unwrap();
    assert_eq!(report.registered, 1);
    assert_eq!(report.components[0].stage, "registered");
    assert_eq!(report.components[0].channel_id, ids::CHANNEL_Z);

    let reply = get(&app, "/event_based_data/waveform?event=quake1&channel_id=BW.FURT..EHZ").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body.as_ref(), body.as_slice());
    assert_eq!(
        reply.disposition.as_deref(),
        Some("attachment; filename=\"BW.FURT..EHZ-2012_8_27_4\"")
    );

    let reply = get(
        &app,
        "/event_based_data/waveform?event=quake1&channel_id=BW.FURT..EHZ&tag=proc1",
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = get(
        &app,
        "/event_based_data/waveform?event=quake1&channel_id=BW.FURT..EHZ&format=segy",
    )
    .await;
    assert_eq!(reply.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(reply.json()["code"], "UNSUPPORTED_CONVERSION");

    let reply = get(
        &app,
        "/event_based_data/waveform?event=quake1&channel_id=BW.FURT..EHZ&format=wav",
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = get(
        &app,
        "/event_based_data/waveform?event=quake1&channel_id=BW.FURT..EHZ&format=json",
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()[0]["npts"], 100);
}

#[tokio::test]
async fn test_partial_ingestion_is_multi_status() {
    let app = app_with_event().await;
    let reply = post(&app, "/event_based_data/waveform?event=quake1", furt_sac("EHZ")).await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let mut mseed = create_mseed_record("BW", "FURT", "", "EHZ", &[1, 2, 3]);
    mseed.extend(create_mseed_record("BW", "FURT", "", "EHN", &[4, 5, 6]));
    let reply = post(&app, "/event_based_data/waveform?event=quake1", mseed).await;
    assert_eq!(reply.status, StatusCode::MULTI_STATUS);

    let report = reply.json();
    assert_eq!(report["registered"], 1);
    assert_eq!(report["code"], "PARTIAL_INGESTION");
    let codes: Vec<Option<&str>> = report["components"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["code"].as_str())
        .collect();
    assert_eq!(codes, vec![Some("DUPLICATE_KEY"), None]);
}

#[tokio::test]
async fn test_waveform_listing_formats() {
    let app = app_with_event().await;
    post(&app, "/event_based_data/waveform?event=quake1", furt_sac("EHZ")).await;
    post(&app, "/event_based_data/waveform?event=quake1&tag=proc1", furt_sac("EHN")).await;

    let reply = get(&app, "/event_based_data/waveform/getList").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.content_type.unwrap().starts_with("application/xml"));
    let xml = std::str::from_utf8(&reply.body).unwrap();
    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains("<resultset>"));

    let reply = get(&app, "/event_based_data/waveform/getList?format=html").await;
    assert!(std::str::from_utf8(&reply.body).unwrap().contains("<table"));

    let reply = get(&app, "/event_based_data/waveform/getList?format=json&tag=proc1").await;
    let rows = reply.json();
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["channel_id"], ids::CHANNEL_N);

    let reply = get(&app, "/event_based_data/waveform/getList?format=csv").await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download_by_file_reference() {
    let app = app_with_event().await;
    let body = furt_sac("EHZ");
    let reply = post(&app, "/event_based_data/waveform?event=quake1", body.clone()).await;
    let filepath_id = reply.json()["filepath_id"].as_str().unwrap().to_string();

    let reply = get(
        &app,
        &format!("/event_based_data/downloadFile?filepath_id={}", filepath_id),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body.as_ref(), body.as_slice());

    let reply = get(&app, "/event_based_data/downloadFile?filepath_id=../etc/passwd").await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["code"], "INVALID_PARAMETER");
}

// ============================================================================
// Stations
// ============================================================================

#[tokio::test]
async fn test_station_upload_and_get() {
    let app = app();
    let xseed = create_xseed("BW", "FURT", ids::FURT_COORDINATES, &["EHZ"]);

    let reply = post(&app, "/event_based_data/station", xseed.clone().into_bytes()).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.json()["stations"][0], "BW.FURT");

    let reply = get(&app, "/event_based_data/station?network=BW&station=FURT").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body.as_ref(), xseed.as_bytes());

    let reply = get(&app, "/event_based_data/station?network=BW&station=FURT&format=json").await;
    let detail = reply.json();
    assert_eq!(detail[0]["station"]["latitude"], ids::FURT_COORDINATES.0);
    assert_eq!(detail[0]["station"]["channels"], ids::CHANNEL_Z);

    let reply = get(&app, "/event_based_data/station/getList?format=json").await;
    assert_eq!(reply.json().as_array().unwrap().len(), 1);

    let reply = get(&app, "/event_based_data/station?network=XX&station=NONE").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_station_upload_rejects_unknown_format() {
    let app = app();
    let reply = post(&app, "/event_based_data/station?format=stationxml", b"<x/>".to_vec()).await;
    assert_eq!(reply.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let reply = post(&app, "/event_based_data/station", b"not metadata".to_vec()).await;
    assert_eq!(reply.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}
