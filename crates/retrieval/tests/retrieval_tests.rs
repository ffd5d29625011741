//! Fetch and listing tests over an archive populated through ingestion.

use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use ingestion::{IngestionConfig, IngestionPipeline, WaveformUpload};
use retrieval::{FormatNegotiator, JsonTrace, ListService, WaveformQuery};
use seis_codec::{BuiltinCodec, SeismicCodec};
use seis_common::{
    ChannelId, OutputFormat, ResourceKind, SeisError, StationKey, Tag, WaveformFormat, WaveformKey,
};
use storage::StorageMode;
use test_utils::fixtures::ids;
use test_utils::{create_mseed_record, create_quakeml, create_xseed, external_file, SacBuilder};

struct Fixture {
    pipeline: IngestionPipeline,
    negotiator: FormatNegotiator,
    lists: ListService,
}

async fn fixture() -> Fixture {
    let codec: Arc<dyn SeismicCodec> = Arc::new(BuiltinCodec);
    let pipeline = IngestionPipeline::new(
        storage::Archive::in_memory(),
        codec.clone(),
        IngestionConfig::default(),
    );
    let quakeml = create_quakeml("smi:local/quake1", "2012-08-27T04:37:19.0Z", 7.3);
    pipeline
        .ingest_event(Some(ids::EVENT), Bytes::from(quakeml), false)
        .await
        .unwrap();
    let archive = pipeline.archive().clone();
    Fixture {
        negotiator: FormatNegotiator::new(archive.clone(), codec),
        lists: ListService::new(archive),
        pipeline,
    }
}

fn key(channel: &str, tag: &str) -> WaveformKey {
    WaveformKey::new(ids::EVENT, ChannelId::parse(channel).unwrap(), Tag::new(tag), false)
}

async fn upload(fixture: &Fixture, body: Vec<u8>) {
    let report = fixture
        .pipeline
        .ingest_waveform(WaveformUpload::managed(ids::EVENT, Bytes::from(body)))
        .await
        .unwrap();
    assert!(report.is_complete());
}

fn tar_entries(data: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = tar::Archive::new(data);
    archive
        .entries()
        .unwrap()
        .map(|entry| {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().into_owned();
            let mut body = Vec::new();
            entry.read_to_end(&mut body).unwrap();
            (name, body)
        })
        .collect()
}

// ============================================================================
// Fetch
// ============================================================================

#[tokio::test]
async fn test_fetch_original_returns_uploaded_bytes() {
    let fixture = fixture().await;
    let body = SacBuilder::new("BW", "FURT", "", "EHZ").build();
    upload(&fixture, body.clone()).await;

    let payload = fixture
        .negotiator
        .fetch(&key(ids::CHANNEL_Z, ""), None)
        .await
        .unwrap();
    assert_eq!(payload.data.as_ref(), body.as_slice());
    assert_eq!(payload.file_name, "BW.FURT..EHZ-2012_8_27_4");
    assert_eq!(payload.content_type, "application/octet-stream");
}

#[tokio::test]
async fn test_fetch_raw_bundles_every_component_file() {
    let fixture = fixture().await;
    let z = SacBuilder::new("BW", "FURT", "", "EHZ").build();
    let n = SacBuilder::new("BW", "FURT", "", "EHN").build();
    upload(&fixture, z.clone()).await;
    upload(&fixture, n.clone()).await;

    let payload = fixture
        .negotiator
        .fetch(&key(ids::CHANNEL_Z, ""), Some(OutputFormat::Raw))
        .await
        .unwrap();
    assert_eq!(payload.content_type, "application/x-tar");
    assert_eq!(payload.file_name, "quake1.BW.FURT..tar");

    let mut entries = tar_entries(&payload.data);
    entries.sort();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], ("BW.FURT..EHN-2012_8_27_4".to_string(), n));
    assert_eq!(entries[1], ("BW.FURT..EHZ-2012_8_27_4".to_string(), z));
}

#[tokio::test]
async fn test_fetch_raw_packs_shared_file_once() {
    let fixture = fixture().await;
    let mut body = create_mseed_record("BW", "FURT", "", "EHZ", &[1, 2, 3]);
    body.extend(create_mseed_record("BW", "FURT", "", "EHN", &[4, 5, 6]));
    upload(&fixture, body.clone()).await;

    let payload = fixture
        .negotiator
        .fetch(&key(ids::CHANNEL_N, ""), Some(OutputFormat::Raw))
        .await
        .unwrap();
    let entries = tar_entries(&payload.data);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].1, body);
}

#[tokio::test]
async fn test_fetch_json_has_one_pair_per_sample() {
    let fixture = fixture().await;
    let body = SacBuilder::new("BW", "FURT", "", "EHZ")
        .sampling_rate(2.0)
        .npts(1500)
        .build();
    upload(&fixture, body).await;

    let payload = fixture
        .negotiator
        .fetch(&key(ids::CHANNEL_Z, ""), Some(OutputFormat::Json))
        .await
        .unwrap();
    assert_eq!(payload.content_type, "application/json");

    let traces: Vec<JsonTrace> = serde_json::from_slice(&payload.data).unwrap();
    assert_eq!(traces.len(), 1);
    let trace = &traces[0];
    assert_eq!(trace.channel_id, ids::CHANNEL_Z);
    assert_eq!(trace.npts, 1500);
    assert_eq!(trace.data.len(), 1500);
    assert!(trace.data.windows(2).all(|w| w[0].0 < w[1].0));
    assert_eq!(trace.data[0].0, "2012-08-27T04:43:56.035000Z");
    assert_eq!(trace.data[1].0, "2012-08-27T04:43:56.535000Z");
}

#[tokio::test]
async fn test_fetch_converts_sac_to_mseed() {
    let fixture = fixture().await;
    upload(&fixture, SacBuilder::new("BW", "FURT", "", "EHZ").npts(250).build()).await;

    let payload = fixture
        .negotiator
        .fetch(
            &key(ids::CHANNEL_Z, ""),
            Some(OutputFormat::Encoded(WaveformFormat::MiniSeed)),
        )
        .await
        .unwrap();
    assert!(payload.file_name.starts_with("BW.FURT..EHZ."));

    let traces = BuiltinCodec
        .decode(WaveformFormat::MiniSeed, &payload.data)
        .unwrap();
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].channel_id().to_string(), ids::CHANNEL_Z);
    assert_eq!(traces[0].data.len(), 250);
}

#[tokio::test]
async fn test_fetch_unsupported_conversion() {
    let fixture = fixture().await;
    upload(&fixture, SacBuilder::new("BW", "FURT", "", "EHZ").build()).await;

    let err = fixture
        .negotiator
        .fetch(
            &key(ids::CHANNEL_Z, ""),
            Some(OutputFormat::Encoded(WaveformFormat::Segy)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SeisError::UnsupportedConversion { ref from, ref to } if from == "SAC" && to == "SEGY"));
    assert_eq!(err.http_status_code(), 415);
}

#[tokio::test]
async fn test_fetch_unknown_tag_is_not_found() {
    let fixture = fixture().await;
    upload(&fixture, SacBuilder::new("BW", "FURT", "", "EHZ").build()).await;

    let err = fixture
        .negotiator
        .fetch(&key(ids::CHANNEL_Z, "proc1"), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SeisError::NotFound {
            kind: ResourceKind::Waveform,
            ..
        }
    ));
}

#[tokio::test]
async fn test_indexed_file_is_read_on_every_fetch() {
    let fixture = fixture().await;
    let original = SacBuilder::new("BW", "FURT", "", "EHZ").build();
    let (_dir, path) = external_file("furt.sac", &original);
    let report = fixture
        .pipeline
        .ingest_waveform(WaveformUpload::indexed(ids::EVENT, path.clone()))
        .await
        .unwrap();
    assert_eq!(report.storage_mode, StorageMode::Indexed);

    let waveform = key(ids::CHANNEL_Z, "");
    let payload = fixture.negotiator.fetch(&waveform, None).await.unwrap();
    assert_eq!(payload.data.as_ref(), original.as_slice());
    assert_eq!(payload.file_name, "furt.sac");

    let modified = SacBuilder::new("BW", "FURT", "", "EHZ").npts(20).build();
    std::fs::write(&path, &modified).unwrap();
    let payload = fixture.negotiator.fetch(&waveform, None).await.unwrap();
    assert_eq!(payload.data.as_ref(), modified.as_slice());

    std::fs::remove_file(&path).unwrap();
    let err = fixture.negotiator.fetch(&waveform, None).await.unwrap_err();
    assert!(matches!(
        err,
        SeisError::NotFound {
            kind: ResourceKind::File,
            ..
        }
    ));
}

#[tokio::test]
async fn test_changed_indexed_file_never_serves_another_channel() {
    let fixture = fixture().await;
    let (_dir, path) = external_file("furt.sac", &SacBuilder::new("BW", "FURT", "", "EHZ").build());
    fixture
        .pipeline
        .ingest_waveform(WaveformUpload::indexed(ids::EVENT, path.clone()))
        .await
        .unwrap();

    std::fs::write(&path, SacBuilder::new("XX", "OTHER", "", "BHN").build()).unwrap();
    let err = fixture
        .negotiator
        .fetch(&key(ids::CHANNEL_Z, ""), Some(OutputFormat::Json))
        .await
        .unwrap_err();
    assert!(matches!(err, SeisError::Codec(_)), "{}", err);
}

#[tokio::test]
async fn test_reordered_indexed_file_serves_matching_channel() {
    let fixture = fixture().await;
    let mut original = create_mseed_record("BW", "FURT", "", "EHZ", &[1, 2, 3]);
    original.extend(create_mseed_record("BW", "FURT", "", "EHN", &[4, 5, 6]));
    let (_dir, path) = external_file("furt.mseed", &original);
    let report = fixture
        .pipeline
        .ingest_waveform(WaveformUpload::indexed(ids::EVENT, path.clone()))
        .await
        .unwrap();
    assert!(report.is_complete());

    let mut reordered = create_mseed_record("BW", "FURT", "", "EHN", &[4, 5, 6]);
    reordered.extend(create_mseed_record("BW", "FURT", "", "EHZ", &[1, 2, 3]));
    std::fs::write(&path, &reordered).unwrap();

    let payload = fixture
        .negotiator
        .fetch(&key(ids::CHANNEL_Z, ""), Some(OutputFormat::Json))
        .await
        .unwrap();
    let traces: Vec<JsonTrace> = serde_json::from_slice(&payload.data).unwrap();
    assert_eq!(traces[0].channel_id, ids::CHANNEL_Z);
    let values: Vec<f64> = traces[0].data.iter().map(|(_, v)| *v).collect();
    assert_eq!(values, vec![1.0, 2.0, 3.0]);
}

#[tokio::test]
async fn test_download_by_filepath_id() {
    let fixture = fixture().await;
    let body = SacBuilder::new("BW", "FURT", "", "EHZ").build();
    upload(&fixture, body.clone()).await;

    let rows = fixture.lists.waveforms(&WaveformQuery::default()).await.unwrap();
    let payload = fixture.negotiator.download(&rows[0].filepath_id).await.unwrap();
    assert_eq!(payload.data.as_ref(), body.as_slice());

    let err = fixture
        .negotiator
        .download(&storage::FilepathId::new())
        .await
        .unwrap_err();
    assert_eq!(err.http_status_code(), 404);
}

// ============================================================================
// Listings
// ============================================================================

#[tokio::test]
async fn test_waveform_listing_order_and_filters() {
    let fixture = fixture().await;
    upload(&fixture, SacBuilder::new("BW", "FURT", "", "EHZ").build()).await;
    upload(&fixture, SacBuilder::new("BW", "FURT", "", "EHN").build()).await;
    upload(&fixture, SacBuilder::new("BW", "ALTM", "", "EHZ").build()).await;

    let rows = fixture.lists.waveforms(&WaveformQuery::default()).await.unwrap();
    let channels: Vec<&str> = rows.iter().map(|r| r.channel_id.as_str()).collect();
    assert_eq!(channels, vec!["BW.ALTM..EHZ", "BW.FURT..EHN", "BW.FURT..EHZ"]);
    assert!(rows.iter().all(|r| r.tag.is_empty() && r.format == "SAC"));

    let query = WaveformQuery {
        channel_id: Some(ChannelId::parse(ids::CHANNEL_N).unwrap()),
        ..Default::default()
    };
    let rows = fixture.lists.waveforms(&query).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].npts, 100);

    let query = WaveformQuery {
        event: Some("other".into()),
        ..Default::default()
    };
    assert!(fixture.lists.waveforms(&query).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_station_filter_joins_coordinates() {
    let fixture = fixture().await;
    let xseed = create_xseed("BW", "FURT", ids::FURT_COORDINATES, &["EHZ"]);
    fixture
        .pipeline
        .ingest_station(None, Bytes::from(xseed))
        .await
        .unwrap();
    upload(&fixture, SacBuilder::new("BW", "FURT", "", "EHZ").build()).await;

    let query = WaveformQuery {
        station_id: Some(StationKey::new("BW", "FURT")),
        ..Default::default()
    };
    let rows = fixture.lists.waveforms(&query).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].latitude, Some(ids::FURT_COORDINATES.0));
    assert_eq!(rows[0].elevation_in_m, Some(ids::FURT_COORDINATES.2));

    let unfiltered = fixture.lists.waveforms(&WaveformQuery::default()).await.unwrap();
    assert_eq!(unfiltered[0].latitude, None);
}

#[tokio::test]
async fn test_event_and_station_listings() {
    let fixture = fixture().await;
    let quakeml = create_quakeml("smi:local/a", "2013-01-01T00:00:00.0Z", 5.1);
    fixture
        .pipeline
        .ingest_event(Some("aftershock"), Bytes::from(quakeml), false)
        .await
        .unwrap();

    let events = fixture.lists.events().await.unwrap();
    let names: Vec<&str> = events.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["aftershock", "quake1"]);
    assert_eq!(events[1].magnitude, Some(7.3));

    let xseed = create_xseed("BW", "FURT", ids::FURT_COORDINATES, &["EHZ", "EHN"]);
    fixture
        .pipeline
        .ingest_station(None, Bytes::from(xseed))
        .await
        .unwrap();

    let stations = fixture.lists.stations().await.unwrap();
    assert_eq!(stations.len(), 1);
    assert_eq!(stations[0].channels, "BW.FURT..EHN,BW.FURT..EHZ");

    let detail = fixture
        .lists
        .station(&StationKey::new("BW", "FURT"))
        .await
        .unwrap();
    assert_eq!(detail.channel.len(), 2);
    assert_eq!(detail.metadata_file.len(), 1);

    let err = fixture
        .lists
        .station(&StationKey::new("XX", "NONE"))
        .await
        .unwrap_err();
    assert_eq!(err.http_status_code(), 404);
}
