//! End-to-end ingestion tests against an in-memory archive.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use ingestion::{CoordinateAuthority, IngestionConfig, IngestionPipeline, WaveformUpload};
use seis_codec::BuiltinCodec;
use seis_common::{ChannelId, SeisError, StationFormat, StationKey, Tag, WaveformKey};
use storage::{
    Archive, Catalogs, ObjectStorage, SqliteCatalog, StorageBackend, StorageMode, WaveformFilter,
};
use test_utils::fixtures::ids;
use test_utils::{
    assert_coordinate_eq, create_dataless_seed, create_mseed_record, create_quakeml, create_resp,
    external_file, SacBuilder, SeedChannel,
};

fn pipeline_with(config: IngestionConfig) -> IngestionPipeline {
    IngestionPipeline::new(Archive::in_memory(), Arc::new(BuiltinCodec), config)
}

async fn pipeline_with_event() -> IngestionPipeline {
    let pipeline = pipeline_with(IngestionConfig::default());
    let quakeml = create_quakeml("smi:local/quake1", "2012-08-27T04:37:19.0Z", 7.3);
    pipeline
        .ingest_event(Some(ids::EVENT), Bytes::from(quakeml), false)
        .await
        .unwrap();
    pipeline
}

fn furt_sac() -> Bytes {
    Bytes::from(SacBuilder::new("BW", "FURT", "", "EHZ").build())
}

fn raw_key(channel: &str) -> WaveformKey {
    WaveformKey::new(ids::EVENT, ChannelId::parse(channel).unwrap(), Tag::RAW, false)
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_event_auto_name_and_replace() {
    let pipeline = pipeline_with(IngestionConfig::default());
    let v1 = create_quakeml("smi:local/a", "2012-08-27T04:37:19.0Z", 7.3);
    let name = pipeline.ingest_event(None, Bytes::from(v1), false).await.unwrap();
    assert_eq!(name, "0");

    let v2 = create_quakeml("smi:local/a", "2012-08-27T04:37:19.0Z", 7.5);
    let err = pipeline
        .ingest_event(Some("0"), Bytes::from(v2.clone()), false)
        .await
        .unwrap_err();
    assert!(matches!(err, SeisError::DuplicateEvent(_)));

    pipeline.ingest_event(Some("0"), Bytes::from(v2), true).await.unwrap();
    let event = pipeline.archive().events.get("0").await.unwrap();
    assert_eq!(event.summary.magnitude, Some(7.5));
    assert_eq!(event.summary.magnitude_type.as_deref(), Some("Mw"));
}

#[tokio::test]
async fn test_event_rejects_malformed_xml() {
    let pipeline = pipeline_with(IngestionConfig::default());
    let err = pipeline
        .ingest_event(None, Bytes::from_static(b"<quakeml><event></quakeml>"), false)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
}

// ============================================================================
// Waveforms
// ============================================================================

#[tokio::test]
async fn test_waveform_requires_existing_event() {
    let pipeline = pipeline_with(IngestionConfig::default());
    let err = pipeline
        .ingest_waveform(WaveformUpload::managed("nope", furt_sac()))
        .await
        .unwrap_err();
    assert!(matches!(err, SeisError::UnboundEvent(ref e) if e == "nope"));
    assert!(pipeline.archive().waveform_store.list("").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_managed_sac_upload() {
    let pipeline = pipeline_with_event().await;
    let body = furt_sac();
    let report = pipeline
        .ingest_waveform(WaveformUpload::managed(ids::EVENT, body.clone()))
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.storage_mode, StorageMode::Managed);
    let stored = pipeline.archive().waveform_store.list(ids::EVENT).await.unwrap();
    assert_eq!(stored, vec!["quake1/BW.FURT..EHZ-2012_8_27_4"]);

    let record = pipeline
        .archive()
        .waveforms
        .get_one(&raw_key(ids::CHANNEL_Z))
        .await
        .unwrap();
    assert_eq!(record.metadata.npts, 100);
    let (name, data) = pipeline.archive().read_file(&record.filepath).await.unwrap();
    assert_eq!(name, "BW.FURT..EHZ-2012_8_27_4");
    assert_eq!(data, body);

    let station = pipeline
        .archive()
        .stations
        .get(&StationKey::new("BW", "FURT"))
        .await
        .unwrap();
    assert!(station.has_channel("", "EHZ"));
}

#[tokio::test]
async fn test_duplicate_content_and_replace() {
    let pipeline = pipeline_with_event().await;
    pipeline
        .ingest_waveform(WaveformUpload::managed(ids::EVENT, furt_sac()))
        .await
        .unwrap();

    let err = pipeline
        .ingest_waveform(WaveformUpload::managed(ids::EVENT, furt_sac()))
        .await
        .unwrap_err();
    assert!(matches!(err, SeisError::DuplicateContent(_)));

    let report = pipeline
        .ingest_waveform(WaveformUpload::managed(ids::EVENT, furt_sac()).replacing(true))
        .await
        .unwrap();
    assert!(report.is_complete());
    // The superseded copy is released, the new one kept.
    let stored = pipeline.archive().waveform_store.list(ids::EVENT).await.unwrap();
    assert_eq!(stored, vec!["quake1/BW.FURT..EHZ-2012_8_27_4.1"]);
}

#[tokio::test]
async fn test_duplicate_key_releases_new_copy() {
    let pipeline = pipeline_with_event().await;
    pipeline
        .ingest_waveform(WaveformUpload::managed(ids::EVENT, furt_sac()))
        .await
        .unwrap();

    let other = Bytes::from(SacBuilder::new("BW", "FURT", "", "EHZ").npts(50).build());
    let report = pipeline
        .ingest_waveform(WaveformUpload::managed(ids::EVENT, other))
        .await
        .unwrap();
    assert_eq!(report.registered(), 0);
    assert!(matches!(report.first_error(), Some(SeisError::DuplicateKey(_))));
    assert!(report.filepath.is_none());
    assert_eq!(pipeline.archive().waveform_store.list(ids::EVENT).await.unwrap().len(), 1);

    let tagged = Bytes::from(SacBuilder::new("BW", "FURT", "", "EHZ").npts(60).build());
    let report = pipeline
        .ingest_waveform(WaveformUpload::managed(ids::EVENT, tagged).with_tag("proc1"))
        .await
        .unwrap();
    assert!(report.is_complete());
    let tags = pipeline
        .archive()
        .waveforms
        .tags(ids::EVENT, &ChannelId::parse(ids::CHANNEL_Z).unwrap())
        .await
        .unwrap();
    assert_eq!(tags, vec![Tag::RAW, Tag::new("proc1")]);
}

#[tokio::test]
async fn test_multicomponent_mseed_shares_one_file() {
    let pipeline = pipeline_with_event().await;
    let mut data = create_mseed_record("BW", "FURT", "", "EHZ", &[1, 2, 3]);
    data.extend(create_mseed_record("BW", "FURT", "", "EHN", &[4, 5, 6]));

    let report = pipeline
        .ingest_waveform(WaveformUpload::managed(ids::EVENT, Bytes::from(data)))
        .await
        .unwrap();
    assert_eq!(report.components.len(), 2);
    assert!(report.is_complete());

    let records: Vec<_> = pipeline
        .archive()
        .waveforms
        .find(&WaveformFilter {
            event: Some(ids::EVENT.to_string()),
            ..Default::default()
        })
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].filepath, records[1].filepath);
    assert_eq!(records[0].metadata.trace_index, 1);
}

#[tokio::test]
async fn test_index_only_upload_writes_no_bytes() {
    let pipeline = pipeline_with_event().await;
    let (_dir, path) = external_file("furt.sac", &furt_sac());

    let report = pipeline
        .ingest_waveform(WaveformUpload::indexed(ids::EVENT, &path))
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.storage_mode, StorageMode::Indexed);
    assert!(pipeline.archive().waveform_store.list("").await.unwrap().is_empty());
    assert!(path.exists());
}

#[tokio::test]
async fn test_index_path_validation() {
    let pipeline = pipeline_with_event().await;

    let relative = pipeline
        .ingest_waveform(WaveformUpload::indexed(ids::EVENT, "data/furt.sac"))
        .await
        .unwrap_err();
    assert_eq!(relative.error_code(), "INVALID_PARAMETER");

    let mut both = WaveformUpload::indexed(ids::EVENT, "/data/furt.sac");
    both.body = Some(furt_sac());
    let err = pipeline.ingest_waveform(both).await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_PARAMETER");
}

#[tokio::test]
async fn test_undetectable_payload_is_unsupported() {
    let pipeline = pipeline_with_event().await;
    let err = pipeline
        .ingest_waveform(WaveformUpload::managed(ids::EVENT, Bytes::from_static(b"not a waveform")))
        .await
        .unwrap_err();
    assert_eq!(err.http_status_code(), 415);
}

#[tokio::test]
async fn test_waveform_ending_past_the_calendar_is_rejected() {
    let pipeline = pipeline_with_event().await;
    let sac = SacBuilder::new("BW", "FURT", "", "EHZ").sampling_rate(1.0e-20).npts(4).build();
    let err = pipeline
        .ingest_waveform(WaveformUpload::managed(ids::EVENT, Bytes::from(sac)))
        .await
        .unwrap_err();
    assert!(matches!(err, SeisError::UnsupportedFormat(_)), "{}", err);
    assert_eq!(err.http_status_code(), 415);
    assert_eq!(pipeline.archive().files.count().await.unwrap(), 0);
    assert_eq!(pipeline.archive().waveforms.count().await.unwrap(), 0);
}

async fn persistent_archive(dir: &std::path::Path) -> Archive {
    let catalog = SqliteCatalog::open(&dir.join("catalog.sqlite")).await.unwrap();
    let local = |name: &str| {
        ObjectStorage::new(&StorageBackend::Local {
            root: dir.join(name),
        })
        .unwrap()
    };
    Archive::new(Catalogs::sqlite(catalog), local("waveforms"), local("stations"))
}

#[tokio::test]
async fn test_archive_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let pipeline = IngestionPipeline::new(
            persistent_archive(dir.path()).await,
            Arc::new(BuiltinCodec),
            IngestionConfig::default(),
        );
        let quakeml = create_quakeml("smi:local/quake1", "2012-08-27T04:37:19.0Z", 7.3);
        pipeline
            .ingest_event(Some(ids::EVENT), Bytes::from(quakeml), false)
            .await
            .unwrap();
        let report = pipeline
            .ingest_waveform(WaveformUpload::managed(ids::EVENT, furt_sac()))
            .await
            .unwrap();
        assert!(report.is_complete());
    }

    let pipeline = IngestionPipeline::new(
        persistent_archive(dir.path()).await,
        Arc::new(BuiltinCodec),
        IngestionConfig::default(),
    );
    let archive = pipeline.archive();
    assert_eq!(archive.events.count().await.unwrap(), 1);
    assert_eq!(archive.waveforms.count().await.unwrap(), 1);
    assert_eq!(archive.files.count().await.unwrap(), 1);
    assert_eq!(archive.stations.count().await.unwrap(), 1);

    let record = archive.waveforms.get_one(&raw_key(ids::CHANNEL_Z)).await.unwrap();
    let (_, data) = archive.read_file(&record.filepath).await.unwrap();
    assert_eq!(data, furt_sac());

    let err = pipeline
        .ingest_waveform(WaveformUpload::managed(ids::EVENT, furt_sac()))
        .await
        .unwrap_err();
    assert!(matches!(err, SeisError::DuplicateContent(_)), "{}", err);
}

// ============================================================================
// Stations and coordinates
// ============================================================================

#[tokio::test]
async fn test_waveform_backfills_station_coordinates() {
    let pipeline = pipeline_with_event().await;
    let resp = create_resp("BW", "FURT", &["EHZ"]);
    pipeline
        .ingest_station(Some(StationFormat::Resp), Bytes::from(resp))
        .await
        .unwrap();
    let key = StationKey::new("BW", "FURT");
    assert!(pipeline.archive().stations.get(&key).await.unwrap().coordinates.is_empty());

    let sac = SacBuilder::new("BW", "FURT", "", "EHZ")
        .coordinates(48.162899, 11.2752, 565.0)
        .build();
    pipeline
        .ingest_waveform(WaveformUpload::managed(ids::EVENT, Bytes::from(sac)))
        .await
        .unwrap();

    let coords = pipeline.archive().stations.get(&key).await.unwrap().coordinates;
    assert_coordinate_eq!(coords.latitude, 48.162899, 1e-4);
    assert_coordinate_eq!(coords.elevation_in_m, 565.0, 1e-4);
    assert_coordinate_eq!(coords.local_depth_in_m, 0.0, 1e-9);
}

#[tokio::test]
async fn test_first_coordinates_win() {
    let pipeline = pipeline_with_event().await;
    let first = SacBuilder::new("BW", "FURT", "", "EHZ").coordinates(48.0, 11.0, 500.0).build();
    let second = SacBuilder::new("BW", "FURT", "", "EHN").coordinates(10.0, 10.0, 10.0).build();
    for data in [first, second] {
        pipeline
            .ingest_waveform(WaveformUpload::managed(ids::EVENT, Bytes::from(data)))
            .await
            .unwrap();
    }
    let coords = pipeline
        .archive()
        .stations
        .get(&StationKey::new("BW", "FURT"))
        .await
        .unwrap()
        .coordinates;
    assert_coordinate_eq!(coords.latitude, 48.0, 1e-4);
}

#[tokio::test]
async fn test_override_authority_replaces_coordinates() {
    let config = IngestionConfig {
        coordinate_authority: CoordinateAuthority::Override,
        ..Default::default()
    };
    let pipeline = pipeline_with(config);
    let seed = create_dataless_seed(
        "BW",
        "FURT",
        (1.0, 2.0, 3.0),
        &[SeedChannel::new("", "EHZ", (1.0, 2.0, 3.0))],
    );
    pipeline.ingest_station(None, Bytes::from(seed)).await.unwrap();

    let seed = create_dataless_seed(
        "BW",
        "FURT",
        ids::FURT_COORDINATES,
        &[SeedChannel::new("", "EHZ", ids::FURT_COORDINATES)],
    );
    pipeline.ingest_station(None, Bytes::from(seed)).await.unwrap();

    let station = pipeline
        .archive()
        .stations
        .get(&StationKey::new("BW", "FURT"))
        .await
        .unwrap();
    assert_coordinate_eq!(station.coordinates.latitude, 48.162899, 1e-6);
    assert_eq!(station.metadata_files.len(), 2);
}

#[tokio::test]
async fn test_station_upload_stores_payload() {
    let pipeline = pipeline_with(IngestionConfig::default());
    let seed = create_dataless_seed(
        "BW",
        "FURT",
        ids::FURT_COORDINATES,
        &[
            SeedChannel::new("", "EHZ", ids::FURT_COORDINATES),
            SeedChannel::new("", "EHN", ids::FURT_COORDINATES),
        ],
    );
    let report = pipeline.ingest_station(None, Bytes::from(seed.clone())).await.unwrap();
    assert_eq!(report.format, StationFormat::Seed);
    assert_eq!(report.stations, vec![StationKey::new("BW", "FURT")]);

    let stored = pipeline.archive().station_store.list("BW").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].starts_with("BW/BW.FURT..EHZ-"));

    let (_, data) = pipeline.archive().read_file(&report.filepath).await.unwrap();
    assert_eq!(data, Bytes::from(seed));
    let station = pipeline
        .archive()
        .stations
        .get(&StationKey::new("BW", "FURT"))
        .await
        .unwrap();
    assert_eq!(station.channels.len(), 2);
}

#[tokio::test]
async fn test_undecodable_station_payload_stores_nothing() {
    let pipeline = pipeline_with(IngestionConfig::default());
    let err = pipeline
        .ingest_station(Some(StationFormat::Seed), Bytes::from_static(b"000001V 010009402.3121992,001,00:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, SeisError::UnsupportedFormat(_)), "{}", err);
    assert_eq!(pipeline.archive().files.count().await.unwrap(), 0);
    assert_eq!(pipeline.archive().stations.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_station_upload_rejects_unknown_payload() {
    let pipeline = pipeline_with(IngestionConfig::default());
    let err = pipeline
        .ingest_station(None, Bytes::from_static(b"hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, SeisError::UnsupportedFormat(_)));
}
