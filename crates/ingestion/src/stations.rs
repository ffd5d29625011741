//! Station metadata intake.

use bytes::Bytes;
use metrics::counter;
use tracing::{info, instrument};

use seis_common::{SeisError, SeisResult, StationFormat, StationKey};
use storage::{ChannelEpoch, FileLocation, FilepathId, FilepathRecord, StorageRoot};

use crate::naming::station_object_name;
use crate::pipeline::IngestionPipeline;

#[derive(Debug, Clone)]
pub struct StationUploadReport {
    pub format: StationFormat,
    pub filepath: FilepathId,
    /// Every station described by the payload, in payload order.
    pub stations: Vec<StationKey>,
}

impl IngestionPipeline {
    /// Store a station metadata payload and upsert every station it
    /// describes.
    #[instrument(skip(self, payload), fields(size = payload.len()))]
    pub async fn ingest_station(
        &self,
        declared: Option<StationFormat>,
        payload: Bytes,
    ) -> SeisResult<StationUploadReport> {
        let format = match declared {
            Some(format) => format,
            None => self.codec.detect_station(&payload).ok_or_else(|| {
                SeisError::UnsupportedFormat("not a SEED, XSEED or RESP file".to_string())
            })?,
        };

        let codec = self.codec.clone();
        let data = payload.clone();
        let inventory = tokio::task::spawn_blocking(move || codec.decode_station(format, &data))
            .await
            .map_err(|e| SeisError::InternalError(format!("station decoder task failed: {}", e)))??;
        let (first_station, first_channel) = inventory
            .first_channel()
            .ok_or_else(|| SeisError::UnsupportedFormat(format!("{} payload lists no channels", format.name())))?;

        let name = station_object_name(
            &first_station.network,
            &first_station.station,
            &first_channel.location,
            &first_channel.channel,
            first_channel.start_date,
        );
        let object_path = self.archive.station_store.put_unique(&name, payload.clone()).await?;
        let record = FilepathRecord::new(
            FileLocation::Managed {
                root: StorageRoot::Stations,
                object_path,
            },
            &payload,
            format.name(),
        );
        let filepath = record.id;
        self.archive.files.insert(record, false).await?;

        let mut stations = Vec::with_capacity(inventory.stations.len());
        for station in inventory.stations {
            let key = StationKey::new(&station.network, &station.station);
            if let Some(coordinates) = &station.coordinates {
                self.resolver.resolve(&key, coordinates).await?;
            }

            let channels = station.channels;
            let added = self
                .archive
                .stations
                .modify(&key, move |record| {
                    let mut added = 0;
                    for channel in channels {
                        let epoch = ChannelEpoch {
                            location: channel.location,
                            channel: channel.channel,
                            start_date: channel.start_date,
                            end_date: channel.end_date,
                        };
                        if record.add_channel(epoch) {
                            added += 1;
                        }
                    }
                    if !record.metadata_files.contains(&filepath) {
                        record.metadata_files.push(filepath);
                    }
                    added
                })
                .await?;

            info!(station = %key, channels_added = added, "Upserted station");
            stations.push(key);
        }

        counter!("station_uploads_total", "format" => format.name()).increment(1);
        Ok(StationUploadReport {
            format,
            filepath,
            stations,
        })
    }
}
