//! Event intake.

use bytes::Bytes;
use metrics::counter;
use tracing::{debug, instrument};

use seis_codec::summarize_quakeml;
use seis_common::{SeisError, SeisResult};

use crate::pipeline::IngestionPipeline;

impl IngestionPipeline {
    /// Store a QuakeML event. With `replace` an existing event of the same
    /// name is updated in place; otherwise a taken name is an error.
    /// Returns the event name.
    #[instrument(skip(self, payload), fields(event = name.unwrap_or("<auto>"), size = payload.len()))]
    pub async fn ingest_event(
        &self,
        name: Option<&str>,
        payload: Bytes,
        replace: bool,
    ) -> SeisResult<String> {
        let summary = summarize_quakeml(&payload)?;
        debug!(origin_time = ?summary.origin_time, magnitude = ?summary.magnitude, "Summarized QuakeML");

        if let (Some(name), true) = (name, replace) {
            match self
                .archive
                .events
                .update(name, summary.clone(), payload.clone())
                .await
            {
                Ok(()) => {
                    counter!("event_updates_total").increment(1);
                    return Ok(name.to_string());
                }
                Err(SeisError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        let name = self.archive.events.create(name, summary, payload).await?;
        counter!("event_creations_total").increment(1);
        Ok(name)
    }
}
