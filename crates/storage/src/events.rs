//! Event catalog: earthquake events keyed by name.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use seis_codec::EventSummary;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info};

use seis_common::{ResourceKind, SeisError, SeisResult};

use crate::catalog::EventCatalog;

#[derive(Debug, Clone)]
pub struct EventRecord {
    pub name: String,
    pub summary: EventSummary,
    /// The QuakeML document as uploaded.
    pub payload: Bytes,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// In-memory event catalog.
#[derive(Default)]
pub struct MemoryEventCatalog {
    events: RwLock<BTreeMap<String, EventRecord>>,
}

/// Keeps an event from being deleted while held.
pub struct EventPin<'a> {
    _guard: RwLockReadGuard<'a, BTreeMap<String, EventRecord>>,
}

/// Event names end up in storage paths.
pub(crate) fn validate_name(name: &str) -> SeisResult<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control)
    {
        return Err(SeisError::invalid_parameter(
            "event",
            format!("'{}' is not a valid event name", name),
        ));
    }
    Ok(())
}

/// Smallest non-negative integer name not yet taken.
pub(crate) fn next_free_name(taken: impl Fn(&str) -> bool) -> SeisResult<String> {
    (0u64..)
        .map(|n| n.to_string())
        .find(|candidate| !taken(candidate))
        .ok_or_else(|| SeisError::InternalError("event names exhausted".to_string()))
}

impl MemoryEventCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `name` in place until the pin is dropped. Fails with
    /// `UnboundEvent` if the event does not exist.
    pub async fn pin(&self, name: &str) -> SeisResult<EventPin<'_>> {
        let guard = self.events.read().await;
        if !guard.contains_key(name) {
            return Err(SeisError::UnboundEvent(name.to_string()));
        }
        Ok(EventPin { _guard: guard })
    }
}

#[async_trait]
impl EventCatalog for MemoryEventCatalog {
    async fn create(&self, name: Option<&str>, summary: EventSummary, payload: Bytes) -> SeisResult<String> {
        let mut events = self.events.write().await;

        let name = match name {
            Some(name) => {
                validate_name(name)?;
                if events.contains_key(name) {
                    return Err(SeisError::DuplicateEvent(name.to_string()));
                }
                name.to_string()
            }
            None => next_free_name(|candidate| events.contains_key(candidate))?,
        };

        let now = Utc::now();
        events.insert(
            name.clone(),
            EventRecord {
                name: name.clone(),
                summary,
                payload,
                created_at: now,
                updated_at: now,
            },
        );
        info!(event = %name, "Created event");
        Ok(name)
    }

    async fn get(&self, name: &str) -> SeisResult<EventRecord> {
        self.events
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| SeisError::not_found(ResourceKind::Event, name))
    }

    async fn exists(&self, name: &str) -> SeisResult<bool> {
        Ok(self.events.read().await.contains_key(name))
    }

    async fn update(&self, name: &str, summary: EventSummary, payload: Bytes) -> SeisResult<()> {
        let mut events = self.events.write().await;
        let record = events
            .get_mut(name)
            .ok_or_else(|| SeisError::not_found(ResourceKind::Event, name))?;
        record.summary = summary;
        record.payload = payload;
        record.updated_at = Utc::now();
        debug!(event = %name, "Updated event");
        Ok(())
    }

    async fn delete(&self, name: &str) -> SeisResult<EventRecord> {
        let removed = self
            .events
            .write()
            .await
            .remove(name)
            .ok_or_else(|| SeisError::not_found(ResourceKind::Event, name))?;
        info!(event = %name, "Deleted event");
        Ok(removed)
    }

    async fn list(&self) -> SeisResult<BoxStream<'static, EventRecord>> {
        let snapshot: Vec<EventRecord> = self.events.read().await.values().cloned().collect();
        Ok(stream::iter(snapshot).boxed())
    }

    async fn count(&self) -> SeisResult<usize> {
        Ok(self.events.read().await.len())
    }
}
