//! Mapping of third-party export rows to imported events.
//!
//! Each supported platform has a [`PlatformMapper`] that recognizes the
//! platform's row shape and converts rows to [`ImportedEvent`]s. Rows that
//! cannot be converted are dropped by the mapper and counted as invalid by
//! the caller.

mod simple_analytics;
mod umami;

use std::sync::Arc;

use backfill_resources::{ImportId, ImportedEvent, Platform, SiteName};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

pub use self::simple_analytics::SimpleAnalyticsMapper;
pub use self::umami::UmamiMapper;

/// Where transformed events are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTarget {
    pub site: SiteName,
    pub import_id: ImportId,
    pub batch_id: Option<String>,
}

pub trait PlatformMapper: Send + Sync {
    fn platform(&self) -> Platform;

    /// Whether the row has this platform's shape.
    fn matches(&self, event: &Value) -> bool;

    /// Convert one row, or `None` if the row is invalid.
    fn transform_event(&self, event: &Value, target: &EventTarget) -> Option<ImportedEvent>;

    /// Convert a batch of rows, dropping invalid ones.
    fn transform(&self, events: &[Value], target: &EventTarget) -> Vec<ImportedEvent> {
        events
            .iter()
            .filter_map(|event| self.transform_event(event, target))
            .collect()
    }
}

pub type PlatformMapperRef = Arc<dyn PlatformMapper>;

/// The known platforms, in detection order.
#[derive(Clone)]
pub struct PlatformRegistry {
    mappers: Vec<PlatformMapperRef>,
}

impl PlatformRegistry {
    pub fn new(mappers: Vec<PlatformMapperRef>) -> Self {
        Self { mappers }
    }

    /// Return the platform of the first mapper matching the row.
    pub fn detect(&self, event: &Value) -> Option<Platform> {
        self.mappers
            .iter()
            .find(|mapper| mapper.matches(event))
            .map(|mapper| mapper.platform())
    }

    pub fn mapper(&self, platform: Platform) -> Option<PlatformMapperRef> {
        self.mappers
            .iter()
            .find(|mapper| mapper.platform() == platform)
            .cloned()
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::new(vec![Arc::new(UmamiMapper), Arc::new(SimpleAnalyticsMapper)])
    }
}

/// Decode a row into a platform's typed row, or `None` if it doesn't fit.
fn decode_row<'de, T: Deserialize<'de>>(event: &'de Value) -> Option<T> {
    T::deserialize(event).ok()
}

/// The trimmed value, unless blank.
fn non_empty(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|value| !value.is_empty())
}

fn has_fields(event: &Value, keys: &[&str]) -> bool {
    event.is_object() && keys.iter().all(|key| event.get(key).is_some())
}

/// Parse RFC 3339 timestamps and naive `YYYY-MM-DD HH:MM:SS` timestamps in UTC.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|timestamp| timestamp.and_utc())
}
