use backfill_resources::{ImportedEvent, Platform};
use serde::Deserialize;
use serde_json::Value;

use super::{EventTarget, PlatformMapper, decode_row, has_fields, non_empty, parse_timestamp};

/// Rows of the Simple Analytics data export.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleAnalyticsMapper;

#[derive(Debug, Deserialize)]
struct SimpleAnalyticsRow<'a> {
    added_iso: &'a str,
    path: &'a str,
    hostname: &'a str,
    #[serde(borrow, default)]
    session_id: Option<&'a str>,
    #[serde(borrow, default)]
    referrer_hostname: Option<&'a str>,
    /// Unset for page views.
    #[serde(borrow, default)]
    event: Option<&'a str>,
}

impl PlatformMapper for SimpleAnalyticsMapper {
    fn platform(&self) -> Platform {
        Platform::SimpleAnalytics
    }

    fn matches(&self, event: &Value) -> bool {
        has_fields(event, &["added_iso", "path", "hostname"])
    }

    fn transform_event(&self, event: &Value, target: &EventTarget) -> Option<ImportedEvent> {
        let row: SimpleAnalyticsRow<'_> = decode_row(event)?;

        let timestamp = parse_timestamp(non_empty(row.added_iso)?)?;
        let pathname = non_empty(row.path)?;
        let hostname = non_empty(row.hostname)?;
        let event_name = row.event.and_then(non_empty).unwrap_or("pageview");

        Some(ImportedEvent {
            site: target.site.clone(),
            import_id: target.import_id,
            batch_id: target.batch_id.clone(),
            timestamp,
            session_id: row.session_id.and_then(non_empty).map(str::to_string),
            hostname: hostname.to_string(),
            pathname: pathname.to_string(),
            referrer: row.referrer_hostname.and_then(non_empty).map(str::to_string),
            event_name: event_name.to_string(),
        })
    }
}
