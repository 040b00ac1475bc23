use backfill_resources::{ImportedEvent, Platform};
use serde::Deserialize;
use serde_json::Value;

use super::{EventTarget, PlatformMapper, decode_row, has_fields, non_empty, parse_timestamp};

const PAGEVIEW: &str = "pageview";

/// Rows of the Umami `website_event` export.
///
/// `event_type` 1 is a page view, 2 a custom event named by `event_name`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UmamiMapper;

#[derive(Debug, Deserialize)]
struct UmamiRow<'a> {
    #[serde(borrow)]
    session_id: Option<&'a str>,
    url_path: &'a str,
    created_at: &'a str,
    event_type: EventType,
    hostname: &'a str,
    #[serde(borrow, default)]
    event_name: Option<&'a str>,
    #[serde(borrow, default)]
    referrer_domain: Option<&'a str>,
}

/// Exports written by some databases quote the event type.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EventType {
    Number(u64),
    Text(String),
}

impl EventType {
    fn code(&self) -> Option<u64> {
        match self {
            EventType::Number(code) => Some(*code),
            EventType::Text(code) => code.trim().parse().ok(),
        }
    }
}

impl PlatformMapper for UmamiMapper {
    fn platform(&self) -> Platform {
        Platform::Umami
    }

    fn matches(&self, event: &Value) -> bool {
        has_fields(event, &["session_id", "url_path", "created_at", "event_type"])
    }

    fn transform_event(&self, event: &Value, target: &EventTarget) -> Option<ImportedEvent> {
        let row: UmamiRow<'_> = decode_row(event)?;

        let timestamp = parse_timestamp(non_empty(row.created_at)?)?;
        let pathname = non_empty(row.url_path)?;
        let hostname = non_empty(row.hostname)?;

        let event_name = match row.event_type.code()? {
            1 => PAGEVIEW,
            2 => row.event_name.and_then(non_empty)?,
            _ => return None,
        };

        Some(ImportedEvent {
            site: target.site.clone(),
            import_id: target.import_id,
            batch_id: target.batch_id.clone(),
            timestamp,
            session_id: row.session_id.and_then(non_empty).map(str::to_string),
            hostname: hostname.to_string(),
            pathname: pathname.to_string(),
            referrer: row.referrer_domain.and_then(non_empty).map(str::to_string),
            event_name: event_name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use backfill_resources::{ImportId, SiteName};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    fn target() -> EventTarget {
        EventTarget {
            site: SiteName::new_unchecked("blog"),
            import_id: ImportId::new(),
            batch_id: Some("b1".to_string()),
        }
    }

    #[test]
    fn test_transform_pageview() {
        let target = target();
        let row = json!({
            "session_id": "0b1c",
            "url_path": "/pricing",
            "created_at": "2024-02-10 08:00:00",
            "event_type": "1",
            "hostname": "example.com",
            "referrer_domain": "news.ycombinator.com",
        });

        let event = UmamiMapper.transform_event(&row, &target).unwrap();
        assert_eq!(event.timestamp, Utc.with_ymd_and_hms(2024, 2, 10, 8, 0, 0).unwrap());
        assert_eq!(event.pathname, "/pricing");
        assert_eq!(event.event_name, "pageview");
        assert_eq!(event.session_id.as_deref(), Some("0b1c"));
        assert_eq!(event.referrer.as_deref(), Some("news.ycombinator.com"));
        assert_eq!(event.import_id, target.import_id);
        assert_eq!(event.batch_id.as_deref(), Some("b1"));
    }

    #[test]
    fn test_transform_custom_event() {
        let row = json!({
            "session_id": "0b1c",
            "url_path": "/signup",
            "created_at": "2024-02-10T08:00:00Z",
            "event_type": 2,
            "event_name": "signup",
            "hostname": "example.com",
            "referrer_domain": "",
        });

        let event = UmamiMapper.transform_event(&row, &target()).unwrap();
        assert_eq!(event.event_name, "signup");
        assert_eq!(event.referrer, None);
    }

    #[test]
    fn test_invalid_rows_are_rejected() {
        let valid = json!({
            "session_id": "0b1c",
            "url_path": "/",
            "created_at": "2024-02-10 08:00:00",
            "event_type": 1,
            "hostname": "example.com",
        });

        let mut bad_timestamp = valid.clone();
        bad_timestamp["created_at"] = json!("last tuesday");
        let mut missing_host = valid.clone();
        missing_host["hostname"] = json!("");
        let mut unnamed_event = valid.clone();
        unnamed_event["event_type"] = json!(2);
        let mut unknown_type = valid.clone();
        unknown_type["event_type"] = json!(7);
        let mut numeric_host = valid.clone();
        numeric_host["hostname"] = json!(42);
        let mut quoted_type = valid.clone();
        quoted_type["event_type"] = json!("1");

        let rows = vec![
            valid,
            bad_timestamp,
            missing_host,
            unnamed_event,
            unknown_type,
            numeric_host,
            quoted_type,
        ];
        let events = UmamiMapper.transform(&rows, &target());
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|event| event.event_name == PAGEVIEW));
    }
}
