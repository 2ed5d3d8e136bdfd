use chrono::{DateTime, Utc};

/// Timestamps are persisted as fixed-width UTC RFC3339 text with microsecond
/// precision so that lexicographic order equals chronological order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn now_timestamp() -> String {
    format_timestamp(&Utc::now())
}

/// Default worker identity: `host:pid`.
pub(crate) fn default_worker_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string());
    format!("{host}:{}", std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_order_lexicographically() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let later = earlier + chrono::Duration::microseconds(1);
        assert!(format_timestamp(&earlier) < format_timestamp(&later));
    }

    #[test]
    fn timestamps_round_trip_through_chrono() {
        let now = Utc::now();
        let formatted = format_timestamp(&now);
        let parsed: DateTime<Utc> = formatted.parse().expect("should parse as RFC3339");
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn worker_id_contains_pid() {
        let id = default_worker_id();
        assert!(id.ends_with(&format!(":{}", std::process::id())));
    }
}
