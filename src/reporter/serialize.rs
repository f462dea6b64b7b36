/// Durations in reports are fractional milliseconds.
pub mod duration_ms {
    use crate::time::as_millis_f64;
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(round(as_millis_f64(duration)))
    }

    pub fn round(millis: f64) -> f64 {
        (millis * 1_000.0).round() / 1_000.0
    }
}

/// Run timestamps in RFC 3339 with the local offset.
pub mod timestamp {
    use chrono::{DateTime, Local, SecondsFormat};
    use serde::Serializer;

    pub fn serialize<S>(moment: &DateTime<Local>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&moment.to_rfc3339_opts(SecondsFormat::Secs, false))
    }
}
