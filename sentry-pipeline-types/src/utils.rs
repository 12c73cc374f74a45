use std::convert::{TryFrom, TryInto};
use std::time::{Duration, SystemTime};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Converts a `SystemTime` object into a float timestamp.
pub fn datetime_to_timestamp(st: &SystemTime) -> f64 {
    match st.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(duration) => duration.as_secs_f64(),
        Err(_) => 0.0,
    }
}

/// Converts a float timestamp back into a `SystemTime`.
pub fn timestamp_to_datetime(ts: f64) -> Option<SystemTime> {
    if !ts.is_finite() || ts < 0.0 {
        return None;
    }
    SystemTime::UNIX_EPOCH.checked_add(Duration::from_secs_f64(ts))
}

/// Formats a `SystemTime` as RFC3339, or an empty string if it predates the epoch.
pub fn to_rfc3339(st: &SystemTime) -> String {
    st.duration_since(SystemTime::UNIX_EPOCH)
        .ok()
        .and_then(|duration| TryFrom::try_from(duration).ok())
        .and_then(|duration| OffsetDateTime::UNIX_EPOCH.checked_add(duration))
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_default()
}

fn parse_rfc3339(value: &str) -> Option<SystemTime> {
    let dt = OffsetDateTime::parse(value, &Rfc3339).ok()?;
    let secs = u64::try_from(dt.unix_timestamp()).ok()?;
    SystemTime::UNIX_EPOCH.checked_add(Duration::new(secs, dt.nanosecond()))
}

/// Serializes a `SystemTime` as float seconds since the epoch.
///
/// Deserialization additionally accepts integers and RFC3339 strings.
pub mod ts_seconds_float {
    use std::fmt;

    use serde::{de, ser};

    use super::*;

    pub fn deserialize<'de, D>(d: D) -> Result<SystemTime, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        d.deserialize_any(SecondsTimestampVisitor)
    }

    pub fn serialize<S>(st: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        match st.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(duration) if duration.subsec_nanos() == 0 => {
                serializer.serialize_u64(duration.as_secs())
            }
            Ok(duration) => serializer.serialize_f64(duration.as_secs_f64()),
            Err(_) => Err(ser::Error::custom(format!(
                "invalid `SystemTime` instance: {:?}",
                st
            ))),
        }
    }

    struct SecondsTimestampVisitor;

    impl de::Visitor<'_> for SecondsTimestampVisitor {
        type Value = SystemTime;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            write!(formatter, "a unix timestamp")
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<SystemTime, E> {
            timestamp_to_datetime(value)
                .ok_or_else(|| E::custom(format!("invalid timestamp: {}", value)))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<SystemTime, E> {
            let value: u64 = value.try_into().map_err(|e| E::custom(format!("{}", e)))?;
            self.visit_u64(value)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<SystemTime, E> {
            SystemTime::UNIX_EPOCH
                .checked_add(Duration::from_secs(value))
                .ok_or_else(|| E::custom(format!("invalid timestamp: {}", value)))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<SystemTime, E> {
            parse_rfc3339(value).ok_or_else(|| E::custom(format!("invalid timestamp: {}", value)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_roundtrip() {
        let st = SystemTime::UNIX_EPOCH + Duration::from_millis(1_500);
        assert_eq!(datetime_to_timestamp(&st), 1.5);
        assert_eq!(timestamp_to_datetime(1.5), Some(st));
        assert_eq!(timestamp_to_datetime(-1.0), None);
    }

    #[test]
    fn test_rfc3339() {
        let st = SystemTime::UNIX_EPOCH + Duration::from_secs(86_400);
        assert_eq!(to_rfc3339(&st), "1970-01-02T00:00:00Z");
        assert_eq!(parse_rfc3339("1970-01-02T00:00:00Z"), Some(st));
    }
}
