/// Durations in settings files are written as `"30s"`, `"250ms"`; a bare
/// integer is read as milliseconds.
pub mod duration {
    use crate::time::timeunit::parse_duration;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(DurationVisitor)
    }

    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a duration such as \"30s\" or a number of milliseconds")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
            match v.trim().parse::<u64>() {
                Ok(millis) => Ok(Duration::from_millis(millis)),
                Err(_) => parse_duration(v).map_err(|e| E::custom(e.to_string())),
            }
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
            Ok(Duration::from_millis(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
            if v < 0 {
                return Err(E::custom("duration cannot be negative"));
            }
            Ok(Duration::from_millis(v as u64))
        }
    }

    #[cfg(test)]
    mod tests {
        use serde_derive::{Deserialize, Serialize};
        use std::time::Duration;

        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Holder {
            #[serde(with = "super")]
            timeout: Duration,
        }

        #[test]
        fn test_reads_units_and_plain_millis() {
            let parsed: Holder = serde_json::from_str(r#"{"timeout": "2s"}"#).unwrap();
            assert_eq!(parsed.timeout, Duration::from_secs(2));
            let parsed: Holder = serde_json::from_str(r#"{"timeout": 750}"#).unwrap();
            assert_eq!(parsed.timeout, Duration::from_millis(750));
            let parsed: Holder = serde_json::from_str(r#"{"timeout": "750"}"#).unwrap();
            assert_eq!(parsed.timeout, Duration::from_millis(750));
            assert!(serde_json::from_str::<Holder>(r#"{"timeout": "soon"}"#).is_err());
            assert!(serde_json::from_str::<Holder>(r#"{"timeout": -5}"#).is_err());
        }

        #[test]
        fn test_written_back_as_millis() {
            let holder = Holder {
                timeout: Duration::from_secs(3),
            };
            assert_eq!(serde_json::to_string(&holder).unwrap(), r#"{"timeout":"3000ms"}"#);
        }
    }
}
