use std::cmp;
use std::convert::TryFrom;
use std::fmt;
use std::time;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{Error, Result};
use crate::record::{FieldValue, Record, RecordBuilder};
use crate::schema::SchemaPool;

const MAX_NANOSEC: u32 = 999_999_999;

/// A point in time, as seconds and nanoseconds since the Unix epoch (UTC).
///
/// This is the external timestamp handle that may show up in input maps. It converts to and from
/// the well-known timestamp record type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Timestamp {
    sec: i64,
    nano: u32,
}

impl Timestamp {
    /// Create a timestamp from a raw seconds + nanoseconds value
    pub fn from_utc(sec: i64, nano: u32) -> Option<Timestamp> {
        if nano > MAX_NANOSEC {
            None
        } else {
            Some(Timestamp { sec, nano })
        }
    }

    pub fn from_sec(sec: i64) -> Timestamp {
        Timestamp { sec, nano: 0 }
    }

    /// Return the UNIX timestamp (number of seconds since January 1, 1970
    /// 0:00:00 UTC).
    pub fn timestamp_utc(&self) -> i64 {
        self.sec
    }

    /// Returns the number of nanoseconds past the second count.
    pub fn timestamp_subsec_nanos(&self) -> u32 {
        self.nano
    }

    /// Convert into a record of the well-known timestamp type from `pool`.
    pub fn to_record(&self, pool: &SchemaPool) -> Result<Record> {
        let mut builder = RecordBuilder::new(&pool.timestamp());
        builder.set("seconds", FieldValue::I64(self.sec))?;
        builder.set("nanos", FieldValue::I32(self.nano as i32))?;
        Ok(builder.build())
    }

    /// Render as an RFC 3339 string in UTC, with 0, 3, 6, or 9 fractional digits. Returns `None`
    /// if the time is outside the range chrono can represent.
    pub fn to_rfc3339(&self) -> Option<String> {
        DateTime::<Utc>::from_timestamp(self.sec, self.nano)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    /// Parse an RFC 3339 string, with any offset.
    pub fn parse_rfc3339(s: &str) -> Option<Timestamp> {
        let dt = DateTime::parse_from_rfc3339(s).ok()?;
        Timestamp::from_utc(dt.timestamp(), dt.timestamp_subsec_nanos())
    }
}

impl TryFrom<&Record> for Timestamp {
    type Error = Error;
    fn try_from(record: &Record) -> Result<Self> {
        if !record.descriptor().is_well_known_timestamp() {
            return Err(Error::Decoding(format!(
                "Record of type '{}' isn't a timestamp",
                record.descriptor().full_name()
            )));
        }
        let sec = record.get("seconds").and_then(|v| v.as_i64()).unwrap_or(0);
        let nano = record.get("nanos").and_then(|v| v.as_i64()).unwrap_or(0);
        u32::try_from(nano)
            .ok()
            .and_then(|nano| Timestamp::from_utc(sec, nano))
            .ok_or_else(|| Error::Decoding(format!("Timestamp nanos out of range: {}", nano)))
    }
}

impl From<time::SystemTime> for Timestamp {
    fn from(t: time::SystemTime) -> Self {
        match t.duration_since(time::SystemTime::UNIX_EPOCH) {
            Ok(d) => Timestamp {
                sec: d.as_secs() as i64,
                nano: d.subsec_nanos(),
            },
            Err(e) => {
                let d = e.duration();
                let (sec, nano) = (d.as_secs() as i64, d.subsec_nanos());
                if nano == 0 {
                    Timestamp { sec: -sec, nano: 0 }
                } else {
                    Timestamp {
                        sec: -sec - 1,
                        nano: 1_000_000_000 - nano,
                    }
                }
            }
        }
    }
}

impl cmp::Ord for Timestamp {
    fn cmp(&self, other: &Timestamp) -> cmp::Ordering {
        if self.sec == other.sec {
            self.nano.cmp(&other.nano)
        } else {
            self.sec.cmp(&other.sec)
        }
    }
}

impl cmp::PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Timestamp) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "UTC: {} sec + {} ns", self.sec, self.nano)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::SchemaPoolBuilder;

    #[test]
    fn nanos_range() {
        assert!(Timestamp::from_utc(0, MAX_NANOSEC).is_some());
        assert!(Timestamp::from_utc(0, MAX_NANOSEC + 1).is_none());
        assert!(Timestamp::from_sec(1) > Timestamp::from_utc(0, MAX_NANOSEC).unwrap());
    }

    #[test]
    fn record_roundtrip() {
        let pool = SchemaPoolBuilder::new().build().unwrap();
        let ts = Timestamp::from_utc(1_600_000_000, 250).unwrap();
        let record = ts.to_record(&pool).unwrap();
        assert_eq!(record.get("seconds"), Some(&FieldValue::I64(1_600_000_000)));
        assert_eq!(Timestamp::try_from(&record).unwrap(), ts);

        let zero = Timestamp::from_sec(0).to_record(&pool).unwrap();
        assert!(zero.is_empty());
    }

    #[test]
    fn rfc3339() {
        let ts = Timestamp::from_utc(0, 0).unwrap();
        assert_eq!(ts.to_rfc3339().unwrap(), "1970-01-01T00:00:00Z");
        let ts = Timestamp::from_utc(1, 500_000_000).unwrap();
        assert_eq!(ts.to_rfc3339().unwrap(), "1970-01-01T00:00:01.500Z");
        assert_eq!(Timestamp::parse_rfc3339("1970-01-01T00:00:01.500Z"), Some(ts));
        assert_eq!(
            Timestamp::parse_rfc3339("1970-01-01T01:00:01.5+01:00"),
            Some(ts)
        );
        assert_eq!(Timestamp::parse_rfc3339("yesterday"), None);
    }

    #[test]
    fn before_epoch() {
        let t = time::SystemTime::UNIX_EPOCH - time::Duration::from_millis(1500);
        let ts = Timestamp::from(t);
        assert_eq!(ts.timestamp_utc(), -2);
        assert_eq!(ts.timestamp_subsec_nanos(), 500_000_000);
    }
}
