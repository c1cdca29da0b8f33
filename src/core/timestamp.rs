//! Purpose: Microsecond timestamps used by signed packets, auth tokens and sessions.
//! Exports: `Timestamp`.
//! Invariants: `Timestamp::now` is strictly increasing within one process.
use crate::core::error::{Error, ErrorKind};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LAST_ISSUED: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn now() -> Self {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_micros() as u64)
            .unwrap_or_default();
        let mut previous = LAST_ISSUED.load(Ordering::Relaxed);
        loop {
            let next = wall.max(previous + 1);
            match LAST_ISSUED.compare_exchange_weak(
                previous,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Self(next),
                Err(actual) => previous = actual,
            }
        }
    }

    pub fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let array: [u8; 8] = bytes.try_into().map_err(|_| {
            Error::new(ErrorKind::Corrupt)
                .with_message(format!("timestamp must be 8 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(u64::from_be_bytes(array)))
    }

    /// Absolute distance to `other` in microseconds.
    pub fn abs_diff(&self, other: Timestamp) -> u64 {
        self.0.abs_diff(other.0)
    }

    pub fn to_rfc3339(&self) -> Result<String, Error> {
        use time::format_description::well_known::Rfc3339;
        let ts = time::OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.0) * 1_000)
            .map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("invalid timestamp")
                    .with_source(err)
            })?;
        ts.format(&Rfc3339).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("timestamp format failed")
                .with_source(err)
        })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Wire form is the 8 big-endian bytes, so encoded timestamps sort by time.
impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_bytes().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = <[u8; 8]>::deserialize(deserializer)?;
        Ok(Self(u64::from_be_bytes(bytes)))
    }
}

impl From<u64> for Timestamp {
    fn from(micros: u64) -> Self {
        Self(micros)
    }
}
