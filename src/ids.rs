//! Client-facing string identifiers and the store's native `ObjectId`.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

const HEX_LEN: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("identifier is empty")]
    Empty,

    #[error("identifier must be 24 hex characters, got {0}")]
    Length(usize),

    #[error("identifier contains non-hex characters")]
    NotHex,
}

/// 12-byte document identifier: seconds timestamp, per-process random, counter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

static PROCESS_UNIQUE: LazyLock<[u8; 5]> = LazyLock::new(|| {
    let bytes = Uuid::new_v4().into_bytes();
    [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4]]
});

static COUNTER: LazyLock<AtomicU32> = LazyLock::new(|| {
    let bytes = Uuid::new_v4().into_bytes();
    AtomicU32::new(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
});

impl ObjectId {
    /// The timestamp saturates at `u32::MAX` (year 2106) rather than wrapping.
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    fn at(now: DateTime<Utc>) -> Self {
        let secs = u32::try_from(now.timestamp().max(0)).unwrap_or(u32::MAX);
        let count = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(&*PROCESS_UNIQUE);
        bytes[9..12].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub fn parse_str(raw: &str) -> Result<Self, IdError> {
        if raw.is_empty() {
            return Err(IdError::Empty);
        }
        if raw.len() != HEX_LEN {
            return Err(IdError::Length(raw.len()));
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(raw, &mut bytes).map_err(|_| IdError::NotHex)?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Creation time embedded in the first four bytes.
    pub fn timestamp(&self) -> DateTime<Utc> {
        let secs = u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]]);
        Utc.timestamp_opt(i64::from(secs), 0)
            .single()
            .unwrap_or_default()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse_str(&raw).map_err(serde::de::Error::custom)
    }
}

pub fn to_internal_id(raw: &str) -> Result<ObjectId, IdError> {
    ObjectId::parse_str(raw)
}

pub fn new_id() -> ObjectId {
    ObjectId::new()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_parse_valid_identifier() {
        let id = to_internal_id("65a1f0c2e4b0a1b2c3d4e5f6").expect("valid id");
        assert_eq!(id.to_hex(), "65a1f0c2e4b0a1b2c3d4e5f6");
    }

    #[test]
    fn test_parse_normalizes_uppercase() {
        let id = to_internal_id("65A1F0C2E4B0A1B2C3D4E5F6").expect("valid id");
        assert_eq!(id.to_string(), "65a1f0c2e4b0a1b2c3d4e5f6");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(to_internal_id(""), Err(IdError::Empty));
        assert_eq!(to_internal_id("bad-id"), Err(IdError::Length(6)));
        assert_eq!(
            to_internal_id("zzzzzzzzzzzzzzzzzzzzzzzz"),
            Err(IdError::NotHex)
        );
    }

    #[test]
    fn test_new_ids_are_unique_and_parseable() {
        let ids: HashSet<ObjectId> = (0..1000).map(|_| new_id()).collect();
        assert_eq!(ids.len(), 1000);

        for id in ids.iter().take(10) {
            assert_eq!(to_internal_id(&id.to_hex()), Ok(*id));
        }
    }

    #[test]
    fn test_timestamp_is_recent() {
        let id = new_id();
        let age = Utc::now() - id.timestamp();
        assert!(age.num_seconds().abs() < 5);
    }

    #[test]
    fn test_timestamp_saturates_instead_of_wrapping() {
        let far_future = Utc.timestamp_opt(i64::from(u32::MAX) + 1_000, 0).unwrap();
        let id = ObjectId::at(far_future);
        assert_eq!(id.timestamp().timestamp(), i64::from(u32::MAX));

        let before_epoch = Utc.timestamp_opt(-1_000, 0).unwrap();
        assert_eq!(ObjectId::at(before_epoch).timestamp().timestamp(), 0);
    }

    #[test]
    fn test_serde_as_hex_string() {
        let id = to_internal_id("65a1f0c2e4b0a1b2c3d4e5f6").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"65a1f0c2e4b0a1b2c3d4e5f6\"");

        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<ObjectId>("\"nope\"").is_err());
    }
}
