//! serde helpers for byte fields carried as standard base64 strings.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<T, S>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: AsRef<[u8]>,
    S: Serializer,
{
    serializer.serialize_str(&STANDARD.encode(bytes.as_ref()))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
}

/// An `i64` carried as base64 of its 8 big-endian bytes (handshake timestamps).
pub mod be_i64 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value.to_be_bytes()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let raw = super::deserialize(deserializer)?;
        let bytes: [u8; 8] = raw
            .as_slice()
            .try_into()
            .map_err(|_| serde::de::Error::custom(format!("timestamp must be 8 bytes, got {}", raw.len())))?;
        Ok(i64::from_be_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        #[serde(with = "super")]
        data: Vec<u8>,
        #[serde(with = "super::be_i64")]
        ts: i64,
    }

    #[test]
    fn timestamp_is_eight_big_endian_bytes() {
        let s = Sample { data: vec![0xde, 0xad], ts: 1 };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["data"], "3q0=");
        assert_eq!(v["ts"], "AAAAAAAAAAE=");
    }

    #[test]
    fn short_timestamp_is_rejected() {
        let raw = r#"{"data":"","ts":"AAE="}"#;
        assert!(serde_json::from_str::<Sample>(raw).is_err());
    }
}
