//! Starting position in the consumed topic

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::ConfigError;

/// Where the consumer starts reading the consumed topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOffset {
    /// Oldest available message
    Beginning,
    /// Only messages produced after the consumer joins
    End,
    /// Offset committed by the consumer group
    Stored,
    /// Explicit offset within the partition
    Offset(i64),
}

impl StartOffset {
    /// `auto.offset.reset` value for a group subscription, if this policy maps to one
    pub fn auto_offset_reset(&self) -> Option<&'static str> {
        match self {
            Self::Beginning => Some("earliest"),
            Self::End => Some("latest"),
            Self::Stored | Self::Offset(_) => None,
        }
    }
}

impl FromStr for StartOffset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "beginning" => Ok(Self::Beginning),
            "end" => Ok(Self::End),
            "stored" => Ok(Self::Stored),
            other => {
                let offset: i64 = other.parse().map_err(|e: std::num::ParseIntError| {
                    ConfigError::Parse {
                        key: "offset".to_string(),
                        value: other.to_string(),
                        reason: e.to_string(),
                    }
                })?;

                if offset < 0 {
                    return Err(ConfigError::Parse {
                        key: "offset".to_string(),
                        value: other.to_string(),
                        reason: "explicit offsets must not be negative".to_string(),
                    });
                }

                Ok(Self::Offset(offset))
            }
        }
    }
}

impl fmt::Display for StartOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Beginning => write!(f, "beginning"),
            Self::End => write!(f, "end"),
            Self::Stored => write!(f, "stored"),
            Self::Offset(offset) => write!(f, "{}", offset),
        }
    }
}

impl Serialize for StartOffset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for StartOffset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StartOffsetVisitor;

        impl<'de> Visitor<'de> for StartOffsetVisitor {
            type Value = StartOffset;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "\"beginning\", \"end\", \"stored\" or a non-negative offset")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                if v < 0 {
                    return Err(E::custom("explicit offsets must not be negative"));
                }
                Ok(StartOffset::Offset(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                i64::try_from(v)
                    .map(StartOffset::Offset)
                    .map_err(|_| E::custom("offset out of range"))
            }
        }

        deserializer.deserialize_any(StartOffsetVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_policies() {
        assert_eq!("beginning".parse::<StartOffset>().unwrap(), StartOffset::Beginning);
        assert_eq!("end".parse::<StartOffset>().unwrap(), StartOffset::End);
        assert_eq!(" stored ".parse::<StartOffset>().unwrap(), StartOffset::Stored);
    }

    #[test]
    fn test_parse_explicit_offset() {
        assert_eq!("1024".parse::<StartOffset>().unwrap(), StartOffset::Offset(1024));
    }

    #[test]
    fn test_parse_rejects_garbage_and_negative() {
        let err = "latest-ish".parse::<StartOffset>().unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref key, .. } if key == "offset"));

        assert!("-5".parse::<StartOffset>().is_err());
    }

    #[test]
    fn test_auto_offset_reset_mapping() {
        assert_eq!(StartOffset::Beginning.auto_offset_reset(), Some("earliest"));
        assert_eq!(StartOffset::End.auto_offset_reset(), Some("latest"));
        assert_eq!(StartOffset::Stored.auto_offset_reset(), None);
        assert_eq!(StartOffset::Offset(7).auto_offset_reset(), None);
    }

    #[test]
    fn test_display_matches_parse() {
        for offset in [
            StartOffset::Beginning,
            StartOffset::End,
            StartOffset::Stored,
            StartOffset::Offset(42),
        ] {
            assert_eq!(offset.to_string().parse::<StartOffset>().unwrap(), offset);
        }
    }
}
