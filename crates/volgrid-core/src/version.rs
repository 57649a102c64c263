//! Cluster definition version gate.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, CoreResult};

/// Oldest cluster definition layout this build understands.
pub const MIN_TOPOLOGY_VERSION: TopologyVersion = TopologyVersion { major: 1, minor: 0 };

/// A `major.minor` cluster definition version.
///
/// Ordering is numeric on each component, so `10.0` is newer than `9.9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TopologyVersion {
    pub major: u32,
    pub minor: u32,
}

impl TopologyVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Reject versions older than `required`.
    pub fn ensure_at_least(self, required: TopologyVersion) -> CoreResult<()> {
        if self < required {
            return Err(CoreError::VersionMismatch {
                found: self,
                required,
            });
        }
        Ok(())
    }
}

impl Ord for TopologyVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
    }
}

impl PartialOrd for TopologyVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TopologyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for TopologyVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidVersion(s.to_string());
        let (major, minor) = s.trim().split_once('.').ok_or_else(invalid)?;
        Ok(TopologyVersion {
            major: major.trim().parse().map_err(|_| invalid())?,
            minor: minor.trim().parse().map_err(|_| invalid())?,
        })
    }
}

impl Serialize for TopologyVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TopologyVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_major_minor() {
        let v: TopologyVersion = "1.2".parse().unwrap();
        assert_eq!(v, TopologyVersion::new(1, 2));
        assert_eq!(v.to_string(), "1.2");
    }

    #[test]
    fn rejects_malformed() {
        assert!("1".parse::<TopologyVersion>().is_err());
        assert!("one.two".parse::<TopologyVersion>().is_err());
        assert!("1.-1".parse::<TopologyVersion>().is_err());
    }

    #[test]
    fn older_version_rejected() {
        let found: TopologyVersion = "0.9".parse().unwrap();
        let err = found.ensure_at_least(MIN_TOPOLOGY_VERSION).unwrap_err();
        assert!(matches!(err, CoreError::VersionMismatch { .. }));
    }

    #[test]
    fn equal_and_newer_accepted() {
        assert!(TopologyVersion::new(1, 0).ensure_at_least(MIN_TOPOLOGY_VERSION).is_ok());
        assert!(TopologyVersion::new(1, 7).ensure_at_least(MIN_TOPOLOGY_VERSION).is_ok());
        assert!(TopologyVersion::new(2, 0).ensure_at_least(TopologyVersion::new(1, 9)).is_ok());
    }

    #[test]
    fn comparison_is_numeric_not_lexical() {
        // "10" sorts before "9" as text.
        assert!(TopologyVersion::new(10, 0) > TopologyVersion::new(9, 0));
        assert!(TopologyVersion::new(1, 10) > TopologyVersion::new(1, 9));
        assert!(TopologyVersion::new(1, 9).ensure_at_least(TopologyVersion::new(1, 10)).is_err());
    }
}
