//! API version constants and ordering.
//!
//! Engine API versions are dotted pairs (`major.minor`), optionally written
//! with a leading `v`. Ordering is numeric per component, so `1.9 < 1.10`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Latest API version this client speaks; the ceiling for negotiation.
pub const DEFAULT_API_VERSION: &str = "1.40";

/// Last API version released before daemons advertised their own version.
///
/// Used when a probe response carries no version at all.
pub const FALLBACK_API_VERSION: &str = "1.24";

/// A `major.minor` API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

/// Version string that is not a `major.minor` pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid API version '{0}': expected <major>.<minor>")]
pub struct ParseApiVersionError(String);

impl ApiVersion {
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse without failing: missing or non-numeric components count as 0.
    ///
    /// This is the ordering used by negotiation, where a daemon may advertise
    /// something this client does not fully understand.
    #[must_use]
    pub fn parse_lenient(s: &str) -> Self {
        let mut parts = strip_v_prefix(s.trim()).split('.');
        let mut next = || {
            parts
                .next()
                .and_then(|p| p.parse::<u32>().ok())
                .unwrap_or(0)
        };
        let major = next();
        let minor = next();
        Self { major, minor }
    }
}

impl FromStr for ApiVersion {
    type Err = ParseApiVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseApiVersionError(s.to_owned());
        let (major, minor) = strip_v_prefix(s.trim())
            .split_once('.')
            .ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Compare two version strings as dotted pairs.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    ApiVersion::parse_lenient(a).cmp(&ApiVersion::parse_lenient(b))
}

/// `true` when `a` orders strictly before `b`.
#[must_use]
pub fn less_than(a: &str, b: &str) -> bool {
    compare_versions(a, b) == Ordering::Less
}

/// Strip a single leading `v` (`v1.22` -> `1.22`).
#[must_use]
pub fn strip_v_prefix(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strict() {
        assert_eq!("1.22".parse::<ApiVersion>().unwrap(), ApiVersion::new(1, 22));
        assert_eq!("v1.40".parse::<ApiVersion>().unwrap(), ApiVersion::new(1, 40));
        assert!("1".parse::<ApiVersion>().is_err());
        assert!("one.two".parse::<ApiVersion>().is_err());
        assert!("".parse::<ApiVersion>().is_err());
    }

    #[test]
    fn test_numeric_not_lexical_ordering() {
        assert_eq!(compare_versions("1.9", "1.10"), Ordering::Less);
        assert_eq!(compare_versions("2.0", "1.99"), Ordering::Greater);
        assert_eq!(compare_versions("v1.24", "1.24"), Ordering::Equal);
    }

    #[test]
    fn test_lenient_parse_defaults_to_zero() {
        assert_eq!(ApiVersion::parse_lenient("1"), ApiVersion::new(1, 0));
        assert_eq!(ApiVersion::parse_lenient("x.5"), ApiVersion::new(0, 5));
        assert_eq!(ApiVersion::parse_lenient(""), ApiVersion::new(0, 0));
    }

    #[test]
    fn test_less_than() {
        assert!(less_than("1.21", "1.22"));
        assert!(!less_than("1.22", "1.22"));
        assert!(!less_than("9.99", "1.24"));
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        let v = ApiVersion::new(1, 41);
        assert_eq!(v.to_string().parse::<ApiVersion>().unwrap(), v);
    }

    #[test]
    fn test_fallback_is_below_default() {
        assert!(less_than(FALLBACK_API_VERSION, DEFAULT_API_VERSION));
    }
}
