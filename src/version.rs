//! ActiveSync protocol versions, as advertised in `MS-ASProtocolVersions`.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref LEADING_DIGITS: Regex = Regex::new(r"^\s*(\d+)").unwrap();
}

/// A `major.minor` protocol version such as `12.1` or `14.0`.
///
/// Parsing is lenient: each dotted component contributes its leading digits, so `"14.0b"` is
/// `14.0`. A component with no digits (or a missing minor part) is left undefined, and any
/// comparison involving an undefined component is false. In particular a malformed version is
/// not equal to itself, and `ne` is always the exact complement of `eq`.
#[derive(Clone, Copy, Debug)]
pub struct Version {
    major: Option<u32>,
    minor: Option<u32>,
}

#[allow(clippy::should_implement_trait)]
impl Version {
    /// Build a version from its two components.
    pub fn new(major: u32, minor: u32) -> Version {
        Version {
            major: Some(major),
            minor: Some(minor),
        }
    }

    /// Parse a `"major.minor"` string. Never fails; see the type docs for how junk is handled.
    pub fn parse(s: &str) -> Version {
        let mut parts = s.split('.').map(leading_number);
        Version {
            major: parts.next().flatten(),
            minor: parts.next().flatten(),
        }
    }

    /// The major component, if it parsed.
    pub fn major(&self) -> Option<u32> {
        self.major
    }

    /// The minor component, if it parsed.
    pub fn minor(&self) -> Option<u32> {
        self.minor
    }

    /// True if both components parsed.
    pub fn is_valid(&self) -> bool {
        self.parts().is_some()
    }

    fn parts(&self) -> Option<(u32, u32)> {
        Some((self.major?, self.minor?))
    }

    /// `self >= other`. Every other comparison agrees with this one.
    pub fn gte(&self, other: impl Into<Version>) -> bool {
        let other: Version = other.into();
        match (self.parts(), other.parts()) {
            (Some((a, b)), Some((c, d))) => a > c || (a == c && b >= d),
            _ => false,
        }
    }

    /// `self > other`.
    pub fn gt(&self, other: impl Into<Version>) -> bool {
        let other: Version = other.into();
        self.gte(other) && !other.gte(*self)
    }

    /// `self <= other`.
    pub fn lte(&self, other: impl Into<Version>) -> bool {
        let other: Version = other.into();
        other.gte(*self)
    }

    /// `self < other`.
    pub fn lt(&self, other: impl Into<Version>) -> bool {
        let other: Version = other.into();
        other.gt(*self)
    }

    /// `self == other`.
    pub fn eq(&self, other: impl Into<Version>) -> bool {
        let other: Version = other.into();
        self.gte(other) && other.gte(*self)
    }

    /// `self != other`.
    pub fn ne(&self, other: impl Into<Version>) -> bool {
        !self.eq(other)
    }
}

fn leading_number(part: &str) -> Option<u32> {
    LEADING_DIGITS
        .captures(part)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

impl PartialEq for Version {
    fn eq(&self, other: &Version) -> bool {
        Version::eq(self, *other)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Version) -> Option<Ordering> {
        Some(self.parts()?.cmp(&other.parts()?))
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Version {
        Version::parse(s)
    }
}

impl From<&String> for Version {
    fn from(s: &String) -> Version {
        Version::parse(s)
    }
}

impl From<String> for Version {
    fn from(s: String) -> Version {
        Version::parse(&s)
    }
}

impl From<&Version> for Version {
    fn from(v: &Version) -> Version {
        *v
    }
}

impl FromStr for Version {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Version, Infallible> {
        Ok(Version::parse(s))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parts() {
            Some((major, minor)) => write!(f, "{}.{}", major, minor),
            None => f.write_str("invalid"),
        }
    }
}
