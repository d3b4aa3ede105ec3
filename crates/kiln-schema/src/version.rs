//! Versions, version ranges and the version field of a coordinate.
//!
//! Ordering follows the conventions of Maven-style repositories: numeric
//! segments compare numerically, and well-known qualifiers rank
//! `alpha < beta < milestone < rc < snapshot < release < sp`. Unknown
//! qualifiers sort after `sp`, lexically among themselves.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Rendering of the "resolve to latest" placeholder.
pub const LATEST: &str = "LATEST";

/// Errors produced while parsing versions or ranges.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The version string was empty.
    #[error("Empty version")]
    Empty,

    /// A bracketed range could not be parsed.
    #[error("Invalid version range: {0}")]
    InvalidRange(String),
}

/// A single version string with a total, repository-style ordering.
///
/// Equality is ordering-equality, so `1.0` and `1.0.0` are the same version.
#[derive(Debug, Clone)]
pub struct Version(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Item {
    Number(u64),
    Qualifier(String),
}

const RELEASE_RANK: u8 = 5;

/// Spelling shared by every alias of a qualifier, so that equal versions
/// also tokenize (and hash) the same.
fn canonical_qualifier(q: String) -> String {
    let canonical = match q.as_str() {
        "a" => "alpha",
        "b" => "beta",
        "m" => "milestone",
        "cr" => "rc",
        "ga" | "final" | "release" => "",
        _ => return q,
    };
    canonical.to_string()
}

fn qualifier_rank(q: &str) -> u8 {
    match q {
        "alpha" => 0,
        "beta" => 1,
        "milestone" => 2,
        "rc" => 3,
        "snapshot" => 4,
        "" => RELEASE_RANK,
        "sp" => 6,
        _ => 7,
    }
}

fn tokenize(raw: &str) -> Vec<Item> {
    let lower = raw.to_lowercase();
    let mut items = Vec::new();
    let mut current = String::new();
    let mut digits = false;

    let flush = |current: &mut String, digits: bool, items: &mut Vec<Item>| {
        if current.is_empty() {
            return;
        }
        if digits {
            items.push(Item::Number(current.parse().unwrap_or(u64::MAX)));
        } else {
            items.push(Item::Qualifier(canonical_qualifier(std::mem::take(current))));
        }
        current.clear();
    };

    for c in lower.chars() {
        if matches!(c, '.' | '-' | '_' | '+') {
            flush(&mut current, digits, &mut items);
            continue;
        }
        let is_digit = c.is_ascii_digit();
        if !current.is_empty() && is_digit != digits {
            flush(&mut current, digits, &mut items);
        }
        digits = is_digit;
        current.push(c);
    }
    flush(&mut current, digits, &mut items);
    items
}

/// Drop trailing items that compare equal to "nothing" (zeros, release markers).
fn normalized(raw: &str) -> Vec<Item> {
    let mut items = tokenize(raw);
    while let Some(last) = items.last() {
        let trivial = match last {
            Item::Number(n) => *n == 0,
            Item::Qualifier(q) => qualifier_rank(q) == RELEASE_RANK,
        };
        if !trivial {
            break;
        }
        items.pop();
    }
    items
}

fn compare_item(a: Option<&Item>, b: Option<&Item>) -> Ordering {
    match (a, b) {
        (Some(Item::Number(x)), Some(Item::Number(y))) => x.cmp(y),
        (Some(Item::Number(_)), Some(Item::Qualifier(_))) => Ordering::Greater,
        (Some(Item::Qualifier(_)), Some(Item::Number(_))) => Ordering::Less,
        (Some(Item::Qualifier(x)), Some(Item::Qualifier(y))) => {
            let (rx, ry) = (qualifier_rank(x), qualifier_rank(y));
            if rx == 7 && ry == 7 {
                x.cmp(y)
            } else {
                rx.cmp(&ry)
            }
        }
        (Some(Item::Number(x)), None) => x.cmp(&0),
        (None, Some(Item::Number(y))) => 0.cmp(y),
        (Some(Item::Qualifier(x)), None) => qualifier_rank(x).cmp(&RELEASE_RANK),
        (None, Some(Item::Qualifier(y))) => RELEASE_RANK.cmp(&qualifier_rank(y)),
        (None, None) => Ordering::Equal,
    }
}

impl Version {
    /// Create a new version from the given string (stored trimmed, as-is).
    pub fn new(v: &str) -> Self {
        Self(v.trim().to_string())
    }

    /// Return the version string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a snapshot (pre-release build) version.
    pub fn is_snapshot(&self) -> bool {
        self.0.to_lowercase().contains("snapshot")
    }

    /// Whether the version starts with a numeric segment.
    ///
    /// Unparseable versions lose ties against parseable ones when search
    /// results are merged.
    pub fn is_parseable(&self) -> bool {
        self.0.chars().next().is_some_and(|c| c.is_ascii_digit())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = normalized(&self.0);
        let b = normalized(&other.0);
        for i in 0..a.len().max(b.len()) {
            let ord = compare_item(a.get(i), b.get(i));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        normalized(&self.0).hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

/// One end of a [`VersionRange`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bound {
    /// The boundary version.
    pub version: Version,
    /// Whether the boundary itself is part of the range.
    pub inclusive: bool,
}

/// A bracketed version interval such as `[1.0,2.0)` or `[0,)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    lower: Option<Bound>,
    upper: Option<Bound>,
}

impl VersionRange {
    /// Whether `version` lies within the range.
    pub fn contains(&self, version: &Version) -> bool {
        let above = self.lower.as_ref().is_none_or(|b| match version.cmp(&b.version) {
            Ordering::Greater => true,
            Ordering::Equal => b.inclusive,
            Ordering::Less => false,
        });
        let below = self.upper.as_ref().is_none_or(|b| match version.cmp(&b.version) {
            Ordering::Less => true,
            Ordering::Equal => b.inclusive,
            Ordering::Greater => false,
        });
        above && below
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || VersionError::InvalidRange(s.to_string());

        let open = s.chars().next().ok_or(VersionError::Empty)?;
        let close = s.chars().last().ok_or(VersionError::Empty)?;
        if s.len() < 2 || !matches!(open, '[' | '(') || !matches!(close, ']' | ')') {
            return Err(invalid());
        }
        let inner = &s[1..s.len() - 1];

        let Some((low, high)) = inner.split_once(',') else {
            // `[1.0]` pins a single version
            if open != '[' || close != ']' || inner.trim().is_empty() {
                return Err(invalid());
            }
            let bound = Bound {
                version: Version::new(inner),
                inclusive: true,
            };
            return Ok(Self {
                lower: Some(bound.clone()),
                upper: Some(bound),
            });
        };
        if high.contains(',') {
            return Err(invalid());
        }

        let lower = (!low.trim().is_empty()).then(|| Bound {
            version: Version::new(low),
            inclusive: open == '[',
        });
        let upper = (!high.trim().is_empty()).then(|| Bound {
            version: Version::new(high),
            inclusive: close == ']',
        });

        if let (Some(l), Some(u)) = (&lower, &upper) {
            if l.version > u.version {
                return Err(invalid());
            }
        }

        Ok(Self { lower, upper })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(l), Some(u)) = (&self.lower, &self.upper) {
            if l.inclusive && u.inclusive && l.version == u.version {
                return write!(f, "[{}]", l.version);
            }
        }
        match &self.lower {
            Some(b) => write!(f, "{}{}", if b.inclusive { '[' } else { '(' }, b.version)?,
            None => write!(f, "(")?,
        }
        write!(f, ",")?;
        match &self.upper {
            Some(b) => write!(f, "{}{}", b.version, if b.inclusive { ']' } else { ')' }),
            None => write!(f, ")"),
        }
    }
}

/// The version field of a coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionSpec {
    /// A concrete version.
    Exact(Version),
    /// An open or closed range to be resolved against a repository.
    Range(VersionRange),
    /// Placeholder: resolve to the latest release later.
    Latest,
}

impl VersionSpec {
    /// The concrete version, if this specifier pins one.
    pub fn exact(&self) -> Option<&Version> {
        match self {
            Self::Exact(v) => Some(v),
            _ => None,
        }
    }

    /// Whether `version` satisfies this specifier. `Latest` accepts everything.
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Exact(v) => v == version,
            Self::Range(r) => r.contains(version),
            Self::Latest => true,
        }
    }

    /// Whether this is the latest-placeholder sentinel.
    pub fn is_latest(&self) -> bool {
        matches!(self, Self::Latest)
    }
}

impl FromStr for VersionSpec {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case(LATEST) || s.eq_ignore_ascii_case("RELEASE") {
            return Ok(Self::Latest);
        }
        if s.starts_with('[') || s.starts_with('(') {
            return s.parse().map(Self::Range);
        }
        Ok(Self::Exact(Version::new(s)))
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "{v}"),
            Self::Range(r) => write!(f, "{r}"),
            Self::Latest => write!(f, "{LATEST}"),
        }
    }
}

impl From<Version> for VersionSpec {
    fn from(v: Version) -> Self {
        Self::Exact(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::new(s)
    }

    #[test]
    fn test_numeric_ordering() {
        assert!(v("1.10") > v("1.9"));
        assert!(v("2.0") > v("1.99.99"));
        assert!(v("1.0.1") > v("1.0"));
        assert_eq!(v("1.0"), v("1.0.0"));
    }

    #[test]
    fn test_qualifier_ordering() {
        assert!(v("2.0-SNAPSHOT") < v("2.0"));
        assert!(v("2.0-alpha1") < v("2.0-beta1"));
        assert!(v("2.0-beta1") < v("2.0-rc1"));
        assert!(v("2.0-rc1") < v("2.0"));
        assert!(v("2.0") < v("2.0-sp1"));
        assert!(v("2.0-SNAPSHOT") > v("1.9"));
        assert!(v("1.0.1") > v("1.0-rc2"));
    }

    #[test]
    fn test_snapshot_and_parseable() {
        assert!(v("1.0-Snapshot").is_snapshot());
        assert!(!v("1.0").is_snapshot());
        assert!(v("3.2").is_parseable());
        assert!(!v(LATEST).is_parseable());
    }

    #[test]
    fn test_equal_versions_hash_alike() {
        use std::collections::HashSet;
        let set: HashSet<Version> = [v("1.0"), v("1.0.0"), v("1-ga")].into_iter().collect();
        assert_eq!(set.len(), 1);

        // Qualifier aliases are the same version and land in the same bucket
        for aliases in [
            ["1.0-alpha1", "1.0-a1", "1.0-ALPHA-1"],
            ["2.0-beta-2", "2.0-b2", "2.0.b.2"],
            ["3.0-milestone1", "3.0-m1", "3.0-M-1"],
            ["4.0-rc1", "4.0-cr1", "4.0-CR-1"],
            ["5.0-ga-1", "5.0-final-1", "5.0-release.1"],
        ] {
            let versions: Vec<Version> = aliases.into_iter().map(v).collect();
            assert!(versions.windows(2).all(|w| w[0] == w[1]));
            let set: HashSet<&Version> = versions.iter().collect();
            assert_eq!(set.len(), 1, "{aliases:?}");
        }
        assert_ne!(v("1.0-a1"), v("1.0-b1"));
    }

    #[test]
    fn test_range_parse_and_contains() {
        let r: VersionRange = "[1.0,2.0)".parse().unwrap();
        assert!(r.contains(&v("1.0")));
        assert!(r.contains(&v("1.5")));
        assert!(!r.contains(&v("2.0")));

        let open: VersionRange = "[0,)".parse().unwrap();
        assert!(open.contains(&v("3.2")));
        assert!(open.contains(&v("0")));

        let upper: VersionRange = "(,1.0]".parse().unwrap();
        assert!(upper.contains(&v("0.9")));
        assert!(upper.contains(&v("1.0")));
        assert!(!upper.contains(&v("1.1")));

        let pinned: VersionRange = "[1.2]".parse().unwrap();
        assert!(pinned.contains(&v("1.2.0")));
        assert!(!pinned.contains(&v("1.3")));
        assert_eq!(pinned.to_string(), "[1.2]");
    }

    #[test]
    fn test_range_rejects_garbage() {
        assert!("1.0,2.0".parse::<VersionRange>().is_err());
        assert!("[2.0,1.0]".parse::<VersionRange>().is_err());
        assert!("(1.0)".parse::<VersionRange>().is_err());
        assert!("[1,2),[3,4)".parse::<VersionRange>().is_err());
    }

    #[test]
    fn test_version_field_parse() {
        assert_eq!("LATEST".parse::<VersionSpec>().unwrap(), VersionSpec::Latest);
        assert_eq!(
            "1.2".parse::<VersionSpec>().unwrap(),
            VersionSpec::Exact(v("1.2"))
        );
        assert!(matches!(
            "[0,)".parse::<VersionSpec>().unwrap(),
            VersionSpec::Range(_)
        ));
        assert_eq!(VersionSpec::Latest.to_string(), "LATEST");
    }
}
