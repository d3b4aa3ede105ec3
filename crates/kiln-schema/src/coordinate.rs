//! Package coordinates: `group:name[:extension[:classifier]]:version`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::version::{Version, VersionError, VersionSpec};

/// Default packaging extension for primary archives.
pub const DEFAULT_EXTENSION: &str = "jar";

/// Errors produced while parsing a coordinate string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinateError {
    /// Wrong number of `:`-separated segments.
    #[error("Invalid coordinate '{0}': expected group:name[:extension[:classifier]]:version")]
    Malformed(String),

    /// A required segment was empty.
    #[error("Invalid coordinate '{coordinate}': empty {field}")]
    EmptyField {
        /// The offending coordinate string.
        coordinate: String,
        /// Which segment was empty.
        field: &'static str,
    },

    /// A segment cannot be used as a directory or file name.
    #[error("Invalid coordinate '{coordinate}': {field} is not a plain path segment")]
    UnsafeSegment {
        /// The offending coordinate string.
        coordinate: String,
        /// Which segment was rejected.
        field: &'static str,
    },

    /// The version segment could not be parsed.
    #[error(transparent)]
    Version(#[from] VersionError),
}

/// Whether `s` can name a single directory or file in repository layout:
/// non-empty, not `.` or `..`, and free of path separators.
pub fn is_path_segment(s: &str) -> bool {
    !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\'])
}

/// Identity of a package variant plus the version (or version query) wanted.
///
/// Coordinates are immutable; the `with_*` helpers return modified copies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    group: String,
    name: String,
    extension: String,
    classifier: Option<String>,
    version: VersionSpec,
}

impl Coordinate {
    /// Create a primary-archive coordinate.
    pub fn new(group: impl Into<String>, name: impl Into<String>, version: VersionSpec) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            extension: DEFAULT_EXTENSION.to_string(),
            classifier: None,
            version,
        }
    }

    /// Like [`Coordinate::new`], for values read from untrusted sources.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateError::UnsafeSegment`] if any segment would leave
    /// its directory once laid out on disk.
    pub fn try_new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: VersionSpec,
    ) -> Result<Self, CoordinateError> {
        let coordinate = Self::new(group, name, version);
        coordinate.check_segments()?;
        Ok(coordinate)
    }

    /// Checks that every segment maps to exactly one path component.
    ///
    /// Group parts are checked one by one; a concrete version is checked
    /// too, ranges and placeholders never reach the file system.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateError::UnsafeSegment`] naming the first bad segment.
    pub fn check_segments(&self) -> Result<(), CoordinateError> {
        let unsafe_segment = |field| CoordinateError::UnsafeSegment {
            coordinate: self.to_string(),
            field,
        };
        if !self.group.split('.').all(is_path_segment) {
            return Err(unsafe_segment("group"));
        }
        if !is_path_segment(&self.name) {
            return Err(unsafe_segment("name"));
        }
        if !is_path_segment(&self.extension) {
            return Err(unsafe_segment("extension"));
        }
        if self.classifier.as_deref().is_some_and(|c| !is_path_segment(c)) {
            return Err(unsafe_segment("classifier"));
        }
        if let Some(version) = self.version.exact()
            && !is_path_segment(version.as_str())
        {
            return Err(unsafe_segment("version"));
        }
        Ok(())
    }

    /// Group identifier (dot separated, e.g. `org.example`).
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Package name within the group.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Packaging extension (`jar`, `pom`, ...).
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Classifier of a secondary variant (e.g. `javadoc`), if any.
    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    /// The version, range or placeholder.
    pub fn version(&self) -> &VersionSpec {
        &self.version
    }

    /// Identity without version: `group:name`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.group, self.name)
    }

    /// Copy with a different version field.
    pub fn with_version(&self, version: impl Into<VersionSpec>) -> Self {
        Self {
            version: version.into(),
            ..self.clone()
        }
    }

    /// Copy pinned to a concrete version.
    pub fn pinned(&self, version: &Version) -> Self {
        self.with_version(VersionSpec::Exact(version.clone()))
    }

    /// Copy with a classifier (a secondary variant of the same package).
    pub fn with_classifier(&self, classifier: impl Into<String>) -> Self {
        Self {
            classifier: Some(classifier.into()),
            ..self.clone()
        }
    }

    /// Copy with a different packaging extension.
    pub fn with_extension(&self, extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            ..self.clone()
        }
    }

    /// File name in repository layout for a concrete `version`:
    /// `name-version[-classifier].extension`.
    pub fn file_name(&self, version: &Version) -> String {
        match &self.classifier {
            Some(c) => format!("{}-{}-{}.{}", self.name, version, c, self.extension),
            None => format!("{}-{}.{}", self.name, version, self.extension),
        }
    }
}

impl FromStr for Coordinate {
    type Err = CoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let (group, name, extension, classifier, version) = match parts.as_slice() {
            [g, n, v] => (*g, *n, DEFAULT_EXTENSION, None, *v),
            [g, n, e, v] => (*g, *n, *e, None, *v),
            [g, n, e, c, v] => (*g, *n, *e, Some(*c), *v),
            _ => return Err(CoordinateError::Malformed(s.to_string())),
        };

        let empty = |field| CoordinateError::EmptyField {
            coordinate: s.to_string(),
            field,
        };
        if group.is_empty() {
            return Err(empty("group"));
        }
        if name.is_empty() {
            return Err(empty("name"));
        }
        if extension.is_empty() {
            return Err(empty("extension"));
        }

        let coordinate = Self {
            group: group.to_string(),
            name: name.to_string(),
            extension: extension.to_string(),
            classifier: classifier.filter(|c| !c.is_empty()).map(str::to_string),
            version: version.parse()?,
        };
        coordinate.check_segments()?;
        Ok(coordinate)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)?;
        match &self.classifier {
            Some(c) => write!(f, ":{}:{}", self.extension, c)?,
            None if self.extension != DEFAULT_EXTENSION => write!(f, ":{}", self.extension)?,
            None => {}
        }
        write!(f, ":{}", self.version)
    }
}

impl Serialize for Coordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
