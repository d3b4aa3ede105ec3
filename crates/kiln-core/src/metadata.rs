//! Version listings: `maven-metadata.xml` documents and HTML directory indexes.

use kiln_schema::Version;
use regex::Regex;

/// Parsed `maven-metadata.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionListing {
    /// Versions in document order.
    pub versions: Vec<Version>,
    pub latest: Option<Version>,
    pub release: Option<Version>,
    /// `lastUpdated` stamp (`yyyyMMddHHmmss`), if present.
    pub last_updated: Option<String>,
}

fn element(xml: &str, tag: &str) -> Result<Option<String>, regex::Error> {
    let re = Regex::new(&format!(r"<{tag}>\s*([^<]*?)\s*</{tag}>"))?;
    Ok(re
        .captures(xml)
        .map(|c| c[1].to_string())
        .filter(|s| !s.is_empty()))
}

/// Parse a repository version listing.
///
/// Only the `<versioning>` block is read; anything else is ignored.
pub fn parse_metadata(xml: &str) -> Result<VersionListing, regex::Error> {
    let block_re = Regex::new(r"(?s)<versioning>(.*)</versioning>")?;
    let Some(block) = block_re.captures(xml).map(|c| c[1].to_string()) else {
        return Ok(VersionListing::default());
    };

    let version_re = Regex::new(r"<version>\s*([^<]+?)\s*</version>")?;
    let versions = version_re
        .captures_iter(&block)
        .map(|c| Version::new(&c[1]))
        .collect();

    Ok(VersionListing {
        versions,
        latest: element(&block, "latest")?.map(Version::from),
        release: element(&block, "release")?.map(Version::from),
        last_updated: element(&block, "lastUpdated")?,
    })
}

/// Extract version sub-directories from an HTML directory index.
///
/// Entries are links ending in `/` whose name starts with a digit.
pub fn parse_directory_listing(html: &str) -> Result<Vec<Version>, regex::Error> {
    let re = Regex::new(r#"href="(?:[^"]*/)?([0-9][^"/]*)/""#)?;
    let mut versions: Vec<Version> = Vec::new();
    for caps in re.captures_iter(html) {
        let v = Version::new(&caps[1]);
        if !versions.iter().any(|seen| seen.as_str() == v.as_str()) {
            versions.push(v);
        }
    }
    Ok(versions)
}
