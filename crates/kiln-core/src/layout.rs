//! Repository layout and the on-disk local repository.
//!
//! Layout: `group/as/dirs/name/version/name-version[-classifier].ext`
//! Layout: `group/as/dirs/name/maven-metadata[-<repo>].xml` (version listings)

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use kiln_schema::{Coordinate, Version, is_path_segment};

use crate::paths::group_path;

/// Checksum side-car extensions captured next to archives.
pub const CHECKSUM_EXTENSIONS: [&str; 2] = ["sha256", "sha1"];

/// Version listing file name in a remote repository.
pub const METADATA_FILE: &str = "maven-metadata.xml";

/// Directory holding all versions of a coordinate, relative to a repository root.
pub fn artifact_dir(coordinate: &Coordinate) -> PathBuf {
    group_path(coordinate.group()).join(coordinate.name())
}

/// Path of `coordinate` at `version`, relative to a repository root.
pub fn relative_path(coordinate: &Coordinate, version: &Version) -> PathBuf {
    artifact_dir(coordinate)
        .join(version.as_str())
        .join(coordinate.file_name(version))
}

/// URL path of `coordinate` at `version`, relative to a repository base URL.
pub fn url_path(coordinate: &Coordinate, version: &Version) -> String {
    format!(
        "{}/{}/{}/{}",
        coordinate.group().replace('.', "/"),
        coordinate.name(),
        version,
        coordinate.file_name(version)
    )
}

/// URL path of the version listing for `coordinate`.
pub fn metadata_url_path(coordinate: &Coordinate) -> String {
    format!(
        "{}/{}/{METADATA_FILE}",
        coordinate.group().replace('.', "/"),
        coordinate.name()
    )
}

/// Refuse coordinates whose segments would resolve outside the repository root.
fn check_layout(coordinate: &Coordinate, version: Option<&Version>) -> io::Result<()> {
    coordinate
        .check_segments()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    match version {
        Some(v) if !is_path_segment(v.as_str()) => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Version '{v}' of {} is not a plain path segment", coordinate.key()),
        )),
        _ => Ok(()),
    }
}

/// A directory laid out as a repository: the shared cache or a scratch cache.
#[derive(Debug, Clone)]
pub struct LocalRepository {
    root: PathBuf,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `coordinate` at `version` lives (whether or not it exists).
    ///
    /// Fails with `InvalidInput` when a segment is not a plain path segment.
    pub fn path_of(&self, coordinate: &Coordinate, version: &Version) -> io::Result<PathBuf> {
        check_layout(coordinate, Some(version))?;
        Ok(self.root.join(relative_path(coordinate, version)))
    }

    /// The installed file, if present.
    pub fn find(&self, coordinate: &Coordinate, version: &Version) -> Option<PathBuf> {
        self.path_of(coordinate, version)
            .ok()
            .filter(|path| path.is_file())
    }

    /// Directory holding cached version listings for `coordinate`.
    pub fn metadata_dir(&self, coordinate: &Coordinate) -> io::Result<PathBuf> {
        check_layout(coordinate, None)?;
        Ok(self.root.join(artifact_dir(coordinate)))
    }

    /// Cached version listing for `coordinate` as served by `repository_id`.
    pub fn metadata_path(&self, coordinate: &Coordinate, repository_id: &str) -> io::Result<PathBuf> {
        let file = format!("maven-metadata-{repository_id}.xml");
        if !is_path_segment(&file) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Repository id '{repository_id}' cannot name a listing file"),
            ));
        }
        Ok(self.metadata_dir(coordinate)?.join(file))
    }

    /// Versions of `coordinate` present on disk, in directory order.
    pub fn versions(&self, coordinate: &Coordinate) -> io::Result<Vec<Version>> {
        let dir = self.metadata_dir(coordinate)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut versions = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let version = Version::new(&entry.file_name().to_string_lossy());
            if entry.path().join(coordinate.file_name(&version)).is_file() {
                versions.push(version);
            }
        }
        Ok(versions)
    }

    /// Copy `source` into place for `coordinate` at `version`.
    ///
    /// The copy goes through a temporary file in the target directory and is
    /// renamed into place, so readers never observe a partial file.
    pub fn install(
        &self,
        coordinate: &Coordinate,
        version: &Version,
        source: &Path,
    ) -> io::Result<PathBuf> {
        let dest = self.path_of(coordinate, version)?;
        copy_atomic(source, &dest)?;
        Ok(dest)
    }
}

/// Copy `source` to `dest` via a sibling temporary file and a rename.
pub fn copy_atomic(source: &Path, dest: &Path) -> io::Result<()> {
    let dir = dest
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "destination has no parent"))?;
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    let mut reader = fs::File::open(source)?;
    io::copy(&mut reader, tmp.as_file_mut())?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

/// Path of the checksum side-car `ext` for `file`.
pub fn sidecar_path(file: &Path, ext: &str) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_schema::VersionSpec;

    fn coord() -> Coordinate {
        Coordinate::new("org.x", "y", VersionSpec::Latest)
    }

    #[test]
    fn test_layout_paths() {
        let v = Version::new("3.2");
        assert_eq!(
            relative_path(&coord(), &v),
            PathBuf::from("org/x/y/3.2/y-3.2.jar")
        );
        assert_eq!(url_path(&coord(), &v), "org/x/y/3.2/y-3.2.jar");
        assert_eq!(metadata_url_path(&coord()), "org/x/y/maven-metadata.xml");
        assert_eq!(
            url_path(&coord().with_classifier("javadoc"), &v),
            "org/x/y/3.2/y-3.2-javadoc.jar"
        );
    }

    #[test]
    fn test_install_and_list_versions() {
        let dir = tempfile::tempdir().unwrap();
        let repo = LocalRepository::new(dir.path());
        let src = dir.path().join("src.jar");
        fs::write(&src, b"jar").unwrap();

        let v = Version::new("1.0");
        let installed = repo.install(&coord(), &v, &src).unwrap();
        assert_eq!(fs::read(&installed).unwrap(), b"jar");
        assert_eq!(repo.find(&coord(), &v), Some(installed));

        // A directory without the archive is not a version
        fs::create_dir_all(repo.metadata_dir(&coord()).unwrap().join("2.0")).unwrap();
        assert_eq!(repo.versions(&coord()).unwrap(), vec![v]);
    }

    #[test]
    fn test_paths_never_leave_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let repo = LocalRepository::new(dir.path().join("cache"));
        let v = Version::new("1.0");

        let escaping = Coordinate::new("g", "../../../esc", VersionSpec::Latest);
        let err = repo.path_of(&escaping, &v).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(repo.metadata_dir(&escaping).is_err());
        assert!(repo.find(&escaping, &v).is_none());

        let src = dir.path().join("src.jar");
        fs::write(&src, b"jar").unwrap();
        assert!(repo.install(&escaping, &v, &src).is_err());
        assert!(repo.path_of(&coord(), &Version::new("../..")).is_err());
        assert!(repo.path_of(&coord().with_classifier("a/b"), &v).is_err());
        assert!(repo.metadata_path(&coord(), "../x").is_err());

        // Nothing was written next to the cache
        assert!(!dir.path().join("esc").exists());
        assert!(repo.path_of(&coord(), &v).unwrap().starts_with(repo.root()));
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/c/y-1.0.jar"), "sha1"),
            PathBuf::from("/c/y-1.0.jar.sha1")
        );
    }
}
