//! Isolated loading context.
//!
//! A [`LoadingContext`] owns an ordered search path of archives and class
//! directories. Type names resolve against it only, first entry winning, so
//! types from different sessions never see each other. [`LoadingContext::close`]
//! releases every open archive.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use walkdir::WalkDir;
use zip::ZipArchive;

use super::ExploreError;
use super::classfile::ClassFile;

#[derive(Debug, Clone)]
enum ClassSource {
    Archive { archive: usize, entry: String },
    File(PathBuf),
}

/// Class name for an archive entry or relative path, if it is a class file.
pub(crate) fn class_name(entry: &str) -> Option<String> {
    let stem = entry.strip_suffix(".class")?;
    if stem.starts_with("META-INF/") || stem.ends_with("module-info") {
        return None;
    }
    Some(stem.replace(['/', '\\'], "."))
}

/// Class names found in `path` (an archive or a class directory), sorted.
///
/// # Errors
///
/// Returns an error if `path` cannot be read as either.
pub fn list_classes(path: &Path) -> Result<Vec<String>, ExploreError> {
    let mut names = Vec::new();
    if path.is_dir() {
        for entry in WalkDir::new(path) {
            let entry = entry.map_err(|e| ExploreError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(path)
                .map_err(|e| ExploreError::Io(std::io::Error::other(e)))?;
            if let Some(name) = class_name(&rel.to_string_lossy()) {
                names.push(name);
            }
        }
    } else {
        let archive = ZipArchive::new(File::open(path)?)?;
        names.extend(archive.file_names().filter_map(class_name));
    }
    names.sort();
    Ok(names)
}

/// An isolated set of loadable types.
#[derive(Debug)]
pub struct LoadingContext {
    entries: Vec<PathBuf>,
    index: HashMap<String, ClassSource>,
    archives: Vec<Mutex<Option<ZipArchive<File>>>>,
    parsed: Mutex<HashMap<String, Arc<ClassFile>>>,
    unreadable: Vec<(PathBuf, String)>,
    closed: AtomicBool,
}

impl LoadingContext {
    /// Index every entry of `search_path`, in order.
    ///
    /// Entries that cannot be read are logged and left out; they are listed
    /// by [`LoadingContext::unreadable`].
    pub fn open(search_path: &[PathBuf]) -> Self {
        let mut index = HashMap::new();
        let mut archives = Vec::new();
        let mut unreadable = Vec::new();

        for path in search_path {
            if path.is_dir() {
                for entry in WalkDir::new(path).into_iter().filter_map(Result::ok) {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let Ok(rel) = entry.path().strip_prefix(path) else {
                        continue;
                    };
                    if let Some(name) = class_name(&rel.to_string_lossy()) {
                        index
                            .entry(name)
                            .or_insert_with(|| ClassSource::File(entry.path().to_path_buf()));
                    }
                }
                continue;
            }

            let opened = File::open(path)
                .map_err(ExploreError::from)
                .and_then(|f| ZipArchive::new(f).map_err(ExploreError::from));
            match opened {
                Ok(archive) => {
                    let slot = archives.len();
                    for entry in archive.file_names() {
                        if let Some(name) = class_name(entry) {
                            index.entry(name).or_insert_with(|| ClassSource::Archive {
                                archive: slot,
                                entry: entry.to_string(),
                            });
                        }
                    }
                    archives.push(Mutex::new(Some(archive)));
                }
                Err(e) => {
                    tracing::warn!("Leaving {} out of the loading context: {e}", path.display());
                    unreadable.push((path.clone(), e.to_string()));
                }
            }
        }

        tracing::debug!(
            "Loading context over {} entries indexes {} types",
            search_path.len(),
            index.len()
        );
        Self {
            entries: search_path.to_vec(),
            index,
            archives,
            parsed: Mutex::new(HashMap::new()),
            unreadable,
            closed: AtomicBool::new(false),
        }
    }

    /// The search path, in order.
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Search path entries that could not be opened, with the cause.
    pub fn unreadable(&self) -> &[(PathBuf, String)] {
        &self.unreadable
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.index.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Load and parse `type_name`.
    ///
    /// # Errors
    ///
    /// Fails if the context is closed, the type is not on the search path,
    /// or its class file cannot be read or parsed.
    pub fn load(&self, type_name: &str) -> Result<Arc<ClassFile>, ExploreError> {
        if self.is_closed() {
            return Err(ExploreError::Closed);
        }
        if let Some(class) = self
            .parsed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(type_name)
        {
            return Ok(class.clone());
        }

        let source = self
            .index
            .get(type_name)
            .ok_or_else(|| ExploreError::NotFound(type_name.to_string()))?;
        let bytes = match source {
            ClassSource::File(path) => std::fs::read(path)?,
            ClassSource::Archive { archive, entry } => {
                let slot = self.archives.get(*archive).ok_or(ExploreError::Closed)?;
                let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
                let archive = guard.as_mut().ok_or(ExploreError::Closed)?;
                let mut file = archive.by_name(entry)?;
                let mut bytes = Vec::with_capacity(file.size() as usize);
                std::io::copy(&mut file, &mut bytes)?;
                bytes
            }
        };

        let class = Arc::new(ClassFile::parse(&bytes)?);
        self.parsed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(type_name.to_string(), class.clone());
        Ok(class)
    }

    /// Release every open archive and cached type. Later loads fail.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for slot in &self.archives {
            slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        }
        self.parsed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::debug!("Loading context closed");
    }
}

impl Drop for LoadingContext {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::Write;
    use std::path::Path;

    use crate::explorer::classfile::testing::ClassFixture;

    /// Write `classes` as a class directory under `root`.
    pub(crate) fn write_dir(root: &Path, classes: &[ClassFixture<'_>]) {
        for fixture in classes {
            let path = root.join(format!("{}.class", fixture.name.replace('.', "/")));
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, fixture.to_bytes()).unwrap();
        }
    }

    /// Write `classes` into a zip archive at `path`.
    pub(crate) fn write_jar(path: &Path, classes: &[ClassFixture<'_>]) {
        let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("META-INF/MANIFEST.MF", options).unwrap();
        zip.write_all(b"Manifest-Version: 1.0\n").unwrap();
        for fixture in classes {
            zip.start_file(format!("{}.class", fixture.name.replace('.', "/")), options)
                .unwrap();
            zip.write_all(&fixture.to_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{write_dir, write_jar};
    use super::*;
    use crate::explorer::classfile::testing::ClassFixture;

    #[test]
    fn test_class_name() {
        assert_eq!(class_name("com/acme/Button.class").as_deref(), Some("com.acme.Button"));
        assert_eq!(class_name("module-info.class"), None);
        assert_eq!(class_name("META-INF/versions/9/a/B.class"), None);
        assert_eq!(class_name("com/acme/icon.png"), None);
    }

    #[test]
    fn test_first_entry_wins_and_close() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("first.jar");
        write_jar(&jar, &[ClassFixture::public("com.acme.Shared", "java.lang.Object")]);
        let classes = dir.path().join("classes");
        write_dir(
            &classes,
            &[
                ClassFixture::public("com.acme.Shared", "java.lang.Thread"),
                ClassFixture::public("com.acme.Only", "java.lang.Object"),
            ],
        );
        let broken = dir.path().join("broken.jar");
        std::fs::write(&broken, b"not a zip").unwrap();

        let ctx = LoadingContext::open(&[jar.clone(), broken.clone(), classes]);
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.unreadable().len(), 1);
        assert_eq!(ctx.unreadable()[0].0, broken);

        let shared = ctx.load("com.acme.Shared").unwrap();
        assert_eq!(shared.super_name.as_deref(), Some("java.lang.Object"));
        assert!(ctx.load("com.acme.Only").is_ok());
        assert!(matches!(ctx.load("com.acme.Missing"), Err(ExploreError::NotFound(_))));

        ctx.close();
        assert!(matches!(ctx.load("com.acme.Shared"), Err(ExploreError::Closed)));
    }

    #[test]
    fn test_list_classes() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("a.jar");
        write_jar(
            &jar,
            &[
                ClassFixture::public("b.Two", "java.lang.Object"),
                ClassFixture::public("a.One", "java.lang.Object"),
            ],
        );
        assert_eq!(list_classes(&jar).unwrap(), ["a.One", "b.Two"]);

        std::fs::write(dir.path().join("bad.jar"), b"junk").unwrap();
        assert!(list_classes(&dir.path().join("bad.jar")).is_err());
    }
}
