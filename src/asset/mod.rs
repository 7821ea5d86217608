use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::{Deserializer, Error as DeError};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use crate::core::{PersistError, Result};

/// A named tree of sql templates loaded from a directory.
///
/// Files with the configured extension become templates keyed by their
/// stem; subdirectories become nested namespaces reachable with dotted
/// lookup (`runs.open`). Hidden entries and other extensions are skipped.
///
/// An asset serializes as its `{ext, path}` reference only and is rebuilt
/// from disk on deserialization, so configuration stays a pointer to the
/// sql source tree rather than a copy of it.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    path: PathBuf,
    ext: String,
    entries: BTreeMap<String, AssetEntry>,
}

#[derive(Debug, Clone, PartialEq)]
enum AssetEntry {
    Sql(String),
    Dir(Asset),
}

impl Asset {
    /// Build from a directory. `ext` includes the leading dot (".sql").
    pub fn build<P: AsRef<Path>>(path: P, ext: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut entries = BTreeMap::new();

        let listing = fs::read_dir(&path)
            .map_err(|err| PersistError::Io(format!("{}: {}", path.display(), err)))?;
        for entry in listing {
            let entry = entry.map_err(|err| PersistError::Io(err.to_string()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let child = entry.path();
            if child.is_dir() {
                entries.insert(name, AssetEntry::Dir(Self::build(&child, ext)?));
                continue;
            }
            let suffix = child
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            if suffix != ext {
                continue;
            }
            let stem = child
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let text = fs::read_to_string(&child)
                .map_err(|err| PersistError::Io(format!("{}: {}", child.display(), err)))?;
            entries.insert(stem, AssetEntry::Sql(text));
        }

        Ok(Self {
            path,
            ext: ext.to_string(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ext(&self) -> &str {
        &self.ext
    }

    /// Look up a template by dotted name.
    pub fn get(&self, name: &str) -> Result<&str> {
        let mut node = self;
        let mut parts = name.split('.').peekable();
        while let Some(part) = parts.next() {
            match node.entries.get(part) {
                Some(AssetEntry::Sql(text)) if parts.peek().is_none() => return Ok(text),
                Some(AssetEntry::Dir(dir)) if parts.peek().is_some() => node = dir,
                _ => break,
            }
        }
        Err(PersistError::TemplateNotFound(name.to_string()))
    }
}

impl Serialize for Asset {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Asset", 2)?;
        state.serialize_field("ext", &self.ext)?;
        state.serialize_field("path", &self.path)?;
        state.end()
    }
}

#[derive(Deserialize)]
struct AssetRef {
    ext: String,
    path: PathBuf,
}

impl<'de> Deserialize<'de> for Asset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let reference = AssetRef::deserialize(deserializer)?;
        Asset::build(&reference.path, &reference.ext).map_err(D::Error::custom)
    }
}
