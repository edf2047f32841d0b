//! Storage Key Sanitization
//!
//! Information Hiding:
//! - Character filtering rules hidden behind `StorageKey` construction
//! - Containment check against the data root re-run on every resolution
//! - File extension and staging suffix owned here, not by callers

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Longest identifier accepted before any transformation
pub const MAX_RAW_KEY_BYTES: usize = 255;

pub(crate) const DOCUMENT_EXTENSION: &str = "json";
pub(crate) const STAGING_SUFFIX: &str = ".tmp";

/// Longest key produced. Leaves room for `.json.tmp` inside a 255-byte file name.
pub const MAX_KEY_BYTES: usize =
    MAX_RAW_KEY_BYTES - (DOCUMENT_EXTENSION.len() + 1 + STAGING_SUFFIX.len());

const SEPARATOR_SUBSTITUTE: char = '_';
const SEGMENT_JOINER: char = '-';

/// Filesystem-safe identifier for one document.
///
/// Only constructible through [`StorageKey::sanitize`] or
/// [`StorageKey::from_segments`], so a value of this type never contains a
/// path separator, control character, or leading dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(String);

impl StorageKey {
    /// Turn one untrusted identifier into a key.
    pub fn sanitize(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::InvalidKey("identifier is empty".to_string()));
        }
        if raw.len() > MAX_RAW_KEY_BYTES {
            return Err(Error::InvalidKey(format!(
                "identifier is {} bytes (max: {} bytes)",
                raw.len(),
                MAX_RAW_KEY_BYTES
            )));
        }

        let replaced: String = raw
            .chars()
            .filter(|c| !c.is_control())
            .map(|c| if is_separator(c) { SEPARATOR_SUBSTITUTE } else { c })
            .collect();

        let undotted = replaced.trim_start_matches('.');
        let key = truncate_to_boundary(undotted, MAX_KEY_BYTES);

        if key.is_empty() {
            return Err(Error::InvalidKey(format!(
                "identifier {:?} has no usable characters",
                raw
            )));
        }

        Ok(Self(key.to_string()))
    }

    /// Build a key from several identifiers, e.g. `{channel}-{user}`.
    ///
    /// Each segment is sanitized on its own before joining, so no segment can
    /// smuggle structure into its neighbour.
    pub fn from_segments(segments: &[&str]) -> Result<Self> {
        if segments.is_empty() {
            return Err(Error::InvalidKey("no identifiers supplied".to_string()));
        }

        let mut joined = String::new();
        for segment in segments {
            let key = Self::sanitize(segment)?;
            if !joined.is_empty() {
                joined.push(SEGMENT_JOINER);
            }
            joined.push_str(&key.0);
        }

        if joined.len() > MAX_KEY_BYTES {
            return Err(Error::InvalidKey(format!(
                "combined key is {} bytes (max: {} bytes)",
                joined.len(),
                MAX_KEY_BYTES
            )));
        }

        Ok(Self(joined))
    }

    /// Recover a key from a document file stem found on disk.
    ///
    /// Stems that would not survive sanitization unchanged are rejected.
    pub(crate) fn from_file_stem(stem: &str) -> Option<Self> {
        match Self::sanitize(stem) {
            Ok(key) if key.0 == stem => Some(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn file_name(&self) -> String {
        format!("{}.{}", self.0, DOCUMENT_EXTENSION)
    }

    /// Join this key to `root` and verify the result stays inside it.
    ///
    /// `root` must already be canonical. An existing target is canonicalized
    /// so a symlink pointing out of the root is caught; a missing target is
    /// checked through its parent directory.
    pub fn resolve(&self, root: &Path) -> Result<PathBuf> {
        let file_name = self.file_name();
        let mut components = Path::new(&file_name).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );

        let candidate = root.join(&file_name);
        if !single_normal {
            return Err(escape(candidate));
        }

        let checked = if candidate.exists() {
            candidate
                .canonicalize()
                .map_err(|e| Error::io(format!("canonicalize {:?}", candidate), e))?
        } else {
            let parent = candidate.parent().ok_or_else(|| escape(candidate.clone()))?;
            let parent = parent
                .canonicalize()
                .map_err(|e| Error::io(format!("canonicalize {:?}", parent), e))?;
            parent.join(&file_name)
        };

        if checked.parent() != Some(root) {
            return Err(escape(checked));
        }

        Ok(candidate)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_separator(c: char) -> bool {
    matches!(c, '/' | '\\' | ':')
}

fn truncate_to_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn escape(path: PathBuf) -> Error {
    tracing::warn!(
        "[StorageKey] Rejected path outside the data root: {:?}",
        path
    );
    Error::PathEscape(path)
}
