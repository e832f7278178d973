//! Content fingerprints and the persisted build manifest
//!
//! The manifest (`files.json` in the project root) records a SHA-256 digest for
//! every source file observed by the last successful build, plus a digest of
//! the configuration that build ran with:
//!
//! ```json
//! {
//!     "files": { "src/main.cpp": "9f86d0..." },
//!     "settings": "2c26b4..."
//! }
//! ```

use crate::error::{BuildError, BuildResult};
use kiln_config::ProjectConfig;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Name of the manifest file within a project directory
pub const MANIFEST_FILE: &str = "files.json";

/// Hex-encoded SHA-256 digest
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an existing hex digest
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading `len` hex characters
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of raw bytes
pub fn compute_hash(bytes: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Fingerprint(format!("{:x}", hasher.finalize()))
}

/// Compute the fingerprint of a file's content
pub fn compute_file_hash(path: &Path) -> BuildResult<Fingerprint> {
    let content = fs::read(path).map_err(|e| BuildError::io(path, e))?;
    Ok(compute_hash(&content))
}

/// Fingerprint of the effective configuration
pub fn config_fingerprint(config: &ProjectConfig) -> Fingerprint {
    compute_hash(&config.canonical_bytes())
}

/// Persisted build state: per-file fingerprints plus the config fingerprint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Normalized source path -> content fingerprint
    pub files: BTreeMap<String, Fingerprint>,
    /// Fingerprint of the configuration the files were built with
    pub settings: Fingerprint,
}

impl Manifest {
    /// Create an empty manifest for the given configuration fingerprint
    pub fn new(settings: Fingerprint) -> Self {
        Self {
            files: BTreeMap::new(),
            settings,
        }
    }

    pub fn get(&self, path: &str) -> Option<&Fingerprint> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Loads and saves the manifest of one project
#[derive(Debug, Clone)]
pub struct FingerprintStore {
    path: PathBuf,
}

impl FingerprintStore {
    /// Store for the project rooted at `project_dir`
    pub fn new(project_dir: &Path) -> Self {
        Self {
            path: project_dir.join(MANIFEST_FILE),
        }
    }

    /// Location of the manifest file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the manifest, returning `None` if it is missing or unreadable
    ///
    /// Any failure is a cache miss; the caller treats it as a full rebuild.
    pub fn load(&self) -> Option<Manifest> {
        let content = fs::read(&self.path).ok()?;
        match serde_json::from_slice(&content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                tracing::warn!("Ignoring corrupt manifest {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Save the manifest
    ///
    /// Writes a sibling temp file and renames it into place, so a crash leaves
    /// either the old manifest or the new one.
    pub fn save(&self, manifest: &Manifest) -> BuildResult<()> {
        let json = serde_json::to_vec_pretty(manifest)
            .map_err(|e| BuildError::io(&self.path, std::io::Error::other(e)))?;

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path).map_err(|e| BuildError::io(&tmp_path, e))?;
            file.write_all(&json)
                .and_then(|_| file.sync_all())
                .map_err(|e| BuildError::io(&tmp_path, e))?;
        }

        fs::rename(&tmp_path, &self.path).map_err(|e| BuildError::io(&self.path, e))?;
        tracing::debug!("Saved manifest with {} entries", manifest.len());
        Ok(())
    }

    /// Fingerprint of the manifest file as it sits on disk, if present
    pub fn file_fingerprint(&self) -> Option<Fingerprint> {
        fs::read(&self.path).ok().map(|bytes| compute_hash(&bytes))
    }
}
