//! Change classification for incremental builds
//!
//! Compares the current source universe against the manifest of the last
//! successful build and decides which translation units need recompiling.

use crate::discover::resolve_key;
use crate::error::BuildResult;
use crate::fingerprint::{compute_file_hash, Fingerprint, Manifest};
use std::collections::HashSet;
use std::path::Path;

/// Why every file is being rebuilt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullRebuildReason {
    /// No manifest on disk, or it could not be parsed
    ManifestMissing,
    /// `--clean` or `--global-clean`
    ForcedClean,
    /// The configuration fingerprint differs from the recorded one
    ConfigChanged,
}

impl FullRebuildReason {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::ManifestMissing => "no usable manifest found",
            Self::ForcedClean => "clean build requested",
            Self::ConfigChanged => "configuration changed",
        }
    }
}

/// Why a single file is in the rebuild set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecompileReason {
    /// Not present in the previous manifest
    New,
    /// Content fingerprint differs from the recorded one
    Modified,
    /// Part of a full rebuild
    FullRebuild,
}

/// One file scheduled for (re)compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildEntry {
    pub path: String,
    pub reason: RecompileReason,
}

/// Files to (re)compile in this cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildSet {
    entries: Vec<RebuildEntry>,
    full_rebuild: Option<FullRebuildReason>,
}

impl RebuildSet {
    pub fn entries(&self) -> &[RebuildEntry] {
        &self.entries
    }

    /// Rebuilt paths in classification order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.path.as_str())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e.path == path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn full_rebuild(&self) -> Option<FullRebuildReason> {
        self.full_rebuild
    }

    pub fn is_full_rebuild(&self) -> bool {
        self.full_rebuild.is_some()
    }

    /// Whether this cycle has anything to compile or purge
    pub fn has_work(&self) -> bool {
        self.is_full_rebuild() || !self.is_empty()
    }
}

/// Result of classifying the source universe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Files to recompile
    pub rebuild: RebuildSet,
    /// Manifest to persist once every compile succeeded
    pub manifest: Manifest,
    /// Recorded files that are no longer part of the universe (kept in the manifest)
    pub removed: Vec<String>,
}

/// Classify the files of the project at `project_dir`, hashing them from disk
pub fn classify(
    project_dir: &Path,
    current_files: &[String],
    prior: Option<&Manifest>,
    config_fingerprint: &Fingerprint,
    force_clean: bool,
) -> BuildResult<Classification> {
    classify_with(current_files, prior, config_fingerprint, force_clean, |key| {
        compute_file_hash(&resolve_key(project_dir, key))
    })
}

/// Classify `current_files` using `fingerprint_of` to hash each one
pub fn classify_with<F>(
    current_files: &[String],
    prior: Option<&Manifest>,
    config_fingerprint: &Fingerprint,
    force_clean: bool,
    mut fingerprint_of: F,
) -> BuildResult<Classification>
where
    F: FnMut(&str) -> BuildResult<Fingerprint>,
{
    let full_rebuild = match prior {
        _ if force_clean => Some(FullRebuildReason::ForcedClean),
        None => Some(FullRebuildReason::ManifestMissing),
        Some(manifest) if manifest.settings != *config_fingerprint => {
            Some(FullRebuildReason::ConfigChanged)
        }
        Some(_) => None,
    };

    let mut entries = Vec::new();
    let mut removed = Vec::new();

    let manifest = match (full_rebuild, prior) {
        (None, Some(prior)) => {
            let mut manifest = prior.clone();
            manifest.settings = config_fingerprint.clone();

            for path in current_files {
                let hash = fingerprint_of(path)?;
                let reason = match prior.get(path) {
                    Some(recorded) if *recorded == hash => {
                        tracing::trace!("unchanged: {}", path);
                        continue;
                    }
                    Some(_) => RecompileReason::Modified,
                    None => RecompileReason::New,
                };

                tracing::debug!("{:?}: {}", reason, path);
                manifest.files.insert(path.clone(), hash);
                entries.push(RebuildEntry {
                    path: path.clone(),
                    reason,
                });
            }

            let current: HashSet<&str> = current_files.iter().map(String::as_str).collect();
            removed = prior
                .files
                .keys()
                .filter(|key| !current.contains(key.as_str()))
                .cloned()
                .collect();
            manifest
        }
        _ => {
            let mut manifest = Manifest::new(config_fingerprint.clone());
            for path in current_files {
                let hash = fingerprint_of(path)?;
                manifest.files.insert(path.clone(), hash);
                entries.push(RebuildEntry {
                    path: path.clone(),
                    reason: RecompileReason::FullRebuild,
                });
            }
            manifest
        }
    };

    if let Some(reason) = full_rebuild {
        tracing::info!("Full rebuild: {}", reason.describe());
    }

    Ok(Classification {
        rebuild: RebuildSet {
            entries,
            full_rebuild,
        },
        manifest,
        removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::compute_hash;
    use std::collections::HashMap;

    fn hashes(files: &[(&str, &str)]) -> HashMap<String, Fingerprint> {
        files
            .iter()
            .map(|(path, content)| (path.to_string(), compute_hash(content.as_bytes())))
            .collect()
    }

    fn run(
        files: &HashMap<String, Fingerprint>,
        order: &[&str],
        prior: Option<&Manifest>,
        config: &Fingerprint,
        force_clean: bool,
    ) -> Classification {
        let current: Vec<String> = order.iter().map(|s| s.to_string()).collect();
        classify_with(&current, prior, config, force_clean, |key| Ok(files[key].clone())).unwrap()
    }

    #[test]
    fn test_incremental_new_and_modified() {
        let config = compute_hash(b"cfg");
        let mut prior = Manifest::new(config.clone());
        prior.files.insert("a.cpp".to_string(), compute_hash(b"a1"));
        prior.files.insert("b.cpp".to_string(), compute_hash(b"b"));

        let files = hashes(&[("a.cpp", "a2"), ("b.cpp", "b"), ("c.cpp", "c")]);
        let result = run(&files, &["a.cpp", "b.cpp", "c.cpp"], Some(&prior), &config, false);

        assert!(!result.rebuild.is_full_rebuild());
        assert_eq!(
            result.rebuild.entries(),
            &[
                RebuildEntry {
                    path: "a.cpp".to_string(),
                    reason: RecompileReason::Modified
                },
                RebuildEntry {
                    path: "c.cpp".to_string(),
                    reason: RecompileReason::New
                },
            ]
        );
        assert_eq!(result.manifest.get("a.cpp"), Some(&compute_hash(b"a2")));
        assert_eq!(result.manifest.get("b.cpp"), Some(&compute_hash(b"b")));
        assert_eq!(result.manifest.get("c.cpp"), Some(&compute_hash(b"c")));
    }

    #[test]
    fn test_missing_manifest_is_full_rebuild() {
        let config = compute_hash(b"cfg");
        let files = hashes(&[("a.cpp", "a"), ("b.h", "b")]);
        let result = run(&files, &["a.cpp", "b.h"], None, &config, false);

        assert_eq!(
            result.rebuild.full_rebuild(),
            Some(FullRebuildReason::ManifestMissing)
        );
        assert_eq!(result.rebuild.len(), 2);
        assert_eq!(result.manifest.settings, config);
        assert_eq!(result.manifest.len(), 2);
    }

    #[test]
    fn test_config_change_drops_stale_entries() {
        let old_config = compute_hash(b"old");
        let mut prior = Manifest::new(old_config);
        prior.files.insert("a.cpp".to_string(), compute_hash(b"a"));
        prior.files.insert("gone.cpp".to_string(), compute_hash(b"gone"));

        let new_config = compute_hash(b"new");
        let files = hashes(&[("a.cpp", "a")]);
        let result = run(&files, &["a.cpp"], Some(&prior), &new_config, false);

        assert_eq!(
            result.rebuild.full_rebuild(),
            Some(FullRebuildReason::ConfigChanged)
        );
        assert!(result.rebuild.contains("a.cpp"));
        assert_eq!(result.manifest.get("gone.cpp"), None);
        assert_eq!(result.manifest.settings, new_config);
    }

    #[test]
    fn test_force_clean_wins_over_matching_manifest() {
        let config = compute_hash(b"cfg");
        let mut prior = Manifest::new(config.clone());
        prior.files.insert("a.cpp".to_string(), compute_hash(b"a"));

        let files = hashes(&[("a.cpp", "a")]);
        let result = run(&files, &["a.cpp"], Some(&prior), &config, true);

        assert_eq!(
            result.rebuild.full_rebuild(),
            Some(FullRebuildReason::ForcedClean)
        );
        assert_eq!(result.rebuild.entries()[0].reason, RecompileReason::FullRebuild);
    }

    #[test]
    fn test_removed_files_reported_but_kept() {
        let config = compute_hash(b"cfg");
        let mut prior = Manifest::new(config.clone());
        prior.files.insert("a.cpp".to_string(), compute_hash(b"a"));
        prior.files.insert("old.cpp".to_string(), compute_hash(b"old"));

        let files = hashes(&[("a.cpp", "a")]);
        let result = run(&files, &["a.cpp"], Some(&prior), &config, false);

        assert!(result.rebuild.is_empty());
        assert!(!result.rebuild.has_work());
        assert_eq!(result.removed, vec!["old.cpp".to_string()]);
        assert_eq!(result.manifest, prior);
    }

    #[test]
    fn test_empty_universe() {
        let config = compute_hash(b"cfg");
        let prior = Manifest::new(config.clone());
        let result = run(&HashMap::new(), &[], Some(&prior), &config, false);

        assert!(result.rebuild.is_empty());
        assert!(result.manifest.is_empty());
    }
}
