//! Source discovery: the file universe seen by the change classifier

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Collect every file under `source_roots` whose name ends with one of
/// `suffixes`, as normalized project-relative keys.
///
/// Suffixes are the outer loop and roots the inner one, both in declared
/// order; each directory is walked sorted by file name. A file reachable
/// through two roots or matching two suffixes is kept at its first sighting.
///
/// Directories in `excluded` are build outputs and are not descended into.
/// An exclusion that contains a whole source root is ignored for that root.
pub fn discover_sources(
    project_dir: &Path,
    source_roots: &[PathBuf],
    suffixes: &[String],
    excluded: &[PathBuf],
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    let excluded: Vec<String> = excluded
        .iter()
        .map(|dir| normalize_key(project_dir, &project_dir.join(dir)))
        .collect();

    for suffix in suffixes {
        for root in source_roots {
            let root_dir = project_dir.join(root);
            if !root_dir.is_dir() {
                tracing::warn!("Source location {} does not exist", root_dir.display());
                continue;
            }

            let root_key = normalize_key(project_dir, &root_dir);
            let skipped: Vec<&String> = excluded
                .iter()
                .filter(|dir| !is_within(&root_key, dir))
                .collect();

            for entry in WalkDir::new(&root_dir)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| {
                    let key = normalize_key(project_dir, e.path());
                    !skipped.iter().any(|dir| is_within(&key, dir))
                })
            {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!("Skipping unreadable entry under {}: {}", root_dir.display(), e);
                        continue;
                    }
                };

                if !entry.file_type().is_file()
                    || !entry.file_name().to_string_lossy().ends_with(suffix.as_str())
                {
                    continue;
                }

                let key = normalize_key(project_dir, entry.path());
                if seen.insert(key.clone()) {
                    files.push(key);
                }
            }
        }
    }

    files
}

/// Normalized manifest key for `path`: relative to `project_dir` when it lies
/// inside it, `/`-separated, without `.` components.
pub fn normalize_key(project_dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(project_dir).unwrap_or(path);
    let mut parts = Vec::new();
    let mut absolute = false;

    for component in relative.components() {
        match component {
            Component::CurDir => {}
            Component::RootDir => absolute = true,
            Component::Prefix(prefix) => parts.push(prefix.as_os_str().to_string_lossy().into_owned()),
            Component::ParentDir => parts.push("..".to_string()),
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }

    let joined = parts.join("/");
    if absolute && !joined.starts_with('/') {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Whether `key` names `dir` or something below it
fn is_within(key: &str, dir: &str) -> bool {
    dir.is_empty()
        || key == dir
        || key.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/'))
}

/// Resolve a manifest key back to a path on disk
pub fn resolve_key(project_dir: &Path, key: &str) -> PathBuf {
    project_dir.join(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel).unwrap();
    }

    #[test]
    fn test_discover_by_suffix_then_root() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "src/main.cpp");
        touch(temp_dir.path(), "src/util/math.cpp");
        touch(temp_dir.path(), "src/util/math.h");
        touch(temp_dir.path(), "lib/extra.c");
        touch(temp_dir.path(), "src/readme.txt");

        let files = discover_sources(
            temp_dir.path(),
            &[PathBuf::from("src"), PathBuf::from("lib")],
            &[".cpp".to_string(), ".c".to_string(), ".h".to_string()],
            &[],
        );

        assert_eq!(
            files,
            vec!["src/main.cpp", "src/util/math.cpp", "lib/extra.c", "src/util/math.h"]
        );
    }

    #[test]
    fn test_overlapping_roots_deduplicated() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "src/a/one.cpp");

        let files = discover_sources(
            temp_dir.path(),
            &[PathBuf::from("src"), PathBuf::from("./src/a")],
            &[".cpp".to_string()],
            &[],
        );

        assert_eq!(files, vec!["src/a/one.cpp"]);
    }

    #[test]
    fn test_missing_root_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let files = discover_sources(
            temp_dir.path(),
            &[PathBuf::from("nope")],
            &[".cpp".to_string()],
            &[],
        );
        assert!(files.is_empty());
    }

    #[test]
    fn test_output_directories_not_discovered() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "src/lib.cpp");
        touch(temp_dir.path(), "src/lib.h");
        touch(temp_dir.path(), "src/public/lib.h");
        touch(temp_dir.path(), "src/obj/stray.cpp");
        touch(temp_dir.path(), "src/objects.cpp");

        let files = discover_sources(
            temp_dir.path(),
            &[PathBuf::from("src")],
            &[".cpp".to_string(), ".h".to_string()],
            &[PathBuf::from("./src/public"), PathBuf::from("src/obj")],
        );

        assert_eq!(files, vec!["src/lib.cpp", "src/objects.cpp", "src/lib.h"]);
    }

    #[test]
    fn test_exclusion_covering_root_ignored() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "main.cpp");
        touch(temp_dir.path(), "obj/stale.cpp");

        let files = discover_sources(
            temp_dir.path(),
            &[PathBuf::from(".")],
            &[".cpp".to_string()],
            &[PathBuf::from("."), PathBuf::from("obj")],
        );

        assert_eq!(files, vec!["main.cpp"]);
    }

    #[test]
    fn test_normalize_key() {
        let project = Path::new("/work/app");
        assert_eq!(normalize_key(project, Path::new("/work/app/./src/x.cpp")), "src/x.cpp");
        assert_eq!(normalize_key(project, Path::new("/work/app/../lib/y.c")), "../lib/y.c");
    }
}
