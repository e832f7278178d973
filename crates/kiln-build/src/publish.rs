//! Header publishing for library projects
//!
//! Mirrors every header under the source and header roots into the configured
//! output directory. Copy failures do not stop the walk; they are collected
//! and reported together once every file has been attempted.

use crate::error::{BuildError, BuildResult, CopyFailure};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Replace `output` with the headers found under `roots`
///
/// Returns the number of headers copied. Relative paths resolve against
/// `project_dir`; the layout below each root is preserved.
pub fn publish_headers(
    project_dir: &Path,
    roots: &[PathBuf],
    header_suffix: &str,
    output: &Path,
) -> BuildResult<usize> {
    let output = project_dir.join(output);
    if output.exists() {
        fs::remove_dir_all(&output).map_err(|e| BuildError::io(&output, e))?;
    }
    fs::create_dir_all(&output).map_err(|e| BuildError::io(&output, e))?;

    let mut copied = 0;
    let mut failures = Vec::new();

    for root in roots {
        let root_dir = project_dir.join(root);
        if !root_dir.is_dir() {
            continue;
        }

        // The output may live inside a root; never copy it into itself
        let walker = WalkDir::new(&root_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !e.path().starts_with(&output));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    failures.push(CopyFailure {
                        source: e.path().map(Path::to_path_buf).unwrap_or_else(|| root_dir.clone()),
                        destination: output.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if !entry.file_type().is_file()
                || !entry.file_name().to_string_lossy().ends_with(header_suffix)
            {
                continue;
            }

            let relative = entry.path().strip_prefix(&root_dir).unwrap_or(entry.path());
            let destination = output.join(relative);
            let result = destination
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|_| fs::copy(entry.path(), &destination));

            match result {
                Ok(_) => copied += 1,
                Err(e) => failures.push(CopyFailure {
                    source: entry.path().to_path_buf(),
                    destination,
                    reason: e.to_string(),
                }),
            }
        }
    }

    if failures.is_empty() {
        tracing::info!("Published {} header(s) to {}", copied, output.display());
        Ok(copied)
    } else {
        Err(BuildError::HeaderPublish { failures })
    }
}
