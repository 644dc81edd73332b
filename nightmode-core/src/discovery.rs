//! File discovery module for finding Matroska containers to plan.
//!
//! Searches the whole tree below the given directory for .mkv files
//! (case-insensitive) and returns them as sorted absolute paths.

use crate::error::{CoreError, CoreResult};

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Checks if the given path names a Matroska container (.mkv, any case).
#[must_use]
pub fn is_container_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mkv"))
}

/// Finds every .mkv file below `input_dir`, recursively.
///
/// # Returns
///
/// * `Ok(Vec<PathBuf>)` - Absolute paths, sorted
/// * `Err(CoreError::InputNotFound)` - If `input_dir` is not a directory
/// * `Err(CoreError::Walkdir)` - If an error occurs during directory traversal
/// * `Err(CoreError::NoFilesFound)` - If no .mkv files are found
///
/// # Examples
///
/// ```rust,no_run
/// use nightmode_core::find_container_files;
/// use std::path::Path;
///
/// let files = find_container_files(Path::new("/media/movies")).unwrap();
/// for file in files {
///     println!("{}", file.display());
/// }
/// ```
pub fn find_container_files(input_dir: &Path) -> CoreResult<Vec<PathBuf>> {
    if !input_dir.is_dir() {
        return Err(CoreError::InputNotFound(input_dir.to_path_buf()));
    }
    let root = std::path::absolute(input_dir)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(&root).follow_links(true) {
        let entry = entry?;
        if entry.file_type().is_file() && is_container_file(entry.path()) {
            files.push(entry.into_path());
        }
    }

    if files.is_empty() {
        return Err(CoreError::NoFilesFound);
    }
    files.sort();
    log::debug!("Found {} container files below {}", files.len(), root.display());
    Ok(files)
}
