//! File discovery and workspace preparation.
//!
//! Discovery only looks at the top level of the input directory. A file is
//! pending when it carries a video extension and the output directory does not
//! already hold a file with the same name.

use crate::config::{CoreConfig, TEMP_SUFFIX};
use crate::error::{CoreError, CoreResult};

use std::fs;
use std::path::{Path, PathBuf};

/// Finds video files in the top level of `input_dir`, sorted by path.
///
/// `extensions` are matched case-insensitively and given without the dot.
///
/// # Returns
///
/// * `Ok(Vec<PathBuf>)` - The discovered files
/// * `Err(CoreError::Io)` - If the directory cannot be read
/// * `Err(CoreError::NoFilesFound)` - If no file matches
///
/// # Examples
///
/// ```rust,no_run
/// use gymnast_core::find_processable_files;
/// use std::path::Path;
///
/// let files = find_processable_files(Path::new("/path/to/videos"), &["mp4", "mkv"]);
/// match files {
///     Ok(files) => println!("Found {} video files", files.len()),
///     Err(e) => println!("Error finding video files: {}", e),
/// }
/// ```
pub fn find_processable_files<S: AsRef<str>>(input_dir: &Path, extensions: &[S]) -> CoreResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(input_dir)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            (path.is_file() && has_video_extension(&path, extensions)).then_some(path)
        })
        .collect();

    if files.is_empty() {
        return Err(CoreError::NoFilesFound);
    }
    files.sort();
    Ok(files)
}

/// Whether `path` ends in one of `extensions`, ignoring case.
pub fn has_video_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|known| known.as_ref().eq_ignore_ascii_case(ext)))
}

/// Video files in the input directory that have no counterpart in the output
/// directory yet. An empty input directory yields an empty list.
pub fn pending_files(config: &CoreConfig) -> CoreResult<Vec<PathBuf>> {
    let files = match find_processable_files(&config.input_dir, &config.video_extensions) {
        Ok(files) => files,
        Err(CoreError::NoFilesFound) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    Ok(files
        .into_iter()
        .filter(|file| match file.file_name() {
            Some(name) => {
                let done = config.output_dir.join(name).exists();
                if done {
                    log::debug!("Skipping {}: already in the output directory", file.display());
                }
                !done
            }
            None => false,
        })
        .collect())
}

/// Creates the input and output directories and removes leftover temporary
/// outputs from an interrupted run.
pub fn prepare_workspace(config: &CoreConfig) -> CoreResult<Vec<PathBuf>> {
    for dir in [&config.input_dir, &config.output_dir] {
        fs::create_dir_all(dir)?;
    }
    let removed = remove_temp_leftovers(&config.output_dir)?;
    if !removed.is_empty() {
        log::info!("Removed {} leftover temporary file(s)", removed.len());
    }
    Ok(removed)
}

/// Recursively deletes files whose name has `.tmp` before the final
/// extension (`clip.tmp.mp4`). A file ending in `.tmp` is kept.
pub fn remove_temp_leftovers(root: &Path) -> CoreResult<Vec<PathBuf>> {
    if !root.exists() {
        return Err(CoreError::PathError(format!("Path not found: {}", root.display())));
    }

    let mut candidates = Vec::new();
    collect_temp_files(root, &mut candidates)?;

    let mut removed = Vec::with_capacity(candidates.len());
    for path in candidates {
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("Removed leftover {}", path.display());
                removed.push(path);
            }
            Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
    Ok(removed)
}

fn collect_temp_files(dir: &Path, out: &mut Vec<PathBuf>) -> CoreResult<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_temp_files(&path, out)?;
        } else if path.is_file() && has_temp_marker(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Whether any suffix other than the last one is `.tmp`.
pub fn has_temp_marker(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.ends_with('.') {
        return false;
    }
    // Leading dots belong to the stem, like `.hidden.tmp.mp4`.
    let suffixes: Vec<&str> = name.trim_start_matches('.').split('.').skip(1).collect();
    match suffixes.split_last() {
        Some((_, inner)) => inner.iter().any(|s| s.eq_ignore_ascii_case(TEMP_SUFFIX)),
        None => false,
    }
}
