//! Filesystem helpers used by the installer.

use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{GraftError, Result};

/// Recursively copies the contents of `src` into `dst`.
///
/// `dst` is created if missing. Existing files with the same relative path
/// are overwritten; other files already in `dst` are left alone. File mode
/// bits are carried over by `fs::copy`. Returns the number of files copied.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<usize> {
    let copy_err = |message: String| GraftError::CopyDir {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        message,
    };

    if !src.is_dir() {
        return Err(copy_err("source is not a directory".to_string()));
    }

    fs::create_dir_all(dst).map_err(|e| copy_err(e.to_string()))?;

    let mut copied = 0;
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| copy_err(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| copy_err(e.to_string()))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| GraftError::CopyDir {
                from: entry.path().to_path_buf(),
                to: target.clone(),
                message: e.to_string(),
            })?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| GraftError::CopyDir {
                from: entry.path().to_path_buf(),
                to: target.clone(),
                message: e.to_string(),
            })?;
            copied += 1;
        }
    }

    tracing::debug!(from = %src.display(), to = %dst.display(), files = copied, "Copied directory");
    Ok(copied)
}

/// Files under `dst` that `copy_dir(src, dst)` would replace with different
/// content, as paths relative to `dst`. Identical files are not conflicts.
pub fn conflicting_files(src: &Path, dst: &Path) -> Result<Vec<PathBuf>> {
    let read_err = |path: &Path, e: std::io::Error| GraftError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    };

    let mut conflicts = Vec::new();
    if !src.is_dir() || !dst.is_dir() {
        return Ok(conflicts);
    }

    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| GraftError::ReadDirectory {
            path: src.to_path_buf(),
            source: e.into(),
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);
        if !target.is_file() {
            continue;
        }

        let incoming = fs::read(entry.path()).map_err(|e| read_err(entry.path(), e))?;
        let existing = fs::read(&target).map_err(|e| read_err(&target, e))?;
        if incoming != existing {
            conflicts.push(relative.to_path_buf());
        }
    }
    Ok(conflicts)
}

/// Lexically normalizes a path: drops `.` segments and folds `..` into the
/// preceding segment where one exists. Never touches the filesystem.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

/// Renders a relative path with `/` separators, as written into manifests.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
