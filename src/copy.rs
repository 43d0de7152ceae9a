//! Recursive directory copy used to extract a subdirectory from a sparse
//! checkout.
//!
//! `FsTreeCopier` walks the source with `walkdir` and recreates every entry
//! under the destination: directories (empty ones included), regular files
//! and, on Unix, symbolic links. Each entry keeps its permission mode.
//! Directory modes are applied after their contents are written so that a
//! read-only directory can still be populated.
//!
//! The first failing entry aborts the copy. Entries already written stay on
//! disk.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Copies a directory tree.
pub trait TreeCopier: Send + Sync {
    /// Reproduces the contents of `src` under `dst`, creating `dst` if needed.
    fn copy_tree(&self, src: &Path, dst: &Path) -> Result<()>;
}

/// Copies trees on the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsTreeCopier;

fn copy_error(src: &Path, dst: &Path, source: std::io::Error) -> Error {
    Error::Copy {
        src: src.to_path_buf(),
        dst: dst.to_path_buf(),
        source,
    }
}

impl TreeCopier for FsTreeCopier {
    fn copy_tree(&self, src: &Path, dst: &Path) -> Result<()> {
        let mut directories: Vec<(PathBuf, PathBuf)> = Vec::new();

        for entry in WalkDir::new(src).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(src).to_path_buf();
                copy_error(&path, dst, e.into())
            })?;
            let relative = entry
                .path()
                .strip_prefix(src)
                .map_err(|e| {
                    copy_error(
                        entry.path(),
                        dst,
                        std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
                    )
                })?;
            let target = dst.join(relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                fs::create_dir_all(&target).map_err(|e| copy_error(entry.path(), &target, e))?;
                directories.push((entry.path().to_path_buf(), target));
            } else if file_type.is_symlink() {
                copy_symlink(entry.path(), &target)?;
            } else {
                fs::copy(entry.path(), &target).map_err(|e| copy_error(entry.path(), &target, e))?;
                copy_permissions(entry.path(), &target)?;
            }
        }

        // Deepest first, so a read-only parent does not block its children.
        for (source, target) in directories.iter().rev() {
            copy_permissions(source, target)?;
        }

        debug!("copied {} to {}", src.display(), dst.display());
        Ok(())
    }
}

fn copy_permissions(src: &Path, dst: &Path) -> Result<()> {
    let permissions = fs::symlink_metadata(src)
        .map_err(|e| copy_error(src, dst, e))?
        .permissions();
    fs::set_permissions(dst, permissions).map_err(|e| copy_error(src, dst, e))
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src).map_err(|e| copy_error(src, dst, e))?;
    std::os::unix::fs::symlink(&link, dst).map_err(|e| copy_error(src, dst, e))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    // Copy what the link points at.
    fs::copy(src, dst).map_err(|e| copy_error(src, dst, e))?;
    Ok(())
}
