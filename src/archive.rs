//! Zip import/export helpers for gallery directories.
//!
//! Everything here is blocking; async callers go through `spawn_blocking`.
//! The public helpers log failures and report them as `bool`/`Option`.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const ARCHIVE_EXTENSION: &str = "zip";
const FLATTEN_STAGING: &str = ".flatten";

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Zip error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Directory walk error: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Archive has no usable file name: {0}")]
    InvalidArchiveName(PathBuf),
}

/// Extract `archive` into `dest`, creating it if needed.
pub fn unzip(archive: &Path, dest: &Path) -> bool {
    match try_unzip(archive, dest) {
        Ok(()) => true,
        Err(e) => {
            error!("Failed to extract {:?}: {}", archive, e);
            false
        }
    }
}

fn try_unzip(archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(file)?;
    fs::create_dir_all(dest)?;
    zip.extract(dest)?;
    debug!("Extracted {} entries from {:?} to {:?}", zip.len(), archive, dest);
    Ok(())
}

/// Deflate every file under `dir` into `archive`, paths relative to `dir`.
pub fn zip_dir(dir: &Path, archive: &Path) -> bool {
    match try_zip_dir(dir, archive) {
        Ok(count) => {
            debug!("Wrote {} files from {:?} to {:?}", count, dir, archive);
            true
        }
        Err(e) => {
            error!("Failed to archive {:?}: {}", dir, e);
            false
        }
    }
}

fn try_zip_dir(dir: &Path, archive: &Path) -> Result<usize, ArchiveError> {
    if !dir.is_dir() {
        return Err(io::Error::new(io::ErrorKind::NotFound, format!("{:?} is not a directory", dir)).into());
    }

    let mut writer = ZipWriter::new(File::create(archive)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut count = 0;

    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if path == archive {
            continue;
        }
        let Ok(relative) = path.strip_prefix(dir) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer.add_directory(name, options)?;
        } else if entry.file_type().is_file() {
            writer.start_file(name, options)?;
            io::copy(&mut File::open(path)?, &mut writer)?;
            count += 1;
        }
    }

    writer.finish()?;
    Ok(count)
}

/// While `dir` holds nothing but a single subdirectory, hoist that
/// subdirectory's contents up one level and remove it.
pub fn flatten_single_child(dir: &Path) -> Result<(), ArchiveError> {
    loop {
        let entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
        let [only] = entries.as_slice() else {
            return Ok(());
        };
        if !only.file_type()?.is_dir() {
            return Ok(());
        }

        // Move the child aside first so its contents may share its name.
        let staging = unused_path(dir, FLATTEN_STAGING);
        fs::rename(only.path(), &staging)?;
        for inner in fs::read_dir(&staging)? {
            let inner = inner?;
            fs::rename(inner.path(), dir.join(inner.file_name()))?;
        }
        fs::remove_dir(&staging)?;
        debug!("Flattened {:?} into {:?}", only.file_name(), dir);
    }
}

fn unused_path(dir: &Path, base: &str) -> PathBuf {
    let mut candidate = dir.join(base);
    let mut n = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{}{}", base, n));
        n += 1;
    }
    candidate
}

/// Folder name an archive extracts into.
pub fn archive_stem(archive: &Path) -> Result<String, ArchiveError> {
    archive
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ArchiveError::InvalidArchiveName(archive.to_path_buf()))
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(ARCHIVE_EXTENSION))
}

/// Extract every `.zip` directly under `root` into a same-named folder,
/// flatten it and delete the archive. Returns the folders created.
pub fn extract_all_archives(root: &Path) -> Vec<PathBuf> {
    extract_archives_except(root, |_| false)
}

/// Like [`extract_all_archives`], also skipping archives whose folder name
/// `is_taken` reports as already in use elsewhere.
pub fn extract_archives_except(root: &Path, is_taken: impl Fn(&str) -> bool) -> Vec<PathBuf> {
    let mut archives: Vec<PathBuf> = match fs::read_dir(root) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_archive(p))
            .collect(),
        Err(e) => {
            error!("Failed to scan {:?} for archives: {}", root, e);
            return Vec::new();
        }
    };
    archives.sort();

    let mut extracted = Vec::new();
    for archive in archives {
        let name = match archive_stem(&archive) {
            Ok(name) => name,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };
        let folder = root.join(&name);
        if folder.exists() || is_taken(&name) {
            warn!("Gallery '{}' already exists, skipping archive {:?}", name, archive);
            continue;
        }

        if !unzip(&archive, &folder) {
            if folder.exists()
                && let Err(e) = fs::remove_dir_all(&folder)
            {
                warn!("Failed to clean up partial extraction {:?}: {}", folder, e);
            }
            continue;
        }
        if let Err(e) = flatten_single_child(&folder) {
            warn!("Failed to flatten {:?}: {}", folder, e);
        }
        if let Err(e) = fs::remove_file(&archive) {
            warn!("Failed to remove extracted archive {:?}: {}", archive, e);
        }

        info!("Extracted archive {:?} into {:?}", archive, folder);
        extracted.push(folder);
    }

    extracted
}
