//! ZIP extraction for downloaded bundles
//!
//! Subsetter results, StreamCat region tables and CDS retrievals all arrive
//! as ZIP archives that are unpacked into the plugin's target directory.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

fn archive_error(archive: &Path, reason: impl Into<String>) -> Error {
    Error::Archive {
        archive: archive.to_path_buf(),
        reason: reason.into(),
    }
}

/// Extract a single entry to disk, creating directories as needed
fn extract_entry(mut file: zip::read::ZipFile, dest: &Path) -> Result<Option<PathBuf>> {
    let path = match file.enclosed_name() {
        Some(name) => dest.join(name),
        None => {
            warn!(entry = file.name(), "skipping entry with unsafe path");
            return Ok(None);
        }
    };

    if file.is_dir() {
        std::fs::create_dir_all(&path)?;
        return Ok(None);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = std::fs::File::create(&path)?;
    std::io::copy(&mut file, &mut out)?;
    Ok(Some(path))
}

/// Extract every entry of `archive` into `dest`
///
/// Returns the paths of the extracted files (directories excluded).
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    debug!(?archive, ?dest, "extracting ZIP archive");
    std::fs::create_dir_all(dest)?;

    let file = std::fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| archive_error(archive, format!("failed to read ZIP archive: {}", e)))?;

    let mut extracted = Vec::new();
    for i in 0..zip.len() {
        let entry = zip
            .by_index(i)
            .map_err(|e| archive_error(archive, format!("failed to read ZIP entry: {}", e)))?;
        if let Some(path) = extract_entry(entry, dest)? {
            extracted.push(path);
        }
    }

    info!(?archive, extracted_count = extracted.len(), "ZIP extraction successful");
    Ok(extracted)
}

/// [`extract_zip`] on the blocking thread pool, deleting the archive afterwards
pub async fn unzip_and_remove(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let (archive_owned, dest_owned) = (archive.to_path_buf(), dest.to_path_buf());
    let extracted = spawn_blocking(move || extract_zip(&archive_owned, &dest_owned))
        .await
        .map_err(|e| archive_error(archive, format!("extraction task panicked: {}", e)))??;
    tokio::fs::remove_file(archive).await?;
    Ok(extracted)
}
