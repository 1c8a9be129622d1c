// Path: crates/cli/src/testing/archive.rs

//! Result archives: node data directories packed into one `.tar.zst` file.

use mkt_types::ArchiveError;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const COMPRESSION_LEVEL: i32 = 3;

/// Writes every non-empty directory in `sources` into a zstd-compressed tar
/// archive at `path`, each under its own name.
///
/// The archive is written to a uniquely named temporary file in the target
/// directory and persisted over `path`, so `path` either holds a complete
/// archive or is left untouched.
/// Returns `Ok(false)` without creating anything when no source has content.
pub fn write_result_archive(
    sources: &[(String, PathBuf)],
    path: &Path,
) -> Result<bool, ArchiveError> {
    let present: Vec<&(String, PathBuf)> =
        sources.iter().filter(|(_, dir)| has_content(dir)).collect();
    if present.is_empty() {
        tracing::info!(target: "cluster", "No validator data to archive");
        return Ok(false);
    }

    let target_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(target_dir)?;

    // Removed on drop unless persisted.
    let temp = NamedTempFile::new_in(target_dir)?;
    write_inner(&present, temp.as_file())?;
    temp.persist(path).map_err(|e| e.error)?;
    tracing::info!(
        target: "cluster",
        "Archived {} validator directories to {}",
        present.len(),
        path.display()
    );
    Ok(true)
}

fn write_inner(sources: &[&(String, PathBuf)], file: &File) -> Result<(), ArchiveError> {
    let encoder = zstd::Encoder::new(BufWriter::new(file), COMPRESSION_LEVEL)?;
    let mut builder = tar::Builder::new(encoder);
    for (name, dir) in sources {
        builder.append_dir_all(name, dir)?;
    }
    let encoder = builder.into_inner()?;
    let mut writer = encoder.finish()?;
    std::io::Write::flush(&mut writer)?;
    writer.get_ref().sync_all()?;
    Ok(())
}

fn has_content(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
