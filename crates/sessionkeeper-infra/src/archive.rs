//! Tar.gz directory archiving.
//!
//! Implements the `SessionArchiver` trait from `sessionkeeper-core`
//! using the `tar` and `flate2` crates. Archives are deterministic:
//! entries are appended in sorted order with fixed metadata, so packing
//! unchanged content yields byte-identical output and a stable
//! checksum.
//!
//! Restore goes through a staging directory next to the target and is
//! swapped in with a rename, so a truncated or corrupt archive never
//! destroys the existing directory.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use sessionkeeper_core::service::archive::SessionArchiver;
use sessionkeeper_types::error::ArchiveError;

/// Deterministic tar.gz implementation of `SessionArchiver`.
pub struct TarGzArchiver;

impl TarGzArchiver {
    /// Create a new archiver.
    pub fn new() -> Self {
        Self
    }
}

impl Default for TarGzArchiver {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionArchiver for TarGzArchiver {
    async fn pack(&self, dir: &Path) -> Result<Vec<u8>, ArchiveError> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || pack_blocking(&dir))
            .await
            .map_err(|e| ArchiveError::Encoding(e.to_string()))?
    }

    async fn unpack(&self, archive: Vec<u8>, dir: &Path) -> Result<(), ArchiveError> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || unpack_blocking(&archive, &dir))
            .await
            .map_err(|e| ArchiveError::Decoding(e.to_string()))?
    }
}

fn encoding_err(e: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::Encoding(e.to_string())
}

fn decoding_err(e: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::Decoding(e.to_string())
}

fn pack_blocking(dir: &Path) -> Result<Vec<u8>, ArchiveError> {
    if !dir.is_dir() {
        // A first run with no session directory yet; nothing to encode.
        return Ok(Vec::new());
    }

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let appended = append_dir_sorted(&mut builder, dir, Path::new(""))?;
    if appended == 0 {
        return Ok(Vec::new());
    }

    let encoder = builder.into_inner().map_err(encoding_err)?;
    encoder.finish().map_err(encoding_err)
}

/// Append the contents of `dir` under the relative `prefix`, entries
/// sorted by name, directories before their children. Symlinks are
/// skipped. Returns the number of entries appended.
fn append_dir_sorted(
    builder: &mut tar::Builder<GzEncoder<Vec<u8>>>,
    dir: &Path,
    prefix: &Path,
) -> Result<usize, ArchiveError> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(encoding_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()
        .map_err(encoding_err)?;
    entries.sort();

    let mut appended = 0;
    for path in entries {
        let name = match path.file_name() {
            Some(name) => name.to_os_string(),
            None => continue,
        };
        let rel = prefix.join(&name);
        let meta = std::fs::symlink_metadata(&path).map_err(encoding_err)?;

        if meta.file_type().is_symlink() {
            continue;
        }
        if meta.is_dir() {
            let mut header = deterministic_header(tar::EntryType::Directory, 0, 0o755);
            builder
                .append_data(&mut header, &rel, std::io::empty())
                .map_err(encoding_err)?;
            appended += 1;
            appended += append_dir_sorted(builder, &path, &rel)?;
        } else {
            let mut header = deterministic_header(tar::EntryType::Regular, meta.len(), 0o644);
            let file = File::open(&path).map_err(encoding_err)?;
            builder
                .append_data(&mut header, &rel, file)
                .map_err(encoding_err)?;
            appended += 1;
        }
    }
    Ok(appended)
}

fn deterministic_header(kind: tar::EntryType, size: u64, mode: u32) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(kind);
    header.set_size(size);
    header.set_mode(mode);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header
}

fn unpack_blocking(archive: &[u8], target: &Path) -> Result<(), ArchiveError> {
    let parent = target
        .parent()
        .ok_or_else(|| ArchiveError::Decoding("target directory has no parent".to_string()))?;
    std::fs::create_dir_all(parent).map_err(decoding_err)?;

    // Extract into a staging directory first; the existing target is
    // only replaced once the whole archive decoded cleanly.
    let staging = tempfile::Builder::new()
        .prefix(".restore-")
        .tempdir_in(parent)
        .map_err(decoding_err)?;

    if !archive.is_empty() {
        let decoder = GzDecoder::new(archive);
        let mut tar = tar::Archive::new(decoder);
        tar.unpack(staging.path()).map_err(decoding_err)?;
    }

    if target.exists() {
        std::fs::remove_dir_all(target).map_err(decoding_err)?;
    }
    std::fs::rename(staging.keep(), target).map_err(decoding_err)?;
    Ok(())
}
