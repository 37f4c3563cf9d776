//! Session blob codec: staging directory ↔ opaque archive blob.
//!
//! The messaging client reads and writes its credential artifacts as a
//! directory tree; the store persists a single opaque blob. The codec
//! bridges the two with a deterministic tar.gz so that the same tree
//! always encodes to the same bytes and one blob always decodes to the
//! same tree.
//!
//! The client flushes its artifacts asynchronously after lifecycle
//! events, so `encode` first waits for the directory to materialize:
//! poll with a fixed interval against a hard deadline, then give up
//! explicitly — never block indefinitely.

use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tar::Archive;

use pl_domain::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct SessionCodec {
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl SessionCodec {
    pub fn new(poll_interval: Duration, wait_timeout: Duration) -> Self {
        Self {
            poll_interval,
            wait_timeout,
        }
    }

    /// Archive the staging directory into a blob.
    ///
    /// Waits up to the configured timeout for the directory to contain
    /// at least one entry (bounded-wait materialization), then produces
    /// a deterministic tar.gz: entries in sorted order, normalized mode
    /// and mtime, so encoding an unchanged tree is byte-stable.
    pub async fn encode(&self, dir: &Path) -> Result<Vec<u8>> {
        let deadline = tokio::time::Instant::now() + self.wait_timeout;
        while !artifact_present(dir) {
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::Encode(format!(
                    "no session artifact in {} after {:?}",
                    dir.display(),
                    self.wait_timeout
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        archive_dir(dir)
    }

    /// Materialize a blob back into the staging directory, replacing any
    /// prior contents.
    ///
    /// Entry paths are validated (no traversal, no absolute paths, no
    /// links) even though we produced the archive ourselves — the store
    /// is remote and the blob may be anything. A blob that does not
    /// parse is [`Error::MalformedBlob`]; the caller proceeds as if no
    /// session existed.
    pub fn decode(&self, blob: &[u8], dir: &Path) -> Result<()> {
        // Parse and validate fully before touching the filesystem, so a
        // malformed blob cannot leave a half-written staging dir behind.
        let entries = unpack_entries(blob)?;

        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        std::fs::create_dir_all(dir)?;

        for entry in entries {
            let full = dir.join(&entry.rel_path);
            if entry.is_dir {
                std::fs::create_dir_all(&full)?;
            } else {
                if let Some(parent) = full.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&full, &entry.contents)?;
            }
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Archiving
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Whether the staging directory has materialized (exists, non-empty).
fn artifact_present(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut it| it.next().is_some())
        .unwrap_or(false)
}

fn archive_dir(dir: &Path) -> Result<Vec<u8>> {
    let gz = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(gz);

    for (rel, is_dir) in walk_sorted(dir, dir)? {
        if is_dir {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            header.set_mtime(0);
            header.set_cksum();
            builder
                .append_data(&mut header, &rel, std::io::empty())
                .map_err(Error::Io)?;
        } else {
            let bytes = std::fs::read(dir.join(&rel))?;
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(bytes.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(0);
            header.set_cksum();
            builder
                .append_data(&mut header, &rel, bytes.as_slice())
                .map_err(Error::Io)?;
        }
    }

    let gz = builder.into_inner().map_err(Error::Io)?;
    let blob = gz.finish().map_err(Error::Io)?;
    Ok(blob)
}

/// Recursive directory walk with sorted entries, for deterministic
/// archive ordering. Returns paths relative to `root`.
fn walk_sorted(root: &Path, dir: &Path) -> Result<Vec<(PathBuf, bool)>> {
    let mut names: Vec<PathBuf> = std::fs::read_dir(dir)?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|e| e.path())
        .collect();
    names.sort();

    let mut out = Vec::new();
    for path in names {
        let rel = path
            .strip_prefix(root)
            .map_err(|_| Error::Encode(format!("{} escapes staging root", path.display())))?
            .to_path_buf();
        let meta = std::fs::symlink_metadata(&path)?;
        if meta.is_dir() {
            out.push((rel, true));
            out.extend(walk_sorted(root, &path)?);
        } else if meta.is_file() {
            out.push((rel, false));
        } else {
            // Sockets/symlinks the automation backend leaves behind do
            // not round-trip; skip them rather than fail the save.
            tracing::debug!(path = %path.display(), "skipping non-regular staging entry");
        }
    }
    Ok(out)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Unpacking
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct UnpackedEntry {
    rel_path: PathBuf,
    is_dir: bool,
    contents: Vec<u8>,
}

fn unpack_entries(blob: &[u8]) -> Result<Vec<UnpackedEntry>> {
    let gz = GzDecoder::new(blob);
    let mut archive = Archive::new(gz);

    let mut out = Vec::new();
    let entries = archive
        .entries()
        .map_err(|e| Error::MalformedBlob(format!("tar entries failed: {e}")))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| Error::MalformedBlob(format!("tar entry read failed: {e}")))?;

        let entry_type = entry.header().entry_type();
        match entry_type {
            // Metadata records are consumed transparently; skip them.
            tar::EntryType::XHeader
            | tar::EntryType::XGlobalHeader
            | tar::EntryType::GNULongName
            | tar::EntryType::GNULongLink => continue,
            tar::EntryType::Regular | tar::EntryType::Directory => {}
            other => {
                return Err(Error::MalformedBlob(format!(
                    "unsupported entry type {other:?} in session blob"
                )));
            }
        }

        let raw_path = entry
            .path()
            .map_err(|e| Error::MalformedBlob(format!("tar path read failed: {e}")))?
            .into_owned();
        let rel_path = validate_entry_path(&raw_path)?;

        let mut contents = Vec::new();
        if entry_type == tar::EntryType::Regular {
            entry
                .read_to_end(&mut contents)
                .map_err(|e| Error::MalformedBlob(format!("tar data read failed: {e}")))?;
        }

        out.push(UnpackedEntry {
            rel_path,
            is_dir: entry_type == tar::EntryType::Directory,
            contents,
        });
    }

    Ok(out)
}

/// Reject traversal, absolute paths, and platform prefixes; strip `.`.
fn validate_entry_path(path: &Path) -> Result<PathBuf> {
    let mut parts = Vec::new();
    for comp in path.components() {
        match comp {
            Component::Normal(s) => parts.push(s),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::MalformedBlob(format!(
                    "parent dir traversal in blob entry: {}",
                    path.display()
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::MalformedBlob(format!(
                    "absolute path in blob entry: {}",
                    path.display()
                )));
            }
        }
    }
    if parts.is_empty() {
        return Err(Error::MalformedBlob(format!(
            "blob entry path normalizes to empty: {}",
            path.display()
        )));
    }
    Ok(parts.iter().collect())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
