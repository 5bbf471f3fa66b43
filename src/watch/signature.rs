//! Content signatures of watched files.
//!
//! A file's signature is its mtime, length and blake3 hash. The hash is only
//! recomputed when mtime or length moved, and only the hash decides whether
//! the file changed, so a `touch` is not a modification.

use super::WatchFilter;
use crate::debug;
use jwalk::WalkDir;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of_file(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::with_capacity(64 * 1024, file);
        let mut hasher = blake3::Hasher::new();
        let mut buffer = [0u8; 64 * 1024];

        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    hasher.update(&buffer[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(Self(*hasher.finalize().as_bytes()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSignature {
    pub modified: Option<SystemTime>,
    pub len: u64,
    pub hash: ContentHash,
}

/// Signatures of every relevant file under the watched roots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    files: BTreeMap<PathBuf, FileSignature>,
}

impl Snapshot {
    /// Walk `roots`, reusing hashes from `previous` for files whose mtime
    /// and length are unchanged.
    pub fn scan(roots: &[PathBuf], filter: &WatchFilter, previous: &Snapshot) -> Self {
        let mut files = BTreeMap::new();
        for root in roots.iter().filter(|r| r.is_dir()) {
            for path in relevant_files(root, filter) {
                match signature(&path, previous.files.get(&path)) {
                    Ok(sig) => {
                        files.insert(path, sig);
                    }
                    Err(e) => debug!("watch"; "cannot read {}: {e}", path.display()),
                }
            }
        }
        Self { files }
    }

    /// Files added, removed or whose content differs between `self` and `next`.
    pub fn changes(&self, next: &Snapshot) -> Vec<PathBuf> {
        let mut changed: Vec<PathBuf> = next
            .files
            .iter()
            .filter(|(path, sig)| self.files.get(*path).is_none_or(|old| old.hash != sig.hash))
            .map(|(path, _)| path.clone())
            .collect();
        changed.extend(
            self.files
                .keys()
                .filter(|path| !next.files.contains_key(*path))
                .cloned(),
        );
        changed.sort();
        changed
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

fn signature(path: &Path, previous: Option<&FileSignature>) -> io::Result<FileSignature> {
    let meta = std::fs::metadata(path)?;
    let modified = meta.modified().ok();
    let len = meta.len();

    if let Some(prev) = previous
        && prev.modified == modified
        && prev.len == len
    {
        return Ok(*prev);
    }
    Ok(FileSignature {
        modified,
        len,
        hash: ContentHash::of_file(path)?,
    })
}

fn relevant_files(root: &Path, filter: &WatchFilter) -> Vec<PathBuf> {
    let skip = filter.clone();
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .skip_hidden(false)
        .process_read_dir(move |depth, _, _, children| {
            // The root itself arrives with no parent depth; never prune it.
            if depth.is_none() {
                return;
            }
            children.retain(|entry| match entry {
                Ok(e) if e.file_type().is_dir() => !skip.skips_dir(&e.file_name.to_string_lossy()),
                _ => true,
            });
        })
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|p| filter.is_relevant(p))
        .collect();
    files.sort();
    files
}
