//! Read-only projection of a decoded `Archive` as a POSIX-style file
//! system. Mutators (create/write/delete/rename/watch/temp-dir)
//! simply do not exist on `ReadOnlyFs` — there is nothing to fail at
//! call time.

use crate::model::{Archive, ArchiveEntry, EntryKind};
use std::time::SystemTime;

pub const MAX_SYMLINK_DEPTH: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
    Link,
    Pipe,
    UnixSocket,
    NotFound,
}

/// A stat result, either a real entry or a synthesized directory.
#[derive(Debug, Clone)]
pub struct Stat {
    pub file_type: FileType,
    pub size: u64,
    pub mode: u32,
    pub modified: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub changed: Option<SystemTime>,
}

fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

fn entry_file_type(kind: EntryKind) -> FileType {
    match kind {
        EntryKind::File | EntryKind::HardLink => FileType::File,
        EntryKind::Directory => FileType::Directory,
        EntryKind::SymbolicLink => FileType::Link,
        EntryKind::Fifo => FileType::Pipe,
        EntryKind::Socket => FileType::UnixSocket,
        EntryKind::CharacterDevice | EntryKind::BlockDevice => FileType::File,
    }
}

/// Join a symlink target against the directory containing the link, then
/// normalize `.`/`..` components away. Pure path arithmetic, no I/O.
fn resolve_relative(base_dir: &str, target: &str) -> String {
    let mut segments: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        base_dir.split('/').filter(|s| !s.is_empty()).collect()
    };

    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Read-only file-system view over a single resolved `Archive`.
pub struct ReadOnlyFs<'a> {
    archive: &'a Archive,
}

impl<'a> ReadOnlyFs<'a> {
    pub fn new(archive: &'a Archive) -> Self {
        ReadOnlyFs { archive }
    }

    fn link_target(&self, entry: &ArchiveEntry) -> Option<String> {
        if let Some(link) = &entry.link {
            return Some(link.clone());
        }
        if entry.data.is_empty() {
            return None;
        }
        // No explicit `link` field: the target is the UTF-8 body with
        // trailing whitespace trimmed.
        std::str::from_utf8(&entry.data)
            .ok()
            .map(|s| s.trim_end().to_string())
    }

    /// Resolve a symlink chain starting at `path`, bounded by
    /// `MAX_SYMLINK_DEPTH`. Returns the final non-link path, or `None`
    /// if the chain exceeds the depth limit (a cycle) or dangles.
    fn resolve_link_chain(&self, path: &str) -> Option<String> {
        let mut current = path.to_string();
        for _ in 0..MAX_SYMLINK_DEPTH {
            let entry = self.archive.find(&current)?;
            if entry.kind != EntryKind::SymbolicLink {
                return Some(current);
            }
            let target = self.link_target(entry)?;
            let joined = resolve_relative(dirname(&current), &target);
            current = joined;
        }
        None
    }

    /// `stat(path)`: exact entry, else a synthesized directory
    /// aggregating its children, else `FileType::NotFound`.
    pub fn stat(&self, path: &str) -> Stat {
        let path = normalize(path);

        if let Some(entry) = self.archive.find(path) {
            return Stat {
                file_type: entry_file_type(entry.kind),
                size: entry.size,
                mode: entry.mode.unwrap_or(0o644),
                modified: entry.modified,
                accessed: entry.accessed,
                changed: entry.modified,
            };
        }

        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };

        let children: Vec<&ArchiveEntry> = self
            .archive
            .entries
            .iter()
            .filter(|e| prefix.is_empty() || e.path.starts_with(&prefix))
            .collect();

        if children.is_empty() {
            return Stat {
                file_type: FileType::NotFound,
                size: 0,
                mode: 0,
                modified: None,
                accessed: None,
                changed: None,
            };
        }

        let size = children.iter().map(|e| e.size).sum();
        let modified = children.iter().filter_map(|e| e.modified).max();
        let accessed = children.iter().filter_map(|e| e.accessed).max();

        Stat {
            file_type: FileType::Directory,
            size,
            mode: 0o755,
            modified,
            accessed,
            changed: modified,
        }
    }

    /// `type(path, follow_links)`.
    pub fn entry_type(&self, path: &str, follow_links: bool) -> FileType {
        let path = normalize(path);

        if follow_links {
            let is_link = matches!(self.archive.find(path), Some(e) if e.kind == EntryKind::SymbolicLink);
            if !is_link {
                return self.stat(path).file_type;
            }
            return match self.resolve_link_chain(path) {
                Some(resolved) => self.stat(&resolved).file_type,
                None => FileType::NotFound,
            };
        }

        self.stat(path).file_type
    }

    /// `list(path, recursive, follow_links)`.
    pub fn list(&self, path: &str, recursive: bool, follow_links: bool) -> Vec<ArchiveEntry> {
        let path = normalize(path);
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };

        let mut out = Vec::new();
        let mut seen_dirs = std::collections::HashSet::new();

        for entry in &self.archive.entries {
            if !prefix.is_empty() && !entry.path.starts_with(&prefix) {
                continue;
            }
            if prefix.is_empty() && entry.path.is_empty() {
                continue;
            }

            let relative = entry.path.strip_prefix(&prefix).unwrap_or(&entry.path);
            if relative.is_empty() {
                continue;
            }

            if !recursive {
                if let Some(slash) = relative.find('/') {
                    let dir_name = &relative[..slash];
                    if !seen_dirs.insert(dir_name.to_string()) {
                        continue;
                    }
                    let dir_path = format!("{prefix}{dir_name}");
                    let synthetic = self.archive.find(&dir_path).cloned().unwrap_or_else(|| {
                        ArchiveEntry {
                            path: dir_path.clone(),
                            size: 0,
                            kind: EntryKind::Directory,
                            modified: None,
                            accessed: None,
                            created: None,
                            mode: Some(0o755),
                            data: bytes::Bytes::new(),
                            metadata: Default::default(),
                            link: None,
                            link_encoding: Default::default(),
                        }
                    });
                    out.push(synthetic);
                    continue;
                }
            }

            if follow_links && entry.kind == EntryKind::SymbolicLink {
                if let Some(resolved_path) = self.resolve_link_chain(&entry.path) {
                    if let Some(resolved) = self.archive.find(&resolved_path) {
                        out.push(resolved.clone());
                        continue;
                    }
                }
                continue;
            }

            out.push(entry.clone());
        }

        out
    }

    /// `read(path)`: the entry's bytes, or `None` if not a file or absent.
    pub fn read(&self, path: &str) -> Option<bytes::Bytes> {
        let path = normalize(path);
        let entry = self.archive.find(path)?;
        if entry.kind != EntryKind::File {
            return None;
        }
        Some(entry.data.clone())
    }
}
