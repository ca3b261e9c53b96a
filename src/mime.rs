//! `MimeResolver` contract, an external collaborator of the planner, plus
//! a small extension-table implementation so the crate runs end to end.

use std::collections::HashMap;

/// Resolves a path or filename to a content-type. `resolve` returns `None`
/// when the extension is unrecognized, matching the planner's fallback to
/// a UTF-8-sniff-then-octet-stream decision.
pub trait MimeResolver: Send + Sync {
    fn resolve(&self, path: &str) -> Option<&str>;
}

/// Static extension → content-type table, the common case for a resolver
/// of this shape (no libmagic, no network lookup).
pub struct ExtensionMimeResolver {
    table: HashMap<&'static str, &'static str>,
}

impl ExtensionMimeResolver {
    pub fn new() -> Self {
        let mut table = HashMap::new();
        table.insert("txt", "text/plain");
        table.insert("md", "text/markdown");
        table.insert("html", "text/html");
        table.insert("htm", "text/html");
        table.insert("css", "text/css");
        table.insert("csv", "text/csv");
        table.insert("json", "application/json");
        table.insert("xml", "application/xml");
        table.insert("js", "text/javascript");
        table.insert("pdf", "application/pdf");
        table.insert("zip", "application/zip");
        table.insert("gz", "application/gzip");
        table.insert("tar", "application/x-tar");
        table.insert("png", "image/png");
        table.insert("jpg", "image/jpeg");
        table.insert("jpeg", "image/jpeg");
        table.insert("gif", "image/gif");
        table.insert("svg", "image/svg+xml");
        table.insert("webp", "image/webp");
        table.insert("ico", "image/x-icon");
        table.insert("mp4", "video/mp4");
        table.insert("mp3", "audio/mpeg");
        table.insert("wav", "audio/wav");
        table.insert("wasm", "application/wasm");
        table.insert("yaml", "application/yaml");
        table.insert("yml", "application/yaml");
        table.insert("toml", "application/toml");
        table.insert("rs", "text/plain");
        table.insert("py", "text/plain");
        table.insert("go", "text/plain");
        ExtensionMimeResolver { table }
    }

    fn extension(path: &str) -> Option<&str> {
        path.rsplit('/').next().unwrap_or(path).rsplit_once('.').map(|(_, ext)| ext)
    }
}

impl Default for ExtensionMimeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MimeResolver for ExtensionMimeResolver {
    fn resolve(&self, path: &str) -> Option<&str> {
        let ext = Self::extension(path)?.to_lowercase();
        self.table.get(ext.as_str()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_extension() {
        let resolver = ExtensionMimeResolver::new();
        assert_eq!(resolver.resolve("a/b.txt"), Some("text/plain"));
    }

    #[test]
    fn unknown_extension_is_none() {
        let resolver = ExtensionMimeResolver::new();
        assert_eq!(resolver.resolve("a/b.weird"), None);
    }

    #[test]
    fn no_extension_is_none() {
        let resolver = ExtensionMimeResolver::new();
        assert_eq!(resolver.resolve("a/b"), None);
    }

    #[test]
    fn case_insensitive() {
        let resolver = ExtensionMimeResolver::new();
        assert_eq!(resolver.resolve("a/B.TXT"), Some("text/plain"));
    }
}
