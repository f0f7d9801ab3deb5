//! `file://` URI <-> path conversion.

use std::path::{Path, PathBuf};

/// Convert a `file://` URI string to a file system path. `None` for other
/// schemes.
///
/// On Unix `file:///foo/bar` becomes `/foo/bar`; on Windows
/// `file:///C:/foo` becomes `C:/foo`.
pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    let path = uri.strip_prefix("file://")?;
    // Drop an authority (`file://localhost/...`).
    let path = match path.find('/') {
        Some(0) => path,
        Some(idx) => &path[idx..],
        None => return None,
    };
    let decoded = percent_decode(path);
    #[cfg(windows)]
    {
        let decoded = decoded.strip_prefix('/').unwrap_or(&decoded);
        Some(PathBuf::from(decoded))
    }
    #[cfg(not(windows))]
    {
        Some(PathBuf::from(decoded))
    }
}

/// Absolute `file://` URI for `path`.
pub fn path_to_uri(path: &Path) -> String {
    let abs = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut s = abs.to_string_lossy().replace('\\', "/");
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    format!("file://{}", percent_encode(&s))
}

fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' | b':' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// Decode percent-encoded characters in a URI path (e.g. `%3A` → `:`).
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(h), Some(l)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                out.push(h << 4 | l);
                i += 3;
                continue;
            }
        }
        // Malformed percent encoding passes through.
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(windows))]
    #[test]
    fn round_trips_paths_with_spaces() {
        let uri = path_to_uri(Path::new("/work/my shop/cue/domain/user.json"));
        assert_eq!(uri, "file:///work/my%20shop/cue/domain/user.json");
        assert_eq!(
            uri_to_path(&uri),
            Some(PathBuf::from("/work/my shop/cue/domain/user.json"))
        );
    }

    #[test]
    fn other_schemes_have_no_path() {
        assert_eq!(uri_to_path("untitled:Untitled-1"), None);
        assert_eq!(percent_decode("a%2"), "a%2");
        assert_eq!(percent_decode("%C3%A9"), "é");
    }
}
