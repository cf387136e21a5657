//! Filesystem and parsing helpers shared across probes.

use std::fs;
use std::io::Read;
use std::path::Path;

use serde_json::{Map, Value};

/// Read a whole file as lossy UTF-8, untrimmed.
pub fn read_raw(path: &Path) -> Option<String> {
    fs::read(path).ok().map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// Read a file and trim surrounding whitespace.
pub fn read_trimmed(path: &Path) -> Option<String> {
    read_raw(path).map(|text| text.trim().to_string())
}

/// Read the first line of a file, trimmed.
pub fn read_first_line(path: &Path) -> Option<String> {
    read_raw(path).map(|text| text.lines().next().unwrap_or("").trim().to_string())
}

/// Read at most `max_bytes` from the start of a file, as lossy UTF-8.
pub fn read_head(path: &Path, max_bytes: usize) -> Option<String> {
    let mut file = fs::File::open(path).ok()?;
    let mut buf = vec![0u8; max_bytes];
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(_) => return None,
        }
    }
    buf.truncate(filled);
    Some(String::from_utf8_lossy(&buf).into_owned())
}

/// Wrap optional text as a JSON value, null when absent.
pub fn string_or_null(text: Option<String>) -> Value {
    text.map(Value::String).unwrap_or(Value::Null)
}

/// Sorted entry names of a directory, empty when unreadable.
pub fn dir_names(path: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(path)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Parse `key: value` lines into a string map. Lines without a colon are
/// skipped.
pub fn parse_key_values(text: &str) -> Map<String, Value> {
    let mut map = Map::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once(':') {
            map.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
        }
    }
    map
}

/// Fields of uname(2), decoded lossily.
#[derive(Debug, Clone)]
pub struct UnameInfo {
    pub system: String,
    pub node: String,
    pub release: String,
    pub version: String,
    pub machine: String,
}

/// Call uname(2). `None` only when the syscall itself fails.
pub fn uname_info() -> Option<UnameInfo> {
    // SAFETY: utsname is plain fixed-width C char arrays; all-zero is a
    // valid initial value.
    let mut buf: libc::utsname = unsafe { std::mem::zeroed() };
    // SAFETY: uname fills the struct we own; a nonzero return means the
    // buffer contents must not be used.
    let rc = unsafe { libc::uname(&mut buf) };
    if rc != 0 {
        return None;
    }
    Some(UnameInfo {
        system: cstr_field(&buf.sysname),
        node: cstr_field(&buf.nodename),
        release: cstr_field(&buf.release),
        version: cstr_field(&buf.version),
        machine: cstr_field(&buf.machine),
    })
}

fn cstr_field(field: &[libc::c_char]) -> String {
    let bytes: Vec<u8> = field.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_temp(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn read_variants_trim_as_documented() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "f", "  first line  \nsecond\n");
        assert_eq!(read_raw(&path).unwrap(), "  first line  \nsecond\n");
        assert_eq!(read_trimmed(&path).unwrap(), "first line  \nsecond");
        assert_eq!(read_first_line(&path).unwrap(), "first line");
    }

    #[test]
    fn read_missing_file_is_none() {
        assert!(read_raw(Path::new("/definitely/not/here")).is_none());
        assert!(read_first_line(Path::new("/definitely/not/here")).is_none());
    }

    #[test]
    fn read_head_caps_at_max_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "big", &"x".repeat(10_000));
        assert_eq!(read_head(&path, 100).unwrap().len(), 100);
        let path = write_temp(&dir, "small", "tiny");
        assert_eq!(read_head(&path, 100).unwrap(), "tiny");
    }

    #[test]
    fn dir_names_sorts_and_tolerates_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        write_temp(&dir, "b", "");
        write_temp(&dir, "a", "");
        write_temp(&dir, "c", "");
        assert_eq!(dir_names(dir.path()), ["a", "b", "c"]);
        assert!(dir_names(Path::new("/definitely/not/here")).is_empty());
    }

    #[test]
    fn key_value_parsing_trims_both_sides() {
        let map = parse_key_values("driver: ixgbe\nfirmware-version:  1.2.3 \nnocolon\n");
        assert_eq!(map.get("driver"), Some(&Value::String("ixgbe".to_string())));
        assert_eq!(map.get("firmware-version"), Some(&Value::String("1.2.3".to_string())));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn string_or_null_maps_absence_to_null() {
        assert_eq!(string_or_null(Some("x".to_string())), Value::String("x".to_string()));
        assert_eq!(string_or_null(None), Value::Null);
    }

    #[test]
    fn uname_reports_a_nonempty_release() {
        let info = uname_info().unwrap();
        assert!(!info.release.is_empty());
        assert_eq!(info.system, "Linux");
    }
}
