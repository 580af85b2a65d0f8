//! Key/path helpers
//!
//! Paths handed to the driver are bucket-relative keys: no leading slash,
//! no leading `./`. Directories are matched against keys with a trailing
//! slash.

/// Strip leading `.` segments and leading slashes.
///
/// `..` is left alone, as is a dot that starts a name (`.hidden`).
pub fn normalize(path: &str) -> &str {
    let mut path = path.trim_start_matches('/');
    loop {
        if path == "." {
            return "";
        }
        match path.strip_prefix("./") {
            Some(rest) => path = rest.trim_start_matches('/'),
            None => return path,
        }
    }
}

/// Key prefix that matches everything inside a directory, e.g. `a/b/`.
///
/// The bucket root maps to the empty prefix.
pub fn dir_prefix(path: &str) -> String {
    let trimmed = normalize(path).trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// Split a path into its parent directory and final component
pub fn split(path: &str) -> (String, String) {
    let trimmed = normalize(path).trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => (trimmed[..idx].to_string(), trimmed[idx + 1..].to_string()),
        None => (String::new(), trimmed.to_string()),
    }
}

/// Join a directory and a name; an empty directory yields the name alone
pub fn join(directory: &str, name: &str) -> String {
    let directory = directory.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if directory.is_empty() {
        normalize(name).to_string()
    } else if name.is_empty() {
        directory.to_string()
    } else {
        format!("{}/{}", directory, name)
    }
}
