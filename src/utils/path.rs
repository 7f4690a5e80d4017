//! Key path handling shared by the origin and the destination side.
//!
//! A backend name is normalized so that it never starts with a separator and always ends with
//! exactly one. Relative key paths lose their leading separators. Joining the two gives the fully
//! qualified key, and stripping the same normalized prefix gives the relative path back.

pub const PATH_SEPARATOR: char = '/';

/// Normalizes a backend name such as `/vault/logical/uuid` or `secret` into `vault/logical/uuid/`
/// or `secret/`. Returns an empty string when nothing but separators was supplied.
pub fn normalize_backend_name(backend_name: &str) -> String {
    let trimmed = backend_name.trim_start_matches(PATH_SEPARATOR).trim_end_matches(PATH_SEPARATOR);
    if trimmed.is_empty() {
        return String::new();
    }

    format!("{trimmed}{PATH_SEPARATOR}")
}

pub fn trim_key_path(path: &str) -> &str {
    path.trim_start_matches(PATH_SEPARATOR)
}

/// Joins an already normalized backend name with a relative key path.
pub fn qualify_key_path(backend_name: &str, path: &str) -> String {
    format!("{}{}", backend_name, trim_key_path(path))
}

pub fn strip_backend_name<'a>(backend_name: &str, key: &'a str) -> &'a str {
    key.strip_prefix(backend_name).unwrap_or(key)
}
