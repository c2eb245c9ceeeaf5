//! Normalization of user-supplied names into safe identifiers.
//!
//! Every function here is idempotent: feeding its output back in returns the same string.

use std::path::Path;

use crate::utils::config::{StorageDefaults, WorkspaceLayout};

/// Keep letters, digits, whitespace and hyphens; collapse whitespace runs to one space; trim.
pub fn sanitize_title(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase, map everything outside `[a-z0-9_-]` to `_`, collapse `_` runs, trim `_`.
/// Returns the default database name when nothing survives.
pub fn sanitize_database_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' {
            c
        } else {
            '_'
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        StorageDefaults::DATABASE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Collection a run writes into: per-course when a course is given, otherwise the configured default.
pub fn collection_name(course: Option<&str>, default_collection: &str) -> String {
    match course.map(str::trim).filter(|c| !c.is_empty()) {
        Some(course) => format!(
            "{}{}",
            StorageDefaults::COURSE_PREFIX,
            sanitize_database_name(course)
        ),
        None => sanitize_database_name(default_collection),
    }
}

/// Extension of an uploaded file name, dot included. Falls back to `.mp4` when the name has
/// none or the extension is not plain alphanumerics.
pub fn upload_extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| WorkspaceLayout::DEFAULT_EXTENSION.to_string())
}

/// `Video_{number}_[{safe_title}]{extension}`.
///
/// `number` goes through [`sanitize_title`] too, so separators in it cannot escape the video directory.
pub fn video_file_name(number: &str, safe_title: &str, extension: &str) -> String {
    format!(
        "Video_{}_[{}]{}",
        sanitize_title(number),
        safe_title,
        extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_rejects_odd_characters() {
        assert_eq!(upload_extension(Some("clip.m p4")), ".mp4");
        assert_eq!(upload_extension(Some(".bashrc")), ".mp4");
        assert_eq!(upload_extension(Some("lecture.MKV")), ".MKV");
    }

    #[test]
    fn number_cannot_traverse() {
        assert_eq!(video_file_name("../01", "Intro", ".mp4"), "Video_01_[Intro].mp4");
    }
}
