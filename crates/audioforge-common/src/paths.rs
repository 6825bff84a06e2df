//! File naming utilities.
//!
//! Uploaded files arrive with user-controlled names. These helpers derive
//! display names for converted artifacts and decide whether a caller-supplied
//! name is safe to join onto a storage directory.

use std::path::Path;

/// Fallback stem used when an upload's name has no usable stem.
const DEFAULT_STEM: &str = "audio";

/// Strip any directory components a client may have sent with a file name.
///
/// Both `/` and `\` are treated as separators since browsers on Windows may
/// send full paths.
///
/// # Examples
///
/// ```
/// use audioforge_common::paths::base_name;
///
/// assert_eq!(base_name("C:\\Users\\me\\clip.mp4"), "clip.mp4");
/// assert_eq!(base_name("../../etc/passwd"), "passwd");
/// assert_eq!(base_name("clip.mp4"), "clip.mp4");
/// ```
pub fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Lowercased extension of a file name, without the dot.
///
/// # Examples
///
/// ```
/// use audioforge_common::paths::file_extension;
///
/// assert_eq!(file_extension("Clip.MP4").as_deref(), Some("mp4"));
/// assert_eq!(file_extension("README"), None);
/// ```
pub fn file_extension(name: &str) -> Option<String> {
    Path::new(base_name(name))
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_lowercase())
}

/// Derive the artifact display name by replacing the upload's extension with
/// the target extension.
///
/// The derivation is deterministic. Names without an extension get one
/// appended; names without a usable stem fall back to `audio`.
///
/// # Examples
///
/// ```
/// use audioforge_common::paths::derive_output_name;
///
/// assert_eq!(derive_output_name("holiday.mp4", "mp3"), "holiday.mp3");
/// assert_eq!(derive_output_name("my.trip.MP4", ".mp3"), "my.trip.mp3");
/// assert_eq!(derive_output_name("recording", "mp3"), "recording.mp3");
/// ```
pub fn derive_output_name(original: &str, target_extension: &str) -> String {
    let ext = target_extension.trim_start_matches('.');
    let name = base_name(original);
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or(DEFAULT_STEM);

    format!("{}.{}", stem, ext)
}

/// Check that a caller-supplied name is a plain file name.
///
/// Rejects empty names, path separators, parent/current directory
/// references, hidden files, and control characters. Only names that pass
/// may be joined onto a storage directory.
///
/// # Examples
///
/// ```
/// use audioforge_common::paths::is_safe_file_name;
///
/// assert!(is_safe_file_name("0191b2c4-7f3e-7a10-9b1c-2d4e5f607182.mp3"));
/// assert!(!is_safe_file_name("../config.toml"));
/// assert!(!is_safe_file_name("nested/file.mp3"));
/// assert!(!is_safe_file_name(".hidden"));
/// ```
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.contains("..")
        && !name.chars().any(char::is_control)
}

/// Make a display name safe to embed in a quoted `Content-Disposition`
/// filename parameter.
///
/// # Examples
///
/// ```
/// use audioforge_common::paths::header_safe_name;
///
/// assert_eq!(header_safe_name("say \"hi\".mp3"), "say _hi_.mp3");
/// ```
pub fn header_safe_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c == '"' || c == '\\' || c.is_control() || !c.is_ascii() {
                '_'
            } else {
                c
            }
        })
        .collect()
}
