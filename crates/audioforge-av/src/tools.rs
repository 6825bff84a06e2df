//! External tool detection.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Tools the service knows how to use, with the flag each one accepts for
/// printing its version.
const KNOWN_TOOLS: &[(&str, &str)] = &[("ffmpeg", "-version"), ("ffprobe", "-version")];

/// Information about an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// First line of the tool's version banner.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Check if a tool is available by running it with `version_arg`.
///
/// # Example
///
/// ```no_run
/// use audioforge_av::check_tool;
///
/// let info = check_tool("ffmpeg", "-version");
/// if info.available {
///     println!("ffmpeg: {:?}", info.version);
/// }
/// ```
pub fn check_tool(name: &str, version_arg: &str) -> ToolInfo {
    let banner = Command::new(name)
        .arg(version_arg)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| {
            String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or_default()
                .to_string()
        });

    ToolInfo {
        name: name.to_string(),
        available: banner.is_some(),
        path: banner.as_ref().and_then(|_| which::which(name).ok()),
        version: banner,
    }
}

/// Check every tool the service uses.
pub fn check_tools() -> Vec<ToolInfo> {
    KNOWN_TOOLS
        .iter()
        .map(|(name, version_arg)| check_tool(name, version_arg))
        .collect()
}

/// Resolve a tool's executable, preferring a configured path over `PATH`.
///
/// A configured path that does not exist is ignored rather than treated as an
/// error, so a stale config entry still falls back to whatever is installed.
///
/// # Errors
///
/// Returns [`Error::ToolNotFound`] if neither location yields the tool.
pub fn resolve_tool(name: &str, configured: Option<&Path>) -> Result<PathBuf> {
    match configured {
        Some(path) if path.exists() => Ok(path.to_path_buf()),
        _ => which::which(name).map_err(|_| Error::tool_not_found(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_tool_not_found() {
        let info = check_tool("nonexistent_tool_12345", "--version");
        assert!(!info.available);
        assert!(info.version.is_none());
        assert!(info.path.is_none());
    }

    #[test]
    fn test_check_tools_lists_ffmpeg() {
        let tools = check_tools();
        assert!(tools.iter().any(|t| t.name == "ffmpeg"));
        assert!(tools.iter().any(|t| t.name == "ffprobe"));
    }

    #[test]
    fn test_resolve_tool_prefers_existing_configured_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let resolved = resolve_tool("nonexistent_tool_12345", Some(file.path())).unwrap();
        assert_eq!(resolved, file.path());
    }

    #[test]
    fn test_resolve_tool_missing() {
        let err = resolve_tool(
            "nonexistent_tool_12345",
            Some(Path::new("/definitely/not/here")),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { .. }));
    }
}
