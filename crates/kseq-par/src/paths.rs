//! Locale and system path discovery for compose files.
//!
//! The compose format's `%L` and `%S` escapes and the locale-driven table
//! constructor all resolve against the X locale directory. The directory
//! itself can be overridden with `XLOCALEDIR`.

use std::env;
use std::path::PathBuf;

/// The conventional system directory for locale compose files.
pub const DEFAULT_XLOCALEDIR: &str = "/usr/share/X11/locale";

/// Returns the system compose directory.
///
/// Honors the `XLOCALEDIR` environment variable, falling back to
/// [`DEFAULT_XLOCALEDIR`].
pub fn xlocaledir() -> String {
    match env::var("XLOCALEDIR") {
        Ok(dir) if !dir.is_empty() => dir,
        _ => DEFAULT_XLOCALEDIR.to_string(),
    }
}

/// Returns the default compose file path for a locale.
///
/// The path is `<xlocaledir>/<locale>/Compose`. Returns `None` for locale
/// identifiers that cannot name a directory entry (empty, or containing a
/// path separator).
pub fn locale_compose_file_path(locale: &str) -> Option<PathBuf> {
    if locale.is_empty() || locale.contains('/') {
        return None;
    }
    let mut path = PathBuf::from(xlocaledir());
    path.push(locale);
    path.push("Compose");
    tracing::debug!(locale, path = %path.display(), "resolved locale compose file");
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_path_shape() {
        let path = locale_compose_file_path("en_US.UTF-8").unwrap();
        assert!(path.ends_with("en_US.UTF-8/Compose"));
    }

    #[test]
    fn test_invalid_locales() {
        assert!(locale_compose_file_path("").is_none());
        assert!(locale_compose_file_path("../evil").is_none());
        assert!(locale_compose_file_path("a/b").is_none());
    }
}
