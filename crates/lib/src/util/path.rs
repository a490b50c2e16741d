//! Path helpers shared by the resolver, synchronizer and inspector.

use std::path::Path;

use crate::consts::{ARCHIVE_EXTENSIONS, ARCHIVE_SEPARATOR};

/// Join a destination prefix with a path component.
///
/// Destinations use `/` between directory components and `!/` after an
/// archive name, so joining must not insert a slash right after an
/// archive boundary or at the root.
pub fn join_dest(prefix: &str, name: &str) -> String {
  if prefix.is_empty() || prefix.ends_with(ARCHIVE_SEPARATOR) {
    format!("{}{}", prefix, name)
  } else {
    format!("{}/{}", prefix, name)
  }
}

/// Split a destination at the first archive boundary.
///
/// Returns `(archive_file, inner_path)` for destinations inside an
/// archive, or `None` for loose files.
pub fn split_archive(dest: &str) -> Option<(&str, &str)> {
  dest.split_once(ARCHIVE_SEPARATOR)
}

/// Whether a file name carries a recognized archive extension.
pub fn has_archive_extension(name: &str) -> bool {
  Path::new(name)
    .extension()
    .and_then(|e| e.to_str())
    .is_some_and(|e| ARCHIVE_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(e)))
}

/// Render a path with forward slashes for reports and state keys.
pub fn display_slashes(path: &Path) -> String {
  path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn join_handles_root_and_archives() {
    assert_eq!(join_dest("", "a.txt"), "a.txt");
    assert_eq!(join_dest("dir", "a.txt"), "dir/a.txt");
    assert_eq!(join_dest("a.jar!/", "a.txt"), "a.jar!/a.txt");
    assert_eq!(join_dest("dir/a.jar!/", "sub"), "dir/a.jar!/sub");
  }

  #[test]
  fn split_finds_first_boundary() {
    assert_eq!(split_archive("a.jar!/f.txt"), Some(("a.jar", "f.txt")));
    assert_eq!(split_archive("lib/a.jar!/b.jar!/f"), Some(("lib/a.jar", "b.jar!/f")));
    assert_eq!(split_archive("plain/file.txt"), None);
  }

  #[test]
  fn archive_extensions_recognized() {
    assert!(has_archive_extension("a.jar"));
    assert!(has_archive_extension("A.ZIP"));
    assert!(has_archive_extension("web.war"));
    assert!(!has_archive_extension("file.txt"));
    assert!(!has_archive_extension("jar"));
  }
}
