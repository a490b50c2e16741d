//! Shared constants for the packaging engine.

/// Separator between an archive file and a path inside it,
/// e.g. `lib/app.jar!/META-INF/MANIFEST.MF`.
pub const ARCHIVE_SEPARATOR: &str = "!/";

/// File extensions treated as archives by the resolver and the inspector.
pub const ARCHIVE_EXTENSIONS: &[&str] = &["jar", "war", "zip"];

/// Directory names skipped when copying directory trees.
pub const IGNORED_DIR_NAMES: &[&str] = &["CVS", ".svn", ".git", ".hg"];

/// Directory under the project base holding persisted engine state.
pub const STATE_DIR: &str = ".artipack";

/// State file name within [`STATE_DIR`].
pub const STATE_FILENAME: &str = "state.json";

/// Current version of the persisted state format.
pub const STATE_VERSION: u32 = 1;

/// Default output location for artifacts, relative to the project base.
pub const DEFAULT_ARTIFACT_OUT: &str = "out/artifacts";

/// Default output location for module builds, relative to the project base.
pub const DEFAULT_MODULE_OUT: &str = "out/production";
