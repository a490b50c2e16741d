//! Archive packing for the synchronizer.
//!
//! Archives are never patched in place: when any entry inside one is
//! stale or orphaned, the whole archive is rebuilt from its current
//! members and atomically renamed over the old file, so no observer can
//! see a partial archive. Nested archives are packed innermost-first in
//! memory.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::consts::ARCHIVE_SEPARATOR;
use crate::resolve::EntrySource;

use super::SyncError;

/// Write an archive at `dest` from its member entries.
///
/// `members` pair an archive-relative path (which may itself cross nested
/// archive boundaries with `!/`) with the source producing it, in
/// declaration order; for duplicate paths the last producer wins.
pub(crate) fn write_archive(dest: &Path, members: &[(String, EntrySource)]) -> Result<(), SyncError> {
  let bytes = pack(dest, members)?;

  let parent = dest.parent().unwrap_or(Path::new("."));
  fs::create_dir_all(parent).map_err(|e| SyncError::CreateDir {
    path: parent.to_path_buf(),
    source: e,
  })?;

  let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| SyncError::Write {
    path: dest.to_path_buf(),
    source: e,
  })?;
  tmp.write_all(&bytes).map_err(|e| SyncError::Write {
    path: dest.to_path_buf(),
    source: e,
  })?;
  tmp.persist(dest).map_err(|e| SyncError::Write {
    path: dest.to_path_buf(),
    source: e.error,
  })?;

  debug!(path = %dest.display(), members = members.len(), "archive rewritten");
  Ok(())
}

/// Pack members into archive bytes, recursing for nested archives.
fn pack(dest: &Path, members: &[(String, EntrySource)]) -> Result<Vec<u8>, SyncError> {
  // Plain entries, last producer per path winning; nested archives keep
  // their own member lists in order.
  let mut plain: BTreeMap<String, &EntrySource> = BTreeMap::new();
  let mut nested: BTreeMap<String, Vec<(String, EntrySource)>> = BTreeMap::new();

  for (path, source) in members {
    match path.split_once(ARCHIVE_SEPARATOR) {
      None => {
        plain.insert(path.clone(), source);
      }
      Some((archive_name, rest)) => {
        nested
          .entry(archive_name.to_string())
          .or_default()
          .push((rest.to_string(), source.clone()));
      }
    }
  }

  let zip_err = |e: zip::result::ZipError| SyncError::Archive {
    path: dest.to_path_buf(),
    message: e.to_string(),
  };

  let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
  let options = SimpleFileOptions::default();

  for (path, source) in plain {
    writer.start_file(path, options).map_err(zip_err)?;
    let content = read_source(source)?;
    writer.write_all(&content).map_err(|e| SyncError::Write {
      path: dest.to_path_buf(),
      source: e,
    })?;
  }

  for (archive_name, sub_members) in nested {
    let content = pack(dest, &sub_members)?;
    writer.start_file(archive_name, options).map_err(zip_err)?;
    writer.write_all(&content).map_err(|e| SyncError::Write {
      path: dest.to_path_buf(),
      source: e,
    })?;
  }

  let cursor = writer.finish().map_err(zip_err)?;
  Ok(cursor.into_inner())
}

/// Read the bytes a source produces.
pub(crate) fn read_source(source: &EntrySource) -> Result<Vec<u8>, SyncError> {
  match source {
    EntrySource::File(path) => fs::read(path).map_err(|e| SyncError::ReadSource {
      path: path.clone(),
      source: e,
    }),
    EntrySource::ArchiveEntry { archive, entry } => {
      let file = fs::File::open(archive).map_err(|e| SyncError::ReadSource {
        path: archive.clone(),
        source: e,
      })?;
      let mut zip = ZipArchive::new(file).map_err(|e| SyncError::Archive {
        path: archive.clone(),
        message: e.to_string(),
      })?;
      let mut zipped = zip.by_name(entry).map_err(|e| SyncError::Archive {
        path: archive.clone(),
        message: e.to_string(),
      })?;
      let mut content = Vec::new();
      zipped.read_to_end(&mut content).map_err(|e| SyncError::ReadSource {
        path: archive.clone(),
        source: e,
      })?;
      Ok(content)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::inspect::TreeSpec;
  use std::path::PathBuf;
  use tempfile::tempdir;

  fn file_source(dir: &Path, name: &str, content: &str) -> EntrySource {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    EntrySource::File(path)
  }

  #[test]
  fn packs_plain_members() {
    let temp = tempdir().unwrap();
    let src = file_source(temp.path(), "a.txt", "a");
    let dest = temp.path().join("out/x.jar");

    write_archive(&dest, &[("a.txt".to_string(), src)]).unwrap();

    TreeSpec::new()
      .archive("x.jar", |a| a.file_text("a.txt", "a"))
      .verify(&temp.path().join("out"))
      .unwrap();
  }

  #[test]
  fn last_producer_wins_for_duplicate_paths() {
    let temp = tempdir().unwrap();
    let first = file_source(temp.path(), "first.txt", "first");
    let second = file_source(temp.path(), "second.txt", "second");
    let dest = temp.path().join("out/x.jar");

    write_archive(
      &dest,
      &[("a.txt".to_string(), first), ("a.txt".to_string(), second)],
    )
    .unwrap();

    TreeSpec::new()
      .archive("x.jar", |a| a.file_text("a.txt", "second"))
      .verify(&temp.path().join("out"))
      .unwrap();
  }

  #[test]
  fn nested_archives_pack_recursively() {
    let temp = tempdir().unwrap();
    let src = file_source(temp.path(), "f.txt", "deep");
    let dest = temp.path().join("out/outer.jar");

    write_archive(&dest, &[("inner.jar!/f.txt".to_string(), src)]).unwrap();

    TreeSpec::new()
      .archive("outer.jar", |o| o.archive("inner.jar", |i| i.file_text("f.txt", "deep")))
      .verify(&temp.path().join("out"))
      .unwrap();
  }

  #[test]
  fn rewrite_replaces_previous_content() {
    let temp = tempdir().unwrap();
    let dest = temp.path().join("out/x.jar");

    let old = file_source(temp.path(), "old.txt", "old");
    write_archive(&dest, &[("old.txt".to_string(), old)]).unwrap();

    let new = file_source(temp.path(), "new.txt", "new");
    write_archive(&dest, &[("new.txt".to_string(), new)]).unwrap();

    TreeSpec::new()
      .archive("x.jar", |a| a.file_text("new.txt", "new"))
      .verify(&temp.path().join("out"))
      .unwrap();
  }

  #[test]
  fn read_source_from_existing_archive() {
    let temp = tempdir().unwrap();
    let inner = file_source(temp.path(), "a.txt", "zipped");
    let jar = temp.path().join("src.jar");
    write_archive(&jar, &[("a.txt".to_string(), inner)]).unwrap();

    let content = read_source(&EntrySource::ArchiveEntry {
      archive: jar,
      entry: "a.txt".to_string(),
    })
    .unwrap();
    assert_eq!(content, b"zipped");
  }

  #[test]
  fn missing_source_is_reported_with_path() {
    let err = read_source(&EntrySource::File(PathBuf::from("/no/such/file"))).unwrap_err();
    assert!(matches!(err, SyncError::ReadSource { .. }));
  }
}
