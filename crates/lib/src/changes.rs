//! Source change tracking.
//!
//! The tracker is a sequenced, append-only log of file events. Build
//! targets do not share a cursor: each target persists the sequence number
//! it last built at and asks for the changes recorded after it. The same
//! change therefore stays visible to every target that has not yet
//! consumed it, which is what keeps per-artifact staleness independent
//! when two artifacts include the same source file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

/// The kind of a recorded source change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
  Added,
  Modified,
  Deleted,
  /// The file now lives at the recorded path; `from` is its previous one.
  Renamed { from: PathBuf },
}

/// A change collapsed for consumption: renames are already expanded into
/// a deletion of the old path and an addition of the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollapsedChange {
  Added,
  Modified,
  Deleted,
}

#[derive(Debug, Clone)]
struct ChangeRecord {
  seq: u64,
  path: PathBuf,
  kind: ChangeKind,
}

/// Sequenced log of source file changes.
#[derive(Debug, Default)]
pub struct ChangeTracker {
  next_seq: u64,
  log: Vec<ChangeRecord>,
}

impl ChangeTracker {
  pub fn new() -> Self {
    Self::default()
  }

  /// The sequence number a consumer should store after seeing the
  /// current log in full.
  pub fn current_seq(&self) -> u64 {
    self.next_seq
  }

  /// Record a change. Multiple records for the same path collapse to the
  /// latest kind when consumed.
  pub fn record(&mut self, path: impl Into<PathBuf>, kind: ChangeKind) {
    let path = path.into();
    debug!(path = %path.display(), ?kind, "change recorded");
    self.log.push(ChangeRecord {
      seq: self.next_seq,
      path,
      kind,
    });
    self.next_seq += 1;
  }

  /// Collapsed changes recorded at or after `seq`, latest kind per path.
  ///
  /// A rename contributes `Deleted` for the old path and `Added` for the
  /// new one; the engine deliberately does not prove content identity to
  /// turn renames into moves.
  pub fn changes_since(&self, seq: u64) -> BTreeMap<PathBuf, CollapsedChange> {
    let mut collapsed = BTreeMap::new();
    for record in self.log.iter().filter(|r| r.seq >= seq) {
      match &record.kind {
        ChangeKind::Added => {
          collapsed.insert(record.path.clone(), CollapsedChange::Added);
        }
        ChangeKind::Modified => {
          collapsed.insert(record.path.clone(), CollapsedChange::Modified);
        }
        ChangeKind::Deleted => {
          collapsed.insert(record.path.clone(), CollapsedChange::Deleted);
        }
        ChangeKind::Renamed { from } => {
          collapsed.insert(from.clone(), CollapsedChange::Deleted);
          collapsed.insert(record.path.clone(), CollapsedChange::Added);
        }
      }
    }
    collapsed
  }

  /// Drop records older than `seq`.
  ///
  /// Safe once every persisted consumer cursor is at or above `seq`: a
  /// target that has never built does not read the log, since its first
  /// build is always from clean. Keeps the log bounded in long-lived
  /// sessions.
  pub fn compact(&mut self, seq: u64) {
    let before = self.log.len();
    self.log.retain(|r| r.seq >= seq);
    debug!(dropped = before - self.log.len(), "change log compacted");
  }

  /// Whether a specific path changed at or after `seq`.
  pub fn changed_since(&self, path: &Path, seq: u64) -> bool {
    self.log.iter().any(|r| {
      r.seq >= seq
        && (r.path == path
          || matches!(&r.kind, ChangeKind::Renamed { from } if from == path))
    })
  }
}
