//! In-flight operation bookkeeping.
//!
//! One record per (path, name) that a mutating call is working on. The
//! record is the single source for the derived per-entry flags (disabled,
//! uploading, selectable); nothing else keeps parallel booleans.

use std::fmt;

use crate::error::{BrowserError, Result};
use crate::fs::RemotePath;

/// Identifier of one issued operation (a whole batch shares one id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// Kind of mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Upload,
    Move,
    Rename,
    Delete,
    CreateDirectory,
}

impl OperationKind {
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Upload => "upload",
            OperationKind::Move => "move",
            OperationKind::Rename => "rename",
            OperationKind::Delete => "delete",
            OperationKind::CreateDirectory => "mkdir",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle of a ledger record.
///
/// Records are removed on settlement; the settled status only travels on
/// the records handed back by [`OperationLedger::settle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Succeeded,
    Failed,
}

/// A mutating call that has been issued but not yet settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    pub id: OperationId,
    pub name: String,
    pub path: RemotePath,
    pub kind: OperationKind,
    pub status: OperationStatus,
}

/// Derived view of one (path, name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryStatus {
    pending: Option<OperationKind>,
}

impl EntryStatus {
    pub fn pending_kind(&self) -> Option<OperationKind> {
        self.pending
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Disabled entries cannot be selected, dragged, renamed or re-uploaded.
    pub fn is_disabled(&self) -> bool {
        self.is_pending()
    }

    pub fn is_selectable(&self) -> bool {
        !self.is_disabled()
    }

    pub fn is_uploading(&self) -> bool {
        self.pending == Some(OperationKind::Upload)
    }
}

/// Registry of in-flight (path, name) pairs.
#[derive(Debug, Default)]
pub struct OperationLedger {
    records: Vec<PendingOperation>,
    next_id: u64,
}

impl OperationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names from `names` already in flight under `path`.
    pub fn busy_names(&self, path: &RemotePath, names: &[String]) -> Vec<String> {
        let mut busy: Vec<String> = Vec::new();
        for name in names {
            if self.is_pending(path, name) && !busy.contains(name) {
                busy.push(name.clone());
            }
        }
        busy
    }

    /// Register every name under one new operation id, or none of them.
    ///
    /// Fails with [`BrowserError::Busy`] when any name is already in flight.
    pub fn try_register(
        &mut self,
        path: &RemotePath,
        names: &[String],
        kind: OperationKind,
    ) -> Result<OperationId> {
        let busy = self.busy_names(path, names);
        if !busy.is_empty() {
            return Err(BrowserError::Busy { names: busy });
        }

        self.next_id += 1;
        let id = OperationId(self.next_id);
        for name in names {
            if self.records.iter().any(|r| r.id == id && &r.name == name) {
                continue;
            }
            self.records.push(PendingOperation {
                id,
                name: name.clone(),
                path: path.clone(),
                kind,
                status: OperationStatus::Pending,
            });
        }
        Ok(id)
    }

    /// Remove every record of `id`, returning them with their final status.
    pub fn settle(&mut self, id: OperationId, succeeded: bool) -> Vec<PendingOperation> {
        let status = if succeeded {
            OperationStatus::Succeeded
        } else {
            OperationStatus::Failed
        };
        let (settled, kept): (Vec<_>, Vec<_>) =
            self.records.drain(..).partition(|r| r.id == id);
        self.records = kept;
        settled
            .into_iter()
            .map(|mut r| {
                r.status = status;
                r
            })
            .collect()
    }

    /// Drop everything (session termination). Records come back as failed.
    pub fn clear(&mut self) -> Vec<PendingOperation> {
        self.records
            .drain(..)
            .map(|mut r| {
                r.status = OperationStatus::Failed;
                r
            })
            .collect()
    }

    pub fn is_pending(&self, path: &RemotePath, name: &str) -> bool {
        self.find(path, name).is_some()
    }

    pub fn status(&self, path: &RemotePath, name: &str) -> EntryStatus {
        EntryStatus {
            pending: self.find(path, name).map(|r| r.kind),
        }
    }

    /// Whether operation `id` still has records (i.e. has not been settled or cleared).
    pub fn contains(&self, id: OperationId) -> bool {
        self.records.iter().any(|r| r.id == id)
    }

    /// Records under `path`, in registration order.
    pub fn pending_in<'a>(
        &'a self,
        path: &'a RemotePath,
    ) -> impl Iterator<Item = &'a PendingOperation> + 'a {
        self.records.iter().filter(move |r| &r.path == path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn find(&self, path: &RemotePath, name: &str) -> Option<&PendingOperation> {
        self.records
            .iter()
            .find(|r| r.name == name && &r.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_register_and_settle() {
        let mut ledger = OperationLedger::new();
        let root = RemotePath::root();
        let id = ledger
            .try_register(&root, &names(&["a", "b"]), OperationKind::Upload)
            .unwrap();

        assert_eq!(ledger.len(), 2);
        assert!(ledger.status(&root, "a").is_uploading());
        assert!(ledger.status(&root, "b").is_disabled());
        assert!(ledger.status(&root, "c").is_selectable());

        let settled = ledger.settle(id, true);
        assert_eq!(settled.len(), 2);
        assert!(settled.iter().all(|r| r.status == OperationStatus::Succeeded));
        assert!(ledger.is_empty());
        assert!(!ledger.contains(id));
    }

    #[test]
    fn test_scoped_by_path() {
        let mut ledger = OperationLedger::new();
        let a = RemotePath::new(["a"]);
        let b = RemotePath::new(["b"]);
        ledger
            .try_register(&a, &names(&["x.txt"]), OperationKind::Delete)
            .unwrap();

        assert!(ledger.is_pending(&a, "x.txt"));
        assert!(!ledger.is_pending(&b, "x.txt"));
        assert!(ledger
            .try_register(&b, &names(&["x.txt"]), OperationKind::Upload)
            .is_ok());
    }

    #[test]
    fn test_second_operation_on_same_name_is_rejected() {
        let mut ledger = OperationLedger::new();
        let root = RemotePath::root();
        ledger
            .try_register(&root, &names(&["a.txt", "b.txt"]), OperationKind::Rename)
            .unwrap();

        let err = ledger
            .try_register(&root, &names(&["c.txt", "a.txt"]), OperationKind::Delete)
            .unwrap_err();
        assert_eq!(err, BrowserError::Busy { names: names(&["a.txt"]) });
        // All or nothing: c.txt was not registered either.
        assert!(!ledger.is_pending(&root, "c.txt"));
        assert_eq!(ledger.status(&root, "a.txt").pending_kind(), Some(OperationKind::Rename));
    }

    #[test]
    fn test_settle_only_touches_own_records() {
        let mut ledger = OperationLedger::new();
        let root = RemotePath::root();
        let first = ledger
            .try_register(&root, &names(&["a"]), OperationKind::Upload)
            .unwrap();
        let second = ledger
            .try_register(&root, &names(&["b"]), OperationKind::Delete)
            .unwrap();

        let settled = ledger.settle(first, false);
        assert_eq!(settled[0].status, OperationStatus::Failed);
        assert!(ledger.contains(second));
        assert_eq!(ledger.pending_in(&root).count(), 1);
    }

    #[test]
    fn test_duplicate_names_in_one_batch() {
        let mut ledger = OperationLedger::new();
        let root = RemotePath::root();
        ledger
            .try_register(&root, &names(&["a", "a"]), OperationKind::Upload)
            .unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut ledger = OperationLedger::new();
        let root = RemotePath::root();
        ledger
            .try_register(&root, &names(&["a", "b"]), OperationKind::Move)
            .unwrap();
        let cleared = ledger.clear();
        assert_eq!(cleared.len(), 2);
        assert!(cleared.iter().all(|r| r.status == OperationStatus::Failed));
        assert!(ledger.is_empty());
    }
}
