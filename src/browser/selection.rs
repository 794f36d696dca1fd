//! Selected entries of the current listing.

use std::collections::BTreeSet;

use crate::fs::{DirectorySnapshot, EntryId};

/// Ids selected by the user, relative to one snapshot.
///
/// The owner keeps it a subset of the snapshot's ids by calling
/// [`retain_present`](Self::retain_present) after every patch.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    ids: BTreeSet<EntryId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip `id`. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, id: &EntryId) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.clone());
            true
        }
    }

    /// Replace the selection with `ids`.
    pub fn select_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a EntryId>) {
        self.ids = ids.into_iter().cloned().collect();
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn deselect(&mut self, id: &EntryId) -> bool {
        self.ids.remove(id)
    }

    /// Drop ids whose entries are gone from `snapshot`.
    pub fn retain_present(&mut self, snapshot: &DirectorySnapshot) {
        self.ids.retain(|id| snapshot.contains_id(id));
    }

    pub fn contains(&self, id: &EntryId) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntryId> {
        self.ids.iter()
    }

    /// Names of the selected entries, in listing order.
    pub fn names(&self, snapshot: &DirectorySnapshot) -> Vec<String> {
        snapshot
            .entries()
            .iter()
            .filter(|e| self.ids.contains(&e.id))
            .map(|e| e.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{Entry, RemotePath};

    fn snapshot() -> DirectorySnapshot {
        let mut snapshot = DirectorySnapshot::new(RemotePath::root());
        snapshot.replace(vec![
            Entry::file("a", 1, 0),
            Entry::file("b", 1, 0),
            Entry::directory("c"),
        ]);
        snapshot
    }

    #[test]
    fn test_toggle() {
        let snapshot = snapshot();
        let id = &snapshot.entries()[0].id;
        let mut selection = SelectionSet::new();
        assert!(selection.toggle(id));
        assert!(selection.contains(id));
        assert!(!selection.toggle(id));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_select_all_and_names_in_listing_order() {
        let snapshot = snapshot();
        let mut selection = SelectionSet::new();
        let ids: Vec<&EntryId> = snapshot.ids().collect();
        selection.select_all(ids.into_iter().rev());
        assert_eq!(selection.len(), 3);
        assert_eq!(selection.names(&snapshot), vec!["a", "b", "c"]);
        selection.clear();
        assert!(selection.is_empty());
    }

    #[test]
    fn test_retain_present() {
        let mut snapshot = snapshot();
        let mut selection = SelectionSet::new();
        selection.select_all(snapshot.ids());
        let removed = snapshot.remove("b").unwrap();

        selection.retain_present(&snapshot);
        assert_eq!(selection.len(), 2);
        assert!(!selection.contains(&removed.id));
        assert!(selection.iter().all(|id| snapshot.contains_id(id)));
    }
}
