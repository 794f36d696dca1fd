//! Cached listing of one directory.

use super::entry::{Entry, EntryId};
use super::path::RemotePath;

/// The client's belief about the contents of one directory.
///
/// Names are unique: every insertion replaces an entry with the same name.
#[derive(Debug, Clone, Default)]
pub struct DirectorySnapshot {
    path: RemotePath,
    entries: Vec<Entry>,
    loaded: bool,
}

impl DirectorySnapshot {
    /// Empty, not yet listed snapshot for `path`.
    pub fn new(path: RemotePath) -> Self {
        Self {
            path,
            entries: Vec::new(),
            loaded: false,
        }
    }

    pub fn path(&self) -> &RemotePath {
        &self.path
    }

    /// `false` between navigation and the first listing arriving.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Point the snapshot at a new directory and forget the old contents.
    pub fn reset(&mut self, path: RemotePath) {
        self.path = path;
        self.entries.clear();
        self.loaded = false;
    }

    /// Replace the whole listing. Later duplicates of a name win.
    pub fn replace(&mut self, entries: Vec<Entry>) {
        self.entries.clear();
        for entry in entries {
            self.upsert(entry);
        }
        self.loaded = true;
    }

    /// Insert or replace by name, keeping the position of a replaced entry.
    pub fn upsert(&mut self, entry: Entry) {
        match self.position(&entry.name) {
            Some(idx) => self.entries[idx] = entry,
            None => self.entries.push(entry),
        }
    }

    /// Insert at the front (new directories), dropping any same-name entry.
    pub fn upsert_front(&mut self, entry: Entry) {
        self.remove(&entry.name);
        self.entries.insert(0, entry);
    }

    /// Replace the entry called `old_name` with `entry` in place.
    ///
    /// Falls back to an append when `old_name` is not listed.
    pub fn replace_named(&mut self, old_name: &str, entry: Entry) {
        if old_name != entry.name {
            self.remove(&entry.name);
        }
        match self.position(old_name) {
            Some(idx) => self.entries[idx] = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Entry> {
        self.position(name).map(|idx| self.entries.remove(idx))
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn get_by_id(&self, id: &EntryId) -> Option<&Entry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn contains_id(&self, id: &EntryId) -> bool {
        self.get_by_id(id).is_some()
    }

    /// Names from `names` that already exist here, in input order.
    pub fn collisions<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        names
            .into_iter()
            .filter(|name| self.contains(name))
            .map(str::to_string)
            .collect()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntryId> {
        self.entries.iter().map(|e| &e.id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(snapshot: &DirectorySnapshot) -> Vec<&str> {
        snapshot.entries().iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_replace_dedupes_names() {
        let mut snapshot = DirectorySnapshot::new(RemotePath::root());
        assert!(!snapshot.is_loaded());

        snapshot.replace(vec![
            Entry::file("a.txt", 1, 0),
            Entry::file("b.txt", 2, 0),
            Entry::file("a.txt", 3, 0),
        ]);

        assert!(snapshot.is_loaded());
        assert_eq!(names(&snapshot), vec!["a.txt", "b.txt"]);
        assert_eq!(snapshot.get("a.txt").map(|e| e.size), Some(3));
    }

    #[test]
    fn test_upsert_keeps_position() {
        let mut snapshot = DirectorySnapshot::new(RemotePath::root());
        snapshot.replace(vec![Entry::file("a", 1, 0), Entry::file("b", 1, 0)]);
        snapshot.upsert(Entry::file("a", 9, 0));
        snapshot.upsert(Entry::file("c", 1, 0));
        assert_eq!(names(&snapshot), vec!["a", "b", "c"]);
        assert_eq!(snapshot.get("a").map(|e| e.size), Some(9));
    }

    #[test]
    fn test_upsert_front() {
        let mut snapshot = DirectorySnapshot::new(RemotePath::root());
        snapshot.replace(vec![Entry::file("a", 1, 0), Entry::directory("d")]);
        snapshot.upsert_front(Entry::directory("d"));
        assert_eq!(names(&snapshot), vec!["d", "a"]);
    }

    #[test]
    fn test_replace_named_in_place() {
        let mut snapshot = DirectorySnapshot::new(RemotePath::root());
        snapshot.replace(vec![
            Entry::file("a.txt", 1, 0),
            Entry::file("b.txt", 1, 0),
            Entry::file("c.txt", 1, 0),
        ]);
        snapshot.replace_named("a.txt", Entry::file("z.txt", 1, 0));
        assert_eq!(names(&snapshot), vec!["z.txt", "b.txt", "c.txt"]);

        // Renaming onto an existing name never leaves two entries with it.
        snapshot.replace_named("z.txt", Entry::file("c.txt", 7, 0));
        assert_eq!(names(&snapshot), vec!["c.txt", "b.txt"]);
    }

    #[test]
    fn test_collisions_and_remove() {
        let mut snapshot = DirectorySnapshot::new(RemotePath::root());
        snapshot.replace(vec![Entry::file("x.txt", 1, 0)]);
        assert_eq!(snapshot.collisions(["x.txt", "y.txt"]), vec!["x.txt"]);

        let removed = snapshot.remove("x.txt").unwrap();
        assert!(!snapshot.contains_id(&removed.id));
        assert!(snapshot.is_empty());
        assert!(snapshot.remove("x.txt").is_none());
    }

    #[test]
    fn test_reset_clears() {
        let mut snapshot = DirectorySnapshot::new(RemotePath::root());
        snapshot.replace(vec![Entry::file("x", 1, 0)]);
        snapshot.reset(RemotePath::new(["sub"]));
        assert!(snapshot.is_empty());
        assert!(!snapshot.is_loaded());
        assert_eq!(snapshot.path(), &RemotePath::new(["sub"]));
    }
}
