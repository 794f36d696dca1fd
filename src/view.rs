//! Render model of the browser.
//!
//! Everything here is derived: rows combine the snapshot with the operation
//! ledger, so a row's flags can never drift from what is actually in flight.

use crate::browser::{OperationKind, PromptId, PromptKind};
use crate::fs::{Entry, EntryId, EntryKind, RemotePath};

/// Interaction state of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    Idle,
    /// Listed entry with an operation in flight; disabled
    Processing(OperationKind),
    /// Not listed yet, shown while the operation creating it is in flight
    Placeholder(OperationKind),
}

/// One line of the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub entry: Entry,
    pub selected: bool,
    pub status: RowStatus,
}

impl Row {
    pub fn id(&self) -> &EntryId {
        &self.entry.id
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn is_disabled(&self) -> bool {
        self.status != RowStatus::Idle
    }

    pub fn is_selectable(&self) -> bool {
        !self.is_disabled()
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.status, RowStatus::Placeholder(_))
    }

    pub fn is_uploading(&self) -> bool {
        matches!(
            self.status,
            RowStatus::Processing(OperationKind::Upload)
                | RowStatus::Placeholder(OperationKind::Upload)
        )
    }

    pub(crate) fn placeholder(name: &str, kind: OperationKind, key: String) -> Self {
        let entry_kind = match kind {
            OperationKind::CreateDirectory => EntryKind::Directory,
            _ => EntryKind::File,
        };
        Row {
            entry: Entry {
                id: EntryId::new(key),
                name: name.to_string(),
                kind: entry_kind,
                size: 0,
                modified_at: 0,
            },
            selected: false,
            status: RowStatus::Placeholder(kind),
        }
    }
}

/// The listing as the user sees it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListingView {
    pub path: RemotePath,
    /// `false` until the first listing of `path` arrives
    pub loaded: bool,
    /// Listed entries first, in listing order, then placeholders
    pub rows: Vec<Row>,
    /// Size of the selection; always equals the number of selected rows
    pub selected_count: usize,
}

impl ListingView {
    pub fn row(&self, name: &str) -> Option<&Row> {
        self.rows.iter().find(|row| row.name() == name)
    }

    /// Names of listed entries (placeholders excluded).
    pub fn names(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|row| !row.is_placeholder())
            .map(Row::name)
            .collect()
    }

    pub fn selected(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|row| row.selected)
            .map(Row::name)
            .collect()
    }

    /// Rows with an operation in flight, placeholders included.
    pub fn processing(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|row| row.is_disabled())
            .map(Row::name)
            .collect()
    }
}

/// The visible confirmation prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptView {
    pub id: PromptId,
    pub kind: PromptKind,
    pub title: String,
    pub message: Option<String>,
    /// Prompts waiting behind this one
    pub queued: usize,
}

impl PromptView {
    /// Colliding or affected names, when the prompt lists any.
    pub fn names(&self) -> Vec<&str> {
        match &self.kind {
            PromptKind::Overwrite { names } | PromptKind::DeleteSelected { names } => {
                names.iter().map(String::as_str).collect()
            }
            PromptKind::Delete { name } => vec![name.as_str()],
            PromptKind::Error { .. } | PromptKind::Input { .. } => Vec::new(),
        }
    }

    /// Pre-filled value of an input prompt.
    pub fn default_value(&self) -> Option<&str> {
        match &self.kind {
            PromptKind::Input { default_value, .. } => Some(default_value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_flags() {
        let idle = Row {
            entry: Entry::file("a.txt", 1, 0),
            selected: true,
            status: RowStatus::Idle,
        };
        assert!(idle.is_selectable());

        let busy = Row {
            status: RowStatus::Processing(OperationKind::Upload),
            ..idle.clone()
        };
        assert!(busy.is_disabled());
        assert!(busy.is_uploading());

        let placeholder = Row::placeholder("new", OperationKind::CreateDirectory, "op#1:new".into());
        assert!(placeholder.is_placeholder());
        assert!(placeholder.entry.is_directory());
        assert!(!placeholder.is_uploading());
    }

    #[test]
    fn test_listing_names_skip_placeholders() {
        let view = ListingView {
            path: RemotePath::root(),
            loaded: true,
            rows: vec![
                Row {
                    entry: Entry::file("a.txt", 1, 0),
                    selected: true,
                    status: RowStatus::Idle,
                },
                Row::placeholder("b.txt", OperationKind::Upload, "op#2:b.txt".into()),
            ],
            selected_count: 1,
        };
        assert_eq!(view.names(), vec!["a.txt"]);
        assert_eq!(view.selected(), vec!["a.txt"]);
        assert_eq!(view.processing(), vec!["b.txt"]);
        assert!(view.row("b.txt").is_some_and(Row::is_uploading));
    }
}
