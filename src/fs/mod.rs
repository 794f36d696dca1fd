//! Remote filesystem data model.

mod entry;
mod path;
mod snapshot;

pub use entry::{Download, Entry, EntryId, EntryKind, UploadFile};
pub use path::{PathStack, RemotePath};
pub use snapshot::DirectorySnapshot;
