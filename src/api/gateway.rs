//! The storage service seam.

use std::fmt;

use async_trait::async_trait;

use super::error::GatewayError;
use crate::fs::{Download, Entry, RemotePath, UploadFile};

/// Wire value meaning "the parent of the source directory".
pub const PARENT_SENTINEL: &str = "...";

/// Destination of a move, relative to the source directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MoveTarget {
    /// One level up
    Parent,
    /// A direct subdirectory of the source
    Child(String),
}

impl MoveTarget {
    /// Parse the wire form (`...` or a directory name).
    pub fn parse(target: &str) -> Self {
        if target == PARENT_SENTINEL {
            MoveTarget::Parent
        } else {
            MoveTarget::Child(target.to_string())
        }
    }

    /// Wire form sent to the service.
    pub fn as_wire(&self) -> &str {
        match self {
            MoveTarget::Parent => PARENT_SENTINEL,
            MoveTarget::Child(name) => name,
        }
    }

    /// Absolute destination for a move issued from `source`.
    ///
    /// `None` when moving up from the root.
    pub fn resolve(&self, source: &RemotePath) -> Option<RemotePath> {
        match self {
            MoveTarget::Parent => source.parent(),
            MoveTarget::Child(name) => Some(source.child(name)),
        }
    }
}

impl fmt::Display for MoveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Result of a gateway call.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Remote storage operations, transport agnostic.
///
/// Every method takes the directory it acts on by value so a call is bound
/// to the path it was issued against.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Entries of `path`. Fails with `NotFound` when it does not exist.
    async fn list(&self, path: &RemotePath) -> GatewayResult<Vec<Entry>>;

    /// Create `name` inside `path`. Fails with `Conflict` when taken.
    async fn create_directory(&self, path: &RemotePath, name: &str) -> GatewayResult<Entry>;

    /// Store files in order, overwriting same-name files.
    ///
    /// Rejects with `Validation` naming the first invalid file; files before
    /// it are persisted, the rest are not. `PayloadTooLarge` when the batch
    /// exceeds the service limit.
    async fn upload_batch(&self, path: &RemotePath, files: &[UploadFile])
        -> GatewayResult<Vec<Entry>>;

    /// Move `names` from `path` to `target`, in order.
    ///
    /// Same partial semantics as [`upload_batch`](Self::upload_batch).
    async fn move_entries(
        &self,
        path: &RemotePath,
        names: &[String],
        target: &MoveTarget,
    ) -> GatewayResult<Vec<Entry>>;

    /// Rename within `path`. Fails with `Conflict` when `new_name` exists.
    async fn rename(&self, path: &RemotePath, name: &str, new_name: &str) -> GatewayResult<Entry>;

    /// Delete one entry. Not safe to retry blindly.
    async fn delete_one(&self, path: &RemotePath, name: &str) -> GatewayResult<()>;

    /// Delete several entries, stopping at the first failure.
    async fn delete_many(&self, path: &RemotePath, names: &[String]) -> GatewayResult<()>;

    /// File body plus the filename the service declares for it.
    async fn download(&self, path: &RemotePath, name: &str) -> GatewayResult<Download>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn StorageGateway) {}
    fn _assert_send<T: Send + Sync>() {}

    #[test]
    fn test_gateway_is_send() {
        _assert_send::<Box<dyn StorageGateway>>();
    }

    #[test]
    fn test_move_target_wire() {
        assert_eq!(MoveTarget::parse("..."), MoveTarget::Parent);
        assert_eq!(MoveTarget::parse("sub"), MoveTarget::Child("sub".into()));
        assert_eq!(MoveTarget::Parent.as_wire(), "...");
        assert_eq!(MoveTarget::Child("sub".into()).to_string(), "sub");
    }

    #[test]
    fn test_move_target_resolve() {
        let src = RemotePath::new(["a", "b"]);
        assert_eq!(MoveTarget::Parent.resolve(&src), Some(RemotePath::new(["a"])));
        assert_eq!(
            MoveTarget::Child("c".into()).resolve(&src),
            Some(RemotePath::new(["a", "b", "c"]))
        );
        assert_eq!(MoveTarget::Parent.resolve(&RemotePath::root()), None);
    }
}
