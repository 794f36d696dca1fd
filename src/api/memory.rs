//! In-memory storage gateway.
//!
//! Implements the full gateway contract (ordered batches with partial
//! rejection, conflicts, size limit, session expiry) against a map of
//! directories. Mutating calls can be held open to simulate slow requests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use super::error::GatewayError;
use super::gateway::{GatewayResult, MoveTarget, StorageGateway};
use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::fs::{Download, Entry, EntryId, EntryKind, RemotePath, UploadFile};

/// Gateway method, for call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayCall {
    List,
    CreateDirectory,
    UploadBatch,
    Move,
    Rename,
    DeleteOne,
    DeleteMany,
    Download,
}

#[derive(Debug)]
struct MemoryState {
    dirs: HashMap<RemotePath, Vec<Entry>>,
    contents: HashMap<(RemotePath, String), Vec<u8>>,
    calls: HashMap<GatewayCall, usize>,
    rejected: HashSet<String>,
    max_upload_bytes: u64,
    expired: bool,
    next_id: u64,
}

impl MemoryState {
    fn mint(&mut self, name: &str, kind: EntryKind, size: u64) -> Entry {
        self.next_id += 1;
        Entry {
            id: EntryId::new(format!("m{}", self.next_id)),
            name: name.to_string(),
            kind,
            size,
            modified_at: self.next_id as i64,
        }
    }

    fn dir(&self, path: &RemotePath) -> GatewayResult<&Vec<Entry>> {
        self.dirs.get(path).ok_or(GatewayError::NotFound)
    }

    fn dir_mut(&mut self, path: &RemotePath) -> GatewayResult<&mut Vec<Entry>> {
        self.dirs.get_mut(path).ok_or(GatewayError::NotFound)
    }

    fn find(&self, path: &RemotePath, name: &str) -> Option<&Entry> {
        self.dirs.get(path)?.iter().find(|e| e.name == name)
    }

    fn check_name(&self, name: &str) -> GatewayResult<()> {
        if name.is_empty() || name.contains('/') || self.rejected.contains(name) {
            return Err(GatewayError::invalid_name(
                name,
                format!("Invalid name [{}]", name),
            ));
        }
        Ok(())
    }

    /// Store `entry` in `path`, replacing a same-name entry.
    fn put(&mut self, path: &RemotePath, entry: Entry) -> GatewayResult<()> {
        let dir = self.dir_mut(path)?;
        match dir.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => dir.push(entry),
        }
        Ok(())
    }

    fn take(&mut self, path: &RemotePath, name: &str) -> GatewayResult<Entry> {
        let dir = self.dir_mut(path)?;
        let idx = dir
            .iter()
            .position(|e| e.name == name)
            .ok_or(GatewayError::NotFound)?;
        Ok(dir.remove(idx))
    }

    /// Re-home a directory subtree (and file bodies) after move/rename.
    fn rekey(&mut self, from: &RemotePath, to: &RemotePath) {
        let moved: Vec<RemotePath> = self
            .dirs
            .keys()
            .filter(|k| k.segments().starts_with(from.segments()))
            .cloned()
            .collect();
        for key in moved {
            if let Some(entries) = self.dirs.remove(&key) {
                self.dirs.insert(rebase(&key, from, to), entries);
            }
        }
        let bodies: Vec<(RemotePath, String)> = self
            .contents
            .keys()
            .filter(|(dir, _)| dir.segments().starts_with(from.segments()))
            .cloned()
            .collect();
        for (dir, name) in bodies {
            if let Some(body) = self.contents.remove(&(dir.clone(), name.clone())) {
                self.contents.insert((rebase(&dir, from, to), name), body);
            }
        }
    }

    fn drop_subtree(&mut self, root: &RemotePath) {
        self.dirs.retain(|k, _| !k.segments().starts_with(root.segments()));
        self.contents
            .retain(|(dir, _), _| !dir.segments().starts_with(root.segments()));
    }

    fn delete(&mut self, path: &RemotePath, name: &str) -> GatewayResult<()> {
        let entry = self.take(path, name)?;
        self.contents.remove(&(path.clone(), name.to_string()));
        if entry.is_directory() {
            self.drop_subtree(&path.child(name));
        }
        Ok(())
    }
}

fn rebase(key: &RemotePath, from: &RemotePath, to: &RemotePath) -> RemotePath {
    RemotePath::new(
        to.segments()
            .iter()
            .chain(&key.segments()[from.depth()..])
            .cloned(),
    )
}

/// In-memory implementation of [`StorageGateway`].
#[derive(Debug)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
    hold: watch::Sender<bool>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    /// Empty storage with only the root directory.
    pub fn new() -> Self {
        let mut dirs = HashMap::new();
        dirs.insert(RemotePath::root(), Vec::new());
        let (hold, _) = watch::channel(false);
        Self {
            state: Mutex::new(MemoryState {
                dirs,
                contents: HashMap::new(),
                calls: HashMap::new(),
                rejected: HashSet::new(),
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
                expired: false,
                next_id: 0,
            }),
            hold,
        }
    }

    /// Override the aggregate upload limit.
    pub fn with_upload_limit(self, bytes: u64) -> Self {
        self.state().max_upload_bytes = bytes;
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a directory and any missing parents.
    pub fn add_directory(&self, path: &RemotePath) {
        let mut state = self.state();
        let mut current = RemotePath::root();
        for segment in path.segments() {
            if state.find(&current, segment).is_none() {
                let entry = state.mint(segment, EntryKind::Directory, 0);
                state.dirs.entry(current.clone()).or_default().push(entry);
            }
            current = current.child(segment);
            state.dirs.entry(current.clone()).or_default();
        }
    }

    /// Add a file with `data` to an existing (or newly created) directory.
    pub fn add_file(&self, path: &RemotePath, name: &str, data: &[u8]) {
        self.add_directory(path);
        let mut state = self.state();
        let entry = state.mint(name, EntryKind::File, data.len() as u64);
        let _ = state.put(path, entry);
        state
            .contents
            .insert((path.clone(), name.to_string()), data.to_vec());
    }

    /// Names stored in `path`, in storage order. Empty if missing.
    pub fn names(&self, path: &RemotePath) -> Vec<String> {
        self.state()
            .dirs
            .get(path)
            .map(|entries| entries.iter().map(|e| e.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn exists(&self, path: &RemotePath) -> bool {
        self.state().dirs.contains_key(path)
    }

    /// Make every upload, move, rename or create touching `name` fail validation.
    pub fn reject_name(&self, name: &str) {
        self.state().rejected.insert(name.to_string());
    }

    /// Fail every following call with `SessionExpired`.
    pub fn expire_session(&self) {
        self.state().expired = true;
    }

    /// Park mutating calls (after they are counted) until released.
    pub fn hold_mutations(&self) {
        self.hold.send_replace(true);
    }

    pub fn release_mutations(&self) {
        self.hold.send_replace(false);
    }

    /// How many times `call` has been invoked.
    pub fn calls(&self, call: GatewayCall) -> usize {
        self.state().calls.get(&call).copied().unwrap_or(0)
    }

    /// Count the call and fail fast on an expired session.
    fn enter(&self, call: GatewayCall) -> GatewayResult<()> {
        let mut state = self.state();
        *state.calls.entry(call).or_default() += 1;
        if state.expired {
            return Err(GatewayError::SessionExpired);
        }
        Ok(())
    }

    /// Like `enter`, then wait while mutations are held.
    async fn enter_mutation(&self, call: GatewayCall) -> GatewayResult<()> {
        self.enter(call)?;
        let mut held = self.hold.subscribe();
        let _ = held.wait_for(|held| !*held).await;
        if self.state().expired {
            return Err(GatewayError::SessionExpired);
        }
        Ok(())
    }
}

#[async_trait]
impl StorageGateway for MemoryGateway {
    async fn list(&self, path: &RemotePath) -> GatewayResult<Vec<Entry>> {
        self.enter(GatewayCall::List)?;
        Ok(self.state().dir(path)?.clone())
    }

    async fn create_directory(&self, path: &RemotePath, name: &str) -> GatewayResult<Entry> {
        self.enter_mutation(GatewayCall::CreateDirectory).await?;
        let mut state = self.state();
        state.dir(path)?;
        state.check_name(name)?;
        if state.find(path, name).is_some() {
            return Err(GatewayError::Conflict {
                name: name.to_string(),
            });
        }
        let entry = state.mint(name, EntryKind::Directory, 0);
        state.put(path, entry.clone())?;
        state.dirs.insert(path.child(name), Vec::new());
        Ok(entry)
    }

    async fn upload_batch(
        &self,
        path: &RemotePath,
        files: &[UploadFile],
    ) -> GatewayResult<Vec<Entry>> {
        self.enter_mutation(GatewayCall::UploadBatch).await?;
        let mut state = self.state();
        state.dir(path)?;
        let total: u64 = files.iter().map(UploadFile::size).sum();
        if total > state.max_upload_bytes {
            return Err(GatewayError::PayloadTooLarge);
        }

        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            state.check_name(&file.name)?;
            if state.find(path, &file.name).is_some_and(Entry::is_directory) {
                return Err(GatewayError::invalid_name(
                    &file.name,
                    format!("Non-empty directory with name [{}] already exists", file.name),
                ));
            }
            let mut entry = state.mint(&file.name, EntryKind::File, file.size());
            if file.modified_at != 0 {
                entry.modified_at = file.modified_at;
            }
            state.put(path, entry.clone())?;
            state
                .contents
                .insert((path.clone(), file.name.clone()), file.data.clone());
            stored.push(entry);
        }
        debug!(path = %path, count = stored.len(), "memory upload stored");
        Ok(stored)
    }

    async fn move_entries(
        &self,
        path: &RemotePath,
        names: &[String],
        target: &MoveTarget,
    ) -> GatewayResult<Vec<Entry>> {
        self.enter_mutation(GatewayCall::Move).await?;
        let mut state = self.state();
        state.dir(path)?;
        let dest = match target.resolve(path) {
            Some(dest) if state.dirs.contains_key(&dest) => dest,
            _ => return Err(GatewayError::validation("Invalid target folder")),
        };

        let mut moved = Vec::with_capacity(names.len());
        for name in names {
            state.check_name(name)?;
            if matches!(target, MoveTarget::Child(child) if child == name) {
                return Err(GatewayError::invalid_name(
                    name,
                    format!("Cannot move [{}] into itself", name),
                ));
            }
            let Some(existing) = state.find(path, name).cloned() else {
                return Err(GatewayError::invalid_name(
                    name,
                    format!("File not found [{}]", name),
                ));
            };
            if existing.is_directory() && state.find(&dest, name).is_some() {
                return Err(GatewayError::invalid_name(
                    name,
                    format!("Non-empty directory with name [{}] already exists", name),
                ));
            }

            state.take(path, name)?;
            let entry = state.mint(name, existing.kind, existing.size);
            state.put(&dest, entry.clone())?;
            if existing.is_directory() {
                state.rekey(&path.child(name), &dest.child(name));
            } else if let Some(body) = state.contents.remove(&(path.clone(), name.clone())) {
                state.contents.insert((dest.clone(), name.clone()), body);
            }
            moved.push(entry);
        }
        Ok(moved)
    }

    async fn rename(&self, path: &RemotePath, name: &str, new_name: &str) -> GatewayResult<Entry> {
        self.enter_mutation(GatewayCall::Rename).await?;
        let mut state = self.state();
        let existing = state
            .find(path, name)
            .cloned()
            .ok_or(GatewayError::NotFound)?;
        state.check_name(new_name)?;
        if state.find(path, new_name).is_some() {
            return Err(GatewayError::Conflict {
                name: new_name.to_string(),
            });
        }

        state.take(path, name)?;
        let entry = state.mint(new_name, existing.kind, existing.size);
        state.put(path, entry.clone())?;
        if existing.is_directory() {
            state.rekey(&path.child(name), &path.child(new_name));
        } else if let Some(body) = state.contents.remove(&(path.clone(), name.to_string())) {
            state
                .contents
                .insert((path.clone(), new_name.to_string()), body);
        }
        Ok(entry)
    }

    async fn delete_one(&self, path: &RemotePath, name: &str) -> GatewayResult<()> {
        self.enter_mutation(GatewayCall::DeleteOne).await?;
        self.state().delete(path, name)
    }

    async fn delete_many(&self, path: &RemotePath, names: &[String]) -> GatewayResult<()> {
        self.enter_mutation(GatewayCall::DeleteMany).await?;
        let mut state = self.state();
        for name in names {
            state.delete(path, name)?;
        }
        Ok(())
    }

    async fn download(&self, path: &RemotePath, name: &str) -> GatewayResult<Download> {
        self.enter(GatewayCall::Download)?;
        let state = self.state();
        let entry = state.find(path, name).ok_or(GatewayError::NotFound)?;
        if entry.is_directory() {
            return Ok(Download {
                filename: format!("{}.zip", name),
                data: Vec::new(),
            });
        }
        let data = state
            .contents
            .get(&(path.clone(), name.to_string()))
            .cloned()
            .unwrap_or_default();
        Ok(Download {
            filename: name.to_string(),
            data,
        })
    }
}
