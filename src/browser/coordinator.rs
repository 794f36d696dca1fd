//! Reconciliation core.
//!
//! [`Coordinator`] owns the navigation state, the listing, the selection, the
//! operation ledger and the prompt queue of one browsing session. It never
//! performs I/O: every action returns the gateway [`Request`]s to run, and the
//! owner feeds each finished call back through [`Coordinator::settle`]. Each
//! request carries the path that was live when it was issued; settlement
//! compares that value with the path that is live *now* before touching the
//! listing.

use std::collections::HashMap;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::conflict::{ConflictResolver, Decision, InputAction, PromptKind, Resolved};
use super::ledger::{OperationId, OperationKind, OperationLedger};
use super::selection::SelectionSet;
use crate::api::{GatewayError, GatewayResult, MoveTarget, StorageGateway};
use crate::error::{BrowserError, Result};
use crate::fs::{DirectorySnapshot, Entry, EntryId, PathStack, RemotePath, UploadFile};
use crate::view::{ListingView, PromptView, Row, RowStatus};

/// Shown when a submission touches a name that is already in flight.
pub const BUSY_MESSAGE: &str = "Processing these files right now, please wait";

pub(crate) type Reply<T> = oneshot::Sender<Result<T>>;

fn respond<T>(reply: Reply<T>, result: Result<T>) {
    // The caller may have stopped waiting.
    let _ = reply.send(result);
}

/// How a mutating action ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Completed and patched into the visible listing.
    Applied,
    /// Completed against storage while another directory was displayed.
    Discarded,
    /// Declined at a prompt (or nothing to do); no call was made.
    Cancelled,
}

/// A gateway call to perform.
#[derive(Debug)]
pub(crate) enum Request {
    List {
        generation: u64,
        path: RemotePath,
    },
    /// Destination listing for a move's conflict pre-check.
    ListTarget {
        check: u64,
        path: RemotePath,
    },
    Upload {
        op: OperationId,
        path: RemotePath,
        files: Vec<UploadFile>,
    },
    Move {
        op: OperationId,
        path: RemotePath,
        names: Vec<String>,
        target: MoveTarget,
    },
    Rename {
        op: OperationId,
        path: RemotePath,
        name: String,
        new_name: String,
    },
    Delete {
        op: OperationId,
        path: RemotePath,
        names: Vec<String>,
    },
    CreateDirectory {
        op: OperationId,
        path: RemotePath,
        name: String,
    },
}

/// A finished gateway call.
#[derive(Debug)]
pub(crate) enum Response {
    Listed {
        generation: u64,
        path: RemotePath,
        result: GatewayResult<Vec<Entry>>,
    },
    TargetListed {
        check: u64,
        result: GatewayResult<Vec<Entry>>,
    },
    Uploaded {
        op: OperationId,
        result: GatewayResult<Vec<Entry>>,
    },
    Moved {
        op: OperationId,
        result: GatewayResult<Vec<Entry>>,
    },
    Renamed {
        op: OperationId,
        result: GatewayResult<Entry>,
    },
    Deleted {
        op: OperationId,
        result: GatewayResult<()>,
    },
    DirectoryCreated {
        op: OperationId,
        result: GatewayResult<Entry>,
    },
}

impl Request {
    pub(crate) async fn execute(self, gateway: &dyn StorageGateway) -> Response {
        match self {
            Request::List { generation, path } => {
                let result = gateway.list(&path).await;
                Response::Listed {
                    generation,
                    path,
                    result,
                }
            }
            Request::ListTarget { check, path } => Response::TargetListed {
                check,
                result: gateway.list(&path).await,
            },
            Request::Upload { op, path, files } => Response::Uploaded {
                op,
                result: gateway.upload_batch(&path, &files).await,
            },
            Request::Move {
                op,
                path,
                names,
                target,
            } => Response::Moved {
                op,
                result: gateway.move_entries(&path, &names, &target).await,
            },
            Request::Rename {
                op,
                path,
                name,
                new_name,
            } => Response::Renamed {
                op,
                result: gateway.rename(&path, &name, &new_name).await,
            },
            Request::Delete { op, path, names } => {
                let result = match names.as_slice() {
                    [name] => gateway.delete_one(&path, name).await,
                    _ => gateway.delete_many(&path, &names).await,
                };
                Response::Deleted { op, result }
            }
            Request::CreateDirectory { op, path, name } => Response::DirectoryCreated {
                op,
                result: gateway.create_directory(&path, &name).await,
            },
        }
    }
}

/// Work parked behind a prompt. Paths are captured when the prompt opens.
#[derive(Debug)]
enum Continuation {
    Upload {
        path: RemotePath,
        files: Vec<UploadFile>,
        reply: Reply<Outcome>,
    },
    Move {
        path: RemotePath,
        names: Vec<String>,
        target: MoveTarget,
        reply: Reply<Outcome>,
    },
    Delete {
        path: RemotePath,
        names: Vec<String>,
        reply: Reply<Outcome>,
    },
    CreateDirectory {
        path: RemotePath,
        reply: Reply<Outcome>,
    },
    Rename {
        path: RemotePath,
        name: String,
        reply: Reply<Outcome>,
    },
}

impl Continuation {
    fn into_reply(self) -> Reply<Outcome> {
        match self {
            Continuation::Upload { reply, .. }
            | Continuation::Move { reply, .. }
            | Continuation::Delete { reply, .. }
            | Continuation::CreateDirectory { reply, .. }
            | Continuation::Rename { reply, .. } => reply,
        }
    }
}

/// A move waiting for its destination listing.
#[derive(Debug)]
struct MoveCheck {
    path: RemotePath,
    names: Vec<String>,
    target: MoveTarget,
    reply: Reply<Outcome>,
}

/// An issued mutating call, keyed by its ledger id.
#[derive(Debug)]
enum InFlight {
    Upload {
        path: RemotePath,
        /// Entries the batch would create, in submission order
        staged: Vec<Entry>,
        reply: Reply<Outcome>,
    },
    Move {
        path: RemotePath,
        names: Vec<String>,
        dest: RemotePath,
        reply: Reply<Outcome>,
    },
    Rename {
        path: RemotePath,
        name: String,
        reply: Reply<Outcome>,
    },
    Delete {
        path: RemotePath,
        names: Vec<String>,
        reply: Reply<Outcome>,
    },
    CreateDirectory {
        path: RemotePath,
        reply: Reply<Outcome>,
    },
}

impl InFlight {
    fn into_reply(self) -> Reply<Outcome> {
        match self {
            InFlight::Upload { reply, .. }
            | InFlight::Move { reply, .. }
            | InFlight::Rename { reply, .. }
            | InFlight::Delete { reply, .. }
            | InFlight::CreateDirectory { reply, .. } => reply,
        }
    }
}

/// Browsing-session state machine.
#[derive(Debug)]
pub(crate) struct Coordinator {
    stack: PathStack,
    snapshot: DirectorySnapshot,
    selection: SelectionSet,
    ledger: OperationLedger,
    prompts: ConflictResolver<Continuation>,
    in_flight: HashMap<OperationId, InFlight>,
    checks: HashMap<u64, MoveCheck>,
    next_check: u64,
    /// Latest issued listing; older ones never replace the snapshot
    generation: u64,
    /// Latest listing that has come back
    settled_generation: u64,
    list_waiters: Vec<(u64, Reply<RemotePath>)>,
    upload_limit: String,
    expired: bool,
    logout_notice: bool,
}

impl Coordinator {
    /// Start at the root with nothing listed yet.
    pub(crate) fn new(upload_limit: impl Into<String>) -> Self {
        Self {
            stack: PathStack::new(),
            snapshot: DirectorySnapshot::new(RemotePath::root()),
            selection: SelectionSet::new(),
            ledger: OperationLedger::new(),
            prompts: ConflictResolver::new(),
            in_flight: HashMap::new(),
            checks: HashMap::new(),
            next_check: 0,
            generation: 0,
            settled_generation: 0,
            list_waiters: Vec::new(),
            upload_limit: upload_limit.into(),
            expired: false,
            logout_notice: false,
        }
    }

    pub(crate) fn path(&self) -> &RemotePath {
        self.stack.current()
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.expired
    }

    /// Whether a gateway call reported session expiry since the last check.
    pub(crate) fn take_logout_notice(&mut self) -> bool {
        std::mem::take(&mut self.logout_notice)
    }

    fn check_live(&self) -> Result<()> {
        if self.expired {
            Err(BrowserError::SessionExpired)
        } else {
            Ok(())
        }
    }

    // ---- navigation ----

    /// Re-list the live path. `reply` gets the displayed path once the
    /// latest listing has come back.
    pub(crate) fn refresh(&mut self, reply: Reply<RemotePath>) -> Vec<Request> {
        if let Err(err) = self.check_live() {
            respond(reply, Err(err));
            return Vec::new();
        }
        let request = self.issue_refresh();
        self.list_waiters.push((self.generation, reply));
        vec![request]
    }

    /// Enter the listed, idle subdirectory `name`.
    pub(crate) fn enter(&mut self, name: &str, reply: Reply<RemotePath>) -> Vec<Request> {
        if let Err(err) = self.check_live().and_then(|_| self.check_enterable(name)) {
            respond(reply, Err(err));
            return Vec::new();
        }
        self.stack.push(name);
        info!(path = %self.stack.current(), "entered directory");
        self.navigated(reply)
    }

    /// Go up one level. At the root nothing is listed and `reply` gets the root.
    pub(crate) fn go_up(&mut self, reply: Reply<RemotePath>) -> Vec<Request> {
        if let Err(err) = self.check_live() {
            respond(reply, Err(err));
            return Vec::new();
        }
        if !self.stack.pop() {
            respond(reply, Ok(RemotePath::root()));
            return Vec::new();
        }
        info!(path = %self.stack.current(), "went up");
        self.navigated(reply)
    }

    fn check_enterable(&self, name: &str) -> Result<()> {
        match self.snapshot.get(name) {
            Some(entry) if entry.is_directory() => {
                if self.ledger.is_pending(self.stack.current(), name) {
                    Err(BrowserError::Busy {
                        names: vec![name.to_string()],
                    })
                } else {
                    Ok(())
                }
            }
            Some(_) => Err(BrowserError::NotADirectory(name.to_string())),
            None => Err(BrowserError::NoSuchEntry(name.to_string())),
        }
    }

    fn navigated(&mut self, reply: Reply<RemotePath>) -> Vec<Request> {
        self.snapshot.reset(self.stack.current().clone());
        self.selection.clear();
        let request = self.issue_refresh();
        self.list_waiters.push((self.generation, reply));
        vec![request]
    }

    fn issue_refresh(&mut self) -> Request {
        self.generation += 1;
        let path = self.stack.current().clone();
        debug!(path = %path, generation = self.generation, "listing issued");
        Request::List {
            generation: self.generation,
            path,
        }
    }

    fn answer_listings(&mut self, upto: u64, result: Result<()>) {
        let live = self.stack.current().clone();
        let (due, waiting): (Vec<_>, Vec<_>) = self
            .list_waiters
            .drain(..)
            .partition(|(generation, _)| *generation <= upto);
        self.list_waiters = waiting;
        for (_, reply) in due {
            respond(reply, result.clone().map(|_| live.clone()));
        }
    }

    fn on_listed(
        &mut self,
        generation: u64,
        path: RemotePath,
        result: GatewayResult<Vec<Entry>>,
    ) -> Vec<Request> {
        if generation != self.generation || !self.stack.is_current(&path) {
            debug!(path = %path, generation, latest = self.generation, "superseded listing dropped");
            if self.settled_generation == self.generation {
                self.answer_listings(generation, Ok(()));
            } else {
                // Wait for the listing that is still on its way.
                for (waiter_generation, _) in self.list_waiters.iter_mut() {
                    if *waiter_generation <= generation {
                        *waiter_generation = self.generation;
                    }
                }
            }
            return Vec::new();
        }

        self.settled_generation = generation;
        match result {
            Ok(entries) => {
                debug!(path = %path, count = entries.len(), "listing applied");
                self.snapshot.replace(entries);
                self.selection.clear();
                self.answer_listings(generation, Ok(()));
                Vec::new()
            }
            Err(GatewayError::NotFound) if !path.is_root() => {
                warn!(path = %path, "displayed directory vanished, going up");
                self.stack.pop();
                self.snapshot.reset(self.stack.current().clone());
                self.selection.clear();
                let request = self.issue_refresh();
                let latest = self.generation;
                for (waiter_generation, _) in self.list_waiters.iter_mut() {
                    if *waiter_generation <= generation {
                        *waiter_generation = latest;
                    }
                }
                vec![request]
            }
            Err(err) => {
                let requests = self.surface_listing(&err);
                self.answer_listings(generation, Err(to_error(err)));
                requests
            }
        }
    }

    // ---- selection ----

    /// Flip the selection of `name`. In-flight entries cannot be selected.
    pub(crate) fn toggle(&mut self, name: &str) -> Result<bool> {
        self.check_live()?;
        let id = self
            .snapshot
            .get(name)
            .map(|entry| entry.id.clone())
            .ok_or_else(|| BrowserError::NoSuchEntry(name.to_string()))?;
        if self.ledger.is_pending(self.stack.current(), name) {
            return Err(BrowserError::Busy {
                names: vec![name.to_string()],
            });
        }
        Ok(self.selection.toggle(&id))
    }

    /// Select every idle entry. Returns how many are selected.
    pub(crate) fn select_all(&mut self) -> Result<usize> {
        self.check_live()?;
        let path = self.stack.current();
        let ids: Vec<EntryId> = self
            .snapshot
            .entries()
            .iter()
            .filter(|entry| !self.ledger.is_pending(path, &entry.name))
            .map(|entry| entry.id.clone())
            .collect();
        self.selection.select_all(&ids);
        Ok(self.selection.len())
    }

    pub(crate) fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // ---- upload ----

    /// Upload `files` into the live directory, asking first when any name
    /// is already listed there.
    pub(crate) fn upload(&mut self, files: Vec<UploadFile>, reply: Reply<Outcome>) -> Vec<Request> {
        if let Err(err) = self.check_live() {
            respond(reply, Err(err));
            return Vec::new();
        }
        if files.is_empty() {
            respond(reply, Ok(Outcome::Cancelled));
            return Vec::new();
        }
        let path = self.stack.current().clone();
        let names = file_names(&files);
        if let Err(err) = self.ensure_idle(&path, &names) {
            respond(reply, Err(err));
            return Vec::new();
        }

        let duplicates = self.snapshot.collisions(names.iter().map(String::as_str));
        if !duplicates.is_empty() {
            debug!(path = %path, ?duplicates, "upload needs overwrite confirmation");
            self.prompts.request(
                PromptKind::Overwrite { names: duplicates },
                Continuation::Upload { path, files, reply },
            );
            return Vec::new();
        }
        self.issue_upload(path, files, reply)
    }

    fn issue_upload(
        &mut self,
        path: RemotePath,
        files: Vec<UploadFile>,
        reply: Reply<Outcome>,
    ) -> Vec<Request> {
        let op = match self.register(&path, &file_names(&files), OperationKind::Upload) {
            Ok(op) => op,
            Err(err) => {
                respond(reply, Err(err));
                return Vec::new();
            }
        };
        debug!(%op, path = %path, count = files.len(), "upload issued");
        let staged = files.iter().map(UploadFile::to_entry).collect();
        self.in_flight.insert(
            op,
            InFlight::Upload {
                path: path.clone(),
                staged,
                reply,
            },
        );
        vec![Request::Upload { op, path, files }]
    }

    fn on_uploaded(
        &mut self,
        path: RemotePath,
        staged: Vec<Entry>,
        reply: Reply<Outcome>,
        result: GatewayResult<Vec<Entry>>,
    ) -> Vec<Request> {
        let visible = self.stack.is_current(&path);
        match result {
            Ok(entries) => {
                if visible {
                    for entry in entries {
                        self.snapshot.upsert(entry);
                    }
                    self.selection.retain_present(&self.snapshot);
                } else {
                    warn!(path = %path, "upload settled out of view, listing untouched");
                }
                respond(reply, Ok(outcome(visible)));
                Vec::new()
            }
            Err(err) => {
                let Some(rejected) = err.rejected_name() else {
                    let requests = self.surface(&err);
                    respond(reply, Err(to_error(err)));
                    return requests;
                };
                let names: Vec<String> = staged.iter().map(|e| e.name.clone()).collect();
                let committed = committed_before(&names, rejected);
                debug!(path = %path, ?committed, rejected, "upload partially rejected");
                if visible {
                    for entry in staged.into_iter().take(committed.len()) {
                        self.snapshot.upsert(entry);
                    }
                    self.selection.retain_present(&self.snapshot);
                }
                let requests = self.surface(&err);
                respond(
                    reply,
                    Err(BrowserError::PartialBatch {
                        committed,
                        source: err,
                    }),
                );
                requests
            }
        }
    }

    // ---- move ----

    /// Move `names` out of the live directory.
    ///
    /// The destination is listed first; names that already exist there
    /// need an overwrite confirmation before anything moves.
    pub(crate) fn move_entries(
        &mut self,
        names: Vec<String>,
        target: MoveTarget,
        reply: Reply<Outcome>,
    ) -> Vec<Request> {
        if let Err(err) = self.check_live() {
            respond(reply, Err(err));
            return Vec::new();
        }
        if names.is_empty() {
            respond(reply, Ok(Outcome::Cancelled));
            return Vec::new();
        }
        let path = self.stack.current().clone();
        let dest = match self.move_destination(&names, &target) {
            Ok(dest) => dest,
            Err(err) => {
                respond(reply, Err(err));
                return Vec::new();
            }
        };
        let mut touched = names.clone();
        if let MoveTarget::Child(child) = &target {
            touched.push(child.clone());
        }
        if let Err(err) = self.ensure_idle(&path, &touched) {
            respond(reply, Err(err));
            return Vec::new();
        }

        self.next_check += 1;
        let check = self.next_check;
        debug!(path = %path, dest = %dest, ?names, "move pre-check issued");
        self.checks.insert(
            check,
            MoveCheck {
                path,
                names,
                target,
                reply,
            },
        );
        vec![Request::ListTarget { check, path: dest }]
    }

    /// Drag semantics: a selected entry drags the whole selection, an
    /// unselected one drags alone and drops the selection.
    pub(crate) fn move_dragged(
        &mut self,
        name: &str,
        target: MoveTarget,
        reply: Reply<Outcome>,
    ) -> Vec<Request> {
        let names = match self.snapshot.get(name) {
            Some(entry) if self.selection.contains(&entry.id) => {
                self.selection.names(&self.snapshot)
            }
            Some(_) => {
                self.selection.clear();
                vec![name.to_string()]
            }
            None => {
                respond(reply, Err(BrowserError::NoSuchEntry(name.to_string())));
                return Vec::new();
            }
        };
        self.move_entries(names, target, reply)
    }

    fn move_destination(&self, names: &[String], target: &MoveTarget) -> Result<RemotePath> {
        if let Some(missing) = names.iter().find(|name| !self.snapshot.contains(name)) {
            return Err(BrowserError::NoSuchEntry(missing.clone()));
        }
        let current = self.stack.current();
        match target {
            MoveTarget::Parent => current
                .parent()
                .ok_or_else(|| BrowserError::InvalidTarget(target.to_string())),
            MoveTarget::Child(child) => {
                if names.contains(child) {
                    return Err(BrowserError::InvalidTarget(child.clone()));
                }
                match self.snapshot.get(child) {
                    Some(entry) if entry.is_directory() => Ok(current.child(child)),
                    _ => Err(BrowserError::InvalidTarget(child.clone())),
                }
            }
        }
    }

    fn on_target_listed(&mut self, check: u64, result: GatewayResult<Vec<Entry>>) -> Vec<Request> {
        let Some(MoveCheck {
            path,
            names,
            target,
            reply,
        }) = self.checks.remove(&check)
        else {
            return Vec::new();
        };
        match result {
            Ok(existing) => {
                let duplicates: Vec<String> = names
                    .iter()
                    .filter(|name| existing.iter().any(|entry| &entry.name == *name))
                    .cloned()
                    .collect();
                if duplicates.is_empty() {
                    return self.issue_move(path, names, target, reply);
                }
                debug!(path = %path, ?duplicates, "move needs overwrite confirmation");
                self.prompts.request(
                    PromptKind::Overwrite { names: duplicates },
                    Continuation::Move {
                        path,
                        names,
                        target,
                        reply,
                    },
                );
                Vec::new()
            }
            Err(err) => {
                let requests = self.surface(&err);
                respond(reply, Err(to_error(err)));
                requests
            }
        }
    }

    fn issue_move(
        &mut self,
        path: RemotePath,
        names: Vec<String>,
        target: MoveTarget,
        reply: Reply<Outcome>,
    ) -> Vec<Request> {
        let Some(dest) = target.resolve(&path) else {
            respond(reply, Err(BrowserError::InvalidTarget(target.to_string())));
            return Vec::new();
        };
        // The destination directory is claimed too, so it cannot be
        // renamed, deleted or entered until the move settles.
        let mut claimed = names.clone();
        if let MoveTarget::Child(child) = &target {
            claimed.push(child.clone());
        }
        let op = match self.register(&path, &claimed, OperationKind::Move) {
            Ok(op) => op,
            Err(err) => {
                respond(reply, Err(err));
                return Vec::new();
            }
        };
        if self.stack.is_current(&path) {
            self.selection.clear();
        }
        debug!(%op, path = %path, dest = %dest, count = names.len(), "move issued");
        self.in_flight.insert(
            op,
            InFlight::Move {
                path: path.clone(),
                names: names.clone(),
                dest,
                reply,
            },
        );
        vec![Request::Move {
            op,
            path,
            names,
            target,
        }]
    }

    fn on_moved(
        &mut self,
        path: RemotePath,
        names: Vec<String>,
        dest: RemotePath,
        reply: Reply<Outcome>,
        result: GatewayResult<Vec<Entry>>,
    ) -> Vec<Request> {
        match result {
            Ok(moved) => {
                let visible = if self.stack.is_current(&path) {
                    for name in &names {
                        self.snapshot.remove(name);
                    }
                    true
                } else if self.stack.is_current(&dest) {
                    for entry in moved {
                        self.snapshot.upsert(entry);
                    }
                    true
                } else {
                    warn!(path = %path, dest = %dest, "move settled out of view, listing untouched");
                    false
                };
                self.selection.retain_present(&self.snapshot);
                respond(reply, Ok(outcome(visible)));
                Vec::new()
            }
            Err(err) => {
                let Some(rejected) = err.rejected_name() else {
                    let requests = self.surface(&err);
                    respond(reply, Err(to_error(err)));
                    return requests;
                };
                let committed = committed_before(&names, rejected);
                debug!(path = %path, ?committed, rejected, "move partially rejected");
                let mut requests = Vec::new();
                if self.stack.is_current(&path) {
                    for name in &committed {
                        self.snapshot.remove(name);
                    }
                    self.selection.retain_present(&self.snapshot);
                } else if self.stack.is_current(&dest) && !committed.is_empty() {
                    // The moved entries were not returned; re-list.
                    requests.push(self.issue_refresh());
                }
                requests.extend(self.surface(&err));
                respond(
                    reply,
                    Err(BrowserError::PartialBatch {
                        committed,
                        source: err,
                    }),
                );
                requests
            }
        }
    }

    // ---- rename ----

    /// Ask for a new name for `name`.
    pub(crate) fn rename(&mut self, name: String, reply: Reply<Outcome>) -> Vec<Request> {
        let path = match self.prepare(&[name.clone()]) {
            Ok(path) => path,
            Err(err) => {
                respond(reply, Err(err));
                return Vec::new();
            }
        };
        self.prompts.request(
            PromptKind::Input {
                action: InputAction::Rename,
                default_value: name.clone(),
            },
            Continuation::Rename { path, name, reply },
        );
        Vec::new()
    }

    /// Rename without prompting.
    pub(crate) fn rename_to(
        &mut self,
        name: String,
        new_name: String,
        reply: Reply<Outcome>,
    ) -> Vec<Request> {
        if let Err(err) = self.check_live() {
            respond(reply, Err(err));
            return Vec::new();
        }
        if !self.snapshot.contains(&name) {
            respond(reply, Err(BrowserError::NoSuchEntry(name)));
            return Vec::new();
        }
        let path = self.stack.current().clone();
        self.issue_rename(path, name, new_name, reply)
    }

    fn issue_rename(
        &mut self,
        path: RemotePath,
        name: String,
        new_name: String,
        reply: Reply<Outcome>,
    ) -> Vec<Request> {
        let new_name = new_name.trim().to_string();
        if new_name.is_empty() || new_name == name {
            respond(reply, Ok(Outcome::Cancelled));
            return Vec::new();
        }
        // Both names are claimed so nothing else can touch either meanwhile.
        let claimed = [name.clone(), new_name.clone()];
        let op = match self.register(&path, &claimed, OperationKind::Rename) {
            Ok(op) => op,
            Err(err) => {
                respond(reply, Err(err));
                return Vec::new();
            }
        };
        debug!(%op, path = %path, from = %name, to = %new_name, "rename issued");
        self.in_flight.insert(
            op,
            InFlight::Rename {
                path: path.clone(),
                name: name.clone(),
                reply,
            },
        );
        vec![Request::Rename {
            op,
            path,
            name,
            new_name,
        }]
    }

    fn on_renamed(
        &mut self,
        path: RemotePath,
        name: String,
        reply: Reply<Outcome>,
        result: GatewayResult<Entry>,
    ) -> Vec<Request> {
        match result {
            Ok(entry) => {
                let visible = self.stack.is_current(&path);
                if visible {
                    self.snapshot.replace_named(&name, entry);
                    self.selection.retain_present(&self.snapshot);
                } else {
                    warn!(path = %path, name = %name, "rename settled out of view, listing untouched");
                }
                respond(reply, Ok(outcome(visible)));
                Vec::new()
            }
            Err(err) => {
                let requests = self.surface(&err);
                respond(reply, Err(to_error(err)));
                requests
            }
        }
    }

    // ---- delete ----

    /// Ask before deleting `name`.
    pub(crate) fn delete(&mut self, name: String, reply: Reply<Outcome>) -> Vec<Request> {
        let path = match self.prepare(&[name.clone()]) {
            Ok(path) => path,
            Err(err) => {
                respond(reply, Err(err));
                return Vec::new();
            }
        };
        self.prompts.request(
            PromptKind::Delete { name: name.clone() },
            Continuation::Delete {
                path,
                names: vec![name],
                reply,
            },
        );
        Vec::new()
    }

    /// Ask before deleting the selection.
    pub(crate) fn delete_selected(&mut self, reply: Reply<Outcome>) -> Vec<Request> {
        let names = self.selection.names(&self.snapshot);
        if names.is_empty() && !self.expired {
            respond(reply, Ok(Outcome::Cancelled));
            return Vec::new();
        }
        let path = match self.prepare(&names) {
            Ok(path) => path,
            Err(err) => {
                respond(reply, Err(err));
                return Vec::new();
            }
        };
        self.prompts.request(
            PromptKind::DeleteSelected {
                names: names.clone(),
            },
            Continuation::Delete { path, names, reply },
        );
        Vec::new()
    }

    fn issue_delete(
        &mut self,
        path: RemotePath,
        names: Vec<String>,
        reply: Reply<Outcome>,
    ) -> Vec<Request> {
        let op = match self.register(&path, &names, OperationKind::Delete) {
            Ok(op) => op,
            Err(err) => {
                respond(reply, Err(err));
                return Vec::new();
            }
        };
        if self.stack.is_current(&path) {
            for name in &names {
                if let Some(id) = self.snapshot.get(name).map(|entry| entry.id.clone()) {
                    self.selection.deselect(&id);
                }
            }
        }
        debug!(%op, path = %path, ?names, "delete issued");
        self.in_flight.insert(
            op,
            InFlight::Delete {
                path: path.clone(),
                names: names.clone(),
                reply,
            },
        );
        vec![Request::Delete { op, path, names }]
    }

    fn on_deleted(
        &mut self,
        path: RemotePath,
        names: Vec<String>,
        reply: Reply<Outcome>,
        result: GatewayResult<()>,
    ) -> Vec<Request> {
        let visible = self.stack.is_current(&path);
        match result {
            Ok(()) => {
                if visible {
                    for name in &names {
                        self.snapshot.remove(name);
                    }
                    self.selection.retain_present(&self.snapshot);
                } else {
                    warn!(path = %path, "delete settled out of view, listing untouched");
                }
                respond(reply, Ok(outcome(visible)));
                Vec::new()
            }
            Err(err) => {
                let Some(rejected) = err.rejected_name() else {
                    let requests = self.surface(&err);
                    respond(reply, Err(to_error(err)));
                    return requests;
                };
                let committed = committed_before(&names, rejected);
                if visible {
                    for name in &committed {
                        self.snapshot.remove(name);
                    }
                    self.selection.retain_present(&self.snapshot);
                }
                let requests = self.surface(&err);
                respond(
                    reply,
                    Err(BrowserError::PartialBatch {
                        committed,
                        source: err,
                    }),
                );
                requests
            }
        }
    }

    // ---- create directory ----

    /// Ask for the name of a new directory.
    pub(crate) fn create_directory(&mut self, reply: Reply<Outcome>) -> Vec<Request> {
        if let Err(err) = self.check_live() {
            respond(reply, Err(err));
            return Vec::new();
        }
        let path = self.stack.current().clone();
        self.prompts.request(
            PromptKind::Input {
                action: InputAction::CreateDirectory,
                default_value: String::new(),
            },
            Continuation::CreateDirectory { path, reply },
        );
        Vec::new()
    }

    /// Create a directory without prompting.
    pub(crate) fn create_directory_named(
        &mut self,
        name: String,
        reply: Reply<Outcome>,
    ) -> Vec<Request> {
        if let Err(err) = self.check_live() {
            respond(reply, Err(err));
            return Vec::new();
        }
        let path = self.stack.current().clone();
        self.issue_create(path, name, reply)
    }

    fn issue_create(&mut self, path: RemotePath, name: String, reply: Reply<Outcome>) -> Vec<Request> {
        let name = name.trim().to_string();
        if name.is_empty() {
            respond(reply, Ok(Outcome::Cancelled));
            return Vec::new();
        }
        let op = match self.register(&path, &[name.clone()], OperationKind::CreateDirectory) {
            Ok(op) => op,
            Err(err) => {
                respond(reply, Err(err));
                return Vec::new();
            }
        };
        debug!(%op, path = %path, name = %name, "mkdir issued");
        self.in_flight.insert(
            op,
            InFlight::CreateDirectory {
                path: path.clone(),
                reply,
            },
        );
        vec![Request::CreateDirectory { op, path, name }]
    }

    fn on_created(
        &mut self,
        path: RemotePath,
        reply: Reply<Outcome>,
        result: GatewayResult<Entry>,
    ) -> Vec<Request> {
        match result {
            Ok(entry) => {
                let visible = self.stack.is_current(&path);
                if visible {
                    self.snapshot.upsert_front(entry);
                    self.selection.retain_present(&self.snapshot);
                }
                respond(reply, Ok(outcome(visible)));
                Vec::new()
            }
            Err(err) => {
                let requests = self.surface(&err);
                respond(reply, Err(to_error(err)));
                requests
            }
        }
    }

    // ---- downloads ----

    /// Location of a listed entry to download.
    pub(crate) fn download_target(&self, name: &str) -> Result<RemotePath> {
        self.check_live()?;
        if !self.snapshot.contains(name) {
            return Err(BrowserError::NoSuchEntry(name.to_string()));
        }
        Ok(self.stack.current().clone())
    }

    /// Location and names of the selection, in listing order.
    pub(crate) fn selected_targets(&self) -> Result<(RemotePath, Vec<String>)> {
        self.check_live()?;
        Ok((
            self.stack.current().clone(),
            self.selection.names(&self.snapshot),
        ))
    }

    // ---- prompts ----

    pub(crate) fn confirm(&mut self, input: Option<String>) -> Result<Vec<Request>> {
        self.check_live()?;
        let resolved = self.prompts.confirm(input).ok_or(BrowserError::NoPrompt)?;
        Ok(self.resume(resolved))
    }

    pub(crate) fn cancel(&mut self) -> Result<()> {
        let resolved = self.prompts.cancel().ok_or(BrowserError::NoPrompt)?;
        self.resume(resolved);
        Ok(())
    }

    fn resume(&mut self, resolved: Resolved<Continuation>) -> Vec<Request> {
        let Some(continuation) = resolved.continuation else {
            return Vec::new();
        };
        let input = match resolved.decision {
            Decision::Cancel => {
                debug!(prompt = %resolved.id, "prompt cancelled");
                respond(continuation.into_reply(), Ok(Outcome::Cancelled));
                return Vec::new();
            }
            Decision::Confirm { input } => input,
        };
        debug!(prompt = %resolved.id, "prompt confirmed");
        match continuation {
            Continuation::Upload { path, files, reply } => self.issue_upload(path, files, reply),
            Continuation::Move {
                path,
                names,
                target,
                reply,
            } => self.issue_move(path, names, target, reply),
            Continuation::Delete { path, names, reply } => self.issue_delete(path, names, reply),
            Continuation::CreateDirectory { path, reply } => match input {
                Some(name) => self.issue_create(path, name, reply),
                None => {
                    respond(reply, Ok(Outcome::Cancelled));
                    Vec::new()
                }
            },
            Continuation::Rename { path, name, reply } => match input {
                Some(new_name) => self.issue_rename(path, name, new_name, reply),
                None => {
                    respond(reply, Ok(Outcome::Cancelled));
                    Vec::new()
                }
            },
        }
    }

    // ---- settlement ----

    /// Reconcile one finished gateway call.
    pub(crate) fn settle(&mut self, response: Response) -> Vec<Request> {
        match response {
            Response::Listed {
                generation,
                path,
                result,
            } => self.on_listed(generation, path, result),
            Response::TargetListed { check, result } => self.on_target_listed(check, result),
            Response::Uploaded { op, result } => match self.release(op, result.is_ok()) {
                Some(InFlight::Upload {
                    path,
                    staged,
                    reply,
                }) => self.on_uploaded(path, staged, reply, result),
                other => self.unmatched(op, other),
            },
            Response::Moved { op, result } => match self.release(op, result.is_ok()) {
                Some(InFlight::Move {
                    path,
                    names,
                    dest,
                    reply,
                }) => self.on_moved(path, names, dest, reply, result),
                other => self.unmatched(op, other),
            },
            Response::Renamed { op, result } => match self.release(op, result.is_ok()) {
                Some(InFlight::Rename { path, name, reply }) => {
                    self.on_renamed(path, name, reply, result)
                }
                other => self.unmatched(op, other),
            },
            Response::Deleted { op, result } => match self.release(op, result.is_ok()) {
                Some(InFlight::Delete { path, names, reply }) => {
                    self.on_deleted(path, names, reply, result)
                }
                other => self.unmatched(op, other),
            },
            Response::DirectoryCreated { op, result } => {
                match self.release(op, result.is_ok()) {
                    Some(InFlight::CreateDirectory { path, reply }) => {
                        self.on_created(path, reply, result)
                    }
                    other => self.unmatched(op, other),
                }
            }
        }
    }

    /// Drop the ledger records of `op`, whatever the outcome.
    fn release(&mut self, op: OperationId, succeeded: bool) -> Option<InFlight> {
        let settled = self.ledger.settle(op, succeeded);
        debug!(%op, succeeded, released = settled.len(), "operation settled");
        self.in_flight.remove(&op)
    }

    fn unmatched(&mut self, op: OperationId, flight: Option<InFlight>) -> Vec<Request> {
        match flight {
            None => debug!(%op, "settlement after session end ignored"),
            Some(flight) => {
                warn!(%op, "settlement kind mismatch");
                respond(flight.into_reply(), Ok(Outcome::Discarded));
            }
        }
        Vec::new()
    }

    /// Claim `names` under `path`, reporting a busy rejection to the user.
    fn register(
        &mut self,
        path: &RemotePath,
        names: &[String],
        kind: OperationKind,
    ) -> Result<OperationId> {
        self.ledger.try_register(path, names, kind).map_err(|err| {
            self.prompts.show_error(BUSY_MESSAGE);
            err
        })
    }

    fn ensure_idle(&mut self, path: &RemotePath, names: &[String]) -> Result<()> {
        let busy = self.ledger.busy_names(path, names);
        if busy.is_empty() {
            return Ok(());
        }
        self.prompts.show_error(BUSY_MESSAGE);
        Err(BrowserError::Busy { names: busy })
    }

    /// Common checks before prompting about listed, idle `names`.
    fn prepare(&mut self, names: &[String]) -> Result<RemotePath> {
        self.check_live()?;
        if let Some(missing) = names.iter().find(|name| !self.snapshot.contains(name)) {
            return Err(BrowserError::NoSuchEntry(missing.clone()));
        }
        let path = self.stack.current().clone();
        self.ensure_idle(&path, names)?;
        Ok(path)
    }

    /// Show a failure to the user and start whatever recovery it needs.
    fn surface(&mut self, err: &GatewayError) -> Vec<Request> {
        match err {
            GatewayError::SessionExpired => {
                self.logout_notice = true;
                self.expire();
                Vec::new()
            }
            GatewayError::NotFound => {
                self.prompts.show_error(err.to_string());
                vec![self.issue_refresh()]
            }
            GatewayError::PayloadTooLarge => {
                self.prompts.show_error(format!(
                    "Maximum upload size exceeded ({})",
                    self.upload_limit
                ));
                Vec::new()
            }
            GatewayError::Validation { .. }
            | GatewayError::Conflict { .. }
            | GatewayError::Network(_) => {
                self.prompts.show_error(err.to_string());
                Vec::new()
            }
        }
    }

    /// Like [`surface`](Self::surface) for a failed listing of the live
    /// path. Re-listing would only fail again, so nothing is issued.
    fn surface_listing(&mut self, err: &GatewayError) -> Vec<Request> {
        match err {
            GatewayError::NotFound => {
                warn!(path = %self.stack.current(), "live directory not found");
                self.prompts.show_error(err.to_string());
                Vec::new()
            }
            _ => self.surface(err),
        }
    }

    /// End the session: every waiter is answered with `SessionExpired` and
    /// nothing in flight will patch the listing any more.
    pub(crate) fn expire(&mut self) {
        if self.expired {
            return;
        }
        self.expired = true;
        warn!(
            pending = self.in_flight.len(),
            prompts = self.prompts.queued() + usize::from(self.prompts.is_showing()),
            "session expired"
        );
        self.ledger.clear();
        self.selection.clear();
        for (_, flight) in self.in_flight.drain() {
            respond(flight.into_reply(), Err(BrowserError::SessionExpired));
        }
        for (_, check) in self.checks.drain() {
            respond(check.reply, Err(BrowserError::SessionExpired));
        }
        for (_, waiter) in self.list_waiters.drain(..) {
            respond(waiter, Err(BrowserError::SessionExpired));
        }
        for resolved in self.prompts.drain() {
            if let Some(continuation) = resolved.continuation {
                respond(continuation.into_reply(), Err(BrowserError::SessionExpired));
            }
        }
    }

    // ---- views ----

    pub(crate) fn listing(&self) -> ListingView {
        let path = self.stack.current();
        let mut rows: Vec<Row> = self
            .snapshot
            .entries()
            .iter()
            .map(|entry| Row {
                entry: entry.clone(),
                selected: self.selection.contains(&entry.id),
                status: match self.ledger.status(path, &entry.name).pending_kind() {
                    Some(kind) => RowStatus::Processing(kind),
                    None => RowStatus::Idle,
                },
            })
            .collect();
        for pending in self.ledger.pending_in(path) {
            let creates = matches!(
                pending.kind,
                OperationKind::Upload | OperationKind::CreateDirectory
            );
            if creates && !self.snapshot.contains(&pending.name) {
                rows.push(Row::placeholder(
                    &pending.name,
                    pending.kind,
                    format!("{}:{}", pending.id, pending.name),
                ));
            }
        }
        ListingView {
            path: path.clone(),
            loaded: self.snapshot.is_loaded(),
            rows,
            selected_count: self.selection.len(),
        }
    }

    pub(crate) fn prompt(&self) -> Option<PromptView> {
        self.prompts.view()
    }
}

fn outcome(visible: bool) -> Outcome {
    if visible {
        Outcome::Applied
    } else {
        Outcome::Discarded
    }
}

fn to_error(err: GatewayError) -> BrowserError {
    match err {
        GatewayError::SessionExpired => BrowserError::SessionExpired,
        other => BrowserError::Gateway(other),
    }
}

fn file_names(files: &[UploadFile]) -> Vec<String> {
    files.iter().map(|file| file.name.clone()).collect()
}

/// Names before `rejected`. A rejected name outside the batch commits nothing.
fn committed_before(names: &[String], rejected: &str) -> Vec<String> {
    match names.iter().position(|name| name == rejected) {
        Some(idx) => names[..idx].to_vec(),
        None => Vec::new(),
    }
}
