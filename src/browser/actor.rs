//! Actor runtime for one browsing session.
//!
//! All state lives in a single task. Handles talk to it over a command
//! channel; gateway calls run as separate tasks whose results come back over
//! a second channel, so every patch to the listing is applied from the one
//! place that also knows which directory is displayed right now.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use super::coordinator::{Coordinator, Outcome, Reply, Request, Response};
use crate::api::{GatewayError, HttpGateway, MoveTarget, StorageGateway};
use crate::config::BrowserConfig;
use crate::error::{BrowserError, Result};
use crate::events::{EventBus, SessionEvent, Subscription};
use crate::fs::{Download, RemotePath, UploadFile};
use crate::view::{ListingView, PromptView};

enum BrowserCommand {
    Refresh {
        reply: Reply<RemotePath>,
    },
    Enter {
        name: String,
        reply: Reply<RemotePath>,
    },
    GoUp {
        reply: Reply<RemotePath>,
    },
    Toggle {
        name: String,
        reply: Reply<bool>,
    },
    SelectAll {
        reply: Reply<usize>,
    },
    ClearSelection {
        reply: Reply<()>,
    },
    Upload {
        files: Vec<UploadFile>,
        reply: Reply<Outcome>,
    },
    Move {
        names: Vec<String>,
        target: MoveTarget,
        reply: Reply<Outcome>,
    },
    MoveDragged {
        name: String,
        target: MoveTarget,
        reply: Reply<Outcome>,
    },
    CreateDirectory {
        name: Option<String>,
        reply: Reply<Outcome>,
    },
    Rename {
        name: String,
        new_name: Option<String>,
        reply: Reply<Outcome>,
    },
    Delete {
        name: String,
        reply: Reply<Outcome>,
    },
    DeleteSelected {
        reply: Reply<Outcome>,
    },
    DownloadTarget {
        name: String,
        reply: Reply<RemotePath>,
    },
    SelectedTargets {
        reply: Reply<(RemotePath, Vec<String>)>,
    },
    Confirm {
        input: Option<String>,
        reply: Reply<()>,
    },
    Cancel {
        reply: Reply<()>,
    },
    Listing {
        reply: Reply<ListingView>,
    },
    Prompt {
        reply: Reply<Option<PromptView>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a browsing session.
#[derive(Clone)]
pub struct BrowserHandle {
    tx: mpsc::Sender<BrowserCommand>,
    gateway: Arc<dyn StorageGateway>,
    events: EventBus,
    listing: watch::Receiver<ListingView>,
    prompt: watch::Receiver<Option<PromptView>>,
}

/// Owner of the session state.
pub struct BrowserActor {
    coordinator: Coordinator,
    gateway: Arc<dyn StorageGateway>,
    rx: mpsc::Receiver<BrowserCommand>,
    settled_tx: mpsc::Sender<Response>,
    settled_rx: mpsc::Receiver<Response>,
    events: EventBus,
    subscription: Subscription,
    listing: watch::Sender<ListingView>,
    prompt: watch::Sender<Option<PromptView>>,
}

impl BrowserHandle {
    /// Browse the REST service described by `config`.
    pub async fn connect(config: &BrowserConfig) -> Result<Self> {
        let gateway = HttpGateway::new(config)?;
        Self::open(Arc::new(gateway), config, EventBus::new()).await
    }

    /// Start a session on `gateway` and wait for the root listing.
    pub async fn open(
        gateway: Arc<dyn StorageGateway>,
        config: &BrowserConfig,
        events: EventBus,
    ) -> Result<Self> {
        let handle = BrowserActor::spawn(gateway, config, events);
        if let Err(err) = handle.refresh().await {
            handle.shutdown().await;
            return Err(err);
        }
        Ok(handle)
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(Reply<R>) -> BrowserCommand,
    ) -> Result<R> {
        let (tx, rx) = oneshot::channel();
        let cmd = build(tx);
        self.tx
            .send(cmd)
            .await
            .map_err(|_| BrowserError::ActorStopped)?;
        rx.await.map_err(|_| BrowserError::ActorStopped)?
    }

    /// Re-list the displayed directory. Returns the displayed path.
    pub async fn refresh(&self) -> Result<RemotePath> {
        self.request(|reply| BrowserCommand::Refresh { reply })
            .await
    }

    pub async fn enter(&self, name: &str) -> Result<RemotePath> {
        self.request(|reply| BrowserCommand::Enter {
            name: name.to_string(),
            reply,
        })
        .await
    }

    pub async fn go_up(&self) -> Result<RemotePath> {
        self.request(|reply| BrowserCommand::GoUp { reply }).await
    }

    /// Flip the selection of `name`. Returns whether it is now selected.
    pub async fn toggle(&self, name: &str) -> Result<bool> {
        self.request(|reply| BrowserCommand::Toggle {
            name: name.to_string(),
            reply,
        })
        .await
    }

    pub async fn select_all(&self) -> Result<usize> {
        self.request(|reply| BrowserCommand::SelectAll { reply })
            .await
    }

    pub async fn clear_selection(&self) -> Result<()> {
        self.request(|reply| BrowserCommand::ClearSelection { reply })
            .await
    }

    /// Upload into the displayed directory.
    ///
    /// Resolves once the upload settles, or when an overwrite prompt for it
    /// is cancelled.
    pub async fn upload(&self, files: Vec<UploadFile>) -> Result<Outcome> {
        self.request(|reply| BrowserCommand::Upload { files, reply })
            .await
    }

    pub async fn move_entries(&self, names: &[&str], target: MoveTarget) -> Result<Outcome> {
        self.request(|reply| BrowserCommand::Move {
            names: names.iter().map(|name| name.to_string()).collect(),
            target,
            reply,
        })
        .await
    }

    /// Drop `name` on `target`, carrying the selection when `name` is in it.
    pub async fn move_dragged(&self, name: &str, target: MoveTarget) -> Result<Outcome> {
        self.request(|reply| BrowserCommand::MoveDragged {
            name: name.to_string(),
            target,
            reply,
        })
        .await
    }

    /// Prompt for a directory name, then create it.
    pub async fn create_directory(&self) -> Result<Outcome> {
        self.request(|reply| BrowserCommand::CreateDirectory { name: None, reply })
            .await
    }

    pub async fn create_directory_named(&self, name: &str) -> Result<Outcome> {
        self.request(|reply| BrowserCommand::CreateDirectory {
            name: Some(name.to_string()),
            reply,
        })
        .await
    }

    /// Prompt for a new name of `name`, then rename it.
    pub async fn rename(&self, name: &str) -> Result<Outcome> {
        self.request(|reply| BrowserCommand::Rename {
            name: name.to_string(),
            new_name: None,
            reply,
        })
        .await
    }

    pub async fn rename_to(&self, name: &str, new_name: &str) -> Result<Outcome> {
        self.request(|reply| BrowserCommand::Rename {
            name: name.to_string(),
            new_name: Some(new_name.to_string()),
            reply,
        })
        .await
    }

    /// Ask for confirmation, then delete `name`.
    pub async fn delete(&self, name: &str) -> Result<Outcome> {
        self.request(|reply| BrowserCommand::Delete {
            name: name.to_string(),
            reply,
        })
        .await
    }

    pub async fn delete_selected(&self) -> Result<Outcome> {
        self.request(|reply| BrowserCommand::DeleteSelected { reply })
            .await
    }

    pub async fn download(&self, name: &str) -> Result<Download> {
        let path = self
            .request(|reply| BrowserCommand::DownloadTarget {
                name: name.to_string(),
                reply,
            })
            .await?;
        self.fetch(&path, name).await
    }

    /// Download every selected entry concurrently.
    pub async fn download_selected(&self) -> Result<Vec<Download>> {
        let (path, names) = self
            .request(|reply| BrowserCommand::SelectedTargets { reply })
            .await?;
        let downloads = join_all(names.iter().map(|name| self.fetch(&path, name))).await;
        downloads.into_iter().collect()
    }

    async fn fetch(&self, path: &RemotePath, name: &str) -> Result<Download> {
        match self.gateway.download(path, name).await {
            Ok(download) => Ok(download),
            Err(GatewayError::SessionExpired) => {
                self.events.publish(SessionEvent::Logout);
                Err(BrowserError::SessionExpired)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Confirm the visible prompt, with the typed value for input prompts.
    pub async fn confirm(&self, input: Option<&str>) -> Result<()> {
        self.request(|reply| BrowserCommand::Confirm {
            input: input.map(str::to_string),
            reply,
        })
        .await
    }

    pub async fn cancel(&self) -> Result<()> {
        self.request(|reply| BrowserCommand::Cancel { reply }).await
    }

    /// Current listing, including every command sent before this one.
    pub async fn listing(&self) -> Result<ListingView> {
        self.request(|reply| BrowserCommand::Listing { reply })
            .await
    }

    pub async fn prompt(&self) -> Result<Option<PromptView>> {
        self.request(|reply| BrowserCommand::Prompt { reply }).await
    }

    /// Listing updates as they happen.
    pub fn watch_listing(&self) -> watch::Receiver<ListingView> {
        self.listing.clone()
    }

    /// Prompt updates as they happen.
    pub fn watch_prompt(&self) -> watch::Receiver<Option<PromptView>> {
        self.prompt.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        let _ = self.tx.send(BrowserCommand::Shutdown { reply: tx }).await;
        let _ = rx.await;
    }
}

impl BrowserActor {
    /// Start the actor task. Nothing is listed until the first refresh.
    pub fn spawn(
        gateway: Arc<dyn StorageGateway>,
        config: &BrowserConfig,
        events: EventBus,
    ) -> BrowserHandle {
        let buffer = config.command_buffer.max(1);
        let (tx, rx) = mpsc::channel(buffer);
        let (settled_tx, settled_rx) = mpsc::channel(buffer);
        let (listing_tx, listing_rx) = watch::channel(ListingView::default());
        let (prompt_tx, prompt_rx) = watch::channel(None);
        let actor = BrowserActor {
            coordinator: Coordinator::new(config.upload_limit_label()),
            gateway: Arc::clone(&gateway),
            rx,
            settled_tx,
            settled_rx,
            subscription: events.subscribe(),
            events: events.clone(),
            listing: listing_tx,
            prompt: prompt_tx,
        };
        tokio::spawn(actor.run());
        BrowserHandle {
            tx,
            gateway,
            events,
            listing: listing_rx,
            prompt: prompt_rx,
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    if self.handle_command(cmd) {
                        break;
                    }
                }
                Some(response) = self.settled_rx.recv() => {
                    let requests = self.coordinator.settle(response);
                    self.dispatch(requests);
                }
                event = self.subscription.recv() => {
                    if let Some(SessionEvent::Logout) = event {
                        info!("logout received, ending browsing session");
                        self.coordinator.expire();
                    }
                }
            }
            if self.coordinator.take_logout_notice() {
                self.events.publish(SessionEvent::Logout);
            }
            self.publish();
        }
        debug!(
            path = %self.coordinator.path(),
            expired = self.coordinator.is_expired(),
            "browser actor stopped"
        );
    }

    fn handle_command(&mut self, cmd: BrowserCommand) -> bool {
        let requests = match cmd {
            BrowserCommand::Refresh { reply } => self.coordinator.refresh(reply),
            BrowserCommand::Enter { name, reply } => self.coordinator.enter(&name, reply),
            BrowserCommand::GoUp { reply } => self.coordinator.go_up(reply),
            BrowserCommand::Toggle { name, reply } => {
                let _ = reply.send(self.coordinator.toggle(&name));
                Vec::new()
            }
            BrowserCommand::SelectAll { reply } => {
                let _ = reply.send(self.coordinator.select_all());
                Vec::new()
            }
            BrowserCommand::ClearSelection { reply } => {
                self.coordinator.clear_selection();
                let _ = reply.send(Ok(()));
                Vec::new()
            }
            BrowserCommand::Upload { files, reply } => self.coordinator.upload(files, reply),
            BrowserCommand::Move {
                names,
                target,
                reply,
            } => self.coordinator.move_entries(names, target, reply),
            BrowserCommand::MoveDragged {
                name,
                target,
                reply,
            } => self.coordinator.move_dragged(&name, target, reply),
            BrowserCommand::CreateDirectory { name, reply } => match name {
                Some(name) => self.coordinator.create_directory_named(name, reply),
                None => self.coordinator.create_directory(reply),
            },
            BrowserCommand::Rename {
                name,
                new_name,
                reply,
            } => match new_name {
                Some(new_name) => self.coordinator.rename_to(name, new_name, reply),
                None => self.coordinator.rename(name, reply),
            },
            BrowserCommand::Delete { name, reply } => self.coordinator.delete(name, reply),
            BrowserCommand::DeleteSelected { reply } => self.coordinator.delete_selected(reply),
            BrowserCommand::DownloadTarget { name, reply } => {
                let _ = reply.send(self.coordinator.download_target(&name));
                Vec::new()
            }
            BrowserCommand::SelectedTargets { reply } => {
                let _ = reply.send(self.coordinator.selected_targets());
                Vec::new()
            }
            BrowserCommand::Confirm { input, reply } => match self.coordinator.confirm(input) {
                Ok(requests) => {
                    let _ = reply.send(Ok(()));
                    requests
                }
                Err(err) => {
                    let _ = reply.send(Err(err));
                    Vec::new()
                }
            },
            BrowserCommand::Cancel { reply } => {
                let _ = reply.send(self.coordinator.cancel());
                Vec::new()
            }
            BrowserCommand::Listing { reply } => {
                let _ = reply.send(Ok(self.coordinator.listing()));
                Vec::new()
            }
            BrowserCommand::Prompt { reply } => {
                let _ = reply.send(Ok(self.coordinator.prompt()));
                Vec::new()
            }
            BrowserCommand::Shutdown { reply } => {
                let _ = reply.send(());
                return true;
            }
        };
        self.dispatch(requests);
        false
    }

    /// Run each gateway call on its own task.
    fn dispatch(&self, requests: Vec<Request>) {
        for request in requests {
            let gateway = Arc::clone(&self.gateway);
            let settled = self.settled_tx.clone();
            tokio::spawn(async move {
                let response = request.execute(gateway.as_ref()).await;
                let _ = settled.send(response).await;
            });
        }
    }

    fn publish(&self) {
        let listing = self.coordinator.listing();
        self.listing.send_if_modified(|current| {
            if *current == listing {
                return false;
            }
            *current = listing;
            true
        });
        let prompt = self.coordinator.prompt();
        self.prompt.send_if_modified(|current| {
            if *current == prompt {
                return false;
            }
            *current = prompt;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{GatewayCall, MemoryGateway};
    use crate::browser::BUSY_MESSAGE;
    use std::time::Duration;
    use tokio::time::timeout;

    fn root() -> RemotePath {
        RemotePath::root()
    }

    async fn open(gateway: &Arc<MemoryGateway>) -> BrowserHandle {
        open_with(gateway, EventBus::new()).await
    }

    async fn open_with(gateway: &Arc<MemoryGateway>, events: EventBus) -> BrowserHandle {
        BrowserHandle::open(gateway.clone(), &BrowserConfig::default(), events)
            .await
            .unwrap()
    }

    async fn wait_listing(handle: &BrowserHandle, check: impl FnMut(&ListingView) -> bool) {
        let mut rx = handle.watch_listing();
        timeout(Duration::from_secs(5), rx.wait_for(check))
            .await
            .expect("listing wait timed out")
            .expect("actor stopped");
    }

    async fn wait_prompt(handle: &BrowserHandle) -> PromptView {
        let mut rx = handle.watch_prompt();
        let prompt = timeout(Duration::from_secs(5), rx.wait_for(Option::is_some))
            .await
            .expect("prompt wait timed out")
            .expect("actor stopped");
        let view: Option<PromptView> = (*prompt).clone();
        view.unwrap()
    }

    fn assert_invariants(view: &ListingView) {
        let mut names = view.names();
        let listed = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), listed, "duplicate names in {:?}", view.names());
        assert_eq!(view.selected_count, view.selected().len());
    }

    #[tokio::test]
    async fn test_navigation_lists_once_per_step() {
        let gw = Arc::new(MemoryGateway::new());
        gw.add_directory(&RemotePath::new(["sub"]));
        let handle = open(&gw).await;
        assert_eq!(gw.calls(GatewayCall::List), 1);

        assert_eq!(handle.enter("sub").await.unwrap(), RemotePath::new(["sub"]));
        assert_eq!(handle.go_up().await.unwrap(), root());
        assert_eq!(gw.calls(GatewayCall::List), 3);

        // Going up from the root is a no-op.
        assert_eq!(handle.go_up().await.unwrap(), root());
        assert_eq!(gw.calls(GatewayCall::List), 3);
        assert_eq!(handle.listing().await.unwrap().names(), vec!["sub"]);
    }

    #[tokio::test]
    async fn test_stale_rename_is_discarded() {
        let gw = Arc::new(MemoryGateway::new());
        gw.add_file(&root(), "a.txt", b"a");
        gw.add_file(&RemotePath::new(["q"]), "inside", b"i");
        let handle = open(&gw).await;

        gw.hold_mutations();
        let h = handle.clone();
        let rename = tokio::spawn(async move { h.rename_to("a.txt", "b.txt").await });
        wait_listing(&handle, |view| view.processing().contains(&"a.txt")).await;

        handle.enter("q").await.unwrap();
        gw.release_mutations();
        assert_eq!(rename.await.unwrap(), Ok(Outcome::Discarded));
        assert_eq!(handle.listing().await.unwrap().names(), vec!["inside"]);

        handle.go_up().await.unwrap();
        let view = handle.listing().await.unwrap();
        assert!(view.row("b.txt").is_some());
        assert!(view.row("a.txt").is_none());
        assert_invariants(&view);
    }

    #[tokio::test]
    async fn test_partial_upload_keeps_prefix_only() {
        let gw = Arc::new(MemoryGateway::new());
        gw.reject_name("b.txt");
        let handle = open(&gw).await;

        let err = handle
            .upload(vec![
                UploadFile::new("a.txt", "a"),
                UploadFile::new("b.txt", "b"),
                UploadFile::new("c.txt", "c"),
            ])
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            BrowserError::PartialBatch { committed, .. } if committed == &vec!["a.txt".to_string()]
        ));

        let view = handle.listing().await.unwrap();
        assert_eq!(view.names(), vec!["a.txt"]);
        assert!(view.processing().is_empty());
        assert_eq!(gw.names(&root()), vec!["a.txt"]);
        let prompt = handle.prompt().await.unwrap().unwrap();
        assert_eq!(prompt.title, "Error");
        assert!(prompt.message.unwrap().contains("b.txt"));
    }

    #[tokio::test]
    async fn test_overwrite_gates_upload() {
        let gw = Arc::new(MemoryGateway::new());
        gw.add_file(&root(), "x.txt", b"old");
        let handle = open(&gw).await;

        let h = handle.clone();
        let upload = tokio::spawn(async move { h.upload(vec![UploadFile::new("x.txt", "new")]).await });
        let prompt = wait_prompt(&handle).await;
        assert_eq!(prompt.title, "Overwrite");
        assert_eq!(prompt.names(), vec!["x.txt"]);
        assert_eq!(gw.calls(GatewayCall::UploadBatch), 0);

        handle.cancel().await.unwrap();
        assert_eq!(upload.await.unwrap(), Ok(Outcome::Cancelled));
        assert_eq!(gw.calls(GatewayCall::UploadBatch), 0);
        assert!(handle.listing().await.unwrap().processing().is_empty());

        let h = handle.clone();
        let upload = tokio::spawn(async move { h.upload(vec![UploadFile::new("x.txt", "new")]).await });
        wait_prompt(&handle).await;
        handle.confirm(None).await.unwrap();
        assert_eq!(upload.await.unwrap(), Ok(Outcome::Applied));
        assert_eq!(gw.calls(GatewayCall::UploadBatch), 1);
        assert_eq!(handle.download("x.txt").await.unwrap().data, b"new".to_vec());
    }

    #[tokio::test]
    async fn test_move_across_visible_boundary() {
        let gw = Arc::new(MemoryGateway::new());
        gw.add_file(&root(), "f1", b"1");
        gw.add_file(&root(), "f2", b"2");
        gw.add_directory(&RemotePath::new(["sub"]));
        let handle = open(&gw).await;

        let outcome = handle
            .move_entries(&["f1", "f2"], MoveTarget::Child("sub".into()))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Applied);
        assert_eq!(handle.listing().await.unwrap().names(), vec!["sub"]);

        handle.enter("sub").await.unwrap();
        assert_eq!(handle.listing().await.unwrap().names(), vec!["f1", "f2"]);

        handle.go_up().await.unwrap();
        let view = handle.listing().await.unwrap();
        assert!(view.row("f1").is_none());
        assert!(view.row("f2").is_none());
    }

    #[tokio::test]
    async fn test_move_up_lands_in_visible_parent() {
        let gw = Arc::new(MemoryGateway::new());
        gw.add_file(&RemotePath::new(["sub"]), "deep", b"d");
        let handle = open(&gw).await;
        handle.enter("sub").await.unwrap();

        gw.hold_mutations();
        let h = handle.clone();
        let moving = tokio::spawn(async move { h.move_entries(&["deep"], MoveTarget::Parent).await });
        wait_listing(&handle, |view| view.processing().contains(&"deep")).await;
        handle.go_up().await.unwrap();
        gw.release_mutations();

        assert_eq!(moving.await.unwrap(), Ok(Outcome::Applied));
        let view = handle.listing().await.unwrap();
        assert!(view.row("deep").is_some());
        assert_invariants(&view);
    }

    #[tokio::test]
    async fn test_rename_blocks_delete_of_same_name() {
        let gw = Arc::new(MemoryGateway::new());
        gw.add_file(&root(), "a.txt", b"a");
        let handle = open(&gw).await;

        gw.hold_mutations();
        let h = handle.clone();
        let rename = tokio::spawn(async move { h.rename_to("a.txt", "b.txt").await });
        wait_listing(&handle, |view| view.processing().contains(&"a.txt")).await;

        assert_eq!(
            handle.delete("a.txt").await,
            Err(BrowserError::Busy {
                names: vec!["a.txt".to_string()]
            })
        );
        let prompt = handle.prompt().await.unwrap().unwrap();
        assert_eq!(prompt.message.as_deref(), Some(BUSY_MESSAGE));
        assert!(matches!(
            handle.toggle("a.txt").await,
            Err(BrowserError::Busy { .. })
        ));

        gw.release_mutations();
        assert_eq!(rename.await.unwrap(), Ok(Outcome::Applied));
        assert_eq!(gw.calls(GatewayCall::DeleteOne), 0);
        assert_eq!(handle.listing().await.unwrap().names(), vec!["b.txt"]);
    }

    #[tokio::test]
    async fn test_gateway_expiry_logs_out() {
        let gw = Arc::new(MemoryGateway::new());
        let events = EventBus::new();
        let mut logout = events.subscribe();
        let handle = open_with(&gw, events).await;

        gw.hold_mutations();
        let h = handle.clone();
        let upload = tokio::spawn(async move { h.upload(vec![UploadFile::new("n.txt", "n")]).await });
        wait_listing(&handle, |view| view.processing().contains(&"n.txt")).await;

        gw.expire_session();
        gw.release_mutations();
        assert_eq!(upload.await.unwrap(), Err(BrowserError::SessionExpired));
        assert_eq!(logout.recv().await, Some(SessionEvent::Logout));

        assert_eq!(handle.refresh().await, Err(BrowserError::SessionExpired));
        let view = handle.listing().await.unwrap();
        assert!(view.processing().is_empty());
        assert!(view.row("n.txt").is_none());
    }

    #[tokio::test]
    async fn test_external_logout_settles_open_prompt() {
        let gw = Arc::new(MemoryGateway::new());
        gw.add_file(&root(), "x", b"x");
        let events = EventBus::new();
        let handle = open_with(&gw, events.clone()).await;

        let h = handle.clone();
        let delete = tokio::spawn(async move { h.delete("x").await });
        assert_eq!(wait_prompt(&handle).await.title, "Delete file");

        events.publish(SessionEvent::Logout);
        assert_eq!(delete.await.unwrap(), Err(BrowserError::SessionExpired));
        assert_eq!(handle.prompt().await.unwrap(), None);
        assert_eq!(gw.calls(GatewayCall::DeleteOne), 0);
        assert_eq!(handle.enter("x").await, Err(BrowserError::SessionExpired));
    }

    #[tokio::test]
    async fn test_prompted_create_and_rename() {
        let gw = Arc::new(MemoryGateway::new());
        gw.add_file(&root(), "a.txt", b"a");
        let handle = open(&gw).await;

        let h = handle.clone();
        let create = tokio::spawn(async move { h.create_directory().await });
        assert_eq!(wait_prompt(&handle).await.title, "Create directory");
        handle.confirm(Some("photos")).await.unwrap();
        assert_eq!(create.await.unwrap(), Ok(Outcome::Applied));
        assert_eq!(handle.listing().await.unwrap().names(), vec!["photos", "a.txt"]);

        let h = handle.clone();
        let rename = tokio::spawn(async move { h.rename("a.txt").await });
        let prompt = wait_prompt(&handle).await;
        assert_eq!(prompt.default_value(), Some("a.txt"));
        handle.confirm(Some("z.txt")).await.unwrap();
        assert_eq!(rename.await.unwrap(), Ok(Outcome::Applied));
        assert_eq!(handle.listing().await.unwrap().names(), vec!["photos", "z.txt"]);
        assert_eq!(handle.confirm(None).await, Err(BrowserError::NoPrompt));
    }

    #[tokio::test]
    async fn test_conflicting_create_shows_error() {
        let gw = Arc::new(MemoryGateway::new());
        gw.add_directory(&RemotePath::new(["docs"]));
        let handle = open(&gw).await;

        let err = handle.create_directory_named("docs").await.unwrap_err();
        assert_eq!(
            err,
            BrowserError::Gateway(GatewayError::Conflict {
                name: "docs".into()
            })
        );
        let prompt = handle.prompt().await.unwrap().unwrap();
        assert_eq!(prompt.message.as_deref(), Some("File with name 'docs' already exists"));
        handle.cancel().await.unwrap();
        assert_eq!(handle.listing().await.unwrap().names(), vec!["docs"]);
    }

    #[tokio::test]
    async fn test_selection_and_delete_selected() {
        let gw = Arc::new(MemoryGateway::new());
        for name in ["a", "b", "c"] {
            gw.add_file(&root(), name, name.as_bytes());
        }
        let handle = open(&gw).await;

        assert_eq!(handle.select_all().await.unwrap(), 3);
        assert!(!handle.toggle("c").await.unwrap());
        assert_invariants(&handle.listing().await.unwrap());

        let h = handle.clone();
        let delete = tokio::spawn(async move { h.delete_selected().await });
        let prompt = wait_prompt(&handle).await;
        assert_eq!(prompt.title, "Delete selected files");
        assert_eq!(prompt.names(), vec!["a", "b"]);
        handle.confirm(None).await.unwrap();
        assert_eq!(delete.await.unwrap(), Ok(Outcome::Applied));

        let view = handle.listing().await.unwrap();
        assert_eq!(view.names(), vec!["c"]);
        assert_eq!(view.selected_count, 0);
        assert_eq!(gw.names(&root()), vec!["c"]);
        assert_eq!(gw.calls(GatewayCall::DeleteMany), 1);
    }

    #[tokio::test]
    async fn test_downloads() {
        let gw = Arc::new(MemoryGateway::new());
        gw.add_file(&root(), "a.txt", b"alpha");
        gw.add_file(&root(), "b.txt", b"beta");
        gw.add_directory(&RemotePath::new(["dir"]));
        let handle = open(&gw).await;

        assert_eq!(handle.download("dir").await.unwrap().filename, "dir.zip");
        assert!(handle.download_selected().await.unwrap().is_empty());

        handle.toggle("b.txt").await.unwrap();
        handle.toggle("a.txt").await.unwrap();
        let downloads = handle.download_selected().await.unwrap();
        let names: Vec<&str> = downloads.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(downloads[1].data, b"beta".to_vec());
        assert_eq!(gw.calls(GatewayCall::Download), 3);
    }

    #[tokio::test]
    async fn test_vanished_directory_recovers() {
        let gw = Arc::new(MemoryGateway::new());
        gw.add_directory(&RemotePath::new(["tmp"]));
        let handle = open(&gw).await;
        handle.enter("tmp").await.unwrap();

        // Removed behind our back.
        let bus = EventBus::new();
        let other = BrowserHandle::open(gw.clone(), &BrowserConfig::default(), bus)
            .await
            .unwrap();
        let h = other.clone();
        let delete = tokio::spawn(async move { h.delete("tmp").await });
        wait_prompt(&other).await;
        other.confirm(None).await.unwrap();
        delete.await.unwrap().unwrap();

        assert_eq!(handle.refresh().await.unwrap(), root());
        assert_eq!(handle.listing().await.unwrap().path, root());
    }

    #[tokio::test]
    async fn test_shutdown_stops_actor() {
        let gw = Arc::new(MemoryGateway::new());
        let handle = open(&gw).await;
        handle.shutdown().await;
        assert_eq!(handle.refresh().await, Err(BrowserError::ActorStopped));
    }
}
