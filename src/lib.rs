//! # cloudnav
//!
//! Client-side browsing of a remote file storage service.
//!
//! ## Features
//!
//! - **Navigation**: enter directories, go up, refresh. A directory that
//!   vanished while displayed falls back to its parent.
//! - **File Operations**:
//!   - Batch uploads with overwrite confirmation and partial-batch recovery.
//!   - Move into a subdirectory or up one level, with a destination pre-check.
//!   - Rename, delete (single or selection) and create directories.
//!   - Downloads of single entries or the whole selection; directories come
//!     back as zip archives.
//! - **Concurrency**: any number of operations may be in flight while the
//!   user keeps browsing. Each one is settled against the directory that is
//!   displayed when it finishes, never the one it was started from.
//! - **Session end**: a rejected credential on any call publishes a logout on
//!   the [`EventBus`] and settles everything still waiting.
//!
//! Every session runs as an actor; [`BrowserHandle`] is the cloneable
//! front end. Rendering code can either poll [`BrowserHandle::listing`] or
//! follow [`BrowserHandle::watch_listing`] and [`BrowserHandle::watch_prompt`].
//!
//! ## Example: Basic Usage
//!
//! ```no_run
//! use cloudnav::{BrowserConfig, BrowserHandle, MoveTarget, UploadFile};
//!
//! # async fn example() -> cloudnav::Result<()> {
//! let config = BrowserConfig::from_env()?;
//! let browser = BrowserHandle::connect(&config).await?;
//!
//! for row in browser.listing().await?.rows {
//!     println!("{} ({})", row.name(), row.entry.display_size());
//! }
//!
//! browser.create_directory_named("reports").await?;
//! browser
//!     .upload(vec![UploadFile::new("q3.csv", "region,total\n")])
//!     .await?;
//! browser
//!     .move_entries(&["q3.csv"], MoveTarget::Child("reports".into()))
//!     .await?;
//!
//! browser.enter("reports").await?;
//! let download = browser.download("q3.csv").await?;
//! println!("{} bytes", download.data.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: Prompts
//!
//! Deletes, overwrites and name entry go through a prompt. The call that
//! opened it resolves once the prompt is answered:
//!
//! ```no_run
//! use cloudnav::{BrowserHandle, Outcome};
//!
//! # async fn example(browser: BrowserHandle) -> cloudnav::Result<()> {
//! let pending = {
//!     let browser = browser.clone();
//!     tokio::spawn(async move { browser.delete("old.log").await })
//! };
//!
//! let mut prompts = browser.watch_prompt();
//! prompts.wait_for(Option::is_some).await.ok();
//! browser.confirm(None).await?;
//!
//! assert!(matches!(pending.await, Ok(Ok(Outcome::Applied))));
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod browser;
pub mod config;
pub mod error;
pub mod events;
pub mod fs;
pub mod http;
pub mod view;

// Re-export commonly used types
pub use api::{GatewayError, HttpGateway, MemoryGateway, MoveTarget, StorageGateway};
pub use browser::{BrowserActor, BrowserHandle, Outcome, PromptKind};
pub use config::BrowserConfig;
pub use error::{BrowserError, Result};
pub use events::{EventBus, SessionEvent, Subscription};
pub use fs::{Download, Entry, EntryKind, RemotePath, UploadFile};
pub use view::{ListingView, PromptView, Row, RowStatus};
