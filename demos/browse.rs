//! Example: Scripted browsing session
//!
//! Runs against an in-memory store by default. Set `CLOUDNAV_BASE_URL` (and
//! `CLOUDNAV_TOKEN`) to browse a live service instead.
//!
//! Usage:
//!   cargo run --example browse -- [--path /docs]

use std::env;
use std::sync::Arc;

use cloudnav::{
    BrowserConfig, BrowserError, BrowserHandle, EventBus, HttpGateway, ListingView,
    MemoryGateway, MoveTarget, Outcome, PromptKind, RemotePath, SessionEvent, StorageGateway,
    UploadFile,
};
use tokio::task::JoinHandle;
use tracing_subscriber::{fmt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cloudnav=debug"));
    fmt().with_env_filter(filter).with_target(false).init();
}

fn print_listing(view: &ListingView) {
    println!("\n📁 {}", view.path);
    if view.rows.is_empty() {
        println!("  (empty)");
    }
    for row in &view.rows {
        let icon = if row.entry.is_directory() { "📁" } else { "📄" };
        let mark = if row.selected { "*" } else { " " };
        let status = if row.is_disabled() { " (processing)" } else { "" };
        println!(
            " {} {} {} {}{}",
            mark,
            icon,
            row.name(),
            row.entry.display_size(),
            status
        );
    }
}

/// Wait for `action`, answering yes to any overwrite prompt it opens.
async fn overwrite_through(
    browser: &BrowserHandle,
    mut action: JoinHandle<cloudnav::Result<Outcome>>,
) -> cloudnav::Result<Outcome> {
    let mut prompts = browser.watch_prompt();
    loop {
        tokio::select! {
            joined = &mut action => {
                return joined.unwrap_or(Err(BrowserError::ActorStopped));
            }
            changed = prompts.changed() => {
                if changed.is_err() {
                    return action.await.unwrap_or(Err(BrowserError::ActorStopped));
                }
                let overwrite = prompts
                    .borrow_and_update()
                    .as_ref()
                    .is_some_and(|prompt| matches!(prompt.kind, PromptKind::Overwrite { .. }));
                if overwrite {
                    println!("overwriting existing files");
                    let _ = browser.confirm(None).await;
                }
            }
        }
    }
}

fn sample_store() -> MemoryGateway {
    let store = MemoryGateway::new();
    store.add_directory(&RemotePath::parse("/docs/archive"));
    store.add_file(&RemotePath::parse("/docs"), "notes.txt", b"remember the milk\n");
    store.add_file(&RemotePath::root(), "report.csv", b"region,total\nnorth,12\n");
    store
}

#[tokio::main]
async fn main() {
    init_tracing();

    let mut path = None;
    let args: Vec<String> = env::args().skip(1).collect();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--path" => {
                path = args.get(i + 1).cloned();
                i += 2;
            }
            _ => {
                eprintln!("Usage: cargo run --example browse -- [--path /docs]");
                std::process::exit(1);
            }
        }
    }

    let events = EventBus::new();
    let mut logout = events.subscribe();
    tokio::spawn(async move {
        if let Some(SessionEvent::Logout) = logout.recv().await {
            eprintln!("❌ Session expired, please log in again");
        }
    });

    let live = env::var("CLOUDNAV_BASE_URL").is_ok();
    let config = match BrowserConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };
    let gateway: Arc<dyn StorageGateway> = if live {
        match HttpGateway::new(&config) {
            Ok(gateway) => Arc::new(gateway),
            Err(e) => {
                eprintln!("❌ {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Arc::new(sample_store())
    };
    let browser = BrowserHandle::open(gateway, &config, events.clone()).await;
    let browser = match browser {
        Ok(browser) => browser,
        Err(e) => {
            eprintln!("❌ Failed to open: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(path) = path {
        for segment in RemotePath::parse(&path).segments() {
            if let Err(e) = browser.enter(segment).await {
                eprintln!("❌ Cannot enter {}: {}", segment, e);
                std::process::exit(1);
            }
        }
    }
    match browser.listing().await {
        Ok(view) => print_listing(&view),
        Err(e) => eprintln!("❌ Failed to list: {}", e),
    }

    // A short scripted session; failures are reported and the script goes on.
    match browser.create_directory_named("scratch").await {
        Ok(outcome) => println!("\nmkdir scratch: {:?}", outcome),
        Err(e) => eprintln!("❌ mkdir: {}", e),
    }
    let files = vec![
        UploadFile::new("hello.txt", "hello\n"),
        UploadFile::new("world.txt", "world\n"),
    ];
    let upload = {
        let browser = browser.clone();
        tokio::spawn(async move { browser.upload(files).await })
    };
    match overwrite_through(&browser, upload).await {
        Ok(outcome) => println!("upload: {:?}", outcome),
        Err(e) => eprintln!("❌ upload: {}", e),
    }
    let moving = {
        let browser = browser.clone();
        tokio::spawn(async move {
            browser
                .move_entries(&["world.txt"], MoveTarget::Child("scratch".into()))
                .await
        })
    };
    match overwrite_through(&browser, moving).await {
        Ok(Outcome::Applied) => println!("moved world.txt into scratch"),
        Ok(outcome) => println!("move: {:?}", outcome),
        Err(e) => eprintln!("❌ move: {}", e),
    }
    if let Ok(Some(prompt)) = browser.prompt().await {
        println!("prompt: {} {}", prompt.title, prompt.message.unwrap_or_default());
        let _ = browser.cancel().await;
    }

    match browser.listing().await {
        Ok(view) => print_listing(&view),
        Err(e) => eprintln!("❌ Failed to list: {}", e),
    }
    match browser.download("hello.txt").await {
        Ok(download) => println!(
            "\n⬇ {} ({} bytes)",
            download.filename,
            download.data.len()
        ),
        Err(e) => eprintln!("❌ download: {}", e),
    }

    browser.shutdown().await;
}
