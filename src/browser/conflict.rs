//! Confirmation workflow.
//!
//! A single visible prompt with a FIFO queue behind it. Each prompt may carry
//! a continuation owned by the caller of [`ConflictResolver::request`]; every
//! way out of the resolver (confirm, cancel, drain) hands the continuation
//! back so the owner can settle whoever is waiting on it.

use std::collections::VecDeque;
use std::fmt;

use crate::view::PromptView;

/// What the typed value of an input prompt is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    CreateDirectory,
    Rename,
}

/// Prompt variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
    /// Informational, nothing runs on dismissal
    Error { message: String },
    /// Names that already exist at the destination
    Overwrite { names: Vec<String> },
    Delete { name: String },
    DeleteSelected { names: Vec<String> },
    /// Text entry (new directory name, new filename)
    Input {
        action: InputAction,
        default_value: String,
    },
}

impl PromptKind {
    pub fn title(&self) -> &'static str {
        match self {
            PromptKind::Error { .. } => "Error",
            PromptKind::Overwrite { .. } => "Overwrite",
            PromptKind::Delete { .. } => "Delete file",
            PromptKind::DeleteSelected { .. } => "Delete selected files",
            PromptKind::Input {
                action: InputAction::CreateDirectory,
                ..
            } => "Create directory",
            PromptKind::Input {
                action: InputAction::Rename,
                ..
            } => "Rename",
        }
    }

    pub fn message(&self) -> Option<String> {
        match self {
            PromptKind::Error { message } => Some(message.clone()),
            PromptKind::Overwrite { .. } => Some(
                "Following files already exist in the target directory. Overwrite them?"
                    .to_string(),
            ),
            PromptKind::Delete { .. } => {
                Some("Are you sure you want to delete this file?".to_string())
            }
            PromptKind::DeleteSelected { .. } => {
                Some("Are you sure you want to delete these files?".to_string())
            }
            PromptKind::Input { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PromptKind::Error { .. })
    }
}

/// Identifier of one prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PromptId(u64);

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prompt#{}", self.0)
    }
}

/// The user's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Proceed. `input` is set for input prompts and never empty.
    Confirm { input: Option<String> },
    Cancel,
}

impl Decision {
    pub fn is_confirm(&self) -> bool {
        matches!(self, Decision::Confirm { .. })
    }
}

/// A prompt taken out of the resolver together with its answer.
#[derive(Debug)]
pub struct Resolved<C> {
    pub id: PromptId,
    pub kind: PromptKind,
    pub decision: Decision,
    pub continuation: Option<C>,
}

#[derive(Debug)]
struct Slot<C> {
    id: PromptId,
    kind: PromptKind,
    continuation: Option<C>,
}

/// Single-slot prompt state machine: `Hidden -> Showing -> Hidden`.
#[derive(Debug)]
pub struct ConflictResolver<C> {
    showing: Option<Slot<C>>,
    queue: VecDeque<Slot<C>>,
    next_id: u64,
}

impl<C> Default for ConflictResolver<C> {
    fn default() -> Self {
        Self {
            showing: None,
            queue: VecDeque::new(),
            next_id: 0,
        }
    }
}

impl<C> ConflictResolver<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a prompt whose confirmation runs `continuation`.
    ///
    /// Queued when another prompt is visible.
    pub fn request(&mut self, kind: PromptKind, continuation: C) -> PromptId {
        self.push(kind, Some(continuation))
    }

    /// Show an informational error.
    pub fn show_error(&mut self, message: impl Into<String>) -> PromptId {
        self.push(
            PromptKind::Error {
                message: message.into(),
            },
            None,
        )
    }

    fn push(&mut self, kind: PromptKind, continuation: Option<C>) -> PromptId {
        self.next_id += 1;
        let id = PromptId(self.next_id);
        let slot = Slot {
            id,
            kind,
            continuation,
        };
        if self.showing.is_none() {
            self.showing = Some(slot);
        } else {
            self.queue.push_back(slot);
        }
        id
    }

    pub fn is_showing(&self) -> bool {
        self.showing.is_some()
    }

    /// Prompts waiting behind the visible one.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn current_kind(&self) -> Option<&PromptKind> {
        self.showing.as_ref().map(|slot| &slot.kind)
    }

    pub fn view(&self) -> Option<PromptView> {
        self.showing.as_ref().map(|slot| PromptView {
            id: slot.id,
            title: slot.kind.title().to_string(),
            message: slot.kind.message(),
            kind: slot.kind.clone(),
            queued: self.queue.len(),
        })
    }

    /// Confirm the visible prompt.
    ///
    /// An input prompt confirmed with blank input resolves as a cancel.
    /// Returns `None` when nothing is showing.
    pub fn confirm(&mut self, input: Option<String>) -> Option<Resolved<C>> {
        let slot = self.take()?;
        let decision = match &slot.kind {
            PromptKind::Input { .. } => match input.map(|s| s.trim().to_string()) {
                Some(value) if !value.is_empty() => Decision::Confirm { input: Some(value) },
                _ => Decision::Cancel,
            },
            _ => Decision::Confirm { input: None },
        };
        Some(resolve(slot, decision))
    }

    /// Cancel (or dismiss) the visible prompt.
    pub fn cancel(&mut self) -> Option<Resolved<C>> {
        let slot = self.take()?;
        Some(resolve(slot, Decision::Cancel))
    }

    /// Cancel the visible prompt and everything queued, in order.
    pub fn drain(&mut self) -> Vec<Resolved<C>> {
        let mut resolved = Vec::new();
        while let Some(r) = self.cancel() {
            resolved.push(r);
        }
        resolved
    }

    fn take(&mut self) -> Option<Slot<C>> {
        let slot = self.showing.take()?;
        self.showing = self.queue.pop_front();
        Some(slot)
    }
}

fn resolve<C>(slot: Slot<C>, decision: Decision) -> Resolved<C> {
    Resolved {
        id: slot.id,
        kind: slot.kind,
        decision,
        continuation: slot.continuation,
    }
}
