//! Browsing session state and its actor.

mod actor;
mod conflict;
mod coordinator;
mod ledger;
mod selection;

pub use actor::{BrowserActor, BrowserHandle};
pub use conflict::{ConflictResolver, Decision, InputAction, PromptId, PromptKind, Resolved};
pub use coordinator::{Outcome, BUSY_MESSAGE};
pub use ledger::{
    EntryStatus, OperationId, OperationKind, OperationLedger, OperationStatus, PendingOperation,
};
pub use selection::SelectionSet;
