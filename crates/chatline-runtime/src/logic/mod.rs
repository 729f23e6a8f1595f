//! Conversation Logic Module
//!
//! One task per conversation owns that conversation's store:
//! - `state`: task statistics
//! - `handle`: cloneable request/response front end for a task
//! - `task`: the `ConversationTask` command loop
//!
//! Commands for a single conversation are applied strictly in arrival order.
//! Separate conversations run on separate tasks and never share state.

pub mod handle;
pub mod state;
pub mod task;

pub use handle::ConversationHandle;
pub use state::TaskStats;
pub use task::ConversationTask;
