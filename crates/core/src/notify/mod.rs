//! Notification job definitions and message templating.

pub mod job;
pub mod template;

pub use job::{JobKind, RunSummary, SkipReason};
pub use template::{render, MessageContext};
