//! Activity log for the fintiva client.
//!
//! - [`events`] appends structured JSONL entries (`~/.fintiva/events.jsonl`)
//!   for logins, submissions and metrics failures.
//! - [`reporter`] reads them back for `fintiva activity`.

pub mod events;
pub mod reporter;
