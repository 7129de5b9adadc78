//! Settlement events.
//!
//! The engine publishes events when orders change status, when revenue is recognized and when a participant should be
//! told about something. Subscribers register hooks through [`EventHooks`]; delivery (email, push, webhooks) is up to
//! the hook, the engine only guarantees that events are published after the change they describe has been stored.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
