// src/chat/mod.rs — Conversation layer

pub mod controller;
pub mod message;
pub mod view;

pub use controller::{Controller, Conversation, RenderSink, SinkClosed, SubmitOutcome};
pub use message::{Message, Role, SessionSummary, Transcript};
pub use view::ViewState;
