//! Core domain types for clink.

pub mod chat;
pub mod sound;

pub use chat::ChatMessage;
pub use sound::SoundEntry;
