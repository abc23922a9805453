//! # clink-core
//!
//! Core types, the sound catalog, and error handling for the clink
//! chat-triggered sound player.

pub mod auth;
pub mod catalog;
pub mod error;
pub mod types;

pub use auth::AuthorizationConfig;
pub use catalog::SoundCatalog;
pub use error::{Error, Result};
pub use types::*;
