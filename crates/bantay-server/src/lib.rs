//! Bantay server: configuration loading, the platform messenger and
//! the event router that drives the moderation core.

pub mod config;
pub mod error;
pub mod messenger;
pub mod router;

pub use config::{ConfigError, ServerConfig};
pub use error::ServerError;
pub use messenger::{JsonLinesMessenger, Messenger, Outbound};
pub use router::{Command, CommandError, InboundEvent, Router};
