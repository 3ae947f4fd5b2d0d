//! Collaborator ports onto the chat platform, plus the pacing decorator.

pub mod port;
pub mod throttled;
pub mod types;

pub use port::{ChannelAdminPort, DirectoryPort, MessagingPort, Platform};
