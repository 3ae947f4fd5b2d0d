//! Core domain + application logic for the Clu Discord bot.
//!
//! Nothing in here knows about Discord. The gateway and REST client live behind
//! ports (traits) implemented in the adapter crate.

pub mod config;
pub mod context;
pub mod domain;
pub mod errors;
pub mod labeling;
pub mod logging;
pub mod platform;
pub mod router;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
