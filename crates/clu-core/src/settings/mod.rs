//! Per-server boolean settings persisted as messages + ballot reactions.

pub mod instance;
pub mod reconcile;
pub mod schema;
pub mod store;

pub use instance::{ballot_value, BallotMarkers, BooleanSetting, SettingBinding, SettingInstance};
pub use reconcile::{GuildReconciler, ReconcileReport};
pub use schema::{DefaultValue, SettingDefinition, SettingSchema, ValueKind};
pub use store::SettingStore;

/// Whether voice channels get renamed after what their occupants are playing.
pub const RENAME_VOICE_CHANNELS: &str = "RenameVoiceChannels";
/// Whether the optional command set is enabled.
pub const ALLOW_EXTRA_COMMANDS: &str = "AllowExtraCommands";
