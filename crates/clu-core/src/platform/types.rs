use crate::domain::{ChannelId, GuildId, MessageRef, UserId};

/// Platform notifications consumed by the core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlatformEvent {
    /// Process is connected and the server list is available.
    Ready,
    /// The bot was added to a server.
    GuildJoined { guild_id: GuildId },
    /// The bot was removed from a server (not a transient outage).
    GuildLeft { guild_id: GuildId },
    /// A member's "currently playing" activity may have changed.
    MemberUpdated {
        guild_id: GuildId,
        user_id: UserId,
        old_activity: Option<String>,
        new_activity: Option<String>,
    },
    /// A member's voice state changed (channel move, mute, deafen...).
    VoiceStateUpdated {
        guild_id: GuildId,
        user_id: UserId,
        old_channel: Option<ChannelId>,
        new_channel: Option<ChannelId>,
    },
    ReactionAdded { message: MessageRef },
    ReactionRemoved { message: MessageRef },
    ReactionsCleared { message: MessageRef },
}

/// Routing tag of a [`PlatformEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    GuildJoined,
    GuildLeft,
    MemberUpdated,
    VoiceStateUpdated,
    ReactionAdded,
    ReactionRemoved,
    ReactionsCleared,
}

impl PlatformEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Ready => EventKind::Ready,
            Self::GuildJoined { .. } => EventKind::GuildJoined,
            Self::GuildLeft { .. } => EventKind::GuildLeft,
            Self::MemberUpdated { .. } => EventKind::MemberUpdated,
            Self::VoiceStateUpdated { .. } => EventKind::VoiceStateUpdated,
            Self::ReactionAdded { .. } => EventKind::ReactionAdded,
            Self::ReactionRemoved { .. } => EventKind::ReactionRemoved,
            Self::ReactionsCleared { .. } => EventKind::ReactionsCleared,
        }
    }
}
