//! Platform-neutral ids and snapshots of platform objects.

use std::fmt;

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

snowflake!(
    /// Server (guild) id.
    GuildId
);
snowflake!(
    /// Text or voice channel id.
    ChannelId
);
snowflake!(
    /// Message id.
    MessageId
);
snowflake!(
    /// User / member id.
    UserId
);
snowflake!(
    /// Role id.
    RoleId
);

/// A server as seen by the directory service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Guild {
    pub id: GuildId,
    pub name: String,
    /// The designated "away" (AFK) voice channel, if the server has one.
    pub afk_channel: Option<ChannelId>,
    /// Role every member holds; permission overwrites on it apply to ordinary members.
    pub everyone_role: RoleId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelKind {
    Text,
    Voice,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub guild_id: GuildId,
    pub name: String,
    pub kind: ChannelKind,
}

/// A voice channel occupant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub user_id: UserId,
    /// Self-reported "currently playing" activity, if any.
    pub activity: Option<String>,
}

/// Stable reference to a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionTally {
    pub marker: String,
    pub count: u32,
}

/// Snapshot of a message at the time it was fetched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub content: String,
    pub reactions: Vec<ReactionTally>,
}

impl Message {
    pub fn reference(&self) -> MessageRef {
        MessageRef {
            channel_id: self.channel_id,
            message_id: self.id,
        }
    }

    /// Number of reactions with `marker`, zero if nobody used it.
    pub fn reaction_count(&self, marker: &str) -> u32 {
        self.reactions
            .iter()
            .find(|r| r.marker == marker)
            .map(|r| r.count)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaction_count_defaults_to_zero() {
        let msg = Message {
            id: MessageId(1),
            channel_id: ChannelId(2),
            author_id: UserId(3),
            content: "x".to_string(),
            reactions: vec![ReactionTally {
                marker: "✔️".to_string(),
                count: 4,
            }],
        };
        assert_eq!(msg.reaction_count("✔️"), 4);
        assert_eq!(msg.reaction_count("❌"), 0);
        assert_eq!(
            msg.reference(),
            MessageRef {
                channel_id: ChannelId(2),
                message_id: MessageId(1)
            }
        );
    }
}
