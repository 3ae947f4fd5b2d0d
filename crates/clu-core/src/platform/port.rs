use async_trait::async_trait;

use crate::{
    domain::{Channel, ChannelId, Guild, GuildId, Member, Message, MessageRef, RoleId, UserId},
    Result,
};

/// Read-only view of servers, channels and who sits where.
#[async_trait]
pub trait DirectoryPort: Send + Sync {
    /// Identity the bot acts as.
    async fn current_user(&self) -> Result<UserId>;

    async fn list_servers(&self) -> Result<Vec<Guild>>;
    async fn server(&self, guild_id: GuildId) -> Result<Guild>;

    async fn list_voice_channels(&self, guild_id: GuildId) -> Result<Vec<Channel>>;
    async fn list_text_channels(&self, guild_id: GuildId) -> Result<Vec<Channel>>;
    async fn channel(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Channel>;

    async fn occupants(&self, channel: &Channel) -> Result<Vec<Member>>;
    /// Voice channel `user_id` currently sits in, if any.
    async fn membership(&self, guild_id: GuildId, user_id: UserId) -> Result<Option<ChannelId>>;
}

#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn fetch_messages(&self, channel_id: ChannelId) -> Result<Vec<Message>>;
    async fn fetch_message(&self, msg: MessageRef) -> Result<Message>;
    async fn send_message(&self, channel_id: ChannelId, text: &str) -> Result<Message>;
    async fn add_reaction(&self, msg: MessageRef, marker: &str) -> Result<()>;
    async fn delete_message(&self, msg: MessageRef) -> Result<()>;
    async fn reactors(&self, msg: MessageRef, marker: &str) -> Result<Vec<UserId>>;

    /// Current count of `marker` on the message, read from a fresh fetch.
    async fn reaction_tally(&self, msg: MessageRef, marker: &str) -> Result<u32> {
        Ok(self.fetch_message(msg).await?.reaction_count(marker))
    }
}

#[async_trait]
pub trait ChannelAdminPort: Send + Sync {
    async fn create_text_channel(&self, guild_id: GuildId, name: &str) -> Result<Channel>;
    /// With `deny_all`, members holding `role` lose view/send/react on the channel.
    async fn set_permission(&self, channel_id: ChannelId, role: RoleId, deny_all: bool)
        -> Result<()>;
    /// May fail with a validation or permission error.
    async fn rename_voice_channel(&self, channel_id: ChannelId, name: &str) -> Result<()>;
}

/// Everything the core needs from the platform.
pub trait Platform: DirectoryPort + MessagingPort + ChannelAdminPort {}

impl<T> Platform for T where T: DirectoryPort + MessagingPort + ChannelAdminPort {}
