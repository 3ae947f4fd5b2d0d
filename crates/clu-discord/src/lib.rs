//! Discord adapter (serenity).
//!
//! This crate implements the `clu-core` platform ports over the Discord gateway
//! cache and REST API, and feeds gateway events into the core router.

use std::sync::Arc;

use async_trait::async_trait;

use serenity::{
    all::{
        ActivityType, ChannelType, CreateChannel, CreateMessage, EditChannel, GetMessages,
        PermissionOverwrite, PermissionOverwriteType, Permissions, ReactionType,
    },
    cache::Cache,
    http::{CacheHttp, Http},
    model::{
        channel::GuildChannel,
        guild::{Guild as DiscordGuild, PartialGuild},
        id as sid,
    },
};

pub mod handler;

pub use handler::{run, Handler};

use clu_core::{
    domain::{
        Channel, ChannelId, ChannelKind, Guild, GuildId, Member, Message, MessageId, MessageRef,
        ReactionTally, RoleId, UserId,
    },
    errors::Error,
    platform::{ChannelAdminPort, DirectoryPort, MessagingPort},
    Result,
};

/// Largest page the message and reaction-user endpoints hand out.
const PAGE_SIZE: u8 = 100;

/// Ports over a live serenity client: reads come from the gateway cache where it
/// has them, everything else goes over HTTP.
#[derive(Clone)]
pub struct DiscordPlatform {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }

    fn dc_guild(guild_id: GuildId) -> sid::GuildId {
        sid::GuildId::new(guild_id.0)
    }

    fn dc_channel(channel_id: ChannelId) -> sid::ChannelId {
        sid::ChannelId::new(channel_id.0)
    }

    fn dc_message(message_id: MessageId) -> sid::MessageId {
        sid::MessageId::new(message_id.0)
    }

    fn dc_user(user_id: UserId) -> sid::UserId {
        sid::UserId::new(user_id.0)
    }

    fn map_err(operation: &'static str) -> impl FnOnce(serenity::Error) -> Error {
        move |e| Error::platform(operation, format!("discord error: {e}"))
    }

    fn not_cached(operation: &'static str, guild_id: GuildId) -> Error {
        Error::platform(operation, format!("server {guild_id} is not in the gateway cache"))
    }

    async fn guild_channels(&self, guild_id: GuildId) -> Result<Vec<Channel>> {
        let cached = self.cache.guild(Self::dc_guild(guild_id)).map(|g| {
            g.channels
                .values()
                .filter_map(to_channel)
                .collect::<Vec<_>>()
        });
        let mut channels = match cached {
            Some(v) => v,
            None => Self::dc_guild(guild_id)
                .channels(self)
                .await
                .map_err(Self::map_err("list_channels"))?
                .values()
                .filter_map(to_channel)
                .collect(),
        };
        channels.sort_by_key(|c| c.id);
        Ok(channels)
    }
}

impl CacheHttp for DiscordPlatform {
    fn http(&self) -> &Http {
        &self.http
    }

    fn cache(&self) -> Option<&Arc<Cache>> {
        Some(&self.cache)
    }
}

impl AsRef<Http> for DiscordPlatform {
    fn as_ref(&self) -> &Http {
        &self.http
    }
}

pub(crate) fn to_guild(guild: &DiscordGuild) -> Guild {
    Guild {
        id: GuildId(guild.id.get()),
        name: guild.name.clone(),
        afk_channel: guild
            .afk_metadata
            .as_ref()
            .map(|afk| ChannelId(afk.afk_channel_id.get())),
        // The @everyone role shares the server's snowflake.
        everyone_role: RoleId(guild.id.get()),
    }
}

fn partial_to_guild(guild: &PartialGuild) -> Guild {
    Guild {
        id: GuildId(guild.id.get()),
        name: guild.name.clone(),
        afk_channel: guild
            .afk_metadata
            .as_ref()
            .map(|afk| ChannelId(afk.afk_channel_id.get())),
        everyone_role: RoleId(guild.id.get()),
    }
}

pub(crate) fn channel_kind(kind: ChannelType) -> Option<ChannelKind> {
    match kind {
        ChannelType::Text => Some(ChannelKind::Text),
        ChannelType::Voice => Some(ChannelKind::Voice),
        _ => None,
    }
}

fn to_channel(channel: &GuildChannel) -> Option<Channel> {
    Some(Channel {
        id: ChannelId(channel.id.get()),
        guild_id: GuildId(channel.guild_id.get()),
        name: channel.name.clone(),
        kind: channel_kind(channel.kind)?,
    })
}

/// Marker text of a reaction. Custom server emoji never count as ballots.
pub(crate) fn reaction_marker(reaction: &ReactionType) -> Option<String> {
    match reaction {
        ReactionType::Unicode(s) => Some(s.clone()),
        _ => None,
    }
}

pub(crate) fn tallies<'a>(
    reactions: impl IntoIterator<Item = (&'a ReactionType, u64)>,
) -> Vec<ReactionTally> {
    reactions
        .into_iter()
        .filter_map(|(reaction, count)| {
            Some(ReactionTally {
                marker: reaction_marker(reaction)?,
                count: u32::try_from(count).unwrap_or(u32::MAX),
            })
        })
        .collect()
}

/// First "Playing" activity name, ignoring streaming/listening/custom statuses.
pub(crate) fn playing_activity<'a>(
    activities: impl IntoIterator<Item = (ActivityType, &'a str)>,
) -> Option<String> {
    activities
        .into_iter()
        .find(|(kind, name)| *kind == ActivityType::Playing && !name.trim().is_empty())
        .map(|(_, name)| name.to_string())
}

fn to_message(msg: &serenity::model::channel::Message) -> Message {
    Message {
        id: MessageId(msg.id.get()),
        channel_id: ChannelId(msg.channel_id.get()),
        author_id: UserId(msg.author.id.get()),
        content: msg.content.clone(),
        reactions: tallies(msg.reactions.iter().map(|r| (&r.reaction_type, r.count))),
    }
}

fn ballot_permissions() -> Permissions {
    Permissions::VIEW_CHANNEL
        | Permissions::SEND_MESSAGES
        | Permissions::ADD_REACTIONS
        | Permissions::READ_MESSAGE_HISTORY
}

#[async_trait]
impl DirectoryPort for DiscordPlatform {
    async fn current_user(&self) -> Result<UserId> {
        Ok(UserId(self.cache.current_user().id.get()))
    }

    async fn list_servers(&self) -> Result<Vec<Guild>> {
        Ok(self
            .cache
            .guilds()
            .into_iter()
            .filter_map(|id| self.cache.guild(id).map(|g| to_guild(&g)))
            .collect())
    }

    async fn server(&self, guild_id: GuildId) -> Result<Guild> {
        let cached = self.cache.guild(Self::dc_guild(guild_id)).map(|g| to_guild(&g));
        if let Some(guild) = cached {
            return Ok(guild);
        }
        let partial = self
            .http
            .get_guild(Self::dc_guild(guild_id))
            .await
            .map_err(Self::map_err("server"))?;
        Ok(partial_to_guild(&partial))
    }

    async fn list_voice_channels(&self, guild_id: GuildId) -> Result<Vec<Channel>> {
        let mut channels = self.guild_channels(guild_id).await?;
        channels.retain(|c| c.kind == ChannelKind::Voice);
        Ok(channels)
    }

    async fn list_text_channels(&self, guild_id: GuildId) -> Result<Vec<Channel>> {
        let mut channels = self.guild_channels(guild_id).await?;
        channels.retain(|c| c.kind == ChannelKind::Text);
        Ok(channels)
    }

    async fn channel(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Channel> {
        self.guild_channels(guild_id)
            .await?
            .into_iter()
            .find(|c| c.id == channel_id)
            .ok_or_else(|| Error::platform("channel", format!("channel {channel_id} not found")))
    }

    async fn occupants(&self, channel: &Channel) -> Result<Vec<Member>> {
        let guild = self
            .cache
            .guild(Self::dc_guild(channel.guild_id))
            .ok_or_else(|| Self::not_cached("occupants", channel.guild_id))?;
        let target = Self::dc_channel(channel.id);
        let mut members: Vec<Member> = guild
            .voice_states
            .values()
            .filter(|vs| vs.channel_id == Some(target))
            .map(|vs| Member {
                user_id: UserId(vs.user_id.get()),
                activity: guild.presences.get(&vs.user_id).and_then(|p| {
                    playing_activity(p.activities.iter().map(|a| (a.kind, a.name.as_str())))
                }),
            })
            .collect();
        members.sort_by_key(|m| m.user_id);
        Ok(members)
    }

    async fn membership(&self, guild_id: GuildId, user_id: UserId) -> Result<Option<ChannelId>> {
        let guild = self
            .cache
            .guild(Self::dc_guild(guild_id))
            .ok_or_else(|| Self::not_cached("membership", guild_id))?;
        Ok(guild
            .voice_states
            .get(&Self::dc_user(user_id))
            .and_then(|vs| vs.channel_id)
            .map(|id| ChannelId(id.get())))
    }
}

#[async_trait]
impl MessagingPort for DiscordPlatform {
    async fn fetch_messages(&self, channel_id: ChannelId) -> Result<Vec<Message>> {
        let channel = Self::dc_channel(channel_id);
        let mut out = Vec::new();
        let mut before: Option<sid::MessageId> = None;
        loop {
            let mut request = GetMessages::new().limit(PAGE_SIZE);
            if let Some(id) = before {
                request = request.before(id);
            }
            let page = channel
                .messages(self, request)
                .await
                .map_err(Self::map_err("fetch_messages"))?;
            let exhausted = page.len() < usize::from(PAGE_SIZE);
            before = page.last().map(|m| m.id);
            out.extend(page.iter().map(to_message));
            if exhausted || before.is_none() {
                break;
            }
        }
        // Pages arrive newest first.
        out.reverse();
        Ok(out)
    }

    async fn fetch_message(&self, msg: MessageRef) -> Result<Message> {
        let fetched = Self::dc_channel(msg.channel_id)
            .message(self, Self::dc_message(msg.message_id))
            .await
            .map_err(Self::map_err("fetch_message"))?;
        Ok(to_message(&fetched))
    }

    async fn send_message(&self, channel_id: ChannelId, text: &str) -> Result<Message> {
        let sent = Self::dc_channel(channel_id)
            .send_message(self, CreateMessage::new().content(text))
            .await
            .map_err(Self::map_err("send_message"))?;
        Ok(to_message(&sent))
    }

    async fn add_reaction(&self, msg: MessageRef, marker: &str) -> Result<()> {
        Self::dc_channel(msg.channel_id)
            .create_reaction(
                self,
                Self::dc_message(msg.message_id),
                ReactionType::Unicode(marker.to_string()),
            )
            .await
            .map_err(Self::map_err("add_reaction"))
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        Self::dc_channel(msg.channel_id)
            .delete_message(self, Self::dc_message(msg.message_id))
            .await
            .map_err(Self::map_err("delete_message"))
    }

    async fn reactors(&self, msg: MessageRef, marker: &str) -> Result<Vec<UserId>> {
        let channel = Self::dc_channel(msg.channel_id);
        let mut out = Vec::new();
        let mut after: Option<sid::UserId> = None;
        loop {
            let page = channel
                .reaction_users(
                    self,
                    Self::dc_message(msg.message_id),
                    ReactionType::Unicode(marker.to_string()),
                    Some(PAGE_SIZE),
                    after,
                )
                .await
                .map_err(Self::map_err("reactors"))?;
            let exhausted = page.len() < usize::from(PAGE_SIZE);
            after = page.last().map(|u| u.id);
            out.extend(page.iter().map(|u| UserId(u.id.get())));
            if exhausted || after.is_none() {
                break;
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl ChannelAdminPort for DiscordPlatform {
    async fn create_text_channel(&self, guild_id: GuildId, name: &str) -> Result<Channel> {
        let created = Self::dc_guild(guild_id)
            .create_channel(self, CreateChannel::new(name).kind(ChannelType::Text))
            .await
            .map_err(Self::map_err("create_text_channel"))?;
        to_channel(&created).ok_or_else(|| {
            Error::platform("create_text_channel", "server returned a non-text channel")
        })
    }

    async fn set_permission(&self, channel_id: ChannelId, role: RoleId, deny_all: bool) -> Result<()> {
        let channel = Self::dc_channel(channel_id);
        let (allow, deny) = if deny_all {
            (Permissions::empty(), ballot_permissions())
        } else {
            (ballot_permissions(), Permissions::empty())
        };
        channel
            .create_permission(
                self,
                PermissionOverwrite {
                    allow,
                    deny,
                    kind: PermissionOverwriteType::Role(sid::RoleId::new(role.0)),
                },
            )
            .await
            .map_err(Self::map_err("set_permission"))?;

        if deny_all {
            // Keep the bot itself able to read and vote in the channel it just locked.
            let me = self.cache.current_user().id;
            channel
                .create_permission(
                    self,
                    PermissionOverwrite {
                        allow: ballot_permissions(),
                        deny: Permissions::empty(),
                        kind: PermissionOverwriteType::Member(me),
                    },
                )
                .await
                .map_err(Self::map_err("set_permission"))?;
        }
        Ok(())
    }

    async fn rename_voice_channel(&self, channel_id: ChannelId, name: &str) -> Result<()> {
        Self::dc_channel(channel_id)
            .edit(self, EditChannel::new().name(name))
            .await
            .map_err(Self::map_err("rename_voice_channel"))?;
        Ok(())
    }
}
