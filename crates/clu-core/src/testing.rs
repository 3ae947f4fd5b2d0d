//! In-memory platform used by unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;

use crate::{
    domain::{
        Channel, ChannelId, ChannelKind, Guild, GuildId, Member, Message, MessageId, MessageRef,
        ReactionTally, RoleId, UserId,
    },
    platform::{ChannelAdminPort, DirectoryPort, MessagingPort},
    settings::SettingSchema,
    Error, Result,
};

pub(crate) const SCHEMA: &str = r#"{"Settings":[
    {"Identifier":"RenameVoiceChannels","Description":"Rename voice channels after the game being played?","ValueTypeString":"Bool","DefaultValueStr":"true"},
    {"Identifier":"AllowExtraCommands","Description":"Allow extra commands?","ValueTypeString":"Bool","DefaultValueStr":"true"},
    {"Identifier":"QuietMode","Description":"Keep the bot quiet?","ValueTypeString":"Bool","DefaultValueStr":"false"}
]}"#;

pub(crate) fn schema() -> SettingSchema {
    SettingSchema::load(SCHEMA).unwrap()
}

struct StoredMessage {
    id: MessageId,
    channel_id: ChannelId,
    author_id: UserId,
    content: String,
}

#[derive(Default)]
struct State {
    next_id: u64,
    guilds: Vec<Guild>,
    channels: Vec<Channel>,
    messages: Vec<StoredMessage>,
    // (message, marker) -> reactors, in insertion order
    reactions: Vec<((MessageId, String), Vec<UserId>)>,
    occupants: HashMap<ChannelId, Vec<Member>>,
    calls: Vec<&'static str>,
    denials: Vec<(ChannelId, RoleId)>,
    renames: Vec<(ChannelId, String)>,
    failing_renames: HashSet<ChannelId>,
    failing_occupants: HashSet<ChannelId>,
    fail_fetch_messages: bool,
}

impl State {
    fn id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn snapshot(&self, stored: &StoredMessage) -> Message {
        let reactions = self
            .reactions
            .iter()
            .filter(|((id, _), who)| *id == stored.id && !who.is_empty())
            .map(|((_, marker), who)| ReactionTally {
                marker: marker.clone(),
                count: who.len() as u32,
            })
            .collect();
        Message {
            id: stored.id,
            channel_id: stored.channel_id,
            author_id: stored.author_id,
            content: stored.content.clone(),
            reactions,
        }
    }

    fn react(&mut self, msg: MessageId, marker: &str, user: UserId) {
        let key = (msg, marker.to_string());
        match self.reactions.iter_mut().find(|(k, _)| *k == key) {
            Some((_, who)) => {
                if !who.contains(&user) {
                    who.push(user);
                }
            }
            None => self.reactions.push((key, vec![user])),
        }
    }
}

/// Fake platform: every port backed by plain collections, every network call recorded.
pub(crate) struct FakePlatform {
    bot: UserId,
    state: Mutex<State>,
}

impl FakePlatform {
    pub(crate) fn new() -> Self {
        Self {
            bot: UserId(1),
            state: Mutex::new(State {
                next_id: 1000,
                ..State::default()
            }),
        }
    }

    pub(crate) fn bot_id(&self) -> UserId {
        self.bot
    }

    pub(crate) fn add_guild(&self, name: &str) -> Guild {
        let mut st = self.state.lock().unwrap();
        let id = st.id();
        let guild = Guild {
            id: GuildId(id),
            name: name.to_string(),
            afk_channel: None,
            everyone_role: RoleId(id),
        };
        st.guilds.push(guild.clone());
        guild
    }

    pub(crate) fn set_afk_channel(&self, guild_id: GuildId, channel_id: ChannelId) {
        let mut st = self.state.lock().unwrap();
        if let Some(g) = st.guilds.iter_mut().find(|g| g.id == guild_id) {
            g.afk_channel = Some(channel_id);
        }
    }

    fn add_channel(&self, guild_id: GuildId, name: &str, kind: ChannelKind) -> Channel {
        let mut st = self.state.lock().unwrap();
        let channel = Channel {
            id: ChannelId(st.id()),
            guild_id,
            name: name.to_string(),
            kind,
        };
        st.channels.push(channel.clone());
        channel
    }

    pub(crate) fn add_text_channel(&self, guild_id: GuildId, name: &str) -> Channel {
        self.add_channel(guild_id, name, ChannelKind::Text)
    }

    pub(crate) fn add_voice_channel(&self, guild_id: GuildId, name: &str) -> Channel {
        self.add_channel(guild_id, name, ChannelKind::Voice)
    }

    pub(crate) fn seat(&self, channel_id: ChannelId, user: u64, activity: Option<&str>) {
        let mut st = self.state.lock().unwrap();
        for members in st.occupants.values_mut() {
            members.retain(|m| m.user_id != UserId(user));
        }
        st.occupants.entry(channel_id).or_default().push(Member {
            user_id: UserId(user),
            activity: activity.map(str::to_string),
        });
    }

    pub(crate) fn seed_message(&self, channel_id: ChannelId, author: UserId, content: &str) -> Message {
        let mut st = self.state.lock().unwrap();
        let stored = StoredMessage {
            id: MessageId(st.id()),
            channel_id,
            author_id: author,
            content: content.to_string(),
        };
        let snapshot = st.snapshot(&stored);
        st.messages.push(stored);
        snapshot
    }

    pub(crate) fn seed_reaction(&self, msg: MessageRef, marker: &str, user: UserId) {
        self.state
            .lock()
            .unwrap()
            .react(msg.message_id, marker, user);
    }

    pub(crate) fn clear_reactions(&self, msg: MessageRef) {
        self.state
            .lock()
            .unwrap()
            .reactions
            .retain(|((id, _), _)| *id != msg.message_id);
    }

    pub(crate) fn fail_rename(&self, channel_id: ChannelId) {
        self.state.lock().unwrap().failing_renames.insert(channel_id);
    }

    pub(crate) fn fail_occupants(&self, channel_id: ChannelId) {
        self.state.lock().unwrap().failing_occupants.insert(channel_id);
    }

    pub(crate) fn fail_fetch_messages(&self, fail: bool) {
        self.state.lock().unwrap().fail_fetch_messages = fail;
    }

    pub(crate) fn count_calls(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| **c == name)
            .count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub(crate) fn renames(&self) -> Vec<(ChannelId, String)> {
        self.state.lock().unwrap().renames.clone()
    }

    pub(crate) fn permission_denials(&self) -> Vec<(ChannelId, RoleId)> {
        self.state.lock().unwrap().denials.clone()
    }

    fn record(&self, call: &'static str) -> std::sync::MutexGuard<'_, State> {
        let mut st = self.state.lock().unwrap();
        st.calls.push(call);
        st
    }
}

fn not_found(operation: &str, what: impl std::fmt::Display) -> Error {
    Error::platform(operation, format!("{what} not found"))
}

#[async_trait]
impl DirectoryPort for FakePlatform {
    async fn current_user(&self) -> Result<UserId> {
        Ok(self.bot)
    }

    async fn list_servers(&self) -> Result<Vec<Guild>> {
        Ok(self.state.lock().unwrap().guilds.clone())
    }

    async fn server(&self, guild_id: GuildId) -> Result<Guild> {
        self.state
            .lock()
            .unwrap()
            .guilds
            .iter()
            .find(|g| g.id == guild_id)
            .cloned()
            .ok_or_else(|| not_found("server", guild_id))
    }

    async fn list_voice_channels(&self, guild_id: GuildId) -> Result<Vec<Channel>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .channels
            .iter()
            .filter(|c| c.guild_id == guild_id && c.kind == ChannelKind::Voice)
            .cloned()
            .collect())
    }

    async fn list_text_channels(&self, guild_id: GuildId) -> Result<Vec<Channel>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .channels
            .iter()
            .filter(|c| c.guild_id == guild_id && c.kind == ChannelKind::Text)
            .cloned()
            .collect())
    }

    async fn channel(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Channel> {
        self.state
            .lock()
            .unwrap()
            .channels
            .iter()
            .find(|c| c.guild_id == guild_id && c.id == channel_id)
            .cloned()
            .ok_or_else(|| not_found("channel", channel_id))
    }

    async fn occupants(&self, channel: &Channel) -> Result<Vec<Member>> {
        let st = self.state.lock().unwrap();
        if st.failing_occupants.contains(&channel.id) {
            return Err(Error::platform("occupants", "voice state unavailable"));
        }
        Ok(st
            .occupants
            .get(&channel.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn membership(&self, guild_id: GuildId, user_id: UserId) -> Result<Option<ChannelId>> {
        let st = self.state.lock().unwrap();
        Ok(st
            .occupants
            .iter()
            .filter(|(id, _)| {
                st.channels
                    .iter()
                    .any(|c| c.id == **id && c.guild_id == guild_id)
            })
            .find(|(_, members)| members.iter().any(|m| m.user_id == user_id))
            .map(|(id, _)| *id))
    }
}

#[async_trait]
impl MessagingPort for FakePlatform {
    async fn fetch_messages(&self, channel_id: ChannelId) -> Result<Vec<Message>> {
        let st = self.record("fetch_messages");
        if st.fail_fetch_messages {
            return Err(Error::platform("fetch_messages", "service unavailable"));
        }
        Ok(st
            .messages
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .map(|m| st.snapshot(m))
            .collect())
    }

    async fn fetch_message(&self, msg: MessageRef) -> Result<Message> {
        let st = self.record("fetch_message");
        st.messages
            .iter()
            .find(|m| m.id == msg.message_id && m.channel_id == msg.channel_id)
            .map(|m| st.snapshot(m))
            .ok_or_else(|| not_found("fetch_message", msg.message_id))
    }

    async fn send_message(&self, channel_id: ChannelId, text: &str) -> Result<Message> {
        let mut st = self.record("send_message");
        let stored = StoredMessage {
            id: MessageId(st.id()),
            channel_id,
            author_id: self.bot,
            content: text.to_string(),
        };
        let snapshot = st.snapshot(&stored);
        st.messages.push(stored);
        Ok(snapshot)
    }

    async fn add_reaction(&self, msg: MessageRef, marker: &str) -> Result<()> {
        let mut st = self.record("add_reaction");
        st.react(msg.message_id, marker, self.bot);
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        let mut st = self.record("delete_message");
        st.messages.retain(|m| m.id != msg.message_id);
        Ok(())
    }

    async fn reactors(&self, msg: MessageRef, marker: &str) -> Result<Vec<UserId>> {
        let st = self.record("reactors");
        Ok(st
            .reactions
            .iter()
            .find(|((id, m), _)| *id == msg.message_id && m == marker)
            .map(|(_, who)| who.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ChannelAdminPort for FakePlatform {
    async fn create_text_channel(&self, guild_id: GuildId, name: &str) -> Result<Channel> {
        let mut st = self.record("create_text_channel");
        let channel = Channel {
            id: ChannelId(st.id()),
            guild_id,
            name: name.to_string(),
            kind: ChannelKind::Text,
        };
        st.channels.push(channel.clone());
        Ok(channel)
    }

    async fn set_permission(&self, channel_id: ChannelId, role: RoleId, deny_all: bool) -> Result<()> {
        let mut st = self.record("set_permission");
        if deny_all {
            st.denials.push((channel_id, role));
        }
        Ok(())
    }

    async fn rename_voice_channel(&self, channel_id: ChannelId, name: &str) -> Result<()> {
        let mut st = self.record("rename_voice_channel");
        if st.failing_renames.contains(&channel_id) {
            return Err(Error::platform("rename_voice_channel", "missing permissions"));
        }
        if let Some(c) = st.channels.iter_mut().find(|c| c.id == channel_id) {
            c.name = name.to_string();
        }
        st.renames.push((channel_id, name.to_string()));
        Ok(())
    }
}
